use serde::{Deserialize, Serialize};
use crate::error::{HarnessError, Result};

/// Most points a single axis may hold.
pub const MAX_AXIS_LEN: usize = 1 << 16;

/// Describes how to generate the values of a parameter axis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AxisSpec {
    /// `base^from, base^(from+1), ..., base^to`, e.g. tree sizes 2^5..2^19.
    Geometric { base: u64, from: u32, to: u32 },
    /// `start, start+step, ..., <= end`, e.g. thread counts 1..31.
    Linear { start: u64, end: u64, step: u64 },
    /// Values given verbatim.
    Explicit { values: Vec<u64> },
}

impl AxisSpec {
    pub fn powers_of_two(from: u32, to: u32) -> Self {
        AxisSpec::Geometric { base: 2, from, to }
    }

    pub fn range(start: u64, end: u64) -> Self {
        AxisSpec::Linear { start, end, step: 1 }
    }

    /// Generates and validates the axis.
    pub fn build(&self) -> Result<ParameterAxis> {
        match self {
            AxisSpec::Geometric { base, from, to } => {
                if *base < 2 {
                    return Err(HarnessError::InvalidAxis(format!("geometric base {} must be at least 2", base)));
                }
                let values = (*from..=*to)
                    .map(|k| {
                        base.checked_pow(k).ok_or_else(|| {
                            HarnessError::InvalidAxis(format!("{}^{} overflows", base, k))
                        })
                    })
                    .collect::<Result<Vec<u64>>>()?;
                ParameterAxis::new(values)
            }
            AxisSpec::Linear { start, end, step } => {
                if *step == 0 {
                    return Err(HarnessError::InvalidAxis("linear step must be positive".to_string()));
                }
                // Counted before generating so a huge range never allocates
                let len = if end < start { 0 } else { (end - start) / step + 1 };
                if len > MAX_AXIS_LEN as u64 {
                    return Err(HarnessError::InvalidAxis(format!(
                        "linear axis has {} values, at most {} allowed",
                        len, MAX_AXIS_LEN
                    )));
                }
                let stride = usize::try_from(*step)
                    .map_err(|_| HarnessError::InvalidAxis(format!("linear step {} is too large", step)))?;
                ParameterAxis::new((*start..=*end).step_by(stride).collect())
            }
            AxisSpec::Explicit { values } => ParameterAxis::new(values.clone()),
        }
    }
}

/// A non-empty, strictly increasing sequence of parameter values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct ParameterAxis {
    values: Vec<u64>,
}

impl ParameterAxis {
    pub fn new(values: Vec<u64>) -> Result<Self> {
        if values.is_empty() {
            return Err(HarnessError::InvalidAxis("axis has no values".to_string()));
        }
        if values.len() > MAX_AXIS_LEN {
            return Err(HarnessError::InvalidAxis(format!(
                "axis has {} values, at most {} allowed",
                values.len(),
                MAX_AXIS_LEN
            )));
        }
        if let Some(pair) = values.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(HarnessError::InvalidAxis(format!(
                "values must be strictly increasing, found {} followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(ParameterAxis { values })
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<Vec<u64>> for ParameterAxis {
    type Error = HarnessError;

    fn try_from(values: Vec<u64>) -> Result<Self> {
        ParameterAxis::new(values)
    }
}

impl From<ParameterAxis> for Vec<u64> {
    fn from(axis: ParameterAxis) -> Self {
        axis.values
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::axis::ParameterAxis;
use crate::error::{HarnessError, Result};
use crate::reducer::summarize;
use crate::runner::{Invocation, TrialProcess, TrialRunner};
use crate::samples::SampleLayout;

pub const DEFAULT_REPEATS: usize = 100;

/// How the optional seed argument is derived from the parameter value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SeedPolicy {
    /// No seed argument is passed.
    #[default]
    Omitted,
    /// The same seed for every point.
    Fixed { value: u64 },
    /// The seed is the parameter value itself.
    Parameter,
    /// A pseudo-random non-zero seed, reproducible from `base` and the parameter.
    Random { base: u64 },
}

impl SeedPolicy {
    pub fn seed_for(&self, parameter: u64) -> Option<u64> {
        match *self {
            SeedPolicy::Omitted => None,
            SeedPolicy::Fixed { value } => Some(value),
            SeedPolicy::Parameter => Some(parameter),
            SeedPolicy::Random { base } => {
                let mut rng = StdRng::seed_from_u64(base ^ parameter.rotate_left(32));
                Some(rng.gen_range(1..=u32::MAX as u64))
            }
        }
    }
}

/// Everything the orchestrator needs to know about one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepDefinition {
    pub variants: Vec<String>,
    pub axis: ParameterAxis,
    pub repeats: usize,
    pub operations: Vec<String>,
    pub layout: SampleLayout,
    pub seed: SeedPolicy,
}

impl SweepDefinition {
    /// A sweep of one undifferentiated latency per trial.
    pub fn single_operation(variants: Vec<String>, axis: ParameterAxis) -> Self {
        SweepDefinition {
            variants,
            axis,
            repeats: DEFAULT_REPEATS,
            operations: vec!["latency".to_string()],
            layout: SampleLayout::Flat,
            seed: SeedPolicy::Omitted,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.variants.is_empty() {
            return Err(HarnessError::invalid_plan("no variants to benchmark"));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.variants.iter().find(|v| !seen.insert(v.as_str())) {
            return Err(HarnessError::invalid_plan(format!("variant '{}' listed twice", duplicate)));
        }
        if self.repeats == 0 {
            return Err(HarnessError::invalid_plan("repeats must be at least 1"));
        }
        if self.operations.is_empty() {
            return Err(HarnessError::invalid_plan("no operations to track"));
        }
        if self.layout == SampleLayout::Flat && self.operations.len() != 1 {
            return Err(HarnessError::invalid_plan(format!(
                "flat layout tracks a single operation, {} given",
                self.operations.len()
            )));
        }
        Ok(())
    }
}

/// Reduced latencies at one parameter value, one per operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SweepPoint {
    pub parameter: u64,
    pub latencies: Vec<u64>,
}

/// The points of one variant, in axis order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariantSeries {
    pub variant: String,
    pub points: Vec<SweepPoint>,
}

/// The output of a whole sweep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SweepResult {
    pub operations: Vec<String>,
    pub parameters: Vec<u64>,
    pub variants: Vec<VariantSeries>,
}

impl SweepResult {
    /// Returns the reduced latencies of `variant` at `parameter`, one per operation.
    pub fn get(&self, variant: &str, parameter: u64) -> Option<&[u64]> {
        self.variants
            .iter()
            .find(|series| series.variant == variant)?
            .points
            .iter()
            .find(|point| point.parameter == parameter)
            .map(|point| point.latencies.as_slice())
    }

    pub fn operation_index(&self, operation: &str) -> Option<usize> {
        self.operations.iter().position(|op| op == operation)
    }

    /// Returns the `(parameter, latency)` line of one variant and operation, ready to plot.
    ///
    /// Points that lack a value for `operation` (a hand-edited results file) are skipped.
    pub fn line(&self, variant: &str, operation: &str) -> Option<Vec<(u64, u64)>> {
        let index = self.operation_index(operation)?;
        let series = self.variants.iter().find(|series| series.variant == variant)?;
        Some(
            series
                .points
                .iter()
                .filter_map(|point| point.latencies.get(index).map(|&latency| (point.parameter, latency)))
                .collect(),
        )
    }
}

/// Runs every variant over the whole axis, one after the other.
///
/// Any error aborts the sweep and nothing is returned for the points
/// measured so far.
pub fn run_sweep<P: TrialProcess>(runner: &mut TrialRunner<P>, definition: &SweepDefinition) -> Result<SweepResult> {
    definition.validate()?;

    let total_points = definition.variants.len() * definition.axis.len();
    let mut done = 0;
    let mut variants = Vec::with_capacity(definition.variants.len());

    for variant in &definition.variants {
        info!("Benchmarking \"{}\"", variant);
        let mut points = Vec::with_capacity(definition.axis.len());

        for &parameter in definition.axis.values() {
            let point = measure_point(runner, definition, variant, parameter)?;
            done += 1;
            info!("({}/{}) {} {} -> {:?} ns", done, total_points, variant, parameter, point.latencies);
            points.push(point);
        }

        variants.push(VariantSeries { variant: variant.clone(), points });
    }

    Ok(SweepResult {
        operations: definition.operations.clone(),
        parameters: definition.axis.values().to_vec(),
        variants,
    })
}

/// Repeats the trial at one parameter value and reduces each operation's samples.
pub fn measure_point<P: TrialProcess>(
    runner: &mut TrialRunner<P>,
    definition: &SweepDefinition,
    variant: &str,
    parameter: u64,
) -> Result<SweepPoint> {
    let width = definition.operations.len();
    let invocation = Invocation::new(variant, parameter).with_seed(definition.seed.seed_for(parameter));

    let mut series: Vec<Vec<u64>> = vec![Vec::with_capacity(definition.repeats); width];
    for _ in 0..definition.repeats {
        let trial = runner.run(&invocation)?;
        let per_operation = definition.layout.decompose(&trial.values, width)?;
        for (samples, values) in series.iter_mut().zip(per_operation) {
            samples.extend(values);
        }
    }

    let mut latencies = Vec::with_capacity(width);
    for (operation, samples) in definition.operations.iter().zip(&series) {
        let summary = summarize(samples)?;
        debug!(
            "{} {} {}: mean {:.1} std {:.1}, kept {}/{} -> {}",
            variant,
            parameter,
            operation,
            summary.mean,
            summary.std_dev,
            summary.kept,
            samples.len(),
            summary.reduced
        );
        latencies.push(summary.reduced);
    }

    Ok(SweepPoint { parameter, latencies })
}

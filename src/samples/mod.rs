use serde::{Deserialize, Serialize};
use crate::error::{HarnessError, Result};

const SEPARATOR: char = ',';

/// How the values of one process output map onto the tracked operations.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleLayout {
    /// A single undifferentiated operation, every value is one sample.
    #[default]
    Flat,
    /// `i0,f0,r0,i1,f1,r1,...`: consecutive tuples, one value per operation.
    Interleaved,
    /// `i0,i1,..,f0,f1,..,r0,r1,..`: one contiguous block per operation.
    Blocked,
}

impl SampleLayout {
    /// Splits `values` into one sequence per operation.
    ///
    /// `width` is the number of tracked operations. `Flat` ignores it and
    /// yields a single sequence holding everything.
    pub fn decompose(self, values: &[u64], width: usize) -> Result<Vec<Vec<u64>>> {
        match self {
            SampleLayout::Flat => Ok(vec![values.to_vec()]),
            SampleLayout::Interleaved => {
                let tuples = group_tuples(values, width)?;
                let mut series = vec![Vec::with_capacity(tuples.len()); width];
                for tuple in &tuples {
                    for (operation, &value) in tuple.iter().enumerate() {
                        series[operation].push(value);
                    }
                }
                Ok(series)
            }
            SampleLayout::Blocked => {
                check_width(values.len(), width)?;
                let block = values.len() / width;
                Ok((0..width)
                    .map(|operation| values[operation * block..(operation + 1) * block].to_vec())
                    .collect())
            }
        }
    }
}

/// Parses one process output into a flat ordered sequence of integers.
///
/// Surrounding whitespace and a single trailing separator are ignored, as is
/// whitespace around each value (executables often print one line per
/// operation).
pub fn parse_flat(text: &str) -> Result<Vec<u64>> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix(SEPARATOR).unwrap_or(trimmed);
    if trimmed.trim().is_empty() {
        return Ok(Vec::new());
    }

    trimmed
        .split(SEPARATOR)
        .enumerate()
        .map(|(position, token)| {
            let token = token.trim();
            if token.is_empty() {
                return Err(HarnessError::malformed(format!("empty value at position {}", position)));
            }
            token.parse::<u64>().map_err(|_| {
                HarnessError::malformed(format!("'{}' at position {} is not a non-negative integer", token, position))
            })
        })
        .collect()
}

/// Parses one process output into tuples of `width` values each.
pub fn parse_tuples(text: &str, width: usize) -> Result<Vec<Vec<u64>>> {
    let values = parse_flat(text)?;
    group_tuples(&values, width)
}

fn group_tuples(values: &[u64], width: usize) -> Result<Vec<Vec<u64>>> {
    check_width(values.len(), width)?;
    Ok(values.chunks(width).map(|tuple| tuple.to_vec()).collect())
}

fn check_width(len: usize, width: usize) -> Result<()> {
    if width == 0 {
        return Err(HarnessError::malformed("tuple width must be at least 1"));
    }
    if len % width != 0 {
        return Err(HarnessError::malformed(format!(
            "{} values cannot be split into tuples of {}",
            len, width
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_trailing_separator() {
        assert_eq!(parse_flat("5,6,7,").unwrap(), vec![5, 6, 7]);
        assert_eq!(parse_flat("5,6,7\n").unwrap(), vec![5, 6, 7]);
        assert_eq!(parse_flat("42").unwrap(), vec![42]);
    }

    #[test]
    fn tolerates_one_line_per_operation() {
        let text = "10,11,\n20,21,\n30,31,\n";
        assert_eq!(parse_flat(text).unwrap(), vec![10, 11, 20, 21, 30, 31]);
    }

    #[test]
    fn empty_output_is_an_empty_sample() {
        assert!(parse_flat("").unwrap().is_empty());
        assert!(parse_flat("  \n").unwrap().is_empty());
        assert!(parse_flat(",").unwrap().is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_flat("1,,2"), Err(HarnessError::MalformedOutput(_))));
        assert!(matches!(parse_flat("1,-2,3"), Err(HarnessError::MalformedOutput(_))));
        assert!(matches!(parse_flat("1,abc"), Err(HarnessError::MalformedOutput(_))));
        assert!(matches!(parse_flat("1,2,,"), Err(HarnessError::MalformedOutput(_))));
    }

    #[test]
    fn tuples_flatten_back_to_input() {
        let inputs: [&[u64]; 4] = [&[], &[1, 2, 3], &[1, 2, 3, 4, 5, 6], &[9, 8, 7, 6, 5, 4, 3, 2, 1]];
        for input in inputs {
            let text: String = input.iter().map(|v| format!("{},", v)).collect();
            let tuples = parse_tuples(&text, 3).unwrap();
            assert!(tuples.iter().all(|t| t.len() == 3));
            let flat: Vec<u64> = tuples.into_iter().flatten().collect();
            assert_eq!(flat, input);
        }
    }

    #[test]
    fn uneven_tuples_are_malformed() {
        for text in ["1", "1,2", "1,2,3,4", "1,2,3,4,5,"] {
            assert!(matches!(parse_tuples(text, 3), Err(HarnessError::MalformedOutput(_))), "{}", text);
        }
        assert!(matches!(parse_tuples("1,2", 0), Err(HarnessError::MalformedOutput(_))));
    }

    #[test]
    fn interleaved_layout_splits_by_position() {
        let series = SampleLayout::Interleaved.decompose(&[1, 2, 3, 4, 5, 6], 3).unwrap();
        assert_eq!(series, vec![vec![1, 4], vec![2, 5], vec![3, 6]]);
    }

    #[test]
    fn blocked_layout_splits_by_block() {
        let series = SampleLayout::Blocked.decompose(&[1, 2, 3, 4, 5, 6], 3).unwrap();
        assert_eq!(series, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);

        let empty = SampleLayout::Blocked.decompose(&[], 3).unwrap();
        assert_eq!(empty, vec![Vec::<u64>::new(); 3]);

        assert!(SampleLayout::Blocked.decompose(&[1, 2, 3, 4], 3).is_err());
    }

    #[test]
    fn flat_layout_keeps_everything() {
        let series = SampleLayout::Flat.decompose(&[5, 6, 7], 1).unwrap();
        assert_eq!(series, vec![vec![5, 6, 7]]);
    }
}

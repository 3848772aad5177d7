use prettytable::{Cell, Row, Table};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::sweep::SweepResult;

/// Writes a sweep result as pretty-printed JSON, replacing any previous file.
pub fn write_sweep_result(result: &SweepResult, file_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    fs::write(file_path, json)?;
    Ok(())
}

/// Reads back a sweep result written by [`write_sweep_result`].
pub fn read_sweep_result(file_path: &Path) -> Result<SweepResult> {
    let content = fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Builds the table of one operation: a row per parameter value, a column per variant.
pub fn operation_table(result: &SweepResult, operation: &str, parameter_label: &str) -> Option<Table> {
    let index = result.operation_index(operation)?;

    let mut table = Table::new();
    let mut header = vec![Cell::new(parameter_label)];
    header.extend(result.variants.iter().map(|series| Cell::new(&format!("{} (ns)", series.variant))));
    table.add_row(Row::new(header));

    for (row, &parameter) in result.parameters.iter().enumerate() {
        let mut cells = vec![Cell::new(&parameter.to_string())];
        for series in &result.variants {
            let latency = series
                .points
                .get(row)
                .and_then(|point| point.latencies.get(index))
                .map(|latency| latency.to_string())
                .unwrap_or_default();
            cells.push(Cell::new(&latency));
        }
        table.add_row(Row::new(cells));
    }

    Some(table)
}

/// Prints one table per operation, or only for `operations` if given.
pub fn print_sweep_result(result: &SweepResult, operations: &[String], parameter_label: &str) {
    let selected: Vec<&String> = if operations.is_empty() {
        result.operations.iter().collect()
    } else {
        operations.iter().collect()
    };

    for operation in selected {
        match operation_table(result, operation, parameter_label) {
            Some(table) => {
                println!("\nLatency of {}:", operation);
                table.printstd();
            }
            None => eprintln!("No operation named '{}' in the results.", operation),
        }
    }
}

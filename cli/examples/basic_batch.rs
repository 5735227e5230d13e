//! Basic Batch Example
//!
//! Builds a small in-memory universe, runs a batch over one week of end dates
//! and prints the top records per date.

use std::error::Error;
use windowscan::models::Cell;
use windowscan::prelude::*;

fn synthetic_universe(stocks: usize, dates: usize) -> Result<MatrixPair, EngineError> {
    let codes: Vec<String> = (0..stocks).map(|i| format!("SYM{}", i)).collect();
    let names: Vec<String> = codes.iter().map(|c| format!("{} Corp", c)).collect();
    // ascending labels, reversed by from_ascending
    let labels: Vec<String> = (0..dates).map(|d| format!("2024-02-{:02}", d + 1)).collect();

    let mut prices = Vec::new();
    let mut diffs = Vec::new();
    for s in 0..stocks {
        let mut price = 20.0 + s as f64 * 2.0;
        let mut price_row: Vec<Cell> = Vec::new();
        let mut diff_row: Vec<Cell> = Vec::new();
        for d in 0..dates {
            let step = (((s + 1) * (d + 3)) % 7) as f64 * 0.5 - 1.5;
            diff_row.push(Some(if d == 0 { 0.0 } else { step }));
            if d > 0 {
                price += step;
            }
            price_row.push(Some(price));
        }
        prices.push(price_row);
        diffs.push(diff_row);
    }

    let price = StockMatrix::from_ascending(codes.clone(), names.clone(), labels.clone(), prices)?;
    let diff = StockMatrix::from_ascending(codes, names, labels, diffs)?;
    MatrixPair::new(price, diff)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    windowscan::init_logger()?;

    println!("Basic Batch Example");
    println!("{}", "=".repeat(60));

    let pair = synthetic_universe(12, 28)?;
    let analyzer = EngineParamsBuilder::new()
        .with_width(10)
        .with_start_option(StartOption::MinValue)
        .with_formula("if valid_first_half < valid_second_half and continuous_sum > 0: result = continuous_sum else: result = 0")
        .with_selection(3, SelectionMode::Max)
        .with_n_proc(4)
        .build_analyzer();

    let result = analyzer.run_batch(pair, "2024-02-22", "2024-02-28").await?;

    for line in result.summary_lines(3) {
        println!("{}", line);
    }
    println!(
        "\n{} records over {} dates in {:.2}ms ({} partitions)",
        result.metrics.record_count,
        result.metrics.date_count,
        result.metrics.calculation_time_ms,
        result.metrics.partition_count
    );

    Ok(())
}

//! Builder Pattern Example
//!
//! Shows the parameter builder, YAML round-tripping of a parameter bundle and
//! formula checking before any data is loaded.

use std::error::Error;
use windowscan::prelude::*;

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    windowscan::init_logger()?;

    println!("Builder Pattern Example");
    println!("{}", "=".repeat(60));

    // Example 1: breakout screen with take-profit selection
    let take_profit = ExitRule {
        op_days: 10,
        inc_rate: 0.02,
        expr: "if AGE.days < INC.days: result = AGE else: result = INC".to_string(),
        ..ExitRule::take_profit_default()
    };
    let breakout = EngineParamsBuilder::new()
        .with_width(20)
        .with_new_extreme(
            1,
            NewExtremeParams {
                start_offset: 1,
                range_span: 20,
                before_high: true,
                ..NewExtremeParams::default()
            },
        )
        .with_take_profit(take_profit)
        .with_formula("if new_before_high_1 and ops_change > 3: result = ops_incre_rate else: result = 0")
        .with_selection(20, SelectionMode::Max)
        .build_analyzer();

    match breakout.check_formula() {
        Ok(()) => println!("breakout formula OK"),
        Err(e) => println!("breakout formula rejected: {}", e),
    }

    // Example 2: the same bundle as YAML
    let yaml = serde_yaml::to_string(breakout.params())?;
    println!("\nparams as YAML:\n{}", yaml);

    // Example 3: a formula naming a disabled flag is rejected up front
    let rejected = EngineParamsBuilder::new()
        .with_formula("if new_after_low_2: result = 1 else: result = 0")
        .build_analyzer();
    if let Err(e) = rejected.check_formula() {
        println!("expected rejection: {}", e);
    }

    Ok(())
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use windowscan::{
    api::{EngineParamsBuilder, WindowAnalyzer},
    models::{EngineParams, SelectionMode, StartOption},
    services::CsvMatrixService,
    utils::{format_elapsed, init_logger},
};

#[derive(Parser)]
#[command(name = "windowscan")]
#[command(about = "Sliding-window signed-run screening over stock price matrices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every subcommand
#[derive(clap::Args)]
pub struct ParamArgs {
    /// Parameters file (YAML or JSON) holding an EngineParams bundle
    #[arg(short, long)]
    params: Option<PathBuf>,
    /// Window width in trailing days
    #[arg(short, long)]
    width: Option<usize>,
    /// Reference for the shifted actual value (start/max/min/closest)
    #[arg(long)]
    start_option: Option<StartOption>,
    #[arg(long, allow_hyphen_values = true)]
    shift_days: Option<i64>,
    /// Score formula text
    #[arg(short, long)]
    formula: Option<String>,
}

impl ParamArgs {
    fn load(&self) -> anyhow::Result<EngineParams> {
        let base = match &self.params {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                if path.extension().is_some_and(|e| e == "json") {
                    serde_json::from_str(&text).context("parsing params JSON")?
                } else {
                    serde_yaml::from_str(&text).context("parsing params YAML")?
                }
            }
            None => EngineParams::default(),
        };

        let mut builder = EngineParamsBuilder::from_params(base);
        if let Some(width) = self.width {
            builder = builder.with_width(width);
        }
        if let Some(option) = self.start_option {
            builder = builder.with_start_option(option);
        }
        if let Some(shift) = self.shift_days {
            builder = builder.with_shift_days(shift);
        }
        if let Some(formula) = &self.formula {
            builder = builder.with_formula(formula.clone());
        }
        Ok(builder.build())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a batch over an end-date range
    Batch {
        /// Combined CSV (price block, blank column, diff block)
        #[arg(short, long)]
        input: PathBuf,
        /// First end date (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last end date (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Partition count
        #[arg(short, long)]
        n_proc: Option<usize>,
        /// Keep the top N records per end date
        #[arg(long)]
        select: Option<usize>,
        /// Selection order (max/min)
        #[arg(long, default_value = "max")]
        mode: SelectionMode,
        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Codes shown per date in the summary
        #[arg(long, default_value_t = 5)]
        top: usize,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Recompute every stock at one end date
    Single {
        #[arg(short, long)]
        input: PathBuf,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Compile the score formula and exit expressions without running
    CheckFormula {
        #[command(flatten)]
        params: ParamArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logger()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Batch {
            input,
            start,
            end,
            n_proc,
            select,
            mode,
            output,
            top,
            params,
        } => {
            let mut builder = EngineParamsBuilder::from_params(params.load()?);
            if let Some(n) = n_proc {
                builder = builder.with_n_proc(n);
            }
            if let Some(count) = select {
                builder = builder.with_selection(count, mode);
            }
            let analyzer = builder.build_analyzer();

            let pair = CsvMatrixService::new()
                .load(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            let result = analyzer.run_batch(pair, &start, &end).await?;

            for line in result.summary_lines(top) {
                println!("{}", line);
            }
            println!(
                "batch {}: {} records, {} failed partitions, {}",
                result.metrics.batch_id,
                result.metrics.record_count,
                result.metrics.failed_partitions,
                format_elapsed(result.metrics.calculation_time_ms)
            );

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&result)?;
                std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                println!("result written to {}", path.display());
            }
        }
        Commands::Single { input, date, params } => {
            let analyzer = WindowAnalyzer::new(params.load()?);
            let pair = CsvMatrixService::new()
                .load(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            let records = analyzer.evaluate_single_date(pair, &date)?;
            for record in records {
                println!(
                    "{:<10} runs {:?} valid {:?} score {:.2}",
                    record.identity.code, record.sequences.continuous, record.sequences.valid, record.score
                );
            }
        }
        Commands::CheckFormula { params } => {
            let analyzer = WindowAnalyzer::new(params.load()?);
            analyzer.check_formula()?;
            println!("formula OK");
        }
    }

    Ok(())
}

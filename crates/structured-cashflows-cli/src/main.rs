mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::cashflows::CashflowsArgs;
use commands::pricing::PriceArgs;
use commands::rates::{DiscountArgs, ForwardArgs};
use commands::scenarios::{ScenarioArgs, StandardScenariosArgs};
use commands::timing::TimingArgs;
use commands::waterfall::WaterfallArgs;

/// Cash-flow projection, pricing, and waterfall analytics
#[derive(Parser)]
#[command(
    name = "scf",
    version,
    about = "Cash-flow projection, pricing, and waterfall analytics",
    long_about = "Simulates loan cash flows under prepayment/default assumptions, prices \
                  the resulting schedules with finite-difference risk measures, and \
                  distributes collections through configurable payment waterfalls. \
                  All math with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a loan's cash-flow schedule
    Cashflows(CashflowsArgs),
    /// Price a cash-flow schedule with risk measures
    Price(PriceArgs),
    /// Run collections through a payment waterfall
    Waterfall(WaterfallArgs),
    /// Expand a scenario configuration into a vector
    Scenario(ScenarioArgs),
    /// Generate the standard named scenario set
    StandardScenarios(StandardScenariosArgs),
    /// Evaluate timing factors for a set of periods
    Timing(TimingArgs),
    /// Discount factor off a zero curve
    Discount(DiscountArgs),
    /// Interpolated forward rate for an index/tenor
    Forward(ForwardArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Cashflows(args) => commands::cashflows::run_cashflows(args),
        Commands::Price(args) => commands::pricing::run_price(args),
        Commands::Waterfall(args) => commands::waterfall::run_waterfall(args),
        Commands::Scenario(args) => commands::scenarios::run_scenario(args),
        Commands::StandardScenarios(args) => commands::scenarios::run_standard_scenarios(args),
        Commands::Timing(args) => commands::timing::run_timing(args),
        Commands::Discount(args) => commands::rates::run_discount(args),
        Commands::Forward(args) => commands::rates::run_forward(args),
        Commands::Version => {
            println!("scf {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

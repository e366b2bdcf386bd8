mod logging;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use netflow_model::{build_model, optimize, OptimizeRequest, OptimizeResponse, OptimizerConfig};
use netflow_solver::SolutionStatus;

use crate::logging::LogFormat;

#[derive(Parser)]
#[command(name = "netflow", version)]
#[command(about = "Least-cost flow optimization for multi-echelon logistics networks", long_about = None)]
struct Cli {
    /// Log format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a network request and print the flow report
    Solve {
        /// JSON request with `data` and `settings`
        file: PathBuf,
        /// TOML optimizer config
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
        /// Write the JSON response to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a request and print entity counts
    Check {
        /// JSON request to check
        file: PathBuf,
    },
    /// Build the LP model and print its size per category
    Model {
        /// JSON request
        file: PathBuf,
        /// TOML optimizer config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Run one command, returning the process exit code: 0 on success, 1 when
/// the network has no solution or fails validation
fn run(command: Commands) -> anyhow::Result<i32> {
    match command {
        Commands::Solve {
            file,
            config,
            format,
            output,
        } => {
            let request = read_request(&file)?;
            let config = load_config(config.as_deref())?;
            let response = optimize(&request, &config)?;

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&response)?;
                std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote {}", path.display());
            } else {
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                    OutputFormat::Pretty => print_report(&response),
                }
            }

            Ok(if response.is_solution() { 0 } else { 1 })
        }
        Commands::Check { file } => {
            let request = read_request(&file)?;
            let data = &request.data;

            match build_model(data, request.settings.objective, &OptimizerConfig::default()) {
                Ok(model) => {
                    let included = model.index.included_paths().count();
                    println!("✓ {} is valid", file.display());
                    println!("  {} customers", data.customers.len());
                    println!("  {} facilities", data.facilities.len());
                    println!("  {} suppliers", data.suppliers.len());
                    println!("  {} products", data.products.len());
                    println!("  {} periods", data.periods.len());
                    println!("  {} paths ({} included)", data.paths.len(), included);
                    println!("  {} total demand", model.index.total_demand());
                    println!("  {} variables", model.stats.variables());
                    for warning in &model.index.warnings {
                        println!("  warning: {}", warning);
                    }
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    eprintln!("  {}", e);
                    Ok(1)
                }
            }
        }
        Commands::Model { file, config } => {
            let request = read_request(&file)?;
            let config = load_config(config.as_deref())?;

            match build_model(&request.data, request.settings.objective, &config) {
                Ok(model) => {
                    let stats = &model.stats;
                    println!("Objective: {:?}", model.objective);
                    println!();
                    println!("Variables: {}", stats.variables());
                    println!("  {:20} {:>8}", "flow", stats.flow_variables);
                    println!("  {:20} {:>8}", "production", stats.production_variables);
                    println!("  {:20} {:>8}", "trips (integer)", stats.trip_variables);
                    println!();
                    println!("Constraints: {}", stats.constraints());
                    println!("  {:20} {:>8}", "flow balance", stats.balance_rows);
                    println!("  {:20} {:>8}", "supply", stats.supply_rows);
                    println!("  {:20} {:>8}", "vehicle", stats.vehicle_rows);
                    println!("  {:20} {:>8}", "production bounds", stats.production_rows);
                    println!("  {:20} {:>8}", "flow rules", stats.flow_rule_rows);
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    eprintln!("  {}", e);
                    Ok(1)
                }
            }
        }
    }
}

fn read_request(path: &Path) -> anyhow::Result<OptimizeRequest> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("parsing request {}", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<OptimizerConfig> {
    match path {
        Some(path) => Ok(OptimizerConfig::load(path)?),
        None => Ok(OptimizerConfig::default()),
    }
}

fn print_report(response: &OptimizeResponse) {
    if let Some(error) = &response.error {
        println!("Status: NO SOLUTION");
        println!("{}", error);
        for warning in &response.warnings {
            println!("Warning: {}", warning);
        }
        return;
    }

    let status = match response.status {
        Some(SolutionStatus::NodeLimit) => "NODE LIMIT",
        Some(SolutionStatus::IterationLimit) => "ITERATION LIMIT",
        _ => "OPTIMAL",
    };
    println!("Status: {}", status);
    if let Some(total) = response.total_cost() {
        println!("Total cost: {:.2}", total);
    }
    for warning in &response.warnings {
        println!("Warning: {}", warning);
    }

    if !response.product_flow.is_empty() {
        println!();
        println!("Product flow:");
        for f in &response.product_flow {
            println!(
                "  {:>8} -> {:<8} {:10} {:>10.2} {:6} {:8} {:>12.2}",
                f.from, f.to, f.product, f.quantity, f.unit, f.period, f.cost
            );
        }
    }

    if !response.production.is_empty() {
        println!();
        println!("Production:");
        for p in &response.production {
            println!(
                "  {:12} {:10} {:>10.2} {:6} {:8} {:>12.2}  {}",
                p.site, p.product, p.quantity, p.unit, p.period, p.cost, p.bom
            );
        }
    }

    if !response.vehicle_flow.is_empty() {
        println!();
        println!("Vehicle flow:");
        for v in &response.vehicle_flow {
            println!(
                "  {:>8} -> {:<8} {:10} {:>6} trips {:8} {:>12.2}",
                v.from, v.to, v.vehicle_type, v.trip_count, v.period, v.cost
            );
        }
    }

    println!();
    println!("Cost summary:");
    for line in &response.cost_summary {
        println!("  {:20} {:>12.2}", line.category, line.amount);
    }
}

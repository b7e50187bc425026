use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use std::process;
use timeforge::api;
use timeforge::config::{PenaltyWeights, SolverConfig};
use tracing::{error, info, warn, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(global = true, short, long, default_value = "data/institution.json")]
    institution: String,

    /// Solver configuration (search parameters and weights) as JSON.
    #[arg(global = true, long)]
    config: Option<String>,

    /// Penalty weights as JSON; explicit weight flags still win.
    #[arg(global = true, long)]
    weights: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Solve(cmd::solve::SolveArgs),
    Verify(cmd::verify::VerifyArgs),
}

fn resolve_config(cli: &Cli, args: &cmd::solve::SolveArgs, matches: &clap::ArgMatches) -> SolverConfig {
    let Some(sub_matches) = matches.subcommand_matches("solve") else {
        return args.config.clone();
    };

    let mut config = match &cli.config {
        Some(path) => {
            info!("⚙️  Loading Solver Config from: {}", path);
            let mut file_config = SolverConfig::load_from_file(path).unwrap_or_else(|e| {
                error!("{}", e);
                process::exit(1);
            });
            file_config.merge_from_cli(&args.config, sub_matches);
            file_config
        }
        None => args.config.clone(),
    };

    if let Some(path) = &cli.weights {
        info!("⚖️  Loading Weights from: {}", path);
        let mut file_weights = PenaltyWeights::load_from_file(path).unwrap_or_else(|e| {
            error!("{}", e);
            process::exit(1);
        });
        file_weights.merge_from_cli(&args.config.weights, sub_matches);
        config.weights = file_weights;
    } else if cli.config.is_none() {
        warn!("⚠️  No external weights loaded. Using embedded defaults.");
    }

    config
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("🚀 Initializing TimeForge...");
    info!("📂 Loading Institution: {}", cli.institution);
    let model = api::build_model(&cli.institution).unwrap_or_else(|e| {
        error!("\n❌ FATAL ERROR BUILDING MODEL:");
        error!("   {}", e);
        process::exit(1);
    });

    match &cli.command {
        Commands::Solve(args) => {
            let config = resolve_config(&cli, args, &matches);
            if let Err(e) = cmd::solve::run(args.clone(), config, model) {
                error!("❌ {}", e);
                process::exit(1);
            }
        }
        Commands::Verify(args) => match cmd::verify::run(args.clone(), &model) {
            Ok(true) => {}
            Ok(false) => process::exit(2),
            Err(e) => {
                error!("❌ {}", e);
                process::exit(1);
            }
        },
    }
}

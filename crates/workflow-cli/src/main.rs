mod cmd;
mod output;
mod stubs;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "workflow",
    about = "Transition-driven workflow orchestrator: inspect definitions and simulate transitions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Orchestrator config file (YAML)
    #[arg(long, global = true, env = "WORKFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log orchestration steps to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the transition table built from a definition file
    Table {
        /// Workflow document (.json) or table document (.yaml / .yml)
        file: PathBuf,
    },

    /// Load definitions and report entries that cannot be orchestrated
    Check {
        /// A definition file, or a directory of <Entity>.json workflow documents
        /// (defaults to `workflows_dir` from the config)
        path: Option<PathBuf>,
    },

    /// Run one transition against stub processors and criteria
    Simulate {
        /// Workflow document (.json) or table document (.yaml / .yml)
        file: PathBuf,

        /// Transition to execute
        #[arg(long, short = 't')]
        transition: String,

        /// Entity id passed to handlers (default: a fresh UUID)
        #[arg(long)]
        entity_id: Option<String>,

        /// JSON file holding the entity (default: {})
        #[arg(long)]
        entity: Option<PathBuf>,

        /// Make the named processor fail (repeatable)
        #[arg(long = "fail", value_name = "PROCESSOR")]
        fail: Vec<String>,

        /// Force a criterion result, e.g. IngestionSuccessCriterion=false (repeatable)
        #[arg(long = "criterion", value_name = "NAME=BOOL")]
        criteria: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = cmd::load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Table { file } => cmd::table::run(&file, &config, cli.json),
        Commands::Check { path } => cmd::check::run(path.as_deref(), &config, cli.json),
        Commands::Simulate {
            file,
            transition,
            entity_id,
            entity,
            fail,
            criteria,
        } => cmd::simulate::run(
            &file,
            &config,
            cmd::simulate::SimulateArgs {
                transition,
                entity_id,
                entity,
                fail,
                criteria,
            },
            cli.json,
        ),
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

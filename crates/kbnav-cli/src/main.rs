mod cmd_serve;
mod cmd_show;
mod cmd_validate;
mod console;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kbnav")]
#[command(about = "Serve and inspect button-navigable knowledge bases")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the navigator over stdin/stdout, one `<session> <input>` per line
    Serve(cmd_serve::ServeArgs),
    /// Check that a dataset file builds a valid tree
    Validate {
        /// Dataset file
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Render a single node with its buttons
    Show {
        /// Dataset file
        #[arg(short, long)]
        input: PathBuf,

        /// Node id (defaults to the root)
        #[arg(short, long)]
        node: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the hierarchy as an indented outline
    Tree {
        /// Dataset file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "kbnav=debug,kbnav_sheet=debug"
    } else {
        "kbnav=info,kbnav_sheet=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve(args) => cmd_serve::run(args),
        Commands::Validate { input } => cmd_validate::run(input),
        Commands::Show { input, node, json } => cmd_show::run_show(&input, node, json, cli.pretty),
        Commands::Tree { input } => cmd_show::run_tree(&input),
    }
}

use crate::commands::{run_quote, run_rank, QuoteArgs, RankArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tariff_compare::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "tariff-compare",
    about = "Predict annual electricity bills and rank competing offers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Rank every offer of the consumer's segment by projected cost
    Rank(RankArgs),
    /// Print the itemized annual bill for a single offer
    Quote(QuoteArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rank(args) => run_rank(args),
        Command::Quote(args) => run_quote(args),
    }
}

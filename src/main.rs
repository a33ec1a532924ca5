use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use sensorchar_cli::cli::Cli;
use sensorchar_cli::cli::Commands;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command() {
        Commands::Dark {
            params,
            output_dir,
            report,
            no_plots,
        } => sensorchar_cli::dark::run(params, output_dir, *report, !no_plots),
        Commands::Ptc {
            params,
            output_dir,
            report,
            no_plots,
        } => sensorchar_cli::ptc::run(params, output_dir, *report, !no_plots),
        _ => bail!("this command has not been implemented!"),
    }
}

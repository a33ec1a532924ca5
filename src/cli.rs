use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Commands {
    /// Estimate read noise and dark current from a dark exposure sweep.
    Dark {
        /// Optional path to TOML formatted DarkParams.
        ///
        /// If not provided, the default DarkParams is used.
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Directory for plots and the JSON report.
        #[arg(short, long, default_value = "dark_analysis")]
        output_dir: PathBuf,

        /// Format of the summary printed to stdout.
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        report: ReportFormat,

        /// Skip rendering histograms, intensity maps and fit plots.
        #[arg(long)]
        no_plots: bool,
    },

    /// Derive gain, full well, dynamic range and SNR from an illuminated sweep.
    Ptc {
        /// Optional path to TOML formatted PtcParams.
        ///
        /// If not provided, the default PtcParams is used.
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Directory for plots and the JSON report.
        #[arg(short, long, default_value = "ptc_analysis")]
        output_dir: PathBuf,

        /// Format of the summary printed to stdout.
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        report: ReportFormat,

        /// Skip rendering the PTC, linearity and SNR plots.
        #[arg(long)]
        no_plots: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[non_exhaustive]
pub enum ReportFormat {
    Text,
    Json,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone()
    }
}

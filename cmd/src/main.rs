mod convert;
mod inspect;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reassemble a SPEAD capture into one DADA file per F-engine and subband.
    ///
    /// Files are named <prefix>_<feng_id>_<subband>.dada, or <feng_id>_<subband>.dada if no
    /// prefix is given, where feng_id is zero padded to 2 digits and subband to 5.
    Convert {
        /// Input pcap capture.
        #[arg(short, long, value_name = "path")]
        input: PathBuf,

        /// Total number of F-engine channels.
        #[arg(short = 'c', long = "nchan")]
        feng_nchan: usize,

        /// Unix time, in seconds, of the F-engine sync epoch.
        #[arg(short = 't', long)]
        sync_epoch: f64,

        /// Output file name prefix.
        #[arg(short, long)]
        prefix: Option<String>,

        /// Stop after reading this many frames.
        #[arg(short = 'n', long)]
        npackets: Option<usize>,

        /// Total bandwidth in MHz.
        #[arg(short, long, default_value_t = 856.0)]
        bandwidth: f64,

        /// Centre frequency of the band in MHz.
        #[arg(short = 'f', long, default_value_t = 1284.0)]
        centre_freq: f64,

        /// Directory to write output files to. It is created if it does not exist.
        #[arg(short, long, default_value = ".", value_name = "path")]
        output_dir: PathBuf,

        /// Decode and validate every header layer instead of jumping straight to the items.
        #[arg(long, action)]
        full_decode: bool,

        /// Summary output format.
        #[arg(long, default_value = "text")]
        summary: convert::Format,
    },
    /// Print the decoded headers and items of the first frames of a capture as JSON lines.
    Inspect {
        /// Input pcap capture.
        #[arg(short, long, value_name = "path")]
        input: PathBuf,

        /// Number of frames to decode.
        #[arg(short = 'n', long, default_value_t = 10)]
        npackets: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("SPEAD2DADA_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Convert {
            input,
            feng_nchan,
            sync_epoch,
            prefix,
            npackets,
            bandwidth,
            centre_freq,
            output_dir,
            full_decode,
            summary,
        } => {
            let config = spead2dada::ObservationConfig::builder()
                .feng_nchan(feng_nchan)
                .sync_epoch(sync_epoch)
                .bandwidth_mhz(bandwidth)
                .centre_freq_mhz(centre_freq)
                .build();
            let options = spead2dada::StreamOptions {
                max_packets: npackets,
                decode_mode: if full_decode {
                    spead2dada::DecodeMode::Full
                } else {
                    spead2dada::DecodeMode::Lite
                },
                ..spead2dada::StreamOptions::default()
            };
            convert::convert(&input, &output_dir, prefix, config, &options, &summary)
        }
        Commands::Inspect { input, npackets } => inspect::inspect(&input, npackets),
    }
}

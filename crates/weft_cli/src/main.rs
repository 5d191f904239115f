//! Weft CLI — place-and-route driver for the Weft CGRA toolchain.
//!
//! Provides `weft place-design` for placement alone, `weft route-design`
//! for the full place-and-route flow, `weft write-bitstream` for bitstream
//! emission, and `weft print` for a human-readable report.

#![warn(missing_docs)]

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Weft — a constraint-based CGRA place-and-route tool.
#[derive(Parser, Debug)]
#[command(name = "weft", version, about = "Weft CGRA place and route")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `weft.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Place a mapped design onto a fabric.
    PlaceDesign {
        /// Mapped design JSON file.
        design: PathBuf,
        /// Fabric XML file.
        fabric: PathBuf,
        /// Write the placement snapshot here (stdout if omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Place (or reuse a placement snapshot) and route a mapped design.
    RouteDesign {
        /// Mapped design JSON file.
        design: PathBuf,
        /// Fabric XML file.
        fabric: PathBuf,
        /// Seed placement from a snapshot produced by `place-design`.
        #[arg(long)]
        placement: Option<PathBuf>,
        /// Write the routing report here (stdout if omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Run the full flow and write the bitstream configuration.
    WriteBitstream {
        /// Mapped design JSON file.
        design: PathBuf,
        /// Fabric XML file.
        fabric: PathBuf,
        /// Output bitstream path.
        output: PathBuf,
        /// Include the debug route trace as comments.
        #[arg(long)]
        annotate: bool,
    },
    /// Run the full flow and print placement and routing info.
    Print {
        /// Mapped design JSON file.
        design: PathBuf,
        /// Fabric XML file.
        fabric: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

// gRPC Gen - CLI Interface
// Command line interface using clap

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::watch::DEFAULT_POLL_INTERVAL_MS;

/// gRPC Gen - Run protoc over a project's sources for every configured output
#[derive(Parser, Debug)]
#[command(name = "grpcgen")]
#[command(author = "Muhammad Asif")]
#[command(version)]
#[command(about = "gRPC Gen - Generate protobuf and gRPC code from a single config file", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Re-run whenever the config or a source changes
    #[arg(short, long)]
    pub watch: bool,

    /// Watch by polling every MS milliseconds, 600 by default (implies --watch)
    #[arg(long, value_name = "MS", num_args = 0..=1)]
    pub poll: Option<Option<u64>>,

    /// Config file (defaults to .grpc-gen.{json,yaml,yml} in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// protoc executable to use instead of looking one up
    #[arg(long, global = true)]
    pub protoc: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate every configured output (default)
    Generate,

    /// Stage sources and check their syntax without generating anything
    Check,

    /// Write a starter config file
    Init {
        /// Directory to write the config into
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

/// How a generate run should proceed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub watch: bool,
    pub poll_interval: Option<Duration>,
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    pub fn generate_options(&self) -> GenerateOptions {
        let poll_interval = self
            .poll
            .map(|ms| Duration::from_millis(ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS)));
        GenerateOptions {
            watch: self.watch || poll_interval.is_some(),
            poll_interval,
            config: self.config.clone(),
        }
    }
}

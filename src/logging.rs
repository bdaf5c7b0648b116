//! Tracing subscriber setup for the `bujo` binary.
//!
//! The `--log` option picks the sink; `RUST_LOG` overrides the level filter.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    /// Append to a file, without ANSI colours.
    File(PathBuf),
}

impl FromStr for LogTarget {
    type Err = std::convert::Infallible;

    /// `0`/`off`, `1`/`stdout`, `2`/`stderr`, anything else is a file path.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            path => LogTarget::File(PathBuf::from(path)),
        })
    }
}

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber.
pub fn init(target: &LogTarget, verbose: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(filter(verbose));

    match target {
        LogTarget::Off => {}
        LogTarget::Stdout => {
            builder
                .with_writer(std::io::stdout)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        LogTarget::Stderr => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder
                .with_writer(file)
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }
    Ok(())
}

use clap::Parser;
use slope::{ResolverConfig, DEFAULT_ENDPOINT, MAX_BATCH};
use std::{path::PathBuf, time::Duration};

/// Color a GPX/KML track by terrain grade.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Elevation lookup URL.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Locations per elevation request.
    #[arg(long, default_value_t = MAX_BATCH, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Wait before retrying a failed request, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub retry_backoff_ms: u64,

    /// Pause between requests, in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub batch_delay_ms: u64,

    /// Output file [default: <input>_elev.kml].
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Input track (`.gpx`, anything else is read as KML).
    pub input: PathBuf,
}

impl Cli {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            endpoint: self.endpoint.clone(),
            batch_size: self.batch_size,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            ..Default::default()
        }
    }
}

fn parse_batch_size(s: &str) -> Result<usize, String> {
    let size: usize = s.parse().map_err(|e| format!("{e}"))?;
    if (1..=MAX_BATCH).contains(&size) {
        Ok(size)
    } else {
        Err(format!("must be between 1 and {MAX_BATCH}"))
    }
}

use std::time::Duration;

use clap::Parser;

use crate::config::parse_timeout_ms;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "cloud-buffer")]
#[command(version)]
#[command(about = "Vim job that stores editor buffers in a remote cloud-buffer collection")]
pub struct Args {
    /// Log every request and response (to stderr)
    #[arg(long, short)]
    pub debug: bool,

    /// Request timeout in milliseconds, 0 to wait indefinitely
    /// (overrides CLOUD_BUFFER_TIMEOUT_MS and g:vim_cloud_buffer_timeout_ms)
    #[arg(long)]
    pub timeout_ms: Option<String>,
}

impl Args {
    /// Timeout override requested on the command line, if any.
    pub fn timeout_override(&self) -> Result<Option<Option<Duration>>> {
        self.timeout_ms.as_deref().map(parse_timeout_ms).transpose()
    }

    /// Default `tracing` filter directive for these flags.
    pub fn log_directive(&self) -> &'static str {
        if self.debug {
            "cloud_buffer=debug"
        } else {
            "cloud_buffer=info"
        }
    }
}

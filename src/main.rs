use std::io;
use std::rc::Rc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cloud_buffer::cli::Args;
use cloud_buffer::proxy::host_proxy;
use cloud_buffer::session::serve;
use cloud_buffer::vim::VimChannel;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // stdout carries the Vim channel; logs must stay on stderr.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let timeout_override = args.timeout_override()?;

    let channel = Rc::new(VimChannel::new(io::stdin().lock(), io::stdout().lock()));
    let mut proxy = host_proxy(Rc::clone(&channel), timeout_override);

    let handled = serve(&*channel, &mut proxy)?;
    info!(handled, "vim channel closed");

    Ok(())
}

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use dnsfwd::config::{self, Args, ProxyConfig};

/// Initialize logging to stdout, duplicated to `log_path` when requested.
///
/// A log file that cannot be opened is reported and otherwise ignored.
fn init_logging(log_path: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_path.map(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| (path.to_path_buf(), e))
    });
    let (file_layer, file_error) = match file {
        Some(Ok(file)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .boxed(),
            ),
            None,
        ),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    if let Some((path, e)) = file_error {
        error!("error opening file {}: {}", path.display(), e);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.version {
        println!("{}", config::version_string());
        return Ok(());
    }

    init_logging(args.log_file.then_some(args.log_path.as_path()));

    let config = ProxyConfig::try_from(&args).context("invalid configuration")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(dnsfwd::proxy::run(config))?;

    Ok(())
}

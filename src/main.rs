//! CLI entry point for lazyfetch.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lazyfetch::fetch::{FetchConfig, Fetcher, ProxySettings, TlsConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

mod cli;

use cli::Args;

/// Bytes requested from the stream per stdout write.
const STDOUT_READ_SIZE: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so stdout carries only the body.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let fetcher = Fetcher::new(build_config(&args)?).context("invalid configuration")?;

    match args.output.as_deref() {
        Some(dir) if dir.is_dir() => {
            let saved = fetcher.download_to_dir(&args.url, dir).await?;
            info!(
                path = %saved.path().display(),
                bytes = saved.bytes_written(),
                "Saved"
            );
        }
        Some(path) => {
            let outcome = fetcher.download(&args.url, Some(path)).await?;
            info!(
                path = %outcome.path().display(),
                bytes = outcome.bytes_written(),
                "Saved"
            );
        }
        None => stream_to_stdout(&fetcher, &args.url).await?,
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<FetchConfig> {
    let mut headers = HeaderMap::new();
    for (name, value) in &args.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name '{name}'"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header '{name}'"))?;
        headers.append(name, value);
    }

    let proxy = args
        .proxy
        .as_deref()
        .map(ProxySettings::parse)
        .transpose()
        .context("invalid --proxy")?;

    let tls = if args.insecure {
        TlsConfig::insecure()
    } else {
        TlsConfig::default()
    };

    Ok(FetchConfig {
        headers,
        connect_timeout: Duration::from_secs(args.connect_timeout),
        read_timeout: Duration::from_secs(args.read_timeout),
        max_redirects: args.max_redirects,
        max_size: args.max_size,
        tls,
        proxy,
        rewindable: false,
        ..FetchConfig::default()
    })
}

async fn stream_to_stdout(fetcher: &Fetcher, url: &str) -> Result<()> {
    let mut stream = fetcher.open(url).await?;
    debug!(
        status = stream.status(),
        size = ?stream.size(),
        encoding = ?stream.encoding(),
        "streaming body to stdout"
    );

    let mut stdout = tokio::io::stdout();
    loop {
        let piece = stream.read(STDOUT_READ_SIZE).await?;
        if piece.is_empty() {
            break;
        }
        stdout
            .write_all(&piece)
            .await
            .context("failed to write to stdout")?;
    }
    stdout.flush().await.context("failed to flush stdout")?;

    debug!(bytes = stream.bytes_fetched(), "stream finished");
    stream.close();
    Ok(())
}

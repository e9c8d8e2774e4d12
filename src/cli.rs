//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use lazyfetch::fetch::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_REDIRECTS, READ_TIMEOUT_SECS};

/// Fetch a URL to stdout or to a file.
///
/// Without `--output` the body is streamed to stdout as it arrives. With it,
/// the body is written to a temporary file next to the destination and moved
/// into place only once complete.
#[derive(Parser, Debug)]
#[command(name = "lazyfetch")]
#[command(author, version, about)]
pub struct Args {
    /// URL to fetch (a missing scheme defaults to http://)
    pub url: String,

    /// Save to this file, or into this directory under an inferred name
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Abort when the body exceeds this many bytes
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,

    /// Maximum redirects to follow
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    pub max_redirects: u32,

    /// Connect timeout in seconds (1-3600)
    #[arg(long, value_name = "SECS", default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: u64,

    /// Read timeout in seconds (1-3600)
    #[arg(long, value_name = "SECS", default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// Proxy URL, optionally with user:password@ credentials
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Extra request header, e.g. -H 'Accept: text/csv' (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

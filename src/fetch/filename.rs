//! Filename inference for saved downloads.
//!
//! The name is taken from, in order: the Content-Disposition header, the last
//! segment of the response URL, and finally `download` plus an extension
//! guessed from Content-Type.

use std::path::{Component, Path, PathBuf};

use reqwest::header::CONTENT_DISPOSITION;
use tracing::debug;
use url::Url;

use super::metadata::ResponseMetadata;

/// Infers a filesystem-safe filename for a response.
#[must_use]
pub fn suggested_filename(metadata: &ResponseMetadata) -> String {
    if let Some(name) = metadata
        .header(CONTENT_DISPOSITION.as_str())
        .and_then(parse_content_disposition)
        .map(|name| sanitize_filename(&name))
    {
        return name;
    }

    if let Some(name) = filename_from_url(metadata.url()) {
        return name;
    }

    let extension = metadata
        .content_type()
        .map_or(".bin", extension_from_content_type);
    format!("download{extension}")
}

/// Picks a path for `filename` inside `dir` that does not exist yet.
///
/// Conflicts get a numeric suffix: `file.pdf`, `file_1.pdf`, `file_2.pdf`, ...
#[must_use]
pub fn unique_path_in(dir: &Path, filename: &str) -> PathBuf {
    let filename = {
        let sanitized = sanitize_filename(filename);
        if sanitized.trim_matches('_').is_empty() {
            "download.bin".to_string()
        } else {
            sanitized
        }
    };
    let base_path = dir.join(&filename);
    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };
    (1..1000)
        .map(|i| dir.join(format!("{stem}_{i}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| dir.join(format!("{stem}_{}{ext}", std::process::id())))
}

fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    Some(sanitize_filename(&decoded))
}

/// Guess file extension from Content-Type header.
fn extension_from_content_type(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    match mime.as_str() {
        "text/html" => ".html",
        "text/plain" => ".txt",
        "text/csv" => ".csv",
        "application/json" => ".json",
        "application/xml" | "text/xml" => ".xml",
        "application/pdf" => ".pdf",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        _ => ".bin",
    }
}

/// Parses a Content-Disposition header value for its filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987, preferred)
fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = header.find("filename=")?;
    let value = header[pos + 9..].trim();
    if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        return Some(stripped[..end].to_string());
    }
    let end = value.find(';').unwrap_or(value.len());
    let filename = value[..end].trim();
    (!filename.is_empty()).then(|| filename.to_string())
}

/// Replaces characters that are invalid on common filesystems and neutralizes
/// dot segments.
fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    let safe = !Path::new(&sanitized).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if safe {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

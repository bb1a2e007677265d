//! Pulling a source file from a public URL

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use std::path::Path;

use crate::GateError;

/// Downloads the body behind a public URL into a local file.
///
/// Transport failures and non-success statuses are reported as
/// [`GateError::DownloadFailed`]; local disk failures as [`GateError::Io`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Stream the body at `url` into `dest`, returning the number of bytes written
    async fn fetch_to(&self, url: &str, dest: &Path) -> crate::Result<u64>;
}

/// Filenames taken from the last path segment of a download URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFilename {
    /// Percent-decoded segment as it appears in the URL
    pub original: String,
    /// `[A-Za-z0-9._-]` only, safe to use inside a local file name
    pub safe: String,
}

const FALLBACK_FILENAME: &str = "download";
const MAX_SAFE_LEN: usize = 200;

impl UrlFilename {
    pub fn from_url(url: &str) -> crate::Result<Self> {
        let url = url.trim();
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| GateError::InvalidSourceUrl(format!("'{}' is not an absolute URL", url)))?;
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(GateError::InvalidSourceUrl(format!(
                "unsupported scheme '{}', expected http or https",
                scheme
            )));
        }

        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        if host.is_empty() {
            return Err(GateError::InvalidSourceUrl(format!("'{}' has no host", url)));
        }

        let segment = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default();
        let original = percent_decode_str(segment).decode_utf8_lossy().trim().to_string();
        if original.is_empty() {
            return Ok(Self::named(FALLBACK_FILENAME));
        }

        Ok(UrlFilename {
            safe: safe_filename(&original),
            original,
        })
    }

    fn named(name: &str) -> Self {
        UrlFilename {
            original: name.to_string(),
            safe: name.to_string(),
        }
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and drop leading dots
pub fn safe_filename(name: &str) -> String {
    let mut safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    safe = safe.trim_start_matches('.').to_string();
    safe.truncate(MAX_SAFE_LEN);

    if safe.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        safe
    }
}

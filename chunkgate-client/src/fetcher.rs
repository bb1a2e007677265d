//! Downloads of public source files for URL uploads

use async_trait::async_trait;
use bytes::Bytes;
use chunkgate_core::*;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::LOCATION;
use hyper::{Method, Request, Response, Uri};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::connector::{https_client, is_supported_scheme, HttpsClient};

/// Default bound on waiting for a response or for the next piece of its body
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_REDIRECTS: usize = 5;

/// [`SourceFetcher`] that streams an `http`/`https` GET response to disk
pub struct HttpSourceFetcher {
    timeout: Duration,
    http: HttpsClient,
}

impl Default for HttpSourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSourceFetcher {
    pub fn new() -> Self {
        HttpSourceFetcher {
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            http: https_client(),
        }
    }

    /// Applies to the response head and to every gap between body frames
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// GET `url`, following up to [`MAX_REDIRECTS`] redirects
    async fn get(&self, url: &str) -> Result<Response<Incoming>> {
        let mut uri = parse_source_uri(url)?;

        for _ in 0..=MAX_REDIRECTS {
            let request = Request::builder()
                .method(Method::GET)
                .uri(uri.clone())
                .body(Full::new(Bytes::new()))
                .map_err(|e| GateError::Internal(format!("building download request: {}", e)))?;

            let response = tokio::time::timeout(self.timeout, self.http.request(request))
                .await
                .map_err(|_| {
                    GateError::DownloadFailed(format!(
                        "no response from {} within {}s",
                        uri,
                        self.timeout.as_secs_f64()
                    ))
                })?
                .map_err(|e| GateError::DownloadFailed(format!("{}: {}", uri, e)))?;

            let status = response.status();
            if status.is_redirection() {
                if let Some(location) = response.headers().get(LOCATION) {
                    let location = location
                        .to_str()
                        .map_err(|_| GateError::DownloadFailed(format!("{} sent an unreadable redirect", uri)))?;
                    let next = follow_redirect(&uri, location)?;
                    debug!("{} redirected ({}) to {}", uri, status, next);
                    uri = next;
                    continue;
                }
            }
            if !status.is_success() {
                return Err(GateError::DownloadFailed(format!("{} returned {}", uri, status)));
            }
            return Ok(response);
        }

        Err(GateError::DownloadFailed(format!(
            "more than {} redirects starting at {}",
            MAX_REDIRECTS, url
        )))
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut body = self.get(url).await?.into_body();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        loop {
            let frame = match tokio::time::timeout(self.timeout, body.frame()).await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(_) => {
                    warn!("Download from {} stalled after {} bytes", url, written);
                    return Err(GateError::DownloadFailed(format!(
                        "{} stalled after {} bytes",
                        url, written
                    )));
                }
            };
            let frame = frame.map_err(|e| GateError::DownloadFailed(format!("{}: {}", url, e)))?;

            if let Ok(data) = frame.into_data() {
                file.write_all(&data).await?;
                written += data.len() as u64;
            }
        }

        file.flush().await?;
        Ok(written)
    }
}

fn parse_source_uri(url: &str) -> Result<Uri> {
    let uri: Uri = url
        .trim()
        .parse()
        .map_err(|e| GateError::InvalidSourceUrl(format!("{}: {}", url, e)))?;
    if !is_supported_scheme(uri.scheme_str()) || uri.host().is_none() {
        return Err(GateError::InvalidSourceUrl(format!(
            "{} is not an absolute http or https URL",
            url
        )));
    }
    Ok(uri)
}

/// Resolve a `Location` header against the URI that produced it
fn follow_redirect(from: &Uri, location: &str) -> Result<Uri> {
    if location.contains("://") {
        return parse_source_uri(location);
    }
    if !location.starts_with('/') {
        return Err(GateError::DownloadFailed(format!(
            "unsupported relative redirect '{}' from {}",
            location, from
        )));
    }

    let scheme = from.scheme_str().unwrap_or("http");
    let authority = from
        .authority()
        .map(|a| a.as_str())
        .ok_or_else(|| GateError::DownloadFailed(format!("{} has no authority", from)))?;
    parse_source_uri(&format!("{}://{}{}", scheme, authority, location))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_uri_validation() {
        assert!(parse_source_uri("https://cdn.example.com/a.bin").is_ok());
        assert!(parse_source_uri(" http://127.0.0.1:9000/a.bin ").is_ok());

        for url in ["ftp://example.com/a.bin", "/a.bin", "not a url"] {
            assert!(
                matches!(parse_source_uri(url), Err(GateError::InvalidSourceUrl(_))),
                "{}",
                url
            );
        }
    }

    #[test]
    fn test_follow_redirect() {
        let from: Uri = "https://cdn.example.com:8443/old/a.bin?x=1".parse().unwrap();

        let next = follow_redirect(&from, "/new/a.bin").unwrap();
        assert_eq!(next.to_string(), "https://cdn.example.com:8443/new/a.bin");

        let next = follow_redirect(&from, "http://mirror.example.org/a.bin").unwrap();
        assert_eq!(next.to_string(), "http://mirror.example.org/a.bin");

        assert!(follow_redirect(&from, "a.bin").is_err());
    }
}

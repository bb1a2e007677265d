//! HTTP(S) client construction shared by every outbound caller

use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

pub(crate) type HttpsClient = hyper_util::client::legacy::Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Client that speaks plain HTTP and HTTPS, trusting the webpki root set
pub(crate) fn https_client() -> HttpsClient {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(connector)
}

/// Whether `scheme` is one the shared client can reach
pub(crate) fn is_supported_scheme(scheme: Option<&str>) -> bool {
    matches!(scheme, Some("http") | Some("https"))
}

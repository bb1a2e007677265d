//! Names shared by the HTTP server and client

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{BucketId, GateError, ObjectKey};

pub const HEADER_TOTAL_CHUNKS: &str = "x-total-chunks";
pub const HEADER_LAST_CHUNK: &str = "x-last-chunk";
pub const HEADER_ORIGINAL_FILENAME: &str = "x-original-filename";
pub const HEADER_OBJECT_NAME: &str = "x-object-name";
pub const HEADER_PATH_PAYLOAD: &str = "x-path-payload";
pub const HEADER_PUBLIC_URL: &str = "x-public-url";

/// Everything except RFC 3986 unreserved characters is escaped in a key segment
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Path of the chunk endpoint for one upload
pub fn chunk_path(upload_id: &str, chunk_number: u32) -> String {
    format!("/v1/uploads/{}/chunks/{}", upload_id, chunk_number)
}

pub fn upload_path(upload_id: &str) -> String {
    format!("/v1/uploads/{}", upload_id)
}

pub const DIRECT_UPLOAD_PATH: &str = "/v1/objects";
pub const URL_UPLOAD_PATH: &str = "/v1/objects/from-url";

/// Path under which a stored object is served, `/v1/{bucket}/{key}`.
///
/// Each `/`-separated key segment is percent-encoded; the slashes stay.
pub fn object_path(bucket: &BucketId, key: &ObjectKey) -> String {
    let encoded: Vec<String> = key
        .as_str()
        .split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect();
    format!("/v1/{}/{}", bucket, encoded.join("/"))
}

/// Undo [`object_path`]'s escaping of a key taken from a request path
pub fn decode_object_key(raw: &str) -> crate::Result<ObjectKey> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| GateError::InvalidObjectName(format!("key is not UTF-8 once decoded: {}", e)))?;
    ObjectKey::new(&decoded)
}

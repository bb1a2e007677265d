use bytes::Bytes;
use chunkgate_client::{Client, ClientError, MultipartUpload};
use chunkgate_core::*;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// What the scripted gateway saw, as "METHOD path total last body_len"
type Log = Arc<Mutex<Vec<String>>>;

/// Accepts chunks, except that any chunk whose number is `fail_on` gets a 500
async fn scripted_gateway(fail_on: u32) -> (Client, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let seen = log.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let seen = seen.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let seen = seen.clone();
                    async move { Ok::<_, Infallible>(respond(req, fail_on, seen).await) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (Client::new(format!("http://{}", addr)).unwrap(), log)
}

async fn respond(req: Request<Incoming>, fail_on: u32, seen: Log) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let header = |name: &str| {
        req.headers()
            .get(name)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default()
    };
    let total = header("x-total-chunks");
    let last = header("x-last-chunk");
    let body = req.into_body().collect().await.unwrap().to_bytes();

    seen.lock()
        .unwrap()
        .push(format!("{} {} {} {} {}", method, path, total, last, body.len()));

    let json = |status: StatusCode, value: serde_json::Value| {
        Response::builder()
            .status(status)
            .body(Full::new(Bytes::from(value.to_string())))
            .unwrap()
    };

    if method == Method::DELETE {
        let upload_id = path.rsplit('/').next().unwrap().to_string();
        return json(
            StatusCode::OK,
            serde_json::json!({ "message": "Upload aborted", "upload_id": upload_id }),
        );
    }

    let number: u32 = path.rsplit('/').next().unwrap().parse().unwrap();
    let total: u32 = total.parse().unwrap();
    if number == fail_on {
        return json(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "internal_error", "detail": "disk on fire" }),
        );
    }

    if last == "true" {
        json(
            StatusCode::OK,
            serde_json::json!({
                "message": "File 'a.bin' uploaded successfully via multipart upload.",
                "storage_locator_url": "http://gate/v1/uploads/a.bin",
                "resolved_object_name": "a.bin",
                "source": "multipart_upload",
                "original_filename": "a.bin",
                "upload_id": "scripted",
                "total_chunks": total,
            }),
        )
    } else {
        json(
            StatusCode::OK,
            serde_json::json!({
                "message": format!("Chunk {}/{} uploaded successfully", number, total),
                "upload_id": "scripted",
                "chunk_number": number,
                "total_chunks": total,
                "chunks_received": number,
            }),
        )
    }
}

#[tokio::test]
async fn test_chunks_sent_in_order() {
    let (client, log) = scripted_gateway(0).await;

    let receipt = MultipartUpload::new(client, UploadId::new("scripted").unwrap(), "a.bin")
        .chunk_size(4)
        .upload(b"0123456789")
        .await
        .unwrap();
    assert_eq!(receipt.total_chunks, Some(3));

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "POST /v1/uploads/scripted/chunks/1 3 false 4",
            "POST /v1/uploads/scripted/chunks/2 3 false 4",
            "POST /v1/uploads/scripted/chunks/3 3 true 2",
        ]
    );
}

#[tokio::test]
async fn test_failed_middle_chunk_aborts_session() {
    let (client, log) = scripted_gateway(2).await;

    let err = MultipartUpload::new(client, UploadId::new("scripted").unwrap(), "a.bin")
        .chunk_size(4)
        .upload(b"0123456789")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 500, .. }));
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "POST /v1/uploads/scripted/chunks/1 3 false 4",
            "POST /v1/uploads/scripted/chunks/2 3 false 4",
            "DELETE /v1/uploads/scripted   0",
        ]
    );
}

#[tokio::test]
async fn test_failed_last_chunk_is_not_aborted() {
    let (client, log) = scripted_gateway(2).await;

    let err = MultipartUpload::new(client, UploadId::new("scripted").unwrap(), "a.bin")
        .chunk_size(8)
        .upload(b"0123456789")
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some("internal_error"));
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|line| line.starts_with("POST")));
}

#[tokio::test]
async fn test_unreachable_gateway() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::new(format!("http://{}", addr)).unwrap();
    let err = client
        .abort(&UploadId::new("anything").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Connection(_)));
}

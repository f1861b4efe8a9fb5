// Chunked JSON streaming utilities
use crate::application::session::DashboardView;
use async_compression::tokio::bufread::BrotliEncoder;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;

/// Create a chunked JSON streaming response.
pub async fn chunked_json_stream<S, T>(
    stream: S,
    compress: bool,
) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let byte_stream = stream.then(move |msg| async move { serialize_chunk(msg, compress).await });

    let body = Body::from_stream(byte_stream);

    // NOTE: No Content-Encoding header here. Chunks are compressed
    // individually, not the HTTP response as a whole, and a
    // Content-Encoding header would make clients try to decompress the
    // stream itself, breaking the chunk protocol.
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-json-stream")
        .header(header::TRANSFER_ENCODING, "chunked");

    response
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize one message to a length-prefixed chunk: 4-byte big-endian
/// payload length, then the (optionally Brotli-compressed) JSON bytes.
async fn serialize_chunk<T: Serialize>(msg: T, compress: bool) -> Result<Bytes, std::io::Error> {
    let buffer = serde_json::to_vec(&msg)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let payload = if compress {
        let cursor = std::io::Cursor::new(buffer);
        let mut encoder = BrotliEncoder::new(cursor);
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await?;
        compressed
    } else {
        buffer
    };

    let length = payload.len() as u32;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Streaming response over a view watch channel: the current snapshot
/// first, then one chunk per published change.
pub async fn stream_from_watch(
    mut rx: watch::Receiver<DashboardView>,
    compress: bool,
) -> impl IntoResponse {
    let stream = async_stream::stream! {
        loop {
            let view = rx.borrow_and_update().clone();
            yield view;
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    match chunked_json_stream(stream, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::BrotliDecoder;
    use serde_json::json;

    #[tokio::test]
    async fn test_chunk_is_length_prefixed_json() {
        let chunk = serialize_chunk(&json!({"battery": 50.0}), false)
            .await
            .unwrap();

        let length = u32::from_be_bytes(chunk[..4].try_into().unwrap()) as usize;
        assert_eq!(length, chunk.len() - 4);

        let value: serde_json::Value = serde_json::from_slice(&chunk[4..]).unwrap();
        assert_eq!(value["battery"], 50.0);
    }

    #[tokio::test]
    async fn test_compressed_chunk_round_trips() {
        let msg = json!({"logs": ["Barking detected: 6 events"]});
        let chunk = serialize_chunk(&msg, true).await.unwrap();

        let length = u32::from_be_bytes(chunk[..4].try_into().unwrap()) as usize;
        assert_eq!(length, chunk.len() - 4);

        let cursor = std::io::Cursor::new(chunk[4..].to_vec());
        let mut decoder = BrotliDecoder::new(cursor);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).await.unwrap();

        let value: serde_json::Value = serde_json::from_slice(&decompressed).unwrap();
        assert_eq!(value, msg);
    }
}

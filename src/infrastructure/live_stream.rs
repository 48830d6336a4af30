// Chunked NDJSON streaming of live measurements
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, warn};

/// One JSON document per line
fn encode_line<T: Serialize>(item: &T) -> Result<Bytes, serde_json::Error> {
    let mut chunk = BytesMut::new().writer();
    serde_json::to_writer(&mut chunk, item)?;
    let mut chunk = chunk.into_inner();
    chunk.put_u8(b'\n');
    Ok(chunk.freeze())
}

/// `backlog` first, then every item received until the sender goes away.
/// A lagging receiver skips what it missed and keeps going.
pub fn ndjson_stream<T>(
    backlog: Vec<T>,
    mut rx: broadcast::Receiver<T>,
) -> impl Stream<Item = Result<Bytes, serde_json::Error>> + Send + 'static
where
    T: Serialize + Clone + Send + 'static,
{
    async_stream::stream! {
        for item in backlog {
            yield encode_line(&item);
        }
        loop {
            match rx.recv().await {
                Ok(item) => yield encode_line(&item),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live stream lagged");
                }
                Err(RecvError::Closed) => {
                    debug!("Live stream source closed");
                    break;
                }
            }
        }
    }
}

pub fn ndjson_response<T>(backlog: Vec<T>, rx: broadcast::Receiver<T>) -> Result<Response<Body>, StatusCode>
where
    T: Serialize + Clone + Send + 'static,
{
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ndjson_stream(backlog, rx)))
        .map_err(|e| {
            error!(error = %e, "Stream response build error");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_backlog_then_live_items() {
        let (tx, rx) = broadcast::channel(8);
        let stream = ndjson_stream(vec![json!({"n": 1})], rx);
        tx.send(json!({"n": 2})).unwrap();
        drop(tx);

        let lines: Vec<Bytes> = stream.map(|chunk| chunk.unwrap()).collect().await;

        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[0][..], b"{\"n\":1}\n");
        let second: Value = serde_json::from_slice(&lines[1]).unwrap();
        assert_eq!(second["n"], 2);
    }

    #[tokio::test]
    async fn test_lagged_receiver_continues() {
        let (tx, rx) = broadcast::channel(2);
        for n in 0..5 {
            tx.send(json!({"n": n})).unwrap();
        }
        drop(tx);

        let lines: Vec<Bytes> = ndjson_stream(Vec::new(), rx)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        // only the last two survive the overflow
        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[1][..], b"{\"n\":4}\n");
    }
}

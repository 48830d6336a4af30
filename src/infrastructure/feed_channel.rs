// WebSocket push channel to the measurements backend
//
// One background task per channel owns both halves of the socket: it writes
// queued outbound frames and hands every inbound envelope to `on_frame` in
// arrival order.
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("session token is not a valid header value")]
    InvalidToken,
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("channel closed")]
    Closed,
}

/// Named event with a JSON payload, used in both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(event: &str, data: &T) -> Result<Self, FeedError> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        })
    }
}

pub struct FeedChannel {
    outbound: mpsc::UnboundedSender<Message>,
}

impl FeedChannel {
    /// Open the channel, sending `token` as a bearer credential on the upgrade.
    ///
    /// `on_close` runs exactly once when the socket task ends, whichever side
    /// closed it.
    pub async fn open<F, C>(url: &str, token: Option<&str>, on_frame: F, on_close: C) -> Result<Self, FeedError>
    where
        F: Fn(Envelope) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let mut request = url.into_client_request()?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| FeedError::InvalidToken)?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        info!(url, "Connecting to live feed");
        let (stream, _) = connect_async(request).await?;
        let (mut write, mut read) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = rx.recv() => {
                        let Some(msg) = outbound else {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        };
                        let closing = matches!(msg, Message::Close(_));
                        if let Err(e) = write.send(msg).await {
                            error!(error = %e, "Failed to send frame");
                            break;
                        }
                        if closing {
                            break;
                        }
                    }
                    inbound = read.next() => {
                        match inbound {
                            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Envelope>(&text) {
                                Ok(envelope) => on_frame(envelope),
                                Err(e) => warn!(error = %e, "Ignoring malformed frame"),
                            },
                            Some(Ok(Message::Close(frame))) => {
                                debug!(?frame, "Live feed closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!(error = %e, "Live feed error");
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
            on_close();
        });

        Ok(Self { outbound: tx })
    }

    pub fn send(&self, envelope: &Envelope) -> Result<(), FeedError> {
        let text = serde_json::to_string(envelope)?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| FeedError::Closed)
    }

    pub fn close(self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = Envelope::new("subscribe:measurements", &serde_json::json!({"areaId": "a1"})).unwrap();
        let text = serde_json::to_string(&envelope).unwrap();
        assert_eq!(text, r#"{"event":"subscribe:measurements","data":{"areaId":"a1"}}"#);
    }

    #[test]
    fn test_envelope_without_data() {
        let envelope: Envelope = serde_json::from_str(r#"{"event":"connected"}"#).unwrap();
        assert_eq!(envelope.data, Value::Null);
    }
}

// Live feed connector - Single push channel plus subscriber registry
use crate::application::auth_service::SessionStore;
use crate::domain::filter::SubscriptionFilter;
use crate::domain::measurement::LiveMeasurement;
use crate::infrastructure::feed_channel::{Envelope, FeedChannel};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

pub const MEASUREMENT_EVENT: &str = "new:measurement";
pub const SUBSCRIBE_EVENT: &str = "subscribe:measurements";

pub type MeasurementHandler = Arc<dyn Fn(&LiveMeasurement) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Default)]
struct FeedState {
    channel: Option<FeedChannel>,
    connecting: bool,
    /// Bumped on every open/close so callbacks from a stale socket are ignored
    generation: u64,
    handlers: HashMap<String, HashMap<usize, MeasurementHandler>>,
    desired: Option<SubscriptionFilter>,
    announced: Option<SubscriptionFilter>,
}

impl FeedState {
    fn announce_desired(&mut self) {
        let Some(channel) = &self.channel else {
            return;
        };
        if self.desired.is_none() || self.desired == self.announced {
            return;
        }
        let Some(filter) = self.desired.clone() else {
            return;
        };
        match Envelope::new(SUBSCRIBE_EVENT, &filter).and_then(|envelope| channel.send(&envelope)) {
            Ok(()) => {
                debug!(?filter, "Announced measurement filter");
                self.announced = Some(filter);
            }
            Err(e) => error!(error = %e, "Failed to announce measurement filter"),
        }
    }

    /// Handler registrations only live as long as the channel session
    fn end_session(&mut self) {
        self.channel = None;
        self.connecting = false;
        self.generation += 1;
        self.announced = None;
        self.handlers.clear();
    }
}

fn handler_key(handler: &MeasurementHandler) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}

/// Owns the process's push channel. Shared through `Arc`; `connect` and
/// `disconnect` are idempotent so any holder may call them.
pub struct LiveFeed {
    url: String,
    session: SessionStore,
    state: Arc<Mutex<FeedState>>,
}

impl LiveFeed {
    pub fn new(url: impl Into<String>, session: SessionStore) -> Self {
        Self {
            url: url.into(),
            session,
            state: Arc::new(Mutex::new(FeedState::default())),
        }
    }

    /// Open the channel unless one is open or opening. Failures are logged,
    /// never returned, and no retry is scheduled.
    pub async fn connect(&self) {
        let generation = {
            let mut state = self.state.lock();
            if state.channel.is_some() || state.connecting {
                return;
            }
            state.connecting = true;
            state.generation += 1;
            state.generation
        };

        let on_frame = {
            let state = Arc::downgrade(&self.state);
            move |envelope: Envelope| dispatch(&state, generation, envelope)
        };
        let on_close = {
            let state = Arc::downgrade(&self.state);
            move || {
                let Some(state) = state.upgrade() else {
                    return;
                };
                let mut state = state.lock();
                if state.generation == generation {
                    warn!("Disconnected from live feed");
                    state.end_session();
                }
            }
        };

        let token = self.session.token();
        match FeedChannel::open(&self.url, token.as_deref(), on_frame, on_close).await {
            Ok(channel) => {
                let mut state = self.state.lock();
                if state.generation != generation || !state.connecting {
                    // disconnect() ran while the handshake was in flight
                    channel.close();
                    return;
                }
                info!(url = %self.url, "Connected to live feed");
                state.channel = Some(channel);
                state.connecting = false;
                state.announced = None;
                state.announce_desired();
            }
            Err(e) => {
                error!(url = %self.url, error = %e, "Failed to connect to live feed");
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.connecting = false;
                }
            }
        }
    }

    /// Close the channel if open. Registered handlers are dropped with it.
    pub fn disconnect(&self) {
        let channel = {
            let mut state = self.state.lock();
            let channel = state.channel.take();
            state.end_session();
            channel
        };
        if let Some(channel) = channel {
            info!("Closing live feed");
            channel.close();
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        let state = self.state.lock();
        if state.channel.is_some() {
            ConnectionState::Connected
        } else if state.connecting {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Registering the same handler twice is a no-op
    pub fn subscribe(&self, event: &str, handler: MeasurementHandler) {
        let mut state = self.state.lock();
        state
            .handlers
            .entry(event.to_string())
            .or_default()
            .insert(handler_key(&handler), handler);
    }

    pub fn unsubscribe(&self, event: &str, handler: &MeasurementHandler) {
        let mut state = self.state.lock();
        if let Some(handlers) = state.handlers.get_mut(event) {
            handlers.remove(&handler_key(handler));
        }
    }

    /// Ask the backend to pre-filter pushed measurements. Only sent when the
    /// filter differs from the one already announced on this channel; the
    /// latest filter is announced again whenever a channel opens.
    pub fn subscribe_to_measurements(&self, filter: SubscriptionFilter) {
        let mut state = self.state.lock();
        state.desired = Some(filter);
        state.announce_desired();
    }
}

fn dispatch(state: &Weak<Mutex<FeedState>>, generation: u64, envelope: Envelope) {
    let Some(state) = state.upgrade() else {
        return;
    };

    if envelope.event != MEASUREMENT_EVENT {
        trace!(event = %envelope.event, "Ignoring feed event");
        return;
    }

    // Handlers run without the lock so they may (un)subscribe
    let handlers: Vec<MeasurementHandler> = {
        let state = state.lock();
        if state.generation != generation {
            return;
        }
        match state.handlers.get(&envelope.event) {
            Some(handlers) => handlers.values().cloned().collect(),
            None => Vec::new(),
        }
    };

    let measurement: LiveMeasurement = match serde_json::from_value(envelope.data) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "Malformed measurement event");
            return;
        }
    };
    trace!(sensor = %measurement.sensor_id, handlers = handlers.len(), "Measurement received");

    for handler in handlers {
        handler(&measurement);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    pub(crate) type ServerSocket = WebSocketStream<TcpStream>;

    impl LiveFeed {
        fn is_connected(&self) -> bool {
            self.connection_state() == ConnectionState::Connected
        }

        fn handler_count(&self, event: &str) -> usize {
            self.state.lock().handlers.get(event).map_or(0, HashMap::len)
        }
    }

    /// Local push server; every accepted socket is handed to the test
    pub(crate) async fn spawn_server() -> (String, mpsc::UnboundedReceiver<ServerSocket>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                    if tx.send(ws).is_err() {
                        break;
                    }
                }
            }
        });
        (format!("ws://{}", addr), rx)
    }

    pub(crate) fn measurement_frame(work_center: &str, sensor: &str) -> Message {
        let text = serde_json::json!({
            "event": MEASUREMENT_EVENT,
            "data": {
                "workCenter": work_center,
                "area": "Assembly",
                "sensorId": sensor,
                "voltage": 110.4,
                "current": 24.8,
                "date": "2024-05-01",
                "time": "10:15"
            }
        })
        .to_string();
        Message::Text(text)
    }

    pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn next_text(socket: &mut ServerSocket) -> Envelope {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    fn recording_handler() -> (MeasurementHandler, Arc<Mutex<Vec<LiveMeasurement>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: MeasurementHandler = Arc::new(move |m: &LiveMeasurement| sink.lock().push(m.clone()));
        (handler, seen)
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (url, mut sockets) = spawn_server().await;
        let feed = LiveFeed::new(url, SessionStore::default());

        feed.connect().await;
        feed.connect().await;

        assert!(feed.is_connected());
        let _first = sockets.recv().await.unwrap();
        let second = tokio::time::timeout(Duration::from_millis(200), sockets.recv()).await;
        assert!(second.is_err(), "second connect opened another socket");
    }

    #[tokio::test]
    async fn test_duplicate_handler_invoked_once() {
        let (url, mut sockets) = spawn_server().await;
        let feed = LiveFeed::new(url, SessionStore::default());
        let (handler, seen) = recording_handler();

        feed.subscribe(MEASUREMENT_EVENT, handler.clone());
        feed.subscribe(MEASUREMENT_EVENT, handler.clone());
        assert_eq!(feed.handler_count(MEASUREMENT_EVENT), 1);

        feed.connect().await;
        let mut server = sockets.recv().await.unwrap();
        server.send(measurement_frame("Plant A", "S-001")).await.unwrap();

        assert!(wait_until(|| seen.lock().len() == 1).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].sensor_id, "S-001");

        feed.unsubscribe(MEASUREMENT_EVENT, &handler);
        assert_eq!(feed.handler_count(MEASUREMENT_EVENT), 0);
    }

    #[tokio::test]
    async fn test_filter_announced_only_on_change() {
        let (url, mut sockets) = spawn_server().await;
        let feed = LiveFeed::new(url, SessionStore::default());

        // Not connected: remembered, nothing sent
        feed.subscribe_to_measurements(SubscriptionFilter {
            work_center_id: Some("wc1".to_string()),
            ..Default::default()
        });

        feed.connect().await;
        let mut server = sockets.recv().await.unwrap();

        let first = next_text(&mut server).await;
        assert_eq!(first.event, SUBSCRIBE_EVENT);
        assert_eq!(first.data, serde_json::json!({"workCenterId": "wc1"}));

        feed.subscribe_to_measurements(SubscriptionFilter {
            work_center_id: Some("wc1".to_string()),
            ..Default::default()
        });
        feed.subscribe_to_measurements(SubscriptionFilter {
            work_center_id: Some("wc1".to_string()),
            area_id: Some("a1".to_string()),
            ..Default::default()
        });

        let second = next_text(&mut server).await;
        assert_eq!(second.data, serde_json::json!({"workCenterId": "wc1", "areaId": "a1"}));
    }

    #[tokio::test]
    async fn test_reconnect_after_server_drop_starts_fresh_session() {
        let (url, mut sockets) = spawn_server().await;
        let feed = LiveFeed::new(url, SessionStore::default());
        let (handler, seen) = recording_handler();

        feed.subscribe(MEASUREMENT_EVENT, handler);
        feed.connect().await;
        let mut server = sockets.recv().await.unwrap();
        server.close(None).await.unwrap();
        drop(server);

        assert!(wait_until(|| !feed.is_connected()).await);
        assert_eq!(feed.handler_count(MEASUREMENT_EVENT), 0);

        feed.connect().await;
        assert!(feed.is_connected());
        let mut server = sockets.recv().await.unwrap();
        server.send(measurement_frame("Plant A", "S-002")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_is_safe_when_not_connected() {
        let feed = LiveFeed::new("ws://127.0.0.1:9", SessionStore::default());
        feed.disconnect();
        assert_eq!(feed.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_failure_is_logged_not_raised() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let feed = LiveFeed::new(format!("ws://{}", addr), SessionStore::default());
        feed.connect().await;

        assert_eq!(feed.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_bearer_token_sent_on_upgrade() {
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let auth = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = tx.send(auth);
                Ok(resp)
            };
            let _ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let session = SessionStore::default();
        session.save("jwt-token");
        let feed = LiveFeed::new(format!("ws://{}", addr), session);
        feed.connect().await;

        assert_eq!(rx.recv().await.unwrap().as_deref(), Some("Bearer jwt-token"));
    }
}

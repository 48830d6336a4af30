// Live view - Filter selection, feed subscription, matching and buffering
use crate::application::buffer::BoundedBuffer;
use crate::application::catalog_service::CatalogService;
use crate::application::live_feed::{ConnectionState, LiveFeed, MEASUREMENT_EVENT, MeasurementHandler};
use crate::application::matcher;
use crate::domain::catalog::ResolvedSelection;
use crate::domain::filter::{FilterError, FilterSelection, FilterUpdate};
use crate::domain::measurement::LiveMeasurement;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

const UPDATES_CAPACITY: usize = 256;

struct ViewState {
    selection: FilterSelection,
    debug_mode: bool,
    buffer: BoundedBuffer<LiveMeasurement>,
}

impl ViewState {
    /// The chart shows data once a sensor is fully selected, or in debug mode
    fn can_show(&self) -> bool {
        self.debug_mode
            || (self.selection.work_center().is_some()
                && self.selection.area().is_some()
                && self.selection.sensor().is_some())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub connection: ConnectionState,
    pub debug_mode: bool,
    pub can_show: bool,
    pub selection: ResolvedSelection,
    pub measurements: Vec<LiveMeasurement>,
}

pub struct LiveView {
    feed: Arc<LiveFeed>,
    catalog: Arc<CatalogService>,
    state: Arc<Mutex<ViewState>>,
    updates: broadcast::Sender<LiveMeasurement>,
    handler: MeasurementHandler,
}

impl LiveView {
    pub fn new(feed: Arc<LiveFeed>, catalog: Arc<CatalogService>, buffer_capacity: usize) -> Self {
        let state = Arc::new(Mutex::new(ViewState {
            selection: FilterSelection::default(),
            debug_mode: false,
            buffer: BoundedBuffer::new(buffer_capacity),
        }));
        let (updates, _) = broadcast::channel(UPDATES_CAPACITY);

        let handler: MeasurementHandler = {
            let state = Arc::downgrade(&state);
            let catalog = catalog.clone();
            let updates = updates.clone();
            Arc::new(move |measurement: &LiveMeasurement| {
                let Some(state) = state.upgrade() else {
                    return;
                };
                let mut state = state.lock();
                if !state.can_show() {
                    return;
                }
                let resolved = catalog.resolve(&state.selection);
                if !matcher::accepts(&resolved, measurement, state.debug_mode) {
                    if state.debug_mode {
                        debug!(?resolved, received = ?measurement, "Measurement filtered out");
                    }
                    return;
                }
                state.buffer.append(measurement.clone());
                let _ = updates.send(measurement.clone());
            })
        };

        Self {
            feed,
            catalog,
            state,
            updates,
            handler,
        }
    }

    /// Connect the feed, register this view's handler and announce the
    /// current filter. Call again after the channel drops.
    pub async fn attach(&self) {
        self.feed.connect().await;
        self.feed.subscribe(MEASUREMENT_EVENT, self.handler.clone());
        let filter = self.state.lock().selection.subscription_filter();
        self.feed.subscribe_to_measurements(filter);
    }

    /// Unregister this view's handler
    pub fn detach(&self) {
        self.feed.unsubscribe(MEASUREMENT_EVENT, &self.handler);
    }

    pub fn selection(&self) -> FilterSelection {
        self.state.lock().selection.clone()
    }

    /// Apply a new selection. On change the buffer is cleared and the new
    /// filter is announced to the backend.
    pub fn apply_filter(&self, update: FilterUpdate) -> Result<FilterSelection, FilterError> {
        let catalog = self.catalog.snapshot();
        let (selection, changed) = {
            let mut state = self.state.lock();
            let next = update.apply(&state.selection, &catalog)?;
            let changed = next != state.selection;
            if changed {
                state.selection = next;
                state.buffer.clear();
            }
            (state.selection.clone(), changed)
        };

        if changed {
            info!(
                work_center = ?selection.work_center(),
                area = ?selection.area(),
                sensor = ?selection.sensor(),
                "Filter changed"
            );
            self.feed.subscribe_to_measurements(selection.subscription_filter());
        }
        Ok(selection)
    }

    pub fn reset_filter(&self) {
        {
            let mut state = self.state.lock();
            state.selection.reset();
            state.buffer.clear();
        }
        self.feed
            .subscribe_to_measurements(FilterSelection::default().subscription_filter());
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.debug_mode = enabled;
        if !state.can_show() {
            state.buffer.clear();
        }
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        let state = self.state.lock();
        LiveSnapshot {
            connection: self.feed.connection_state(),
            debug_mode: state.debug_mode,
            can_show: state.can_show(),
            selection: self.catalog.resolve(&state.selection),
            measurements: state.buffer.to_vec(),
        }
    }

    /// Buffered measurements plus a receiver for everything accepted after
    /// them. Taken under the view lock, so nothing lands in both.
    pub fn follow(&self) -> (Vec<LiveMeasurement>, broadcast::Receiver<LiveMeasurement>) {
        let state = self.state.lock();
        (state.buffer.to_vec(), self.updates.subscribe())
    }

    pub fn feed(&self) -> &Arc<LiveFeed> {
        &self.feed
    }
}

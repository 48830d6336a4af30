// Simulator - Periodically posts synthetic measurements to the backend
use crate::application::monitoring_repository::MonitoringRepository;
use crate::domain::simulation::{SimulatedMeasurement, SimulationConfig, SimulationStatus};
use chrono::Local;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

#[derive(Default)]
struct SimulatorState {
    status: SimulationStatus,
    timer: Option<JoinHandle<()>>,
}

/// At most one simulation runs per simulator. `count` is never reset, so it
/// keeps accumulating across start/stop cycles.
#[derive(Clone)]
pub struct Simulator {
    repository: Arc<dyn MonitoringRepository>,
    state: Arc<Mutex<SimulatorState>>,
}

impl Simulator {
    pub fn new(repository: Arc<dyn MonitoringRepository>) -> Self {
        Self {
            repository,
            state: Arc::new(Mutex::new(SimulatorState::default())),
        }
    }

    /// Replace any running timer, send one measurement now, then one every
    /// `interval_seconds`.
    pub fn start(&self, config: SimulationConfig) -> SimulationStatus {
        let period = Duration::from_secs(config.interval_seconds.max(1));
        let config = Arc::new(config);

        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        info!(
            work_center = %config.work_center,
            area = ?config.area,
            sensor = ?config.sensor_id,
            interval_secs = period.as_secs(),
            "Starting simulation"
        );
        self.spawn_send(config.clone());

        let simulator = self.clone();
        state.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                simulator.spawn_send(config.clone());
            }
        }));
        state.status.is_running = true;
        state.status.clone()
    }

    /// Cancel the timer. A send already in flight still completes.
    pub fn stop(&self) -> SimulationStatus {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
            info!(sent = state.status.count, "Simulation stopped");
        }
        state.status.is_running = false;
        state.status.clone()
    }

    pub fn status(&self) -> SimulationStatus {
        self.state.lock().status.clone()
    }

    // Sends run detached from the timer so stopping never cancels one
    fn spawn_send(&self, config: Arc<SimulationConfig>) {
        let repository = self.repository.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let now = Local::now();
            let payload = SimulatedMeasurement::synthesize(&config, now, &mut rand::thread_rng());

            match repository.post_measurement(&payload, &config.api_key).await {
                Ok(()) => {
                    let mut state = state.lock();
                    state.status.last_sent = Some(now);
                    state.status.count += 1;
                    info!(
                        voltage = payload.voltage,
                        current = payload.current,
                        count = state.status.count,
                        "Simulated measurement sent"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to send simulated measurement");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::catalog_service::tests::FakeRepository;
    use crate::domain::simulation::tests::sample_config;
    use std::sync::atomic::Ordering;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_immediately_then_every_interval() {
        let repo = Arc::new(FakeRepository::default());
        let simulator = Simulator::new(repo.clone());

        let status = simulator.start(sample_config());
        assert!(status.is_running);
        settle().await;
        assert_eq!(repo.posted_count(), 1);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        settle().await;
        assert_eq!(repo.posted_count(), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(repo.posted_count(), 3);
        assert_eq!(simulator.status().count, 3);
        assert!(simulator.status().last_sent.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_keeps_single_timer() {
        let repo = Arc::new(FakeRepository::default());
        let simulator = Simulator::new(repo.clone());

        simulator.start(sample_config());
        simulator.start(sample_config());
        settle().await;
        // one immediate send per start
        assert_eq!(repo.posted_count(), 2);

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        settle().await;
        assert_eq!(repo.posted_count(), 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(repo.posted_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer_and_count_accumulates() {
        let repo = Arc::new(FakeRepository::default());
        let simulator = Simulator::new(repo.clone());

        simulator.start(sample_config());
        settle().await;
        let stopped = simulator.stop();
        assert!(!stopped.is_running);
        assert_eq!(stopped.count, 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(repo.posted_count(), 1);

        simulator.start(sample_config());
        settle().await;
        assert_eq!(simulator.status().count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_keeps_timer_running() {
        let repo = Arc::new(FakeRepository::default());
        repo.fail.store(true, Ordering::SeqCst);
        let simulator = Simulator::new(repo.clone());

        simulator.start(sample_config());
        settle().await;
        assert_eq!(simulator.status().count, 0);

        repo.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        settle().await;

        let status = simulator.status();
        assert!(status.is_running);
        assert_eq!(status.count, 1);
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let simulator = Simulator::new(Arc::new(FakeRepository::default()));
        let status = simulator.stop();
        assert!(!status.is_running);
        assert_eq!(status.count, 0);
    }
}

// Collar session service - event reducer, animator loop and deterrent timers
use crate::application::deterrent::{DeterrentControls, DeterrentKind};
use crate::application::telemetry_source::{SourceEvent, TelemetryFeed, TelemetrySource};
use crate::domain::collar::{NormalizedStatus, RawCollarStatus};
use crate::domain::event_log::{EventLog, LogCategory, LogEntry};
use crate::domain::history::HistoryBuffer;
use crate::domain::position::{GeoBounds, ScreenPosition};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const HEART_TRACE_LEN: usize = 40;
pub const SOUND_BAR_COUNT: usize = 32;

/// Animator cadence, independent of the data-arrival cadence.
const ANIMATION_TICK: Duration = Duration::from_millis(100);

const SOUND_BASELINE: f64 = 5.0;
/// Static level the sound bars collapse to while disconnected.
const SOUND_FLATLINE: f64 = 2.0;
const VIBRATION_ANXIETY_RELIEF: u8 = 10;

/// Everything the dashboard renders for one collar, published as an
/// immutable snapshot after every state change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub collar_id: String,
    pub status: NormalizedStatus,
    pub position: ScreenPosition,
    pub heart_rate_history: Vec<f64>,
    pub sound_bars: Vec<f64>,
    pub logs: Vec<LogEntry>,
    pub controls: DeterrentControls,
}

/// Mutable session state. Owned by the session task alone; everything
/// here is reduced synchronously, one event at a time.
#[derive(Debug)]
pub struct DashboardState {
    pub status: NormalizedStatus,
    pub position: ScreenPosition,
    pub heart_history: HistoryBuffer,
    pub sound_bars: HistoryBuffer,
    pub logs: EventLog,
    pub controls: DeterrentControls,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            status: NormalizedStatus::default(),
            position: ScreenPosition::default(),
            heart_history: HistoryBuffer::new(HEART_TRACE_LEN, 0.0),
            sound_bars: HistoryBuffer::new(SOUND_BAR_COUNT, SOUND_BASELINE),
            logs: EventLog::new(),
            controls: DeterrentControls::default(),
        }
    }

    pub fn apply_event(&mut self, event: SourceEvent, bounds: &GeoBounds) {
        match event {
            SourceEvent::Connected => {
                self.status.is_connected = true;
                self.logs.add(LogCategory::Info, "Telemetry stream connected");
            }
            SourceEvent::Disconnected => self.transport_lost("Telemetry stream disconnected"),
            SourceEvent::Unreachable => self.transport_lost("Collar unreachable"),
            SourceEvent::ParseError(err) => {
                self.logs
                    .add(LogCategory::Alert, format!("Malformed telemetry payload: {err}"));
            }
            SourceEvent::Status(raw) => self.apply_status(&raw, bounds),
        }
    }

    /// Log the loss only on the connected -> disconnected edge, so a
    /// transport retrying every tick does not flood the log.
    fn transport_lost(&mut self, message: &str) {
        if self.status.is_connected {
            self.logs.add(LogCategory::Alert, message);
        }
        self.status.mark_disconnected();
    }

    fn apply_status(&mut self, raw: &RawCollarStatus, bounds: &GeoBounds) {
        // Snapshot is replaced wholesale before position and log update,
        // so no reader observes a half-applied record.
        self.status = NormalizedStatus::from_raw(raw);

        if let (Some(lat), Some(lon)) = (raw.lat, raw.lon) {
            self.position = bounds.project(lat, lon);
        }

        let barks = raw.bark_count.unwrap_or(0);
        if barks > 0 {
            self.logs
                .add(LogCategory::Alert, format!("Barking detected: {} events", barks));
        }
    }

    /// One animator frame. Connected: jitter around the last real
    /// values so the traces look alive between data arrivals.
    /// Disconnected: flatline the heart trace and collapse the bars.
    pub fn animate(&mut self, rng: &mut impl Rng) {
        if !self.status.is_connected {
            self.heart_history.push(0.0);
            self.sound_bars.fill(SOUND_FLATLINE);
            return;
        }

        let jitter = rng.gen_range(-1.0..=1.0);
        self.heart_history.push(self.status.heart_rate + jitter);

        let base = self.status.decibels.max(0.0);
        self.sound_bars.refill_with(|| rng.gen_range(0.0..=base));
    }

    /// Returns true when a reset timer must be armed.
    pub fn trigger_deterrent(&mut self, kind: DeterrentKind) -> bool {
        if !self.controls.arm(kind) {
            return false;
        }
        let message = match kind {
            DeterrentKind::Vibration => "Manual vibration triggered",
            DeterrentKind::Ultrasonic => "Ultrasonic deterrent triggered",
        };
        self.logs.add(LogCategory::Action, message);
        true
    }

    pub fn deterrent_elapsed(&mut self, kind: DeterrentKind) {
        self.controls.clear(kind);
        match kind {
            DeterrentKind::Vibration => {
                self.status.anxiety_level =
                    self.status.anxiety_level.saturating_sub(VIBRATION_ANXIETY_RELIEF);
            }
            DeterrentKind::Ultrasonic => {
                let was_barking = self.status.is_barking;
                self.status.is_barking = false;
                if was_barking {
                    self.logs
                        .add(LogCategory::Alert, "Barking suppressed by ultrasonic pulse");
                }
            }
        }
    }

    pub fn view(&self, collar_id: &str) -> DashboardView {
        DashboardView {
            collar_id: collar_id.to_string(),
            status: self.status,
            position: self.position,
            heart_rate_history: self.heart_history.to_vec(),
            sound_bars: self.sound_bars.to_vec(),
            logs: self.logs.to_vec(),
            controls: self.controls,
        }
    }
}

enum SessionCommand {
    TriggerDeterrent(DeterrentKind),
    DeterrentElapsed(DeterrentKind),
    Shutdown,
}

/// Handle to a running collar session. Views are read from a watch
/// channel; commands go through an mpsc channel to the session task.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<DashboardView>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Latest published snapshot.
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// A receiver that observes every subsequent snapshot.
    pub fn watch_view(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    /// Fire-and-forget trigger. Returns false if the session is gone.
    pub async fn trigger_deterrent(&self, kind: DeterrentKind) -> bool {
        self.commands
            .send(SessionCommand::TriggerDeterrent(kind))
            .await
            .is_ok()
    }

    /// Idempotent teardown: stops the session task, its telemetry feed
    /// and any pending deterrent timers.
    pub async fn stop(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

pub struct CollarSession;

impl CollarSession {
    /// Subscribe to the source and start the session task for one
    /// collar. The animator starts exactly once here and dies with the
    /// task.
    pub async fn spawn(
        collar_id: String,
        source: &dyn TelemetrySource,
        bounds: GeoBounds,
    ) -> SessionHandle {
        let feed = source.subscribe(&collar_id).await;

        let mut state = DashboardState::new();
        state.logs.add(LogCategory::Info, "Dashboard initialized.");

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (view_tx, view_rx) = watch::channel(state.view(&collar_id));

        let timer_tx = cmd_tx.clone();
        let task = tokio::spawn(run_session(
            collar_id, state, feed, cmd_rx, timer_tx, view_tx, bounds,
        ));

        SessionHandle {
            commands: cmd_tx,
            view: view_rx,
            task: Mutex::new(Some(task)),
        }
    }
}

async fn run_session(
    collar_id: String,
    mut state: DashboardState,
    mut feed: TelemetryFeed,
    mut commands: mpsc::Receiver<SessionCommand>,
    timer_tx: mpsc::Sender<SessionCommand>,
    view_tx: watch::Sender<DashboardView>,
    bounds: GeoBounds,
) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(ANIMATION_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut feed_open = true;

    loop {
        tokio::select! {
            event = feed.events.recv(), if feed_open => match event {
                Some(event) => state.apply_event(event, &bounds),
                None => {
                    // Source task died; keep animating the dead state.
                    feed_open = false;
                    state.apply_event(SourceEvent::Disconnected, &bounds);
                }
            },
            _ = ticker.tick() => state.animate(&mut rng),
            cmd = commands.recv() => match cmd {
                Some(SessionCommand::TriggerDeterrent(kind)) => {
                    if state.trigger_deterrent(kind) {
                        let tx = timer_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(kind.reset_delay()).await;
                            // Session may be gone by now; a closed
                            // channel swallows the reset.
                            let _ = tx.send(SessionCommand::DeterrentElapsed(kind)).await;
                        });
                    }
                }
                Some(SessionCommand::DeterrentElapsed(kind)) => state.deterrent_elapsed(kind),
                Some(SessionCommand::Shutdown) | None => break,
            },
        }

        let _ = view_tx.send(state.view(&collar_id));
    }

    feed.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    fn raw_status() -> RawCollarStatus {
        RawCollarStatus {
            lat: Some(38.2465),
            lon: Some(21.7345),
            battery_mv: Some(3900.0),
            dog_temp_c: Some(38.5),
            last_leq_db: Some(60.0),
            bark_count: Some(3),
            resp_rate_bpm: Some(30.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_event_replaces_snapshot_and_logs_barking() {
        let mut state = DashboardState::new();
        state.apply_event(SourceEvent::Status(raw_status()), &GeoBounds::default());

        assert!(state.status.is_connected);
        assert_eq!(state.status.battery, 50.0);
        assert!((state.position.x - 50.0).abs() < 1e-6);
        let logs = state.logs.to_vec();
        assert_eq!(logs[0].message, "Barking detected: 3 events");
        assert_eq!(logs[0].category, LogCategory::Alert);
    }

    #[test]
    fn test_transport_loss_logs_only_on_edge() {
        let mut state = DashboardState::new();
        let bounds = GeoBounds::default();
        state.apply_event(SourceEvent::Connected, &bounds);

        state.apply_event(SourceEvent::Unreachable, &bounds);
        let after_first = state.logs.len();
        state.apply_event(SourceEvent::Unreachable, &bounds);
        state.apply_event(SourceEvent::Unreachable, &bounds);

        assert!(!state.status.is_connected);
        assert_eq!(state.logs.len(), after_first);
    }

    #[test]
    fn test_animate_connected_jitters_around_heart_rate() {
        let mut state = DashboardState::new();
        state.apply_event(SourceEvent::Status(raw_status()), &GeoBounds::default());
        let heart_rate = state.status.heart_rate;

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            state.animate(&mut rng);
            assert_eq!(state.heart_history.len(), HEART_TRACE_LEN);
            let latest = *state.heart_history.to_vec().last().unwrap();
            assert!((latest - heart_rate).abs() <= 1.0);
            assert!(state
                .sound_bars
                .to_vec()
                .iter()
                .all(|&bar| (0.0..=state.status.decibels).contains(&bar)));
        }
    }

    #[test]
    fn test_animate_disconnected_flatlines() {
        let mut state = DashboardState::new();
        let mut rng = StdRng::seed_from_u64(7);
        state.animate(&mut rng);

        assert_eq!(*state.heart_history.to_vec().last().unwrap(), 0.0);
        assert!(state.sound_bars.to_vec().iter().all(|&bar| bar == 2.0));
        assert_eq!(state.sound_bars.len(), SOUND_BAR_COUNT);
    }

    #[test]
    fn test_animate_tolerates_silent_sound_level() {
        let mut state = DashboardState::new();
        let mut quiet = raw_status();
        quiet.last_leq_db = Some(0.0);
        quiet.bark_count = Some(0);
        state.apply_event(SourceEvent::Status(quiet), &GeoBounds::default());

        let mut rng = StdRng::seed_from_u64(11);
        state.animate(&mut rng);
        assert!(state.sound_bars.to_vec().iter().all(|&bar| bar == 0.0));
    }

    #[test]
    fn test_vibration_relief_floors_at_zero() {
        let mut state = DashboardState::new();
        state.status.anxiety_level = 5;

        assert!(state.trigger_deterrent(DeterrentKind::Vibration));
        assert!(state.controls.vibration_active);
        state.deterrent_elapsed(DeterrentKind::Vibration);

        assert!(!state.controls.vibration_active);
        assert_eq!(state.status.anxiety_level, 0);
    }

    #[test]
    fn test_ultrasonic_clears_barking_with_followup_log() {
        let mut state = DashboardState::new();
        state.status.is_barking = true;

        assert!(state.trigger_deterrent(DeterrentKind::Ultrasonic));
        state.deterrent_elapsed(DeterrentKind::Ultrasonic);

        assert!(!state.status.is_barking);
        assert_eq!(
            state.logs.to_vec()[0].message,
            "Barking suppressed by ultrasonic pulse"
        );
    }

    #[test]
    fn test_ultrasonic_quiet_dog_logs_no_followup() {
        let mut state = DashboardState::new();
        assert!(state.trigger_deterrent(DeterrentKind::Ultrasonic));
        let logged = state.logs.len();
        state.deterrent_elapsed(DeterrentKind::Ultrasonic);
        assert_eq!(state.logs.len(), logged);
    }

    #[test]
    fn test_retrigger_adds_no_second_log() {
        let mut state = DashboardState::new();
        assert!(state.trigger_deterrent(DeterrentKind::Vibration));
        let logged = state.logs.len();
        assert!(!state.trigger_deterrent(DeterrentKind::Vibration));
        assert_eq!(state.logs.len(), logged);
    }

    struct OneShotSource;

    #[async_trait]
    impl TelemetrySource for OneShotSource {
        async fn subscribe(&self, _collar_id: &str) -> TelemetryFeed {
            let (tx, rx) = mpsc::channel(4);
            let task = tokio::spawn(async move {
                let _ = tx.send(SourceEvent::Status(raw_status())).await;
                // Keep the sender alive so the feed stays open.
                futures::future::pending::<()>().await;
            });
            TelemetryFeed::new(rx, vec![task])
        }
    }

    #[tokio::test]
    async fn test_session_applies_source_events_and_stops() {
        let handle =
            CollarSession::spawn("dog-001".to_string(), &OneShotSource, GeoBounds::default())
                .await;
        let mut views = handle.watch_view();

        let view = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                views.changed().await.expect("session closed early");
                let view = views.borrow_and_update().clone();
                if view.status.is_connected {
                    break view;
                }
            }
        })
        .await
        .expect("no status applied in time");

        assert_eq!(view.collar_id, "dog-001");
        assert_eq!(view.status.battery, 50.0);
        assert_eq!(view.heart_rate_history.len(), HEART_TRACE_LEN);

        handle.stop().await;
        // Second stop must be a safe no-op.
        handle.stop().await;
    }
}

//! Fakes and helpers shared by the room integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rally_protocol::{MatchId, ParticipantId, ServerMessage, Side, Snapshot};
use rally_room::{EngineConfig, MatchOutcome, MatchRecorder, RecordError, RoomRegistry};
use rally_session::{Frame, TransportHandle};
use rally_sim::SimConfig;
use rally_tick::TickConfig;
use rally_transport::ConnectionId;
use tokio::sync::mpsc;

// =========================================================================
// Recorders
// =========================================================================

/// Accepts every outcome and keeps a copy.
#[derive(Clone, Default)]
pub struct CountingRecorder {
    outcomes: Arc<Mutex<Vec<MatchOutcome>>>,
}

impl CountingRecorder {
    pub fn outcomes(&self) -> Vec<MatchOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }

    /// Waits until at least `n` outcomes were recorded.
    pub async fn wait_for(&self, n: usize) {
        wait_until(|| self.count() >= n).await;
    }
}

impl MatchRecorder for CountingRecorder {
    async fn record(&self, outcome: &MatchOutcome) -> Result<(), RecordError> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

/// Reports `Unavailable` for the first `fail_first` calls, then behaves
/// like a [`CountingRecorder`].
#[derive(Clone)]
pub struct FlakyRecorder {
    fail_first: u32,
    calls: Arc<AtomicU32>,
    inner: CountingRecorder,
}

impl FlakyRecorder {
    pub fn new(fail_first: u32) -> Self {
        Self {
            fail_first,
            calls: Arc::new(AtomicU32::new(0)),
            inner: CountingRecorder::default(),
        }
    }

    /// Never succeeds.
    pub fn broken() -> Self {
        Self::new(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<MatchOutcome> {
        self.inner.outcomes()
    }
}

impl MatchRecorder for FlakyRecorder {
    async fn record(&self, outcome: &MatchOutcome) -> Result<(), RecordError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(RecordError::Unavailable(format!("attempt {} refused", n + 1)));
        }
        self.inner.record(outcome).await
    }
}

// =========================================================================
// Configuration
// =========================================================================

/// 20 Hz without start jitter, flat serves, first to two.
///
/// With the right paddle held at the top, every serve sails past it, so a
/// match finishes deterministically in a few seconds of simulated time.
pub fn quick_match_config() -> EngineConfig {
    EngineConfig {
        tick: TickConfig {
            initial_jitter_us: 0,
            ..TickConfig::with_rate(20)
        },
        sim: SimConfig {
            serve_angle: 0.0,
            win_score: 2,
            ..SimConfig::default()
        },
        outbound_queue: 1_024,
        retry: rally_room::RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 200,
        },
        ..EngineConfig::default()
    }
}

// =========================================================================
// Transports
// =========================================================================

static NEXT_CONN: AtomicU64 = AtomicU64::new(1_000);

pub fn pid(id: u64) -> ParticipantId {
    ParticipantId(id)
}

/// A transport handle with a fresh connection id.
pub fn transport() -> (TransportHandle, mpsc::Receiver<Frame>) {
    let conn = ConnectionId::new(NEXT_CONN.fetch_add(1, Ordering::Relaxed));
    TransportHandle::channel(conn, 1_024)
}

/// Registers a fresh transport for `participant` and returns its side and
/// receiving end.
pub fn connect<R: MatchRecorder>(
    registry: &RoomRegistry<R>,
    id: MatchId,
    participant: ParticipantId,
) -> (Side, mpsc::Receiver<Frame>) {
    let (handle, rx) = transport();
    let (side, _) = registry
        .register_transport(id, participant, handle)
        .expect("registration should succeed");
    (side, rx)
}

pub fn decode(frame: &Frame) -> Snapshot {
    match serde_json::from_slice::<ServerMessage>(frame).expect("valid frame") {
        ServerMessage::State { snapshot } => snapshot,
        other => panic!("expected STATE, got {other:?}"),
    }
}

/// Receives until the queue closes.
pub async fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Snapshot> {
    let mut out = Vec::new();
    while let Some(frame) = rx.recv().await {
        out.push(decode(&frame));
    }
    out
}

/// Polls `cond` every 10 ms, for at most 60 s of (possibly paused) time.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..6_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

//! One match: its identity, simulation state, input slots, and transports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use rally_protocol::{MatchId, MatchType, PaddleIntent, Pair, ParticipantId, Side, Snapshot};
use rally_session::SessionDirectory;
use rally_sim::{Inputs, MatchState, SimConfig};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::RoomPhase;

/// Authoritative state of one match.
///
/// Shared as `Arc<Room>` between the registry, the match loop, and
/// connection handlers. Only the match loop advances the simulation;
/// connection handlers write the input slots and the session directory.
pub struct Room {
    id: MatchId,
    participants: Pair<ParticipantId>,
    match_type: MatchType,
    started_at: SystemTime,
    created: Instant,
    finished_at: Mutex<Option<SystemTime>>,
    phase: Mutex<RoomPhase>,
    state: Mutex<MatchState>,
    /// Latest intent per side. Writers replace, the tick reads.
    inputs: Pair<watch::Sender<PaddleIntent>>,
    sessions: SessionDirectory,
    loop_started: AtomicBool,
    closing: watch::Sender<bool>,
}

impl Room {
    /// A fresh room at kickoff. `a` plays left, `b` plays right.
    pub(crate) fn new(
        id: MatchId,
        a: ParticipantId,
        b: ParticipantId,
        match_type: MatchType,
        sim: &SimConfig,
    ) -> Self {
        Self {
            id,
            participants: Pair::new(a, b),
            match_type,
            started_at: SystemTime::now(),
            created: Instant::now(),
            finished_at: Mutex::new(None),
            phase: Mutex::new(RoomPhase::Created),
            state: Mutex::new(MatchState::kickoff(sim)),
            inputs: Pair::new(
                watch::channel(PaddleIntent::default()).0,
                watch::channel(PaddleIntent::default()).0,
            ),
            sessions: SessionDirectory::new(),
            loop_started: AtomicBool::new(false),
            closing: watch::channel(false).0,
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    /// `left` is participant A, `right` is participant B.
    pub fn participants(&self) -> Pair<ParticipantId> {
        self.participants
    }

    pub fn match_type(&self) -> &MatchType {
        &self.match_type
    }

    /// Wall-clock time the room was created.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Set once, the first time the match is seen finished.
    pub fn finished_at(&self) -> Option<SystemTime> {
        *lock(&self.finished_at)
    }

    pub fn phase(&self) -> RoomPhase {
        *lock(&self.phase)
    }

    /// Which side `participant` plays, or `None` for a non-member.
    pub fn side_of(&self, participant: ParticipantId) -> Option<Side> {
        if participant == self.participants.left {
            Some(Side::Left)
        } else if participant == self.participants.right {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn sessions(&self) -> &SessionDirectory {
        &self.sessions
    }

    /// Snapshot of the current state, without advancing it.
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.state).snapshot(self.id)
    }

    /// Replaces `side`'s intent. Takes effect at the next tick.
    pub fn set_input(&self, side: Side, intent: PaddleIntent) {
        self.inputs.get(side).send_replace(intent);
    }

    /// The intents the next tick will use.
    pub fn latest_inputs(&self) -> Inputs {
        Pair::new(*self.inputs.left.borrow(), *self.inputs.right.borrow())
    }

    /// `true` once the room has been removed from the registry.
    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    // -----------------------------------------------------------------------
    // Crate-internal: used by the registry and the match loop
    // -----------------------------------------------------------------------

    /// Instant the room was created, on Tokio's clock.
    pub(crate) fn created(&self) -> Instant {
        self.created
    }

    /// Claims the right to start this room's loop. Returns `true` for
    /// exactly one caller over the room's lifetime.
    pub(crate) fn try_start_loop(&self) -> bool {
        self.loop_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn closing_signal(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    /// Tells the loop to stop and drops every transport handle.
    pub(crate) fn close(&self) {
        self.closing.send_replace(true);
        self.sessions.clear();
        self.set_phase(RoomPhase::Removed);
    }

    /// Moves to `next` if the state machine allows it.
    pub(crate) fn set_phase(&self, next: RoomPhase) -> bool {
        let mut phase = lock(&self.phase);
        if phase.can_transition_to(next) {
            tracing::debug!(match_id = %self.id, from = %*phase, to = %next, "room phase");
            *phase = next;
            true
        } else {
            false
        }
    }

    /// Stamps the finish time unless already set; returns the stamp.
    pub(crate) fn mark_finished(&self) -> SystemTime {
        *lock(&self.finished_at).get_or_insert_with(SystemTime::now)
    }

    /// Runs one simulation step with the latest inputs and returns the
    /// resulting snapshot.
    pub(crate) fn advance(&self, config: &SimConfig, dt: Duration) -> Snapshot {
        let inputs = self.latest_inputs();
        let snapshot = {
            let mut state = lock(&self.state);
            let (next, _) = rally_sim::step(&state, &inputs, config, dt);
            *state = next;
            state.snapshot(self.id)
        };
        if snapshot.finished && self.set_phase(RoomPhase::Finished) {
            self.mark_finished();
        }
        snapshot
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("participants", &self.participants)
            .field("match_type", &self.match_type)
            .field("phase", &self.phase())
            .field("transports", &self.sessions.len())
            .finish()
    }
}

/// The guarded values are plain data that every writer leaves consistent,
/// so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

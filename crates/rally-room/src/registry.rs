//! The room registry: every live match, keyed by id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use dashmap::DashMap;
use rally_protocol::{
    Codec, JsonCodec, MatchId, MatchType, PaddleIntent, ParticipantId, Side, Snapshot,
};
use rally_session::TransportHandle;
use rally_transport::ConnectionId;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::finalize::{deliver, outcome_of};
use crate::match_loop::run_match;
use crate::{Broadcaster, EngineConfig, MatchOutcome, MatchRecorder, Room, RoomError, RoomPhase};

/// Owns every live room and the collaborators their loops need.
///
/// Cheap to clone: all clones share one registry. There is no global
/// instance; whoever wires up the server creates one and passes it around.
///
/// Lookups and mutations go through a sharded concurrent map, so rooms
/// never contend with each other. Removing a room from the map is the one
/// atomic gate for ending it: whichever caller gets the room out of the
/// map does the cleanup, and any concurrent caller sees it absent.
pub struct RoomRegistry<R, C = JsonCodec> {
    inner: Arc<Inner<R, C>>,
}

struct Inner<R, C> {
    rooms: DashMap<MatchId, Arc<Room>>,
    config: EngineConfig,
    recorder: R,
    broadcaster: Broadcaster<C>,
    /// Outcomes the recorder never accepted, kept for operator replay.
    undelivered: Mutex<Vec<MatchOutcome>>,
    /// Outcomes currently inside `deliver`, retries included.
    in_flight: DashMap<MatchId, MatchOutcome>,
    loops_started: AtomicU64,
}

impl<R, C> Clone for RoomRegistry<R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: MatchRecorder> RoomRegistry<R, JsonCodec> {
    /// A registry that sends JSON frames.
    pub fn new(config: EngineConfig, recorder: R) -> Self {
        Self::with_codec(config, recorder, JsonCodec)
    }
}

impl<R: MatchRecorder, C: Codec> RoomRegistry<R, C> {
    pub fn with_codec(config: EngineConfig, recorder: R, codec: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                rooms: DashMap::new(),
                config: config.validated(),
                recorder,
                broadcaster: Broadcaster::new(codec),
                undelivered: Mutex::new(Vec::new()),
                in_flight: DashMap::new(),
                loops_started: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn recorder(&self) -> &R {
        &self.inner.recorder
    }

    pub(crate) fn broadcaster(&self) -> &Broadcaster<C> {
        &self.inner.broadcaster
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Registers a new match between `a` (left) and `b` (right) and returns
    /// its id with the kickoff snapshot. The match loop starts once both
    /// have a transport registered.
    ///
    /// # Errors
    /// [`RoomError::SameParticipant`] if `a == b`.
    pub fn create(
        &self,
        a: ParticipantId,
        b: ParticipantId,
        match_type: MatchType,
    ) -> Result<(MatchId, Snapshot), RoomError> {
        if a == b {
            return Err(RoomError::SameParticipant(a));
        }

        let id = MatchId::random();
        let room = Arc::new(Room::new(id, a, b, match_type, &self.inner.config.sim));
        let snapshot = room.snapshot();
        tracing::info!(
            match_id = %id,
            participant_a = %a,
            participant_b = %b,
            match_type = %room.match_type(),
            "room created"
        );
        self.inner.rooms.insert(id, room);
        Ok((id, snapshot))
    }

    pub fn find(&self, id: MatchId) -> Option<Arc<Room>> {
        self.inner.rooms.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Removes a room, stopping its loop and dropping its transports.
    /// Safe to call any number of times; returns `true` only for the call
    /// that actually removed it. No outcome is recorded.
    pub fn remove(&self, id: MatchId) -> bool {
        let removed = self.take(id).is_some();
        if removed {
            tracing::info!(match_id = %id, "room removed");
        }
        removed
    }

    /// Administrative cancellation. The match is void: nothing is
    /// recorded, the score at the time is only logged.
    pub fn abandon(&self, id: MatchId) -> bool {
        let Some(room) = self.take(id) else {
            return false;
        };
        let snapshot = room.snapshot();
        tracing::warn!(
            match_id = %id,
            participant_a = %room.participants().left,
            participant_b = %room.participants().right,
            score_a = snapshot.scores.left,
            score_b = snapshot.scores.right,
            tick = snapshot.tick,
            "match abandoned, no result recorded"
        );
        true
    }

    /// The single gate: only the caller that gets the room out of the map
    /// sees `Some`.
    fn take(&self, id: MatchId) -> Option<Arc<Room>> {
        let (_, room) = self.inner.rooms.remove(&id)?;
        room.close();
        Some(room)
    }

    // -----------------------------------------------------------------------
    // Transports and input
    // -----------------------------------------------------------------------

    /// Attaches `participant`'s transport to a room, replacing any earlier
    /// one. The call that completes the pair starts the match loop; no
    /// other call ever does.
    ///
    /// Returns the participant's side and the room's current snapshot.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`]: no such room (or it was removed meanwhile)
    /// - [`RoomError::NotMember`]: `participant` is not in this match
    pub fn register_transport(
        &self,
        id: MatchId,
        participant: ParticipantId,
        handle: TransportHandle,
    ) -> Result<(Side, Snapshot), RoomError> {
        let room = self.find(id).ok_or(RoomError::NotFound(id))?;
        let side = room
            .side_of(participant)
            .ok_or(RoomError::NotMember(participant, id))?;

        let conn_id = handle.conn_id();
        room.sessions().register(participant, handle);

        // Lost a race with removal: the directory was already cleared.
        if room.is_closing() {
            room.sessions().unregister(participant, conn_id);
            return Err(RoomError::NotFound(id));
        }

        tracing::info!(match_id = %id, %participant, %side, %conn_id, "transport registered");

        let both = room.participants();
        if room.sessions().contains_all(&[both.left, both.right]) && room.try_start_loop() {
            self.start_loop(Arc::clone(&room));
        }
        Ok((side, room.snapshot()))
    }

    /// Detaches `participant`'s transport if it is still `conn_id`.
    /// A no-op for absent rooms.
    pub fn unregister_transport(
        &self,
        id: MatchId,
        participant: ParticipantId,
        conn_id: ConnectionId,
    ) -> bool {
        let Some(room) = self.find(id) else {
            return false;
        };
        let removed = room.sessions().unregister(participant, conn_id);
        if removed {
            tracing::info!(match_id = %id, %participant, %conn_id, "transport unregistered");
        }
        removed
    }

    /// Records `participant`'s latest paddle intent. Silently ignored when
    /// the room is absent or `participant` is not a member.
    pub fn update_input(&self, id: MatchId, participant: ParticipantId, intent: PaddleIntent) {
        let Some(room) = self.find(id) else {
            tracing::trace!(match_id = %id, %participant, "input for absent room ignored");
            return;
        };
        match room.side_of(participant) {
            Some(side) => room.set_input(side, intent),
            None => tracing::trace!(match_id = %id, %participant, "input from non-member ignored"),
        }
    }

    // -----------------------------------------------------------------------
    // Match loop plumbing
    // -----------------------------------------------------------------------

    fn start_loop(&self, room: Arc<Room>) {
        self.inner.loops_started.fetch_add(1, Ordering::Relaxed);
        let id = room.id();
        let task = tokio::spawn(run_match(self.clone(), room));

        // A loop that panics must not leave its room stranded as Active.
        let registry = self.clone();
        tokio::spawn(async move {
            match task.await {
                Err(e) if e.is_panic() => {
                    tracing::error!(match_id = %id, "match loop panicked");
                    registry.abandon(id);
                }
                _ => {}
            }
        });
    }

    /// Ends a finished match: removes it, then hands its outcome to the
    /// recorder. If something else removed the room first, it is not
    /// recorded.
    pub(crate) async fn finalize(&self, id: MatchId) {
        let Some(room) = self.take(id) else {
            tracing::debug!(match_id = %id, "room already removed, skipping finalization");
            return;
        };
        let outcome = outcome_of(&room);
        drop(room);

        tracing::info!(
            match_id = %outcome.match_id,
            score_a = outcome.score_a,
            score_b = outcome.score_b,
            "match finished"
        );

        self.inner.in_flight.insert(id, outcome.clone());
        match deliver(&self.inner.recorder, &outcome, &self.inner.config.retry).await {
            Ok(attempts) => {
                self.inner.in_flight.remove(&id);
                tracing::info!(match_id = %outcome.match_id, attempts, "match outcome recorded");
            }
            Err(e) => {
                tracing::error!(
                    match_id = %outcome.match_id,
                    participant_a = %outcome.participant_a,
                    participant_b = %outcome.participant_b,
                    score_a = outcome.score_a,
                    score_b = outcome.score_b,
                    started_at = ?outcome.started_at,
                    finished_at = ?outcome.finished_at,
                    match_type = %outcome.match_type,
                    error = %e,
                    "match outcome could not be recorded, parked for replay"
                );
                self.inner
                    .undelivered
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(outcome);
                self.inner.in_flight.remove(&id);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reaper
    // -----------------------------------------------------------------------

    /// Abandons rooms that never started within `start_timeout_ms` and
    /// active rooms nobody has been connected to for `abandon_grace_ms`.
    /// Returns the ids it abandoned.
    pub fn reap(&self) -> Vec<MatchId> {
        let now = Instant::now();
        let start_timeout = self.inner.config.start_timeout();
        let grace = self.inner.config.abandon_grace();

        // Collect first: removing while iterating would deadlock the shard.
        let stale: Vec<MatchId> = self
            .inner
            .rooms
            .iter()
            .filter(|entry| {
                let room = entry.value();
                match room.phase() {
                    RoomPhase::Created => now.duration_since(room.created()) >= start_timeout,
                    RoomPhase::Active => room
                        .sessions()
                        .vacant_since()
                        .is_some_and(|since| now.duration_since(since) >= grace),
                    RoomPhase::Finished | RoomPhase::Removed => false,
                }
            })
            .map(|entry| *entry.key())
            .collect();

        stale.into_iter().filter(|id| self.abandon(*id)).collect()
    }

    /// Runs [`reap`](Self::reap) every `reap_interval_ms` until every
    /// other clone of the registry is dropped.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let weak: Weak<Inner<R, C>> = Arc::downgrade(&self.inner);
        let period = self.inner.config.reap_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    tracing::debug!("registry dropped, reaper exiting");
                    return;
                };
                let reaped = RoomRegistry { inner }.reap();
                if !reaped.is_empty() {
                    tracing::info!(count = reaped.len(), "reaper abandoned rooms");
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.rooms.is_empty()
    }

    pub fn ids(&self) -> Vec<MatchId> {
        self.inner.rooms.iter().map(|e| *e.key()).collect()
    }

    /// Outcomes the recorder refused after every retry.
    pub fn undelivered_outcomes(&self) -> Vec<MatchOutcome> {
        self.inner
            .undelivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outcomes whose handoff to the recorder has not finished yet.
    pub fn in_flight_outcomes(&self) -> Vec<MatchOutcome> {
        self.inner.in_flight.iter().map(|e| e.value().clone()).collect()
    }

    /// Logs every outcome that has not reached the recorder, parked or
    /// still retrying, at `error`. Meant for shutdown, when both are about
    /// to be lost. Returns how many were logged.
    pub fn log_unrecorded(&self) -> usize {
        let parked = self.undelivered_outcomes();
        let pending = self.in_flight_outcomes();
        for (outcome, state) in parked
            .iter()
            .map(|o| (o, "parked"))
            .chain(pending.iter().map(|o| (o, "in flight")))
        {
            tracing::error!(
                match_id = %outcome.match_id,
                participant_a = %outcome.participant_a,
                participant_b = %outcome.participant_b,
                score_a = outcome.score_a,
                score_b = outcome.score_b,
                started_at = ?outcome.started_at,
                finished_at = ?outcome.finished_at,
                match_type = %outcome.match_type,
                state,
                "match outcome not recorded"
            );
        }
        parked.len() + pending.len()
    }

    /// How many match loops this registry has ever started.
    pub fn loops_started(&self) -> u64 {
        self.inner.loops_started.load(Ordering::Relaxed)
    }
}

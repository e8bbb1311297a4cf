//! The per-room tick task.

use std::sync::Arc;

use rally_protocol::Codec;
use rally_tick::TickClock;

use crate::{MatchRecorder, Room, RoomPhase, RoomRegistry};

/// Drives one room from activation to finish or removal.
///
/// Pushes the kickoff snapshot (tick 0) right away, then one snapshot per
/// tick. Stops when the room is removed; a tick already underway still
/// completes and publishes. On the first finished snapshot it hands the
/// room to the finalizer and exits.
pub(crate) async fn run_match<R: MatchRecorder, C: Codec>(
    registry: RoomRegistry<R, C>,
    room: Arc<Room>,
) {
    let match_id = room.id();
    let mut closing = room.closing_signal();
    // Removed between the start claim and this task being scheduled.
    if *closing.borrow_and_update() || !room.set_phase(RoomPhase::Active) {
        tracing::debug!(%match_id, "room closed before its loop started");
        return;
    }

    let sim = &registry.config().sim;
    let mut clock = TickClock::new(registry.config().tick.clone());
    tracing::info!(%match_id, rate_hz = clock.tick_rate_hz(), "match loop started");

    registry.broadcaster().broadcast(room.sessions(), &room.snapshot());

    loop {
        tokio::select! {
            biased;

            changed = closing.changed() => {
                if changed.is_err() || *closing.borrow() {
                    tracing::info!(%match_id, ticks = clock.tick_count(), "match loop stopped");
                    return;
                }
            }

            info = clock.wait_for_tick() => {
                let snapshot = room.advance(sim, info.dt);
                registry.broadcaster().broadcast(room.sessions(), &snapshot);
                clock.record_tick_end();
                tracing::trace!(%match_id, tick = snapshot.tick, "tick");

                if snapshot.finished {
                    let metrics = clock.metrics();
                    tracing::debug!(
                        %match_id,
                        ticks = metrics.total_ticks,
                        overruns = metrics.total_overruns,
                        max_tick_us = metrics.max_tick_time.as_micros() as u64,
                        "match loop done"
                    );
                    registry.finalize(match_id).await;
                    return;
                }
            }
        }
    }
}

//! Per-room map from participant to their current transport.

use std::sync::Mutex;

use dashmap::DashMap;
use rally_protocol::ParticipantId;
use rally_transport::ConnectionId;
use tokio::time::Instant;

use crate::TransportHandle;

/// Which connection carries each participant's snapshots, for one room.
///
/// At most one handle per participant: registering again (a reconnect)
/// replaces the previous handle. Removal is keyed by connection as well as
/// participant, so the late disconnect of a replaced connection cannot
/// evict its replacement.
///
/// The directory also remembers when it last became empty, which the
/// registry's reaper uses to spot matches nobody is watching any more.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    transports: DashMap<ParticipantId, TransportHandle>,
    /// Set when the last transport leaves, cleared when one arrives.
    vacant_since: Mutex<Option<Instant>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` for `participant`, returning the handle it
    /// replaced, if any.
    pub fn register(
        &self,
        participant: ParticipantId,
        handle: TransportHandle,
    ) -> Option<TransportHandle> {
        let conn_id = handle.conn_id();
        let previous = self.transports.insert(participant, handle);
        self.refresh_vacancy();

        match &previous {
            Some(old) => tracing::debug!(
                %participant,
                old = %old.conn_id(),
                new = %conn_id,
                "transport replaced"
            ),
            None => tracing::debug!(%participant, %conn_id, "transport registered"),
        }
        previous
    }

    /// Removes `participant`'s transport if it is still `conn_id`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn unregister(&self, participant: ParticipantId, conn_id: ConnectionId) -> bool {
        let removed = self
            .transports
            .remove_if(&participant, |_, handle| handle.conn_id() == conn_id)
            .is_some();
        if removed {
            self.refresh_vacancy();
            tracing::debug!(%participant, %conn_id, "transport unregistered");
        }
        removed
    }

    /// Drops every handle. Writer tasks see their queues close and shut
    /// their connections down. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let count = self.transports.len();
        self.transports.clear();
        if count > 0 {
            self.refresh_vacancy();
        }
        count
    }

    /// `true` if `participant` has a registered transport.
    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.transports.contains_key(&participant)
    }

    /// `true` if every one of `participants` has a registered transport.
    pub fn contains_all(&self, participants: &[ParticipantId]) -> bool {
        participants.iter().all(|p| self.contains(*p))
    }

    /// The connection currently registered for `participant`.
    pub fn conn_id(&self, participant: ParticipantId) -> Option<ConnectionId> {
        self.transports.get(&participant).map(|h| h.conn_id())
    }

    /// Calls `f` for every registered transport. Must not call back into
    /// the directory.
    pub fn for_each(&self, mut f: impl FnMut(ParticipantId, &TransportHandle)) {
        for entry in self.transports.iter() {
            f(*entry.key(), entry.value());
        }
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// When the directory last became empty after having had a transport.
    /// `None` while anyone is registered, and for a directory nobody ever
    /// joined.
    pub fn vacant_since(&self) -> Option<Instant> {
        *self.vacancy()
    }

    fn refresh_vacancy(&self) {
        let mut vacant = self.vacancy();
        if self.transports.is_empty() {
            if vacant.is_none() {
                *vacant = Some(Instant::now());
            }
        } else {
            *vacant = None;
        }
    }

    fn vacancy(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        // The guarded value is a plain timestamp; a poisoned lock still
        // holds a usable one.
        self.vacant_since
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::Frame;

    fn pid(id: u64) -> ParticipantId {
        ParticipantId(id)
    }

    fn handle(conn: u64) -> (TransportHandle, tokio::sync::mpsc::Receiver<Frame>) {
        TransportHandle::channel(ConnectionId::new(conn), 8)
    }

    // =====================================================================
    // register() / unregister()
    // =====================================================================

    #[test]
    fn test_register_new_participant_returns_none() {
        let dir = SessionDirectory::new();
        let (h, _rx) = handle(1);

        assert!(dir.register(pid(1), h).is_none());
        assert!(dir.contains(pid(1)));
        assert_eq!(dir.conn_id(pid(1)), Some(ConnectionId::new(1)));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_register_again_replaces_previous_handle() {
        let dir = SessionDirectory::new();
        let (first, _rx1) = handle(1);
        let (second, _rx2) = handle(2);
        dir.register(pid(1), first);

        let old = dir.register(pid(1), second).expect("should replace");
        assert_eq!(old.conn_id(), ConnectionId::new(1));
        assert_eq!(dir.conn_id(pid(1)), Some(ConnectionId::new(2)));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_stale_unregister_keeps_newer_connection() {
        let dir = SessionDirectory::new();
        let (first, _rx1) = handle(1);
        let (second, _rx2) = handle(2);
        dir.register(pid(1), first);
        dir.register(pid(1), second);

        // The replaced connection's disconnect arrives late.
        assert!(!dir.unregister(pid(1), ConnectionId::new(1)));
        assert_eq!(dir.conn_id(pid(1)), Some(ConnectionId::new(2)));

        assert!(dir.unregister(pid(1), ConnectionId::new(2)));
        assert!(!dir.contains(pid(1)));
    }

    #[test]
    fn test_unregister_unknown_participant_is_noop() {
        let dir = SessionDirectory::new();
        assert!(!dir.unregister(pid(5), ConnectionId::new(1)));
    }

    #[test]
    fn test_contains_all_needs_every_participant() {
        let dir = SessionDirectory::new();
        let (a, _ra) = handle(1);
        let (b, _rb) = handle(2);

        dir.register(pid(1), a);
        assert!(!dir.contains_all(&[pid(1), pid(2)]));
        dir.register(pid(2), b);
        assert!(dir.contains_all(&[pid(1), pid(2)]));
    }

    // =====================================================================
    // clear() / for_each()
    // =====================================================================

    #[tokio::test]
    async fn test_clear_closes_writer_queues() {
        let dir = SessionDirectory::new();
        let (a, mut rx) = handle(1);
        dir.register(pid(1), a);

        assert_eq!(dir.clear(), 1);
        assert!(dir.is_empty());
        assert!(rx.recv().await.is_none(), "sender dropped with the entry");
    }

    #[test]
    fn test_for_each_visits_every_transport() {
        let dir = SessionDirectory::new();
        let (a, _ra) = handle(1);
        let (b, _rb) = handle(2);
        dir.register(pid(1), a);
        dir.register(pid(2), b);

        let mut seen = Vec::new();
        dir.for_each(|p, h| seen.push((p, h.conn_id())));
        seen.sort_by_key(|(p, _)| *p);

        assert_eq!(
            seen,
            vec![
                (pid(1), ConnectionId::new(1)),
                (pid(2), ConnectionId::new(2))
            ]
        );
    }

    // =====================================================================
    // vacant_since()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_vacancy_tracks_last_departure() {
        let dir = SessionDirectory::new();
        assert_eq!(dir.vacant_since(), None, "never joined is not vacant");

        let (a, _ra) = handle(1);
        let (b, _rb) = handle(2);
        dir.register(pid(1), a);
        dir.register(pid(2), b);

        dir.unregister(pid(1), ConnectionId::new(1));
        assert_eq!(dir.vacant_since(), None, "one still watching");

        tokio::time::advance(Duration::from_secs(3)).await;
        let left_at = Instant::now();
        dir.unregister(pid(2), ConnectionId::new(2));
        assert_eq!(dir.vacant_since(), Some(left_at));

        let (again, _rc) = handle(3);
        dir.register(pid(1), again);
        assert_eq!(dir.vacant_since(), None);
    }
}

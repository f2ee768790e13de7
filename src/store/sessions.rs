use tracing::debug;

use super::CounterStore;
use crate::clock::Clock;
use crate::db::SlotStorage;
use crate::ids::generate_id;
use crate::types::CounterSession;

/// How an open session was closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Closed and kept in the counter's history.
    Recorded(CounterSession),
    /// Shorter than the configured minimum and dropped.
    Discarded(CounterSession),
}

impl SessionEnd {
    pub fn session(&self) -> &CounterSession {
        match self {
            SessionEnd::Recorded(session) | SessionEnd::Discarded(session) => session,
        }
    }
}

impl<S: SlotStorage, C: Clock> CounterStore<S, C> {
    /// Opens a session at the current count. No-op while one is already open.
    pub fn start_session(&mut self, id: &str) -> bool {
        let now = self.clock.now();
        let session_cap = self.settings.session_cap;
        let Some(counter) = self.counter_mut(id) else {
            return false;
        };
        if let Some(active) = &counter.active_session_id {
            debug!(id, session = %active, "session already open");
            return false;
        }

        let session = CounterSession {
            id: generate_id(),
            start_time: now,
            end_time: None,
            start_value: counter.count,
            end_value: None,
            notes: None,
            duration: None,
        };
        counter.active_session_id = Some(session.id.clone());
        counter.sessions.insert(0, session);
        if let Some(cap) = session_cap {
            counter.sessions.truncate(cap.max(1));
        }
        self.commit("start_session");
        true
    }

    /// Closes the open session, if any, at the current count.
    pub fn end_session(&mut self, id: &str) -> Option<SessionEnd> {
        let now = self.clock.now();
        let min_seconds = self.settings.min_session_seconds;
        let counter = self.counter_mut(id)?;
        let active = counter.active_session_id.take()?;
        let end_value = counter.count;

        let Some(index) = counter.sessions.iter().position(|s| s.id == active) else {
            debug!(id, session = %active, "active session missing from history");
            self.commit("end_session");
            return None;
        };

        let session = &mut counter.sessions[index];
        let duration = now.saturating_sub(session.start_time).max(0) / 1000;
        session.end_time = Some(now);
        session.end_value = Some(end_value);
        session.duration = Some(duration as u64);

        let outcome = if (duration as u64) < min_seconds {
            debug!(id, duration, min_seconds, "discarding short session");
            SessionEnd::Discarded(counter.sessions.remove(index))
        } else {
            SessionEnd::Recorded(session.clone())
        };
        self.commit("end_session");
        Some(outcome)
    }

    /// Attaches free-text notes to one of a counter's sessions.
    pub fn set_session_notes(
        &mut self,
        id: &str,
        session_id: &str,
        notes: Option<String>,
    ) -> bool {
        let Some(counter) = self.counter_mut(id) else {
            return false;
        };
        let Some(session) = counter.sessions.iter_mut().find(|s| s.id == session_id) else {
            return false;
        };
        session.notes = notes.filter(|n| !n.trim().is_empty());
        self.commit("set_session_notes");
        true
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::SessionEnd;
    use crate::clock::ManualClock;
    use crate::db::MemorySlot;
    use crate::store::tests::{T0, store};
    use crate::store::{CounterStore, StoreSettings};
    use crate::types::NewCounter;

    fn store_with(clock: &ManualClock, settings: StoreSettings) -> CounterStore<MemorySlot, &ManualClock> {
        CounterStore::with_clock(MemorySlot::default(), clock, settings)
    }

    #[test]
    fn start_opens_a_session_at_current_count() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a").count(4));
        clock.advance(500);

        assert!(store.start_session(&id));

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.sessions.len(), 1);
        let session = &counter.sessions[0];
        assert_eq!(counter.active_session_id.as_deref(), Some(session.id.as_str()));
        assert_eq!(session.start_time, T0 + 500);
        assert_eq!(session.start_value, 4);
        assert!(session.is_open());
        assert_eq!(session.duration, None);
    }

    #[test]
    fn second_start_is_a_no_op() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.start_session(&id);
        let active = store.get(&id).unwrap().active_session_id.clone();
        let revision = store.revision();

        assert!(!store.start_session(&id));

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.sessions.len(), 1);
        assert_eq!(counter.active_session_id, active);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn end_without_open_session_is_a_no_op() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        let revision = store.revision();
        assert_eq!(store.end_session(&id), None);
        assert_eq!(store.revision(), revision);
    }

    #[rstest]
    #[case::whole_seconds(5_000, 5)]
    #[case::rounds_down(5_999, 5)]
    #[case::sub_second(999, 0)]
    #[case::instant(0, 0)]
    fn end_fills_in_duration_and_end_value(#[case] elapsed: i64, #[case] seconds: u64) {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a").count(2));
        store.start_session(&id);
        store.increment(&id, 3);
        clock.advance(elapsed);

        let ended = store.end_session(&id).unwrap();

        let SessionEnd::Recorded(session) = ended else {
            panic!("expected a recorded session");
        };
        assert_eq!(session.end_time, Some(T0 + elapsed));
        assert_eq!(session.end_value, Some(5));
        assert_eq!(session.duration, Some(seconds));
        assert_eq!(session.delta(), Some(3));

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.active_session_id, None);
        assert_eq!(counter.sessions[0], session);
    }

    #[test]
    fn sessions_are_newest_first_and_one_at_a_time() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.start_session(&id);
        clock.advance(2_000);
        store.end_session(&id);
        clock.advance(1_000);
        store.start_session(&id);

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.sessions.len(), 2);
        assert!(counter.sessions[0].is_open());
        assert!(!counter.sessions[1].is_open());
        assert_eq!(counter.sessions.iter().filter(|s| s.is_open()).count(), 1);
        assert_eq!(
            counter.active_session_id.as_deref(),
            Some(counter.sessions[0].id.as_str())
        );
    }

    #[test]
    fn sessions_are_independent_per_counter() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let a = store.create(NewCounter::named("a"));
        let b = store.create(NewCounter::named("b"));
        assert!(store.start_session(&a));
        assert!(store.start_session(&b));
        assert!(store.end_session(&a).is_some());
        assert!(store.get(&b).unwrap().active_session().is_some());
    }

    #[test]
    fn short_sessions_are_discarded_under_a_minimum() {
        let clock = ManualClock::new(T0);
        let settings = StoreSettings {
            min_session_seconds: 1,
            ..StoreSettings::default()
        };
        let mut store = store_with(&clock, settings);
        let id = store.create(NewCounter::named("a"));

        store.start_session(&id);
        clock.advance(400);
        let ended = store.end_session(&id).unwrap();
        assert!(matches!(ended, SessionEnd::Discarded(_)));
        assert_eq!(ended.session().duration, Some(0));

        let counter = store.get(&id).unwrap();
        assert!(counter.sessions.is_empty());
        assert_eq!(counter.active_session_id, None);

        store.start_session(&id);
        clock.advance(1_000);
        assert!(matches!(store.end_session(&id), Some(SessionEnd::Recorded(_))));
        assert_eq!(store.get(&id).unwrap().sessions.len(), 1);
    }

    #[test]
    fn session_history_can_be_capped() {
        let clock = ManualClock::new(T0);
        let settings = StoreSettings {
            session_cap: Some(2),
            ..StoreSettings::default()
        };
        let mut store = store_with(&clock, settings);
        let id = store.create(NewCounter::named("a"));
        for _ in 0..4 {
            store.start_session(&id);
            clock.advance(1_000);
            store.end_session(&id);
        }
        store.start_session(&id);

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.sessions.len(), 2);
        assert!(counter.sessions[0].is_open());
        assert_eq!(counter.sessions[1].start_time, T0 + 3_000);
    }

    #[test]
    fn clock_going_backwards_yields_zero_duration() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.start_session(&id);
        clock.set(T0 - 10_000);
        let ended = store.end_session(&id).unwrap();
        assert_eq!(ended.session().duration, Some(0));
    }

    #[test]
    fn extreme_start_time_saturates_the_duration() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let text = r#"[{"id": "c1", "name": "a", "count": 2,
            "sessions": [{"id": "s1", "startTime": -9223372036854775808, "startValue": 0}],
            "activeSessionId": "s1"}]"#;
        assert!(store.import_data(text));

        let ended = store.end_session("c1").unwrap();

        assert_eq!(ended.session().duration, Some((i64::MAX / 1000) as u64));
        assert_eq!(ended.session().delta(), Some(2));
    }

    #[test]
    fn missing_active_session_clears_the_marker() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.start_session(&id);
        store.counters[0].sessions.clear();
        let revision = store.revision();

        assert_eq!(store.end_session(&id), None);

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.active_session_id, None);
        assert_eq!(store.revision(), revision + 1);
        assert!(store.start_session(&id));
    }

    #[test]
    fn notes_attach_to_a_session() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.start_session(&id);
        let session_id = store.get(&id).unwrap().sessions[0].id.clone();

        assert!(store.set_session_notes(&id, &session_id, Some("morning set".to_string())));
        assert_eq!(
            store.get(&id).unwrap().sessions[0].notes.as_deref(),
            Some("morning set")
        );
        assert!(store.set_session_notes(&id, &session_id, Some("  ".to_string())));
        assert_eq!(store.get(&id).unwrap().sessions[0].notes, None);
        assert!(!store.set_session_notes(&id, "missing", None));
    }
}

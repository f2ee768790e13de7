use tracing::debug;

use super::CounterStore;
use crate::clock::Clock;
use crate::db::SlotStorage;
use crate::ids::generate_id;
use crate::types::{Counter, LogEntry};

impl<S: SlotStorage, C: Clock> CounterStore<S, C> {
    pub fn increment(&mut self, id: &str, amount: u64) -> bool {
        self.apply(id, "increment", |count| {
            (count.saturating_add(amount), signed(amount))
        })
    }

    /// Lowers the count, stopping at zero.
    ///
    /// The log records the requested amount, so a clamped decrement logs a
    /// larger negative `increment` than the change that actually happened.
    pub fn decrement(&mut self, id: &str, amount: u64) -> bool {
        self.apply(id, "decrement", |count| {
            (count.saturating_sub(amount), -signed(amount))
        })
    }

    /// Sets the count back to zero. Earlier logs and sessions are kept.
    pub fn reset(&mut self, id: &str) -> bool {
        self.apply(id, "reset", |count| (0, -signed(count)))
    }

    /// `step` maps the current count to the new count and the delta to log.
    fn apply(
        &mut self,
        id: &str,
        operation: &'static str,
        step: impl FnOnce(u64) -> (u64, i64),
    ) -> bool {
        let now = self.clock.now();
        let log_cap = self.settings.log_cap;
        let Some(counter) = self.counter_mut(id) else {
            return false;
        };
        let (new_value, increment) = step(counter.count);
        debug!(id, operation, from = counter.count, to = new_value, "count changed");
        record(
            counter,
            LogEntry {
                id: generate_id(),
                timestamp: now,
                increment,
                new_value,
            },
            log_cap,
        );
        self.commit(operation);
        true
    }
}

fn record(counter: &mut Counter, entry: LogEntry, log_cap: usize) {
    counter.count = entry.new_value;
    counter.logs.insert(0, entry);
    counter.logs.truncate(log_cap);
}

/// Log deltas are `i64`; amounts beyond `i64::MAX` are logged as `i64::MAX`.
fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::clock::ManualClock;
    use crate::db::MemorySlot;
    use crate::store::tests::{T0, store};
    use crate::store::{CounterStore, StoreSettings};
    use crate::types::{CounterPatch, NewCounter};

    #[test]
    fn increment_logs_amount_and_new_value() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        clock.advance(1_000);

        assert!(store.increment(&id, 10));

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.count, 10);
        assert_eq!(counter.logs.len(), 1);
        assert_eq!(counter.logs[0].increment, 10);
        assert_eq!(counter.logs[0].new_value, 10);
        assert_eq!(counter.logs[0].timestamp, T0 + 1_000);
    }

    #[test]
    fn logs_are_newest_first() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.increment(&id, 1);
        clock.advance(10);
        store.increment(&id, 2);
        clock.advance(10);
        store.decrement(&id, 1);

        let counter = store.get(&id).unwrap();
        let deltas: Vec<i64> = counter.logs.iter().map(|l| l.increment).collect();
        assert_eq!(deltas, vec![-1, 2, 1]);
        assert_eq!(counter.logs[0].new_value, counter.count);
        assert!(counter.logs[0].timestamp > counter.logs[2].timestamp);
    }

    #[rstest]
    #[case::within_range(10, 3, 7)]
    #[case::exact(10, 10, 0)]
    #[case::clamped(10, 15, 0)]
    #[case::from_zero(0, 1, 0)]
    fn decrement_clamps_at_zero_and_logs_requested_amount(
        #[case] start: u64,
        #[case] amount: u64,
        #[case] expected: u64,
    ) {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a").count(start));

        assert!(store.decrement(&id, amount));

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.count, expected);
        assert_eq!(counter.logs[0].increment, -(amount as i64));
        assert_eq!(counter.logs[0].new_value, expected);
    }

    #[test]
    fn clamped_decrement_logs_more_than_was_removed() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.increment(&id, 2);
        store.decrement(&id, 5);

        let counter = store.get(&id).unwrap();
        let applied = counter.logs[0].new_value as i64 - counter.logs[1].new_value as i64;
        assert_eq!(counter.logs[0].increment, -5);
        assert_eq!(applied, -2);
    }

    #[test]
    fn count_never_goes_negative() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        let steps: [(bool, u64); 8] = [
            (true, 3),
            (false, 5),
            (false, 1),
            (true, 7),
            (false, 2),
            (false, 100),
            (true, 1),
            (false, 1),
        ];
        let mut expected: u64 = 0;
        for (up, amount) in steps {
            if up {
                store.increment(&id, amount);
                expected += amount;
            } else {
                store.decrement(&id, amount);
                expected = expected.saturating_sub(amount);
            }
            assert_eq!(store.get(&id).unwrap().count, expected);
        }
        assert_eq!(expected, 0);
    }

    #[test]
    fn increment_then_decrement_scenario() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("Pushups").goal(50));

        store.increment(&id, 10);
        store.decrement(&id, 15);

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.count, 0);
        assert_eq!(counter.logs[0].increment, -15);
        assert_eq!(counter.logs[0].new_value, 0);
        assert_eq!(counter.logs[1].increment, 10);
        assert_eq!(counter.logs[1].new_value, 10);
    }

    #[test]
    fn reset_keeps_history() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.increment(&id, 4);
        store.increment(&id, 3);
        store.start_session(&id);

        assert!(store.reset(&id));

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.count, 0);
        assert_eq!(counter.logs.len(), 3);
        assert_eq!(counter.logs[0].increment, -7);
        assert_eq!(counter.logs[0].new_value, 0);
        assert_eq!(counter.logs[1].new_value, 7);
        assert_eq!(counter.sessions.len(), 1);
        assert!(counter.active_session_id.is_some());
    }

    #[test]
    fn reset_at_zero_still_logs() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.reset(&id);
        let counter = store.get(&id).unwrap();
        assert_eq!(counter.logs.len(), 1);
        assert_eq!(counter.logs[0].increment, 0);
    }

    #[test]
    fn increment_saturates_instead_of_overflowing() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a").count(u64::MAX - 1));
        store.increment(&id, 5);
        let counter = store.get(&id).unwrap();
        assert_eq!(counter.count, u64::MAX);
        assert_eq!(counter.logs[0].increment, 5);
    }

    #[test]
    fn amounts_beyond_i64_are_logged_at_the_limit() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));

        store.increment(&id, u64::MAX);
        store.decrement(&id, u64::MAX);
        store.increment(&id, u64::MAX);
        store.reset(&id);

        let counter = store.get(&id).unwrap();
        let deltas: Vec<i64> = counter.logs.iter().map(|l| l.increment).collect();
        assert_eq!(deltas, vec![-i64::MAX, i64::MAX, -i64::MAX, i64::MAX]);
        assert_eq!(counter.logs[1].new_value, u64::MAX);
        assert_eq!(counter.count, 0);
    }

    #[test]
    fn log_is_capped_to_most_recent_entries() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        for _ in 0..1_005 {
            clock.advance(1);
            store.increment(&id, 1);
        }

        let counter = store.get(&id).unwrap();
        assert_eq!(counter.count, 1_005);
        assert_eq!(counter.logs.len(), 1_000);
        assert_eq!(counter.logs[0].new_value, 1_005);
        assert_eq!(counter.logs[999].new_value, 6);
        assert!(
            counter
                .logs
                .windows(2)
                .all(|pair| pair[0].timestamp > pair[1].timestamp)
        );
    }

    #[test]
    fn log_cap_is_configurable() {
        let clock = ManualClock::new(T0);
        let settings = StoreSettings {
            log_cap: 3,
            ..StoreSettings::default()
        };
        let mut store = CounterStore::with_clock(MemorySlot::default(), &clock, settings);
        let id = store.create(NewCounter::named("a"));
        for amount in 1..=5 {
            store.increment(&id, amount);
        }
        store.reset(&id);

        let counter = store.get(&id).unwrap();
        let deltas: Vec<i64> = counter.logs.iter().map(|l| l.increment).collect();
        assert_eq!(deltas, vec![-15, 5, 4]);
    }

    #[test]
    fn update_cannot_touch_the_count() {
        let clock = ManualClock::new(T0);
        let mut store = store(&clock);
        let id = store.create(NewCounter::named("a"));
        store.increment(&id, 3);
        store.update(&id, CounterPatch::default().name("b").archived(true));
        let counter = store.get(&id).unwrap();
        assert_eq!(counter.count, 3);
        assert_eq!(counter.logs.len(), 1);
    }
}

//! Read-only aggregates over a collection, for dashboards and history views.
use chrono::{Days, NaiveDate, TimeZone};

use crate::types::{Counter, LogEntry, Millis};

const DAY_MILLIS: Millis = 24 * 60 * 60 * 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Sum of all current counts.
    pub total_count: u64,
    /// Sum of positive increments since local midnight.
    pub counted_today: u64,
    pub active_counters: usize,
    pub goals_met: usize,
}

/// A log entry together with the counter it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryItem<'a> {
    pub counter_id: &'a str,
    pub counter_name: &'a str,
    pub entry: &'a LogEntry,
}

pub fn summary<Tz: TimeZone>(counters: &[Counter], now: Millis, tz: &Tz) -> Summary {
    let today = local_date(now, tz);
    let counted_today: u64 = counters
        .iter()
        .flat_map(|c| &c.logs)
        .filter(|log| log.increment > 0 && local_date(log.timestamp, tz) == today)
        .map(|log| log.increment as u64)
        .fold(0, u64::saturating_add);

    Summary {
        total_count: counters.iter().map(|c| c.count).fold(0, u64::saturating_add),
        counted_today,
        active_counters: counters.iter().filter(|c| !c.is_archived).count(),
        goals_met: counters.iter().filter(|c| c.goal_met()).count(),
    }
}

/// Positive increments per local calendar day for the `days` days ending
/// today, oldest first. Days without activity are included with zero.
pub fn daily_totals<Tz: TimeZone>(
    counters: &[Counter],
    now: Millis,
    tz: &Tz,
    days: u64,
) -> Vec<(NaiveDate, u64)> {
    let Some(today) = local_date(now, tz) else {
        return Vec::new();
    };
    let mut totals: Vec<(NaiveDate, u64)> = (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|day| (day, 0))
        .collect();

    for log in counters.iter().flat_map(|c| &c.logs) {
        if log.increment <= 0 {
            continue;
        }
        let Some(day) = local_date(log.timestamp, tz) else {
            continue;
        };
        if let Some((_, total)) = totals.iter_mut().find(|(d, _)| *d == day) {
            *total = total.saturating_add(log.increment as u64);
        }
    }
    totals
}

/// Number of positive log entries in the 24 hours before `now`.
pub fn velocity_24h(counters: &[Counter], now: Millis) -> usize {
    let since = now.saturating_sub(DAY_MILLIS);
    counters
        .iter()
        .flat_map(|c| &c.logs)
        .filter(|log| log.increment > 0 && log.timestamp > since)
        .count()
}

/// Percent of the goal reached, capped at 100.
pub fn goal_progress(counter: &Counter) -> Option<f64> {
    let goal = counter.goal.filter(|goal| *goal > 0)?;
    Some((counter.count as f64 / goal as f64 * 100.0).min(100.0))
}

/// The `limit` highest counts, ties in collection order.
pub fn top_counters(counters: &[Counter], limit: usize) -> Vec<&Counter> {
    let mut ranked: Vec<&Counter> = counters.iter().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// Every log entry across all counters, newest first.
pub fn history(counters: &[Counter]) -> Vec<HistoryItem<'_>> {
    let mut items: Vec<HistoryItem<'_>> = counters
        .iter()
        .flat_map(|c| {
            c.logs.iter().map(move |entry| HistoryItem {
                counter_id: &c.id,
                counter_name: &c.name,
                entry,
            })
        })
        .collect();
    items.sort_by(|a, b| b.entry.timestamp.cmp(&a.entry.timestamp));
    items
}

fn local_date<Tz: TimeZone>(millis: Millis, tz: &Tz) -> Option<NaiveDate> {
    tz.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.date_naive())
}

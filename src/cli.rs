/// CLI argument parsing and command handling.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};

use crate::clock::Clock;
use crate::db::SlotStorage;
use crate::store::{CounterStore, SessionEnd, backup_file_name};
use crate::types::{Counter, CounterId, CounterPatch, CounterQuery, Millis, NewCounter};
use crate::{color, stats};

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Tally - Count anything, keep the history"
)]
pub struct Cli {
    /// Database file to use instead of the configured one.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create a counter.
    New {
        name: Option<String>,
        #[arg(short = 'g', long = "goal")]
        goal: Option<u64>,
        #[arg(short = 'c', long = "color")]
        color: Option<String>,
        #[arg(short = 'i', long = "icon")]
        icon: Option<String>,
        #[arg(short = 'k', long = "category")]
        category: Option<String>,
        #[arg(long = "count")]
        count: Option<u64>,
    },
    /// List counters. Archived ones are hidden unless asked for.
    List {
        #[arg(short = 'k', long = "category")]
        category: Option<String>,
        #[arg(short = 'a', long = "all", conflicts_with = "archived")]
        all: bool,
        #[arg(long = "archived")]
        archived: bool,
    },
    Show {
        counter: String,
    },
    Inc {
        counter: String,
        #[arg(default_value_t = 1)]
        amount: u64,
    },
    Dec {
        counter: String,
        #[arg(default_value_t = 1)]
        amount: u64,
    },
    Reset {
        counter: String,
    },
    /// Change a counter's name, goal or display fields.
    Edit {
        counter: String,
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
        #[arg(short = 'g', long = "goal", conflicts_with = "no_goal")]
        goal: Option<u64>,
        #[arg(long = "no-goal")]
        no_goal: bool,
        #[arg(short = 'c', long = "color")]
        color: Option<String>,
        #[arg(short = 'i', long = "icon")]
        icon: Option<String>,
        #[arg(short = 'k', long = "category")]
        category: Option<String>,
        #[arg(long = "order")]
        order: Option<usize>,
    },
    Archive {
        counter: String,
    },
    Unarchive {
        counter: String,
    },
    Delete {
        counter: String,
    },
    /// Start a timed session.
    Start {
        counter: String,
    },
    /// End the running session.
    Stop {
        counter: String,
        #[arg(short = 'n', long = "note")]
        note: Option<String>,
    },
    /// Recent log entries, across all counters or for one.
    History {
        counter: Option<String>,
        #[arg(short = 'l', long = "limit", default_value_t = 20)]
        limit: usize,
    },
    Stats {
        #[arg(short = 'd', long = "days", default_value_t = 7)]
        days: u64,
    },
    /// Write every counter to a JSON backup file.
    Export {
        path: Option<PathBuf>,
    },
    /// Replace every counter with the contents of a JSON backup file.
    Import {
        path: PathBuf,
    },
    /// Delete every counter and its history.
    Clear {
        #[arg(long = "yes")]
        yes: bool,
    },
}

/// How a user-supplied counter reference matched.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup {
    Found(CounterId),
    Missing,
    Ambiguous(usize),
}

/// Resolves a reference by exact id, then exact name ignoring case, then id
/// prefix.
pub fn lookup(counters: &[Counter], key: &str) -> Lookup {
    if let Some(counter) = counters.iter().find(|c| c.id == key) {
        return Lookup::Found(counter.id.clone());
    }
    let by_name: Vec<&Counter> = counters
        .iter()
        .filter(|c| c.name.eq_ignore_ascii_case(key))
        .collect();
    let candidates = if by_name.is_empty() && !key.is_empty() {
        counters.iter().filter(|c| c.id.starts_with(key)).collect()
    } else {
        by_name
    };
    match candidates.as_slice() {
        [] => Lookup::Missing,
        [only] => Lookup::Found(only.id.clone()),
        many => Lookup::Ambiguous(many.len()),
    }
}

/// Execute a CLI command against the store.
pub fn run<S: SlotStorage, C: Clock>(
    command: Command,
    store: &mut CounterStore<S, C>,
) -> Result<()> {
    match command {
        Command::New {
            name,
            goal,
            color,
            icon,
            category,
            count,
        } => handle_new(store, name, goal, color, icon, category, count)?,
        Command::List {
            category,
            all,
            archived,
        } => handle_list(store, category, all, archived),
        Command::Show { counter } => {
            if let Some(id) = resolve(store, &counter) {
                handle_show(store, &id);
            }
        }
        Command::Inc { counter, amount } => {
            if let Some(id) = resolve(store, &counter) {
                store.increment(&id, amount);
                print_count(store, &id);
            }
        }
        Command::Dec { counter, amount } => {
            if let Some(id) = resolve(store, &counter) {
                store.decrement(&id, amount);
                print_count(store, &id);
            }
        }
        Command::Reset { counter } => {
            if let Some(id) = resolve(store, &counter) {
                store.reset(&id);
                print_count(store, &id);
            }
        }
        Command::Edit {
            counter,
            name,
            goal,
            no_goal,
            color,
            icon,
            category,
            order,
        } => {
            if let Some(id) = resolve(store, &counter) {
                if color.as_deref().is_some_and(|c| !color::is_valid_hex(c)) {
                    println!("Invalid color format. Please provide a hex code like #RRGGBB.");
                    return Ok(());
                }
                let patch = CounterPatch {
                    name,
                    goal: if no_goal { Some(None) } else { goal.map(Some) },
                    color,
                    icon,
                    category,
                    is_archived: None,
                    order,
                };
                if patch.is_empty() {
                    println!("Nothing to change.");
                    return Ok(());
                }
                store.update(&id, patch);
                handle_show(store, &id);
            }
        }
        Command::Archive { counter } => {
            if let Some(id) = resolve(store, &counter) {
                store.set_archived(&id, true);
                println!("Archived '{}'.", name_of(store, &id));
            }
        }
        Command::Unarchive { counter } => {
            if let Some(id) = resolve(store, &counter) {
                store.set_archived(&id, false);
                println!("Restored '{}'.", name_of(store, &id));
            }
        }
        Command::Delete { counter } => {
            if let Some(id) = resolve(store, &counter) {
                let name = name_of(store, &id);
                store.delete(&id);
                println!("Deleted '{name}'.");
            }
        }
        Command::Start { counter } => {
            if let Some(id) = resolve(store, &counter) {
                if store.start_session(&id) {
                    println!("Session started for '{}'.", name_of(store, &id));
                } else {
                    println!("'{}' already has a running session.", name_of(store, &id));
                }
            }
        }
        Command::Stop { counter, note } => {
            if let Some(id) = resolve(store, &counter) {
                handle_stop(store, &id, note);
            }
        }
        Command::History { counter, limit } => handle_history(store, counter, limit),
        Command::Stats { days } => handle_stats(store, days),
        Command::Export { path } => handle_export(store, path)?,
        Command::Import { path } => handle_import(store, &path)?,
        Command::Clear { yes } => {
            if !yes {
                println!(
                    "This deletes all {} counters and their history. Re-run with --yes to confirm.",
                    store.counters().len()
                );
                return Ok(());
            }
            store.clear_all();
            println!("All counters deleted.");
        }
    }
    Ok(())
}

fn resolve<S: SlotStorage, C: Clock>(store: &CounterStore<S, C>, key: &str) -> Option<CounterId> {
    match lookup(store.counters(), key) {
        Lookup::Found(id) => Some(id),
        Lookup::Missing => {
            println!("Counter '{key}' not found");
            None
        }
        Lookup::Ambiguous(matches) => {
            println!("'{key}' matches {matches} counters, use the id instead");
            None
        }
    }
}

fn handle_new<S: SlotStorage, C: Clock>(
    store: &mut CounterStore<S, C>,
    name: Option<String>,
    goal: Option<u64>,
    color: Option<String>,
    icon: Option<String>,
    category: Option<String>,
    count: Option<u64>,
) -> Result<()> {
    let color = match color {
        Some(c) if !color::is_valid_hex(&c) => {
            println!("Invalid color format. Please provide a hex code like #RRGGBB.");
            return Ok(());
        }
        Some(c) => c,
        None => color::random_color(),
    };
    let id = store.create(NewCounter {
        name,
        count,
        goal,
        color: Some(color),
        icon,
        category,
    });
    let counter = store
        .get(&id)
        .context("Counter vanished right after creation")?;
    println!("Created '{}' ({})", counter.name, short_id(&counter.id));
    Ok(())
}

fn handle_list<S: SlotStorage, C: Clock>(
    store: &CounterStore<S, C>,
    category: Option<String>,
    all: bool,
    archived: bool,
) {
    let query = match (category, all, archived) {
        (_, _, true) => CounterQuery::Archived,
        (_, true, _) => CounterQuery::All,
        (Some(category), _, _) => CounterQuery::ByCategory(category),
        (None, _, _) => CounterQuery::Active,
    };
    let counters = store.query(&query);
    if counters.is_empty() {
        println!("No counters.");
        return;
    }
    for counter in counters {
        let goal = match (counter.goal, stats::goal_progress(counter)) {
            (Some(goal), Some(progress)) => format!(" / {goal} ({progress:.0}%)"),
            _ => String::new(),
        };
        let running = if counter.active_session_id.is_some() {
            " [running]"
        } else {
            ""
        };
        println!(
            "{}  {}  {:>6}{goal}  {}{running}",
            short_id(&counter.id),
            clamp_name(&counter.name, 24),
            counter.count,
            counter.category,
        );
    }
}

fn handle_show<S: SlotStorage, C: Clock>(store: &CounterStore<S, C>, id: &str) {
    let Some(counter) = store.get(id) else {
        return;
    };
    println!("{} ({})", counter.name, counter.id);
    println!("  Count:     {}", counter.count);
    if let Some(goal) = counter.goal {
        let progress = stats::goal_progress(counter).unwrap_or(0.0);
        println!("  Goal:      {goal} ({progress:.0}%)");
    }
    println!("  Category:  {}", counter.category);
    println!("  Color:     {}", counter.color);
    println!("  Icon:      {}", counter.icon);
    println!("  Created:   {}", format_timestamp(counter.created_at));
    if counter.is_archived {
        println!("  Archived");
    }
    if let Some(session) = counter.active_session() {
        let elapsed = store.now().saturating_sub(session.start_time) / 1000;
        println!(
            "  Running:   {} since {} (+{})",
            format_duration(elapsed),
            format_timestamp(session.start_time),
            counter.count.saturating_sub(session.start_value),
        );
    }
    println!("  Logs:      {}", counter.logs.len());
    println!("  Sessions:  {}", counter.sessions.len());
}

fn handle_stop<S: SlotStorage, C: Clock>(
    store: &mut CounterStore<S, C>,
    id: &str,
    note: Option<String>,
) {
    match store.end_session(id) {
        None => println!("'{}' has no running session.", name_of(store, id)),
        Some(SessionEnd::Discarded(session)) => println!(
            "Session discarded after {} (shorter than the configured minimum).",
            format_duration(session.duration.unwrap_or(0) as i64)
        ),
        Some(SessionEnd::Recorded(session)) => {
            if note.is_some() {
                store.set_session_notes(id, &session.id, note);
            }
            println!(
                "Session ended after {}: {} -> {} ({:+})",
                format_duration(session.duration.unwrap_or(0) as i64),
                session.start_value,
                session.end_value.unwrap_or(session.start_value),
                session.delta().unwrap_or(0),
            );
        }
    }
}

fn handle_history<S: SlotStorage, C: Clock>(
    store: &CounterStore<S, C>,
    counter: Option<String>,
    limit: usize,
) {
    let scope: Vec<Counter> = match counter {
        Some(key) => {
            let Some(id) = resolve(store, &key) else {
                return;
            };
            store.counters().iter().filter(|c| c.id == id).cloned().collect()
        }
        None => store.counters().to_vec(),
    };
    let items = stats::history(&scope);
    if items.is_empty() {
        println!("No history yet.");
        return;
    }
    for item in items.into_iter().take(limit) {
        println!(
            "{}  {}  {:+}  -> {}",
            format_timestamp(item.entry.timestamp),
            clamp_name(item.counter_name, 24),
            item.entry.increment,
            item.entry.new_value,
        );
    }
}

fn handle_stats<S: SlotStorage, C: Clock>(store: &CounterStore<S, C>, days: u64) {
    let now = store.now();
    let counters = store.counters();
    let summary = stats::summary(counters, now, &Local);
    println!("Total count:     {}", summary.total_count);
    println!("Counted today:   {}", summary.counted_today);
    println!("Last 24 hours:   {} increments", stats::velocity_24h(counters, now));
    println!("Active counters: {}", summary.active_counters);
    println!("Goals met:       {}", summary.goals_met);

    println!();
    for (day, total) in stats::daily_totals(counters, now, &Local, days) {
        println!("{}  {total}", day.format("%a %Y-%m-%d"));
    }

    let top = stats::top_counters(counters, 3);
    if !top.is_empty() {
        println!();
        for counter in top {
            println!("{}  {}", clamp_name(&counter.name, 24), counter.count);
        }
    }
}

fn handle_export<S: SlotStorage, C: Clock>(
    store: &CounterStore<S, C>,
    path: Option<PathBuf>,
) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(backup_file_name(store.now())));
    let payload = store.export_data().context("Failed to serialize counters")?;
    std::fs::write(&path, payload)
        .with_context(|| format!("Failed to write backup to {}", path.display()))?;
    println!(
        "Exported {} counters to {}",
        store.counters().len(),
        path.display()
    );
    Ok(())
}

fn handle_import<S: SlotStorage, C: Clock>(
    store: &mut CounterStore<S, C>,
    path: &Path,
) -> Result<()> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup from {}", path.display()))?;
    match store.try_import(&payload) {
        Ok(imported) => println!("Imported {imported} counters from {}", path.display()),
        Err(err) => println!("Import failed, nothing was changed: {err}"),
    }
    Ok(())
}

fn print_count<S: SlotStorage, C: Clock>(store: &CounterStore<S, C>, id: &str) {
    if let Some(counter) = store.get(id) {
        match counter.goal {
            Some(goal) => println!("{}: {} / {goal}", counter.name, counter.count),
            None => println!("{}: {}", counter.name, counter.count),
        }
    }
}

fn name_of<S: SlotStorage, C: Clock>(store: &CounterStore<S, C>, id: &str) -> String {
    store
        .get(id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_timestamp(millis: Millis) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn clamp_name(value: &str, width: usize) -> String {
    let value_len = value.chars().count();
    if value_len <= width {
        return format!("{value:<width$}", width = width);
    }
    let trimmed = value
        .chars()
        .take(width.saturating_sub(2))
        .collect::<String>();
    format!("{trimmed}..")
}

//! Weekly mode scheduler.
//!
//! Entries mark points in the week at which the global run and DHW
//! modes change. The active entry at any instant is the most recent one
//! at or before the current time of week, wrapping around to the last
//! entry of the previous week. `tick` fires once per transition.

use chrono::{Datelike, NaiveDateTime, Timelike};
use hp_config::ScheduleEntryDef;
use hp_core::RunMode;

const WEEK_MINUTES: u32 = 7 * 24 * 60;

#[derive(Clone, Copy, Debug)]
struct Entry {
    /// Minute of the week, counted from Sunday 00:00.
    tow: u32,
    runmode: Option<RunMode>,
    dhwmode: Option<RunMode>,
    legionella: bool,
}

/// What a newly activated entry asks the runtime to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleChange {
    pub runmode: Option<RunMode>,
    pub dhwmode: Option<RunMode>,
    /// Request an anti-legionella charge on every configured tank.
    pub legionella: bool,
}

pub struct Scheduler {
    entries: Vec<Entry>,
    active: Option<usize>,
}

impl Scheduler {
    pub fn from_config(entries: &[ScheduleEntryDef]) -> Self {
        let mut entries: Vec<Entry> = entries
            .iter()
            .map(|e| Entry {
                tow: u32::from(e.weekday) * 24 * 60 + u32::from(e.hour) * 60 + u32::from(e.minute),
                runmode: e.runmode,
                dhwmode: e.dhwmode,
                legionella: e.legionella,
            })
            .collect();
        entries.sort_by_key(|e| e.tow);
        Self {
            entries,
            active: None,
        }
    }

    /// The entry index active at the given minute of the week.
    fn active_at(&self, tow: u32) -> Option<usize> {
        debug_assert!(tow < WEEK_MINUTES);
        if self.entries.is_empty() {
            return None;
        }
        match self.entries.iter().rposition(|e| e.tow <= tow) {
            Some(index) => Some(index),
            // Before the first entry of the week: the last entry of the
            // previous week still applies.
            None => Some(self.entries.len() - 1),
        }
    }

    /// Returns the schedule change when a new entry becomes active.
    pub fn tick(&mut self, now: NaiveDateTime) -> Option<ScheduleChange> {
        let tow =
            now.weekday().num_days_from_sunday() * 24 * 60 + now.hour() * 60 + now.minute();
        let active = self.active_at(tow)?;
        if self.active == Some(active) {
            return None;
        }
        self.active = Some(active);
        let entry = self.entries[active];
        tracing::info!(
            runmode = ?entry.runmode,
            dhwmode = ?entry.dhwmode,
            legionella = entry.legionella,
            "schedule entry activated"
        );
        Some(ScheduleChange {
            runmode: entry.runmode,
            dhwmode: entry.dhwmode,
            legionella: entry.legionella,
        })
    }
}

// THEORY:
// The dispatcher answers "what should the panel show right now?" for the generic
// dashboard endpoint. Two rules, in order:
// 1.  **Priority window**: during a fixed clock-time window (by default the morning
//     commute, 07:15 to 07:40) the priority slot always wins.
// 2.  **Rotation**: otherwise the slots in the rotation list are served round-robin.
//     Every non-priority dispatch advances the rotation by exactly one step, whether
//     or not the caller manages to serve the slot.
//
// The rotation index is the only shared mutable state; it lives behind a `Mutex`
// held just long to read and bump the index.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::core_modules::slot::Slot;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A clock time with minute resolution, stored as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Panics (at compile time, in const context) for an invalid hour or minute.
    pub const fn new(hour: u8, minute: u8) -> Self {
        assert!(hour < 24, "hour out of range");
        assert!(minute < 60, "minute out of range");
        Self(hour as u16 * 60 + minute as u16)
    }

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    /// The time of day of any chrono time value, seconds dropped.
    pub fn of<T: Timelike>(time: &T) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u8 {
        (self.0 / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.0 % 60) as u8
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid clock time `{0}` (expected HH:MM)")]
pub struct ClockParseError(pub String);

impl FromStr for TimeOfDay {
    type Err = ClockParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClockParseError(s.to_string());
        let (hour, minute) = s.split_once(':').ok_or_else(err)?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(err());
        }
        let hour: u8 = hour.parse().map_err(|_| err())?;
        let minute: u8 = minute.parse().map_err(|_| err())?;
        if hour >= 24 || minute >= 60 {
            return Err(err());
        }
        Ok(Self::new(hour, minute))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ClockParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Half-open clock window `[from, to)`. Wraparound past midnight is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: TimeOfDay,
    pub to: TimeOfDay,
}

impl TimeWindow {
    pub const fn new(from: TimeOfDay, to: TimeOfDay) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, now: TimeOfDay) -> bool {
        now >= self.from && now < self.to
    }

    pub fn is_valid(&self) -> bool {
        self.from < self.to
    }
}

pub const DEFAULT_PRIORITY_WINDOW: TimeWindow =
    TimeWindow::new(TimeOfDay::new(7, 15), TimeOfDay::new(7, 40));

/// Dispatch settings, as found in the `[dispatch]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub priority_from: TimeOfDay,
    pub priority_to: TimeOfDay,
    pub priority_slot: Slot,
    pub rotation: Vec<Slot>,
}

impl DispatchConfig {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.priority_from, self.priority_to)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            priority_from: DEFAULT_PRIORITY_WINDOW.from,
            priority_to: DEFAULT_PRIORITY_WINDOW.to,
            priority_slot: Slot::Transport,
            rotation: vec![Slot::Weather, Slot::Quote, Slot::Stocks, Slot::Calendar],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("rotation must contain at least one slot")]
    EmptyRotation,

    #[error("priority window {from}..{to} is empty or wraps past midnight")]
    InvalidWindow { from: TimeOfDay, to: TimeOfDay },
}

#[derive(Debug)]
pub struct Dispatcher {
    window: TimeWindow,
    priority_slot: Slot,
    rotation: Vec<Slot>,
    next: Mutex<usize>,
}

impl Dispatcher {
    pub fn new(config: &DispatchConfig) -> Result<Self, DispatchError> {
        let window = config.window();
        if !window.is_valid() {
            return Err(DispatchError::InvalidWindow {
                from: window.from,
                to: window.to,
            });
        }
        if config.rotation.is_empty() {
            return Err(DispatchError::EmptyRotation);
        }

        Ok(Self {
            window,
            priority_slot: config.priority_slot,
            rotation: config.rotation.clone(),
            next: Mutex::new(0),
        })
    }

    /// Resolves the slot to serve at `now`, advancing the rotation unless the
    /// priority window applies.
    pub fn dispatch(&self, now: TimeOfDay) -> Slot {
        if self.window.contains(now) {
            return self.priority_slot;
        }

        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = self.rotation[*next];
        *next = (*next + 1) % self.rotation.len();
        slot
    }

    /// Index of the slot the next rotating dispatch will return.
    pub fn rotation_index(&self) -> usize {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn rotation(&self) -> &[Slot] {
        &self.rotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(&DispatchConfig::default()).expect("default config is valid")
    }

    #[test]
    fn clock_strings_parse_and_print() {
        assert_eq!("07:15".parse::<TimeOfDay>(), Ok(TimeOfDay::new(7, 15)));
        assert_eq!(TimeOfDay::new(7, 5).to_string(), "07:05");
        assert_eq!(TimeOfDay::new(23, 59).minutes(), 1439);
        for bad in ["7:15", "24:00", "07:60", "0715", "ab:cd", ""] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn from_minutes_rejects_out_of_day_values() {
        assert_eq!(TimeOfDay::from_minutes(435), Some(TimeOfDay::new(7, 15)));
        assert_eq!(TimeOfDay::from_minutes(1440), None);
    }

    #[test]
    fn chrono_times_convert_to_minutes() {
        let t = chrono::NaiveTime::from_hms_opt(7, 39, 59).expect("valid time");
        assert_eq!(TimeOfDay::of(&t), TimeOfDay::new(7, 39));
    }

    #[test]
    fn window_is_half_open() {
        let w = DEFAULT_PRIORITY_WINDOW;
        assert!(!w.contains(TimeOfDay::new(7, 14)));
        assert!(w.contains(TimeOfDay::new(7, 15)));
        assert!(w.contains(TimeOfDay::new(7, 39)));
        assert!(!w.contains(TimeOfDay::new(7, 40)));
    }

    #[test]
    fn priority_window_always_wins_and_leaves_rotation_alone() {
        let d = dispatcher();
        d.dispatch(TimeOfDay::new(12, 0));
        let before = d.rotation_index();
        for minute in 15..40 {
            assert_eq!(d.dispatch(TimeOfDay::new(7, minute)), Slot::Transport);
        }
        assert_eq!(d.rotation_index(), before);
    }

    #[test]
    fn rotation_advances_one_step_per_call() {
        let d = dispatcher();
        let served: Vec<Slot> = (0..6).map(|_| d.dispatch(TimeOfDay::new(18, 30))).collect();
        assert_eq!(
            served,
            vec![
                Slot::Weather,
                Slot::Quote,
                Slot::Stocks,
                Slot::Calendar,
                Slot::Weather,
                Slot::Quote,
            ]
        );
        assert_eq!(d.rotation_index(), 2);
    }

    #[test]
    fn concurrent_dispatches_never_lose_updates() {
        let d = Arc::new(dispatcher());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = Arc::clone(&d);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| d.dispatch(TimeOfDay::new(9, 0)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<Slot, usize> = HashMap::new();
        for handle in handles {
            for slot in handle.join().expect("dispatch thread") {
                *counts.entry(slot).or_default() += 1;
            }
        }
        // 800 calls over a rotation of 4: every slot served exactly 200 times.
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&n| n == 200));
        assert_eq!(d.rotation_index(), 0);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let empty = DispatchConfig {
            rotation: Vec::new(),
            ..DispatchConfig::default()
        };
        assert_eq!(Dispatcher::new(&empty).err(), Some(DispatchError::EmptyRotation));

        let reversed = DispatchConfig {
            priority_from: TimeOfDay::new(22, 0),
            priority_to: TimeOfDay::new(6, 0),
            ..DispatchConfig::default()
        };
        assert!(matches!(
            Dispatcher::new(&reversed),
            Err(DispatchError::InvalidWindow { .. })
        ));
    }
}

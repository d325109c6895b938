// THEORY:
// A `Slot` names one kind of dashboard content. The set is closed and small, so it is
// an enum rather than a string key: the cache can hold one lock per slot in a fixed
// array, and the dispatcher can only ever resolve to something the cache knows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Transport,
    Weather,
    Quote,
    Photo,
    Stocks,
    Calendar,
}

impl Slot {
    pub const COUNT: usize = 6;

    pub const ALL: [Slot; Slot::COUNT] = [
        Slot::Transport,
        Slot::Weather,
        Slot::Quote,
        Slot::Photo,
        Slot::Stocks,
        Slot::Calendar,
    ];

    /// Position of the slot in `Slot::ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Transport => "transport",
            Slot::Weather => "weather",
            Slot::Quote => "quote",
            Slot::Photo => "photo",
            Slot::Stocks => "stocks",
            Slot::Calendar => "calendar",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown slot `{0}`")]
pub struct UnknownSlot(pub String);

impl FromStr for Slot {
    type Err = UnknownSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| UnknownSlot(s.to_string()))
    }
}

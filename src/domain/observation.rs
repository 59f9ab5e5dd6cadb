use serde::{Deserialize, Serialize};

use super::types::{OBS_SLOTS, REPORTED_SLOTS};

/// The prices a user has reported so far this week. Slot 0 is the buy
/// price, slots 1..=13 are half-days (Mon AM = 1 .. Sat PM = 12, 13
/// reserved). Absent means "not reported yet". Treated as an immutable
/// value for the duration of a prediction call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationVector {
    slots: [Option<u32>; OBS_SLOTS],
}

impl ObservationVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.slots.get(index).copied().flatten()
    }

    /// Slot 0, if reported.
    pub fn buy_price(&self) -> Option<u32> {
        self.slots[0]
    }

    pub fn set(&mut self, index: usize, price: u32) {
        if index < OBS_SLOTS {
            self.slots[index] = Some(price);
        }
    }

    pub fn with_slot(mut self, index: usize, price: u32) -> Self {
        self.set(index, price);
        self
    }

    /// Copy with one slot cleared. Used by the relaxation fallback.
    pub fn without_slot(&self, index: usize) -> Self {
        let mut copy = self.clone();
        if index < OBS_SLOTS {
            copy.slots[index] = None;
        }
        copy
    }

    /// Lowest slot index with a reported value.
    pub fn earliest_observed(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_some())
    }

    /// First half-day slot (index >= 1) with no reported value.
    /// Slot 13 is reserved and never reported, so this always exists.
    pub fn first_unobserved(&self) -> usize {
        (1..OBS_SLOTS)
            .find(|&i| self.slots[i].is_none())
            .unwrap_or(OBS_SLOTS - 1)
    }

    pub fn observed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.observed_count() == 0
    }

    /// Raw slot values, for serialization by collaborators.
    pub fn slots(&self) -> &[Option<u32>; OBS_SLOTS] {
        &self.slots
    }
}

impl std::str::FromStr for ObservationVector {
    type Err = String;

    /// Parse a comma-separated vector, e.g. "90,,,140". Empty or "-"
    /// cells are unknown, trailing cells may be omitted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut obs = ObservationVector::new();
        for (i, cell) in s.split(',').enumerate() {
            if i >= OBS_SLOTS {
                return Err(format!("too many slots (max {})", OBS_SLOTS));
            }
            let cell = cell.trim();
            if cell.is_empty() || cell == "-" {
                continue;
            }
            let price: u32 = cell
                .parse()
                .map_err(|_| format!("slot {}: invalid price '{}'", i, cell))?;
            obs.set(i, price);
        }
        Ok(obs)
    }
}

impl std::fmt::Display for ObservationVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cells: Vec<String> = self
            .slots
            .iter()
            .map(|s| s.map(|v| v.to_string()).unwrap_or_default())
            .collect();
        write!(f, "{}", cells.join(","))
    }
}

/// Observation slot index for a weekday (1 = Monday .. 6 = Saturday)
/// and half of day. Matches the (day-1)*2 + am|pm addressing used by
/// the reporting front end.
pub fn slot_for(day: u8, am: bool) -> Result<usize, String> {
    if !(1..=6).contains(&day) {
        return Err(format!("day must be 1-6, got {}", day));
    }
    Ok((day as usize - 1) * 2 + if am { 1 } else { 2 })
}

/// Human label for a half-day slot ("Mon AM" .. "Sat PM").
pub fn slot_label(slot: usize) -> String {
    const DAYS: [&str; 6] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    if slot == 0 {
        return "Buy".to_string();
    }
    if slot > REPORTED_SLOTS {
        return format!("Slot {}", slot);
    }
    let day = DAYS[(slot - 1) / 2];
    let half = if slot % 2 == 1 { "AM" } else { "PM" };
    format!("{} {}", day, half)
}

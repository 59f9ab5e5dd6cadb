use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::{ObservationVector, OBS_SLOTS};

/// One user's observation vector for one week.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWeek {
    pub user_id: String,
    pub week_start: NaiveDate,
    pub observations: ObservationVector,
}

/// Monday of the week containing `today`. Prices reset weekly.
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.weekday().num_days_from_monday() as i64)
}

/// CSV file backing the store.
pub fn store_path(data_dir: &str) -> String {
    format!("{}/observations.csv", data_dir)
}

fn header() -> Vec<String> {
    let mut cols = vec!["user_id".to_string(), "week_start".to_string()];
    for i in 0..OBS_SLOTS {
        cols.push(format!("slot{}", i));
    }
    cols
}

/// Load every stored week. Missing file means an empty store.
pub fn load_all(data_dir: &str) -> Result<Vec<StoredWeek>, Box<dyn std::error::Error>> {
    let path = store_path(data_dir);
    if !Path::new(&path).exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(&path)?;
    let mut weeks = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() < 2 + OBS_SLOTS {
            return Err(format!("store {}: malformed row", path).into());
        }
        let mut observations = ObservationVector::new();
        for i in 0..OBS_SLOTS {
            let cell = record[2 + i].trim();
            if !cell.is_empty() {
                observations.set(i, cell.parse()?);
            }
        }
        weeks.push(StoredWeek {
            user_id: record[0].to_string(),
            week_start: record[1].parse()?,
            observations,
        });
    }
    Ok(weeks)
}

fn save_all(data_dir: &str, weeks: &[StoredWeek]) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let mut writer = csv::Writer::from_path(store_path(data_dir))?;
    writer.write_record(&header())?;
    for week in weeks {
        let mut row = vec![week.user_id.clone(), week.week_start.to_string()];
        for slot in week.observations.slots() {
            row.push(slot.map(|v| v.to_string()).unwrap_or_default());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// The user's current-week vector, or None if nothing recorded yet.
/// A row from a previous week is treated as absent (stale data never
/// leaks into a new cycle).
pub fn load_week(
    data_dir: &str,
    user_id: &str,
    today: NaiveDate,
) -> Result<Option<ObservationVector>, Box<dyn std::error::Error>> {
    let current = week_start(today);
    Ok(load_all(data_dir)?
        .into_iter()
        .find(|w| w.user_id == user_id && w.week_start == current)
        .map(|w| w.observations))
}

/// Record one price for the user's current week, creating or resetting
/// the row as needed. Returns the updated vector.
pub fn record_price(
    data_dir: &str,
    user_id: &str,
    slot: usize,
    price: u32,
    today: NaiveDate,
) -> Result<ObservationVector, Box<dyn std::error::Error>> {
    if slot >= OBS_SLOTS {
        return Err(format!("slot {} out of range (max {})", slot, OBS_SLOTS - 1).into());
    }
    let current = week_start(today);
    let mut weeks = load_all(data_dir)?;

    match weeks
        .iter_mut()
        .find(|w| w.user_id == user_id)
    {
        Some(week) => {
            if week.week_start != current {
                // New cycle: start over.
                week.week_start = current;
                week.observations = ObservationVector::new();
            }
            week.observations.set(slot, price);
        }
        None => {
            let mut observations = ObservationVector::new();
            observations.set(slot, price);
            weeks.push(StoredWeek {
                user_id: user_id.to_string(),
                week_start: current,
                observations,
            });
        }
    }

    save_all(data_dir, &weeks)?;
    Ok(weeks
        .iter()
        .find(|w| w.user_id == user_id)
        .map(|w| w.observations.clone())
        .unwrap_or_default())
}

/// Drop the user's stored data entirely.
pub fn clear_week(data_dir: &str, user_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut weeks = load_all(data_dir)?;
    weeks.retain(|w| w.user_id != user_id);
    save_all(data_dir, &weeks)
}

//! Demo data for local development.

use crate::server::StoredEvent;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use uuid::Uuid;

const TITLES: &[&str] = &[
    "Team standup",
    "Design review",
    "Lunch with Alex",
    "Sprint planning",
    "1:1 with manager",
    "Dentist appointment",
    "Gym",
    "Yoga class",
];

const DESCRIPTIONS: &[&str] = &[
    "",
    "Bring the latest mockups",
    "Don't be late",
    "Room 4B",
];

/// Generates `count` plausible events spread over the days following
/// `from`, three per day in morning/noon/afternoon slots.
pub fn demo_events(count: usize, from: DateTime<Utc>) -> Vec<StoredEvent> {
    let created = from.to_rfc3339_opts(SecondsFormat::AutoSi, true);
    (0..count)
        .map(|i| {
            let day = (i / 3) as i64;
            let hour = 9 + (i % 3) as i64 * 3;
            let start = from + Duration::days(day) + Duration::hours(hour);
            let end = start + Duration::hours(1);
            StoredEvent {
                id: Uuid::new_v4().to_string(),
                title: TITLES[i % TITLES.len()].to_string(),
                description: DESCRIPTIONS[i % DESCRIPTIONS.len()].to_string(),
                start_date: start.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                end_date: end.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                created: created.clone(),
                modified: created.clone(),
            }
        })
        .collect()
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-boxed calendar entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventInput {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl CalendarEvent {
    /// Times after a move. A lone new start or end shifts the other bound by
    /// the same amount, so the event keeps its length.
    pub fn moved_times(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let length = self.end_time - self.start_time;
        match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, start + length),
            (None, Some(end)) => (end - length, end),
            (None, None) => (self.start_time, self.end_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dentist() -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2026, 5, 12, 9, 0, 0).unwrap();
        CalendarEvent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Dentist".to_string(),
            description: None,
            start_time: start,
            end_time: start + chrono::Duration::hours(1),
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn a_lone_start_keeps_the_length() {
        let new_start = Utc.with_ymd_and_hms(2026, 5, 14, 9, 0, 0).unwrap();
        let (start, end) = dentist().moved_times(Some(new_start), None);
        assert_eq!(start, new_start);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 5, 14, 10, 0, 0).unwrap());
    }

    #[test]
    fn a_lone_end_keeps_the_length() {
        let new_end = Utc.with_ymd_and_hms(2026, 5, 11, 18, 0, 0).unwrap();
        let (start, end) = dentist().moved_times(None, Some(new_end));
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 5, 11, 17, 0, 0).unwrap());
        assert_eq!(end, new_end);
    }

    #[test]
    fn both_bounds_are_taken_as_given() {
        let event = dentist();
        let new_end = event.end_time + chrono::Duration::hours(1);
        assert_eq!(
            event.moved_times(Some(event.start_time), Some(new_end)),
            (event.start_time, new_end)
        );
    }
}

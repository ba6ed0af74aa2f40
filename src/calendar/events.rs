use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::allocation::types::Guests;
use crate::error::{AllocError, Result};

/// One end of an event as calendars export it: either a timestamp or a
/// whole day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEventTime {
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAttendee {
    #[serde(default)]
    pub email: String,
    #[serde(rename = "responseStatus", default)]
    pub response_status: String,
    #[serde(rename = "self", default)]
    pub is_self: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub resource: bool,
}

/// An event exactly as read from a calendar export.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub start: RawEventTime,
    pub end: RawEventTime,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub transparency: String,
    #[serde(default)]
    pub attendees: Vec<RawAttendee>,
}

/// A calendar event, normalised to UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: String,
    /// Opaque events block time; transparent ones do not.
    pub busy: bool,
    /// How the calendar's owner answered the invitation. Empty when the
    /// owner was not invited.
    pub response_status: String,
    /// Required, non-resource attendees keyed by response status.
    pub attendees: BTreeMap<String, Vec<String>>,
}

impl Event {
    pub fn from_raw(raw: RawEvent) -> Result<Self> {
        let start = parse_event_time(&raw.start, NaiveTime::MIN)?;
        let end = parse_event_time(&raw.end, end_of_day())?;
        let response_status = raw
            .attendees
            .iter()
            .find(|a| a.is_self)
            .map(|a| a.response_status.clone())
            .unwrap_or_default();

        let mut attendees: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for attendee in raw.attendees {
            if attendee.optional || attendee.resource {
                continue;
            }
            attendees
                .entry(attendee.response_status)
                .or_default()
                .push(attendee.email);
        }

        Ok(Self {
            start,
            end,
            summary: raw.summary,
            busy: raw.transparency != "transparent",
            response_status,
            attendees,
        })
    }

    /// Touching counts: only events ending before `start` or beginning after
    /// `end` miss.
    pub fn intersects_with(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !(end < self.start || start > self.end)
    }

    pub fn with_status(&self, status: &str) -> &[String] {
        self.attendees.get(status).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn guests(&self) -> Guests {
        Guests {
            accepted: self.with_status("accepted").to_vec(),
            tentative: self.with_status("tentative").to_vec(),
            needs_action: self.with_status("needsAction").to_vec(),
        }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
}

/// Timestamps keep their own offset; a bare date takes `default_time` in UTC.
fn parse_event_time(time: &RawEventTime, default_time: NaiveTime) -> Result<DateTime<Utc>> {
    if let Some(text) = &time.date_time {
        return DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AllocError::InvalidTime(format!("{text}: {e}")));
    }
    if let Some(text) = &time.date {
        let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|e| AllocError::InvalidTime(format!("{text}: {e}")))?;
        return Ok(date.and_time(default_time).and_utc());
    }
    Err(AllocError::InvalidTime("event time has neither dateTime nor date".into()))
}

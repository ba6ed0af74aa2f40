use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::events::{Event, RawEvent};
use crate::allocation::levels::ConflictModel;
use crate::allocation::types::{Availability, ConflictLevel, SlotStart};
use crate::error::Result;
use crate::roster::Person;

const HOLIDAY_PATTERN: &str = r"\b(leave|al|holiday|ooi|out of office)\b";
const PREFERRED_PATTERN: &str = r"\bpreferred\s+interview\s+slot\b";

/// Summary patterns that change how an event counts.
#[derive(Debug, Clone)]
struct SummaryRules {
    holiday: Regex,
    preferred: Regex,
}

impl SummaryRules {
    fn new() -> Result<Self> {
        Ok(Self {
            holiday: Regex::new(HOLIDAY_PATTERN)?,
            preferred: Regex::new(PREFERRED_PATTERN)?,
        })
    }
}

/// One person's (or the appointments') events, earliest first.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    events: Vec<Event>,
}

impl Calendar {
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.start);
        Self { events }
    }

    pub fn from_raw(raw: Vec<RawEvent>) -> Result<Self> {
        let events = raw.into_iter().map(Event::from_raw).collect::<Result<Vec<_>>>()?;
        Ok(Self::new(events))
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn intersecting_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.intersects_with(start, end))
    }

    /// How hard it would be for the owner to attend `[start, end]`.
    fn conflict_level(&self, rules: &SummaryRules, start: DateTime<Utc>, end: DateTime<Utc>) -> Availability {
        let mut max_attendees = 0;
        let mut preferred = false;
        for event in self.intersecting_events(start, end) {
            let summary = event.summary.to_lowercase();
            if rules.preferred.is_match(&summary) {
                preferred = true;
                continue;
            }
            if !event.busy {
                continue;
            }
            if rules.holiday.is_match(&summary) {
                return Availability::Unavailable;
            }
            if event.response_status != "accepted" {
                continue;
            }
            max_attendees = max_attendees.max(event.with_status("accepted").len());
        }

        let level = match (preferred, max_attendees) {
            (true, _) => ConflictLevel::PREFERRED,
            (false, 0) => ConflictLevel::FREE,
            (false, 1) => ConflictLevel::LIGHT,
            (false, 2) => ConflictLevel::CONTENDED,
            (false, _) => ConflictLevel::BUSY,
        };
        Availability::Available(level)
    }
}

/// Calendar exports as read from disk or a request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarData {
    #[serde(default)]
    pub people: HashMap<String, Vec<RawEvent>>,
    #[serde(default)]
    pub bookings: Vec<RawEvent>,
}

/// Everybody's calendars plus the appointments calendar holding interview
/// bookings.
#[derive(Debug, Clone)]
pub struct CalendarSet {
    rules: SummaryRules,
    people: HashMap<String, Calendar>,
    bookings: Calendar,
}

impl CalendarSet {
    pub fn new(people: HashMap<String, Calendar>, bookings: Calendar) -> Result<Self> {
        Ok(Self {
            rules: SummaryRules::new()?,
            people,
            bookings,
        })
    }

    pub fn from_data(data: CalendarData) -> Result<Self> {
        let mut people = HashMap::new();
        for (email, events) in data.people {
            people.insert(email, Calendar::from_raw(events)?);
        }
        let bookings = Calendar::from_raw(data.bookings)?;
        info!(
            calendars = people.len(),
            bookings = bookings.events().len(),
            "Loaded calendars"
        );
        Self::new(people, bookings)
    }

    /// Reads `{"people": {email: [event, ...]}, "bookings": [event, ...]}`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_data(serde_json::from_reader(reader)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn bookings(&self) -> &Calendar {
        &self.bookings
    }
}

impl ConflictModel for CalendarSet {
    fn conflict_level(&self, person: &Person, start: SlotStart, end: DateTime<Utc>) -> Availability {
        match self.people.get(&person.email) {
            Some(calendar) => calendar.conflict_level(&self.rules, start, end),
            None => {
                debug!(email = %person.email, "No calendar, treating as free");
                Availability::Available(ConflictLevel::FREE)
            }
        }
    }
}

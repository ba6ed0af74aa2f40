use std::fmt;

use chrono::{DateTime, Datelike, IsoWeek, Utc};
use serde::{Deserialize, Serialize};

/// Slots are keyed by their start time, which is unique across a run.
pub type SlotStart = DateTime<Utc>;

/// How costly it is for someone to sit on a panel at a given time.
/// Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictLevel(pub u32);

impl ConflictLevel {
    /// The person marked this time as a preferred interview slot.
    pub const PREFERRED: ConflictLevel = ConflictLevel(0);
    pub const FREE: ConflictLevel = ConflictLevel(1);
    /// Clashes with an accepted meeting with one attendee.
    pub const LIGHT: ConflictLevel = ConflictLevel(2);
    /// Clashes with an accepted meeting with two attendees.
    pub const CONTENDED: ConflictLevel = ConflictLevel(5);
    /// Clashes with a larger accepted meeting.
    pub const BUSY: ConflictLevel = ConflictLevel(10);
}

impl fmt::Display for ConflictLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the conflict model says about one person for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available(ConflictLevel),
    /// Leave, out of office or similar. Never a candidate at any level.
    Unavailable,
}

/// Guests of an existing calendar booking, grouped by response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guests {
    #[serde(default)]
    pub accepted: Vec<String>,
    #[serde(default)]
    pub tentative: Vec<String>,
    #[serde(default)]
    pub needs_action: Vec<String>,
}

impl Guests {
    /// Everyone who has not declined, in response order.
    pub fn potential(&self) -> impl Iterator<Item = &String> {
        self.accepted
            .iter()
            .chain(self.tentative.iter())
            .chain(self.needs_action.iter())
    }
}

/// An interview booking already present in the appointments calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub summary: String,
    #[serde(default)]
    pub guests: Guests,
}

impl Booking {
    /// Placeholders reserve a slot; only real interviews count as the
    /// heavier kind of work.
    pub fn is_placeholder(&self) -> bool {
        self.summary
            .trim()
            .to_lowercase()
            .starts_with("interview placeholder")
    }
}

/// A bookable panel time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: SlotStart,
    pub end: DateTime<Utc>,
    /// Open for allocation in this run. Old slots only count towards recent
    /// workload.
    pub new: bool,
    #[serde(default)]
    pub booking: Option<Booking>,
}

impl Slot {
    pub fn new(start: SlotStart, end: DateTime<Utc>, new: bool) -> Self {
        Self {
            start,
            end,
            new,
            booking: None,
        }
    }

    pub fn with_booking(mut self, booking: Booking) -> Self {
        self.booking = Some(booking);
        self
    }

    pub fn iso_week(&self) -> IsoWeek {
        self.start.iso_week()
    }
}

/// What should happen to a new slot's calendar entry after the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "assignees", rename_all = "snake_case")]
pub enum SlotOutcome {
    /// Invite exactly these people.
    Assigned(Vec<String>),
    /// The slot is no longer needed; remove the placeholder.
    Cleared,
    /// Leave the calendar entry as it is.
    Unchanged,
}

/// A slot that was dropped because a pass could not fill it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnfilledSlot {
    pub start: SlotStart,
    pub missing: String,
}

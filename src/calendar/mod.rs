//! Calendar data: events, the conflict model built on them, and the slots
//! generated from the appointments calendar.

pub mod conflict;
pub mod events;
pub mod slots;

pub use conflict::{Calendar, CalendarData, CalendarSet};
pub use events::{Event, RawEvent};
pub use slots::{load_bank_holidays, parse_bank_holidays, SlotGenerator};

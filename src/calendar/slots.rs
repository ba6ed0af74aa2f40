use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info};

use super::conflict::Calendar;
use crate::allocation::types::{Booking, Slot};
use crate::config::SlotWindowConfig;
use crate::error::{AllocError, Result};

#[derive(Debug, Deserialize)]
struct BankHolidayEvent {
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct BankHolidayFile {
    events: Vec<BankHolidayEvent>,
}

/// Reads the gov.uk bank holiday feed for a single division.
pub fn parse_bank_holidays<R: Read>(reader: R) -> Result<BTreeSet<NaiveDate>> {
    let file: BankHolidayFile = serde_json::from_reader(reader)?;
    Ok(file.events.into_iter().map(|e| e.date).collect())
}

pub fn load_bank_holidays<P: AsRef<Path>>(path: P) -> Result<BTreeSet<NaiveDate>> {
    let file = File::open(path)?;
    parse_bank_holidays(BufReader::new(file))
}

/// Lays out panel slots on working days around `today`.
#[derive(Debug, Clone)]
pub struct SlotGenerator {
    today: NaiveDate,
    window: SlotWindowConfig,
    holidays: BTreeSet<NaiveDate>,
}

impl SlotGenerator {
    pub fn new(today: NaiveDate, window: SlotWindowConfig, holidays: BTreeSet<NaiveDate>) -> Self {
        Self {
            today,
            window,
            holidays,
        }
    }

    /// Working days in the window: no weekends, no bank holidays.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let first = self.today - Duration::days(self.window.lookback_days);
        let last = self.today + Duration::days(self.window.lookahead_days);
        first
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .filter(|d| !self.holidays.contains(d))
            .collect()
    }

    /// Every slot in the window, each carrying the interview booking that
    /// overlaps it, if any.
    pub fn generate(&self, appointments: &Calendar) -> Result<Vec<Slot>> {
        let times = self.window.parsed_start_times()?;
        let zone = self.window.parsed_time_zone()?;
        let first_new = self.today + Duration::days(self.window.new_after_days);
        let length = Duration::minutes(self.window.length_minutes);

        let mut slots = Vec::new();
        for date in self.dates() {
            for time in &times {
                let start = local_to_utc(&zone, date, *time)?;
                let slot = Slot::new(start, start + length, date >= first_new);
                slots.push(associate_booking(slot, appointments));
            }
        }
        info!(
            slots = slots.len(),
            new = slots.iter().filter(|s| s.new).count(),
            "Generated slots"
        );
        Ok(slots)
    }
}

// Ambiguous times (clocks going back) take the earlier instant; times
// skipped by clocks going forward are an error.
fn local_to_utc(zone: &Tz, date: NaiveDate, time: NaiveTime) -> Result<chrono::DateTime<Utc>> {
    zone.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| AllocError::InvalidTime(format!("{date} {time}")))
}

/// The last overlapping event whose summary mentions an interview wins.
fn associate_booking(slot: Slot, appointments: &Calendar) -> Slot {
    let booking = appointments
        .intersecting_events(slot.start, slot.end)
        .filter(|e| e.summary.to_lowercase().contains("interview"))
        .last();
    match booking {
        Some(event) => {
            debug!(slot = %slot.start, summary = %event.summary, "Found booking");
            slot.with_booking(Booking {
                summary: event.summary.clone(),
                guests: event.guests(),
            })
        }
        None => slot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::events::{Event, RawEvent};

    fn generator(today: NaiveDate, holidays: BTreeSet<NaiveDate>) -> SlotGenerator {
        let window = SlotWindowConfig {
            lookback_days: 7,
            lookahead_days: 14,
            ..SlotWindowConfig::default()
        };
        SlotGenerator::new(today, window, holidays)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn skips_weekends_and_bank_holidays() {
        let holidays = parse_bank_holidays(
            r#"{"division": "england-and-wales", "events": [{"title": "Easter Monday", "date": "2024-04-01", "notes": ""}]}"#
                .as_bytes(),
        )
        .unwrap();
        // Monday 25 March 2024.
        let dates = generator(date(2024, 3, 25), holidays).dates();
        assert!(dates.iter().all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
        assert!(!dates.contains(&date(2024, 4, 1)));
        assert_eq!(dates.first(), Some(&date(2024, 3, 18)));
        assert_eq!(dates.last(), Some(&date(2024, 4, 8)));
        // Three full weeks plus a Monday, less the holiday.
        assert_eq!(dates.len(), 15);
    }

    #[test]
    fn slots_are_new_from_the_cutoff() {
        let slots = generator(date(2024, 3, 25), BTreeSet::new())
            .generate(&Calendar::default())
            .unwrap();
        let first_new = slots.iter().find(|s| s.new).unwrap();
        // 25 March + 10 days is Thursday 4 April, after the clocks change.
        assert_eq!(first_new.start, Utc.with_ymd_and_hms(2024, 4, 4, 9, 15, 0).unwrap());
        assert_eq!(first_new.end - first_new.start, Duration::minutes(150));
        assert!(slots.iter().filter(|s| s.start < first_new.start).all(|s| !s.new));
        assert_eq!(slots.iter().filter(|s| s.new).count(), 6);
    }

    fn first_start(slots: &[Slot], day: NaiveDate) -> String {
        slots
            .iter()
            .find(|s| s.start.date_naive() == day)
            .unwrap()
            .start
            .format("%H:%M")
            .to_string()
    }

    #[test]
    fn start_times_follow_daylight_saving() {
        // London moves to BST on Sunday 31 March 2024.
        let slots = generator(date(2024, 3, 25), BTreeSet::new())
            .generate(&Calendar::default())
            .unwrap();
        assert_eq!(first_start(&slots, date(2024, 3, 29)), "10:15");
        assert_eq!(first_start(&slots, date(2024, 4, 2)), "09:15");
    }

    #[test]
    fn time_zone_is_configurable() {
        let mut gen = generator(date(2024, 6, 10), BTreeSet::new());
        gen.window.time_zone = "UTC".to_string();
        let slots = gen.generate(&Calendar::default()).unwrap();
        assert_eq!(first_start(&slots, date(2024, 6, 10)), "10:15");

        gen.window.time_zone = "Not/AZone".to_string();
        assert!(matches!(gen.generate(&Calendar::default()), Err(AllocError::InvalidConfig(_))));
    }

    #[test]
    fn attaches_overlapping_interview_bookings() {
        let raw: Vec<RawEvent> = serde_json::from_value(serde_json::json!([
            {
                "start": {"dateTime": "2024-03-25T10:15:00Z"},
                "end": {"dateTime": "2024-03-25T12:45:00Z"},
                "summary": "Interview placeholder",
                "attendees": [{"email": "a@x", "responseStatus": "accepted"}]
            },
            {
                "start": {"dateTime": "2024-03-25T14:00:00Z"},
                "end": {"dateTime": "2024-03-25T15:00:00Z"},
                "summary": "Team lunch"
            }
        ]))
        .unwrap();
        let events: Vec<Event> = raw.into_iter().map(|r| Event::from_raw(r).unwrap()).collect();
        let slots = generator(date(2024, 3, 25), BTreeSet::new())
            .generate(&Calendar::new(events))
            .unwrap();

        let morning = slots
            .iter()
            .find(|s| s.start == Utc.with_ymd_and_hms(2024, 3, 25, 10, 15, 0).unwrap())
            .unwrap();
        let booking = morning.booking.as_ref().unwrap();
        assert!(booking.is_placeholder());
        assert_eq!(booking.guests.accepted, vec!["a@x"]);

        let afternoon = slots
            .iter()
            .find(|s| s.start == Utc.with_ymd_and_hms(2024, 3, 25, 14, 15, 0).unwrap())
            .unwrap();
        assert!(afternoon.booking.is_none());
    }
}

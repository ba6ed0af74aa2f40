//! Synthetic rosters and calendars for trying the allocator without real
//! data.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::allocation::levels::ConflictTable;
use crate::allocation::types::{Availability, ConflictLevel, Slot};
use crate::calendar::{Calendar, SlotGenerator};
use crate::config::SlotWindowConfig;
use crate::error::Result;
use crate::roster::{Person, Roster};

const TEAMS: usize = 6;

pub struct Demo {
    pub roster: Roster,
    pub slots: Vec<Slot>,
    pub conflicts: ConflictTable,
}

/// Same seed, same demo.
pub fn generate(seed: u64, people: usize, today: NaiveDate, window: &SlotWindowConfig) -> Result<Demo> {
    let mut rng = StdRng::seed_from_u64(seed);

    let roster = Roster::new((0..people).map(|i| random_person(&mut rng, i)).collect());
    let slots = SlotGenerator::new(today, window.clone(), BTreeSet::new()).generate(&Calendar::default())?;

    let mut conflicts = ConflictTable::all_free();
    for slot in slots.iter().filter(|s| s.new) {
        for person in roster.iter() {
            conflicts.set(&person.email, slot.start, random_availability(&mut rng));
        }
    }
    Ok(Demo {
        roster,
        slots,
        conflicts,
    })
}

fn random_person(rng: &mut StdRng, i: usize) -> Person {
    let mut person = Person::new(&format!("Person {i}"), &format!("person{i}@example.org"));
    person.can_chair = rng.gen_bool(0.3);
    person.technical = rng.gen_bool(0.6);
    person.can_do_frontend_test = rng.gen_bool(0.3);
    person.civil_servant = rng.gen_bool(0.7);
    person.gender = if rng.gen_bool(0.5) { "f" } else { "m" }.to_string();
    person.bame = if rng.gen_bool(0.25) { "y" } else { "n" }.to_string();
    person.team = Some(format!("Team {}", rng.gen_range(0..TEAMS)));
    person.use_rate = if rng.gen_bool(0.2) { 0.5 } else { 1.0 };
    person.use_freq = rng.gen_bool(0.2).then_some(1);
    person
}

fn random_availability(rng: &mut StdRng) -> Availability {
    match rng.gen_range(0..100) {
        0..=4 => Availability::Available(ConflictLevel::PREFERRED),
        5..=59 => Availability::Available(ConflictLevel::FREE),
        60..=74 => Availability::Available(ConflictLevel::LIGHT),
        75..=84 => Availability::Available(ConflictLevel::CONTENDED),
        85..=89 => Availability::Available(ConflictLevel::BUSY),
        _ => Availability::Unavailable,
    }
}

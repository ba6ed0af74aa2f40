use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::context::AllocationContext;
use super::ledger::SlotAssignments;
use super::types::{Availability, ConflictLevel, SlotStart};
use crate::roster::{Person, Roster};

/// Source of the per-person, per-slot conflict signal.
pub trait ConflictModel {
    fn conflict_level(&self, person: &Person, start: SlotStart, end: DateTime<Utc>) -> Availability;
}

/// A conflict model backed by a lookup table, with one answer for anything
/// not listed.
#[derive(Debug, Clone)]
pub struct ConflictTable {
    default: Availability,
    entries: HashMap<(String, SlotStart), Availability>,
}

impl ConflictTable {
    pub fn new(default: Availability) -> Self {
        Self {
            default,
            entries: HashMap::new(),
        }
    }

    /// Everyone free for everything unless told otherwise.
    pub fn all_free() -> Self {
        Self::new(Availability::Available(ConflictLevel::FREE))
    }

    pub fn set(&mut self, email: &str, start: SlotStart, availability: Availability) {
        self.entries.insert((email.to_string(), start), availability);
    }

    pub fn with(mut self, email: &str, start: SlotStart, availability: Availability) -> Self {
        self.set(email, start, availability);
        self
    }
}

impl ConflictModel for ConflictTable {
    fn conflict_level(&self, person: &Person, start: SlotStart, _end: DateTime<Utc>) -> Availability {
        self.entries
            .get(&(person.email.clone(), start))
            .copied()
            .unwrap_or(self.default)
    }
}

/// Asks the model about every person for every new slot and records the
/// answers on both sides: the slot's candidate buckets and the person's
/// options. Unavailable people are left out of the slot entirely.
///
/// Returns the distinct levels seen, lowest first. Passes walk them in this
/// order.
pub fn derive_conflict_levels(
    roster: &Roster,
    ledger: &mut SlotAssignments,
    model: &dyn ConflictModel,
    ctx: &mut AllocationContext,
) -> Vec<ConflictLevel> {
    let mut levels = BTreeSet::new();
    for start in ledger.new_assignments() {
        let Some(assignment) = ledger.get_mut(&start) else {
            continue;
        };
        let end = assignment.slot().end;
        for person in roster.iter() {
            let Availability::Available(level) = model.conflict_level(person, start, end) else {
                continue;
            };
            levels.insert(level);
            assignment.add_to_possible(level, &person.email);
            ctx.record_option(&person.email, level, start);
        }
    }
    levels.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::types::Slot;
    use chrono::{Duration, TimeZone};

    fn setup() -> (Roster, SlotAssignments, Vec<SlotStart>) {
        let roster = Roster::new(vec![
            Person::new("A", "a@x"),
            Person::new("B", "b@x"),
            Person::new("C", "c@x"),
        ]);
        let starts: Vec<SlotStart> = (11..13)
            .map(|d| Utc.with_ymd_and_hms(2024, 3, d, 10, 15, 0).unwrap())
            .collect();
        let mut slots: Vec<Slot> = starts
            .iter()
            .map(|&s| Slot::new(s, s + Duration::minutes(150), true))
            .collect();
        let old = starts[0] - Duration::days(7);
        slots.push(Slot::new(old, old + Duration::minutes(150), false));
        let ledger = SlotAssignments::from_slots(slots, &roster);
        (roster, ledger, starts)
    }

    fn model(starts: &[SlotStart]) -> ConflictTable {
        ConflictTable::all_free()
            .with("a@x", starts[0], Availability::Available(ConflictLevel::PREFERRED))
            .with("b@x", starts[0], Availability::Unavailable)
            .with("c@x", starts[1], Availability::Available(ConflictLevel::BUSY))
    }

    #[test]
    fn records_levels_on_both_sides() {
        let (roster, mut ledger, starts) = setup();
        let mut ctx = AllocationContext::new(&roster, 3);
        let levels = derive_conflict_levels(&roster, &mut ledger, &model(&starts), &mut ctx);

        assert_eq!(
            levels,
            vec![ConflictLevel::PREFERRED, ConflictLevel::FREE, ConflictLevel::BUSY]
        );
        let first = ledger.get(&starts[0]).unwrap();
        assert_eq!(first.possible(ConflictLevel::PREFERRED), ["a@x".to_string()]);
        assert_eq!(first.possible(ConflictLevel::FREE), ["c@x".to_string()]);
        assert!(!first.is_possible("b@x"));

        let c = ctx.workload("c@x").unwrap();
        assert_eq!(c.options_at(ConflictLevel::FREE), 1);
        assert_eq!(c.options_at(ConflictLevel::BUSY), 1);
    }

    #[test]
    fn rerunning_gives_the_same_answer() {
        let (roster, mut ledger, starts) = setup();
        let mut ctx = AllocationContext::new(&roster, 3);
        let model = model(&starts);
        let first = derive_conflict_levels(&roster, &mut ledger, &model, &mut ctx);
        let snapshot: Vec<Vec<String>> = first
            .iter()
            .map(|&l| ledger.get(&starts[0]).unwrap().possible(l).to_vec())
            .collect();
        let options = ctx.workload("a@x").cloned();

        let second = derive_conflict_levels(&roster, &mut ledger, &model, &mut ctx);
        assert_eq!(first, second);
        let again: Vec<Vec<String>> = second
            .iter()
            .map(|&l| ledger.get(&starts[0]).unwrap().possible(l).to_vec())
            .collect();
        assert_eq!(snapshot, again);
        assert_eq!(options, ctx.workload("a@x").cloned());
    }

    #[test]
    fn old_slots_are_not_asked_about() {
        let (roster, mut ledger, _) = setup();
        let mut ctx = AllocationContext::new(&roster, 3);
        derive_conflict_levels(&roster, &mut ledger, &ConflictTable::all_free(), &mut ctx);
        let old = ledger.iter().find(|a| !a.slot().new).unwrap();
        assert!(old.possible(ConflictLevel::FREE).is_empty());
        assert_eq!(ctx.workload("a@x").unwrap().options_at(ConflictLevel::FREE), 2);
    }
}

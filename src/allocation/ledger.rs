use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::warn;

use super::types::{ConflictLevel, Slot, SlotStart};
use crate::error::{AllocError, Result};
use crate::roster::{Person, Roster};

/// Number of people on a full panel.
pub const PANEL_SIZE: usize = 3;

/// Who is on one slot's panel, and who could still be added.
#[derive(Debug, Clone)]
pub struct SlotAssignment {
    slot: Slot,
    assigned: Vec<Person>,
    /// Candidates by conflict level. An email sits in at most one bucket.
    possible: BTreeMap<ConflictLevel, Vec<String>>,
    costs: HashMap<String, ConflictLevel>,
}

impl SlotAssignment {
    /// Starts from whoever the slot's existing booking already invites.
    pub fn new(slot: Slot, roster: &Roster) -> Self {
        let mut assigned: Vec<Person> = Vec::new();
        if let Some(booking) = &slot.booking {
            for email in booking.guests.potential() {
                if assigned.iter().any(|p| &p.email == email) {
                    continue;
                }
                match roster.by_email(email) {
                    Some(person) => assigned.push(person.clone()),
                    None => warn!(email = %email, slot = %slot.start, "Unknown invitee of interview slot"),
                }
            }
        }
        Self {
            slot,
            assigned,
            possible: BTreeMap::new(),
            costs: HashMap::new(),
        }
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn start(&self) -> SlotStart {
        self.slot.start
    }

    pub fn assigned(&self) -> &[Person] {
        &self.assigned
    }

    pub fn assigned_emails(&self) -> Vec<String> {
        self.assigned.iter().map(|p| p.email.clone()).collect()
    }

    pub fn possible(&self, level: ConflictLevel) -> &[String] {
        self.possible.get(&level).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_possible(&self, email: &str) -> bool {
        self.possible.values().any(|emails| emails.iter().any(|e| e == email))
    }

    /// Makes `email` a candidate at `level`, moving them out of any other
    /// bucket first.
    pub fn add_to_possible(&mut self, level: ConflictLevel, email: &str) {
        self.remove_from_possible(email);
        self.possible.entry(level).or_default().push(email.to_string());
        self.costs.insert(email.to_string(), level);
    }

    pub fn remove_from_possible(&mut self, email: &str) {
        for emails in self.possible.values_mut() {
            emails.retain(|e| e != email);
        }
    }

    /// Puts a candidate on the panel.
    ///
    /// Assigning someone who is not a candidate means the pool and the ledger
    /// disagree, which is a bug; that is reported as `NotACandidate`.
    pub fn assign(&mut self, email: &str, roster: &Roster) -> Result<()> {
        if !self.is_possible(email) {
            return Err(AllocError::NotACandidate {
                slot: self.slot.start,
                email: email.to_string(),
            });
        }
        match roster.by_email(email) {
            Some(person) => self.assigned.push(person.clone()),
            None => warn!(email = %email, "Unknown email to assign to interview"),
        }
        self.remove_from_possible(email);
        Ok(())
    }

    /// Sum of the assignees' conflict levels. People who were on the panel
    /// before the run have no recorded level and cost nothing.
    pub fn cost(&self) -> u32 {
        self.assigned
            .iter()
            .filter_map(|p| self.costs.get(&p.email))
            .map(|level| level.0)
            .sum()
    }

    pub fn cost_of(&self, email: &str) -> Option<ConflictLevel> {
        self.costs.get(email).copied()
    }

    pub fn is_full(&self) -> bool {
        self.assigned.len() >= PANEL_SIZE
    }

    pub fn has_chair(&self) -> bool {
        self.assigned.iter().any(|p| p.can_chair)
    }

    pub fn can_be_frontend(&self) -> bool {
        self.assigned.iter().any(|p| p.can_do_frontend_test)
    }

    pub fn has_two_tech(&self) -> bool {
        self.assigned.iter().filter(|p| p.technical).count() >= 2
    }

    pub fn has_two_civil_servants(&self) -> bool {
        self.assigned.iter().filter(|p| p.civil_servant).count() >= 2
    }

    pub fn has_gender(&self, gender: &str) -> bool {
        self.assigned.iter().any(|p| p.gender == gender)
    }

    pub fn gender_diverse(&self) -> bool {
        distinct(self.assigned.iter().map(|p| p.gender.as_str())) >= 2
    }

    pub fn has_bame(&self, category: &str) -> bool {
        self.assigned.iter().any(|p| p.bame == category)
    }

    pub fn bame_diverse(&self) -> bool {
        distinct(self.assigned.iter().map(|p| p.bame.as_str())) >= 2
    }

    /// No two panel members from the same team.
    pub fn teams_distinct(&self) -> bool {
        let mut seen = HashSet::new();
        self.assigned
            .iter()
            .filter_map(|p| p.team.as_deref())
            .all(|team| seen.insert(team))
    }

    pub fn has_team_member(&self, person: &Person) -> bool {
        self.assigned.iter().any(|p| p.same_team(person))
    }

    /// Enough to run an interview.
    pub fn viable(&self) -> bool {
        self.assigned.len() == PANEL_SIZE
            && self.has_chair()
            && self.has_two_tech()
            && self.gender_diverse()
            && self.bame_diverse()
            && self.has_two_civil_servants()
            && self.teams_distinct()
    }
}

/// Unknown (empty) values do not count towards diversity.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    values.filter(|v| !v.is_empty()).collect::<HashSet<_>>().len()
}

/// Every slot of the run, keyed by start time.
#[derive(Debug, Clone, Default)]
pub struct SlotAssignments {
    assignments: BTreeMap<SlotStart, SlotAssignment>,
}

impl SlotAssignments {
    pub fn new<I: IntoIterator<Item = SlotAssignment>>(assignments: I) -> Self {
        Self {
            assignments: assignments
                .into_iter()
                .map(|a| (a.start(), a))
                .collect(),
        }
    }

    pub fn from_slots(slots: Vec<Slot>, roster: &Roster) -> Self {
        Self::new(slots.into_iter().map(|s| SlotAssignment::new(s, roster)))
    }

    /// Slots in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = &SlotAssignment> {
        self.assignments.values()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn get(&self, start: &SlotStart) -> Option<&SlotAssignment> {
        self.assignments.get(start)
    }

    pub fn get_mut(&mut self, start: &SlotStart) -> Option<&mut SlotAssignment> {
        self.assignments.get_mut(start)
    }

    pub fn assign(&mut self, start: SlotStart, email: &str, roster: &Roster) -> Result<()> {
        self.assignments
            .get_mut(&start)
            .ok_or(AllocError::UnknownSlot(start))?
            .assign(email, roster)
    }

    pub fn drop_slot(&mut self, start: &SlotStart) -> Option<SlotAssignment> {
        self.assignments.remove(start)
    }

    pub fn new_assignments(&self) -> BTreeSet<SlotStart> {
        self.new_where(|_| true)
    }

    /// Start times of the new slots matching `check`, in order. The result is
    /// a snapshot; later changes to the ledger do not affect it.
    pub fn new_where<F>(&self, check: F) -> BTreeSet<SlotStart>
    where
        F: Fn(&SlotAssignment) -> bool,
    {
        self.assignments
            .values()
            .filter(|a| a.slot.new && check(a))
            .map(|a| a.start())
            .collect()
    }

    pub fn new_count(&self) -> usize {
        self.assignments.values().filter(|a| a.slot.new).count()
    }
}

use std::collections::BTreeMap;

use chrono::Duration;

use super::types::SlotStart;

/// Who can still fill which open slot during one pass at one conflict level.
///
/// Both directions are kept in step: `slots` lists candidates per slot and
/// `options` counts, per person, how many slots list them. Every removal
/// goes through one place so the two never disagree.
#[derive(Debug, Clone, Default)]
pub struct PossibleAssignments {
    slots: BTreeMap<SlotStart, Vec<String>>,
    options: BTreeMap<String, usize>,
}

impl PossibleAssignments {
    pub fn new<I: IntoIterator<Item = SlotStart>>(starts: I) -> Self {
        Self {
            slots: starts.into_iter().map(|s| (s, Vec::new())).collect(),
            options: BTreeMap::new(),
        }
    }

    /// Offers `email` for the slot. Slots outside the pool are ignored.
    pub fn add(&mut self, start: SlotStart, email: &str) {
        if let Some(emails) = self.slots.get_mut(&start) {
            if !emails.iter().any(|e| e == email) {
                emails.push(email.to_string());
                *self.options.entry(email.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Number of slots still open to `email`.
    pub fn options_for(&self, email: &str) -> usize {
        self.options.get(email).copied().unwrap_or(0)
    }

    pub fn candidates(&self, start: &SlotStart) -> &[String] {
        self.slots.get(start).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// People with any option left, fewest options first, ties by email.
    pub fn people_busiest_first(&self) -> Vec<String> {
        let mut people: Vec<(&String, usize)> = self
            .options
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(email, &count)| (email, count))
            .collect();
        people.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        people.into_iter().map(|(email, _)| email.clone()).collect()
    }

    /// The open slot for `email` with the fewest candidates, earliest first
    /// on ties.
    pub fn busiest_slot_possible(&self, email: &str) -> Option<SlotStart> {
        self.slots
            .iter()
            .filter(|(_, emails)| emails.iter().any(|e| e == email))
            .min_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.0.cmp(b.0)))
            .map(|(start, _)| *start)
    }

    /// Removes one pairing, e.g. because a rule rules it out.
    pub fn discard(&mut self, start: SlotStart, email: &str) {
        if let Some(emails) = self.slots.get_mut(&start) {
            let before = emails.len();
            emails.retain(|e| e != email);
            if emails.len() < before {
                self.forget_option(email);
            }
        }
    }

    /// Records that `email` sits on a panel at `start`: they are no longer a
    /// candidate for any slot starting within `window` of it.
    pub fn assigned(&mut self, start: SlotStart, email: &str, window: Duration) {
        let nearby: Vec<SlotStart> = self
            .slots
            .keys()
            .filter(|slot_start| (**slot_start - start).abs() < window)
            .copied()
            .collect();
        for slot_start in nearby {
            self.discard(slot_start, email);
        }
    }

    /// Takes a slot out of the pool once it has been filled for this pass.
    pub fn drop_slot(&mut self, start: SlotStart) {
        if let Some(emails) = self.slots.remove(&start) {
            for email in emails {
                self.forget_option(&email);
            }
        }
    }

    /// Total number of (slot, person) pairings left.
    pub fn len(&self) -> usize {
        self.slots.values().map(|e| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget_option(&mut self, email: &str) {
        if let Some(count) = self.options.get_mut(email) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.options.remove(email);
            }
        }
    }
}

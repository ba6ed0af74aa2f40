use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::IsoWeek;
use tracing::warn;

use super::ledger::SlotAssignments;
use super::types::{ConflictLevel, SlotStart};
use crate::roster::Roster;

/// Working counters for one person during one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workload {
    pub recent_slots: u32,
    /// Slots that turned into real interviews. Weighted more heavily.
    pub recent_interviews: u32,
    pub newly_assigned: u32,
    pub recent_by_week: HashMap<IsoWeek, u32>,
    pub new_by_week: HashMap<IsoWeek, u32>,
    /// Slots this person could fill, by conflict level.
    pub options_by_level: BTreeMap<ConflictLevel, BTreeSet<SlotStart>>,
}

impl Workload {
    pub fn recent_work(&self, work_of_interview: u32) -> u32 {
        self.recent_slots + self.recent_interviews * work_of_interview
    }

    pub fn planned_work(&self) -> u32 {
        self.newly_assigned
    }

    pub fn slots_in_week(&self, week: IsoWeek) -> u32 {
        self.recent_by_week.get(&week).copied().unwrap_or(0)
            + self.new_by_week.get(&week).copied().unwrap_or(0)
    }

    pub fn options_at(&self, level: ConflictLevel) -> usize {
        self.options_by_level.get(&level).map_or(0, |s| s.len())
    }
}

/// Mutable per-run state that used to live on the people themselves.
/// Built fresh for every run, so nothing leaks between runs.
#[derive(Debug, Clone)]
pub struct AllocationContext {
    workloads: BTreeMap<String, Workload>,
    work_of_interview: u32,
}

impl AllocationContext {
    pub fn new(roster: &Roster, work_of_interview: u32) -> Self {
        Self {
            workloads: roster
                .emails()
                .map(|email| (email.to_string(), Workload::default()))
                .collect(),
            work_of_interview,
        }
    }

    /// Counts recent work from old slots and planned work from whoever is
    /// already on the new ones.
    pub fn from_ledger(roster: &Roster, ledger: &SlotAssignments, work_of_interview: u32) -> Self {
        let mut ctx = Self::new(roster, work_of_interview);
        ctx.count_recent(ledger);
        ctx.recount_planned(ledger);
        ctx
    }

    fn count_recent(&mut self, ledger: &SlotAssignments) {
        for assignment in ledger.iter().filter(|a| !a.slot().new) {
            let Some(booking) = &assignment.slot().booking else {
                continue;
            };
            let week = assignment.slot().iso_week();
            for email in &booking.guests.accepted {
                let Some(workload) = self.workloads.get_mut(email) else {
                    warn!(email = %email, "Unknown attendee of recent interview");
                    continue;
                };
                workload.recent_slots += 1;
                *workload.recent_by_week.entry(week).or_insert(0) += 1;
                if !booking.is_placeholder() {
                    workload.recent_interviews += 1;
                }
            }
        }
    }

    /// Rebuilds the newly-assigned counters from the new slots in the ledger.
    pub fn recount_planned(&mut self, ledger: &SlotAssignments) {
        for workload in self.workloads.values_mut() {
            workload.newly_assigned = 0;
            workload.new_by_week.clear();
        }
        for assignment in ledger.iter().filter(|a| a.slot().new) {
            let week = assignment.slot().iso_week();
            for person in assignment.assigned() {
                if let Some(workload) = self.workloads.get_mut(&person.email) {
                    workload.newly_assigned += 1;
                    *workload.new_by_week.entry(week).or_insert(0) += 1;
                }
            }
        }
    }

    pub fn record_assignment(&mut self, email: &str, week: IsoWeek) {
        let workload = self.workloads.entry(email.to_string()).or_default();
        workload.newly_assigned += 1;
        *workload.new_by_week.entry(week).or_insert(0) += 1;
    }

    pub fn record_option(&mut self, email: &str, level: ConflictLevel, start: SlotStart) {
        self.workloads
            .entry(email.to_string())
            .or_default()
            .options_by_level
            .entry(level)
            .or_default()
            .insert(start);
    }

    pub fn workload(&self, email: &str) -> Option<&Workload> {
        self.workloads.get(email)
    }

    /// Total weighted work for a person; unknown people have done none.
    pub fn work(&self, email: &str) -> u32 {
        self.workloads
            .get(email)
            .map_or(0, |w| w.recent_work(self.work_of_interview) + w.planned_work())
    }

    pub fn slots_in_week(&self, email: &str, week: IsoWeek) -> u32 {
        self.workloads.get(email).map_or(0, |w| w.slots_in_week(week))
    }
}

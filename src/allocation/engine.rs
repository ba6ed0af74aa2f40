use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::Datelike;
use tracing::{debug, info, warn};

use super::context::AllocationContext;
use super::ledger::{SlotAssignment, SlotAssignments};
use super::levels::{derive_conflict_levels, ConflictModel};
use super::passes::{plan, Pass};
use super::pool::PossibleAssignments;
use super::types::{ConflictLevel, Slot, SlotOutcome, SlotStart, UnfilledSlot};
use super::work_share::work_share;
use crate::config::AllocatorConfig;
use crate::error::Result;
use crate::roster::{Person, Roster};
use crate::writeback::WriteBack;

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct Allocation {
    /// One entry per slot that was new at the start of the run.
    pub outcomes: BTreeMap<SlotStart, SlotOutcome>,
    pub unfilled: Vec<UnfilledSlot>,
    pub ledger: SlotAssignments,
    pub context: AllocationContext,
    pub levels: Vec<ConflictLevel>,
}

impl Allocation {
    pub fn viable_count(&self) -> usize {
        self.ledger.iter().filter(|a| a.slot().new && a.viable()).count()
    }
}

/// Fills new slots with panels, one pass per missing property.
pub struct Allocator<'a> {
    roster: &'a Roster,
    config: &'a AllocatorConfig,
    ledger: SlotAssignments,
    ctx: AllocationContext,
    levels: Vec<ConflictLevel>,
    new_slots: Vec<SlotStart>,
    unfilled: Vec<UnfilledSlot>,
}

impl<'a> Allocator<'a> {
    /// `slots` covers both recent history and the slots to fill.
    pub fn new(slots: Vec<Slot>, roster: &'a Roster, config: &'a AllocatorConfig) -> Self {
        let ledger = SlotAssignments::from_slots(slots, roster);
        let new_slots = ledger.new_assignments().into_iter().collect();
        let ctx = AllocationContext::from_ledger(roster, &ledger, config.work_of_interview);
        Self {
            roster,
            config,
            ledger,
            ctx,
            levels: Vec::new(),
            new_slots,
            unfilled: Vec::new(),
        }
    }

    /// Runs every pass and hands the final outcomes to `sink`.
    pub fn allocate(mut self, model: &dyn ConflictModel, sink: &mut dyn WriteBack) -> Result<Allocation> {
        self.prepare(model);
        for pass in plan(self.config, self.roster) {
            self.run_pass(&pass)?;
            if self.config.incremental_write_back {
                write_outcomes(sink, &self.outcomes())?;
            }
        }
        let allocation = self.finish();
        write_outcomes(sink, &allocation.outcomes)?;
        sink.flush()?;
        Ok(allocation)
    }

    /// Asks the conflict model about every new slot.
    pub fn prepare(&mut self, model: &dyn ConflictModel) {
        self.levels = derive_conflict_levels(self.roster, &mut self.ledger, model, &mut self.ctx);
        info!(
            slots = self.new_slots.len(),
            people = self.roster.len(),
            levels = ?self.levels,
            "Prepared allocation"
        );
    }

    pub fn ledger(&self) -> &SlotAssignments {
        &self.ledger
    }

    /// Runs one pass, repeating it if asked, then drops what it could not fill.
    pub fn run_pass(&mut self, pass: &Pass) -> Result<()> {
        info!(requirement = %pass.requirement, "Assigning");
        if pass.repeat {
            while self.assign_people(pass)? {}
        } else {
            self.assign_people(pass)?;
        }
        if pass.drop_unfilled {
            let requirement = &pass.requirement;
            self.drop_slots(&requirement.to_string(), |a| requirement.is_missing(a));
        }
        Ok(())
    }

    /// One round of greedy matching for `pass`. Returns whether anything was
    /// assigned.
    pub fn assign_people(&mut self, pass: &Pass) -> Result<bool> {
        let requirement = &pass.requirement;
        let to_fill = self.ledger.new_where(|a| requirement.is_missing(a));
        let total_new = self.ledger.new_count();
        let mut number_to_fill = (total_new as f64 * pass.fill_rate).ceil() as i64
            - (total_new - to_fill.len()) as i64;
        if to_fill.is_empty() || number_to_fill <= 0 {
            return Ok(false);
        }

        self.ctx.recount_planned(&self.ledger);
        let people: Vec<&Person> = self.roster.iter().filter(|p| requirement.is_eligible(p)).collect();
        let eligible: HashSet<&str> = people.iter().map(|p| p.email.as_str()).collect();
        let mut shares = work_share(to_fill.len(), &people, &self.ctx, &self.config.work_share);
        let window = self.config.spacing();

        let mut made: BTreeSet<SlotStart> = BTreeSet::new();
        let levels: Vec<ConflictLevel> = self
            .levels
            .iter()
            .copied()
            .filter(|level| pass.max_level.map_or(true, |max| *level <= max))
            .collect();

        for level in levels {
            debug!(level = %level, "At conflict level");
            let mut pool = PossibleAssignments::new(to_fill.iter().copied().filter(|s| !made.contains(s)));
            for start in &to_fill {
                let Some(assignment) = self.ledger.get(start) else {
                    continue;
                };
                for email in assignment.possible(level) {
                    if shares.get(email).copied().unwrap_or(0) > 0 {
                        pool.add(*start, email);
                    }
                }
            }

            // Nobody sits on two panels too close together, counting every
            // slot in the run, old ones included.
            for assignment in self.ledger.iter() {
                for person in assignment.assigned() {
                    if eligible.contains(person.email.as_str()) {
                        pool.assigned(assignment.start(), &person.email, window);
                    }
                }
            }

            let mut changed = true;
            while changed {
                changed = false;
                for email in pool.people_busiest_first() {
                    if shares.get(&email).copied().unwrap_or(0) == 0 {
                        continue;
                    }
                    let Some(start) = self.admissible_slot(&mut pool, &email) else {
                        continue;
                    };
                    info!(email = %email, slot = %start, level = %level, "Assigning to slot");
                    pool.assigned(start, &email, window);
                    pool.drop_slot(start);
                    self.ledger.assign(start, &email, self.roster)?;
                    self.ctx.record_assignment(&email, start.iso_week());
                    if let Some(share) = shares.get_mut(&email) {
                        *share -= 1;
                    }
                    made.insert(start);
                    number_to_fill -= 1;
                    if number_to_fill <= 0 {
                        return Ok(true);
                    }
                    changed = true;
                    break;
                }
            }
        }
        Ok(!made.is_empty())
    }

    /// The scarcest slot `email` may actually take. Pairings broken by the
    /// team or weekly-limit rules are discarded from the pool on the way.
    fn admissible_slot(&self, pool: &mut PossibleAssignments, email: &str) -> Option<SlotStart> {
        let person = self.roster.by_email(email)?;
        while let Some(start) = pool.busiest_slot_possible(email) {
            let Some(assignment) = self.ledger.get(&start) else {
                pool.drop_slot(start);
                continue;
            };
            if assignment.assigned().iter().any(|p| p.email == email) {
                pool.discard(start, email);
                continue;
            }
            if assignment.has_team_member(person) {
                debug!(email = %email, slot = %start, "Team already on panel");
                pool.discard(start, email);
                continue;
            }
            if let Some(limit) = person.use_freq {
                if self.ctx.slots_in_week(email, start.iso_week()) >= limit {
                    debug!(email = %email, slot = %start, limit, "Weekly limit reached");
                    pool.discard(start, email);
                    continue;
                }
            }
            return Some(start);
        }
        None
    }

    fn drop_slots<F>(&mut self, description: &str, check: F)
    where
        F: Fn(&SlotAssignment) -> bool,
    {
        for start in self.ledger.new_where(check) {
            warn!(slot = %start, missing = description, "Unable to allocate, dropping slot");
            self.ledger.drop_slot(&start);
            self.unfilled.push(UnfilledSlot {
                start,
                missing: description.to_string(),
            });
        }
    }

    /// Drops anything that still is not a viable panel and wraps up.
    pub fn finish(mut self) -> Allocation {
        self.drop_slots("viable panel", |a| !a.viable());
        self.ctx.recount_planned(&self.ledger);
        let outcomes = self.outcomes();
        Allocation {
            outcomes,
            unfilled: self.unfilled,
            ledger: self.ledger,
            context: self.ctx,
            levels: self.levels,
        }
    }

    /// What each new slot looks like right now.
    pub fn outcomes(&self) -> BTreeMap<SlotStart, SlotOutcome> {
        self.new_slots
            .iter()
            .map(|start| {
                let outcome = match self.ledger.get(start) {
                    Some(assignment) => SlotOutcome::Assigned(assignment.assigned_emails()),
                    None if self.config.clear_dropped_slots => SlotOutcome::Cleared,
                    None => SlotOutcome::Unchanged,
                };
                (*start, outcome)
            })
            .collect()
    }
}

fn write_outcomes(sink: &mut dyn WriteBack, outcomes: &BTreeMap<SlotStart, SlotOutcome>) -> Result<()> {
    for (start, outcome) in outcomes {
        sink.write(*start, outcome)?;
    }
    Ok(())
}

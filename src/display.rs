use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::allocation::engine::Allocation;
use crate::allocation::types::{ConflictLevel, SlotOutcome, SlotStart};
use crate::error::Result;
use crate::roster::{Person, Roster};

/// One line of the per-person diagnostic report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub email: String,
    pub name: String,
    pub can_chair: bool,
    pub work: u32,
    pub recent_slots: u32,
    pub new_slots: u32,
    /// Slots this person could have taken, per conflict level.
    pub options: BTreeMap<ConflictLevel, usize>,
}

/// One new slot and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRow {
    pub start: SlotStart,
    pub outcome: SlotOutcome,
    pub panel: Vec<String>,
    pub cost: Option<u32>,
    /// Why the slot was dropped.
    pub missing: Option<String>,
}

/// Formats a person's name with a marker for chairs
pub fn format_person_name(person: &Person) -> String {
    if person.can_chair {
        format!("{} (chair)", person.name)
    } else {
        person.name.clone()
    }
}

pub fn report_rows(roster: &Roster, allocation: &Allocation) -> Vec<ReportRow> {
    roster
        .iter()
        .map(|person| {
            let workload = allocation.context.workload(&person.email).cloned().unwrap_or_default();
            ReportRow {
                email: person.email.clone(),
                name: person.name.clone(),
                can_chair: person.can_chair,
                work: allocation.context.work(&person.email),
                recent_slots: workload.recent_slots,
                new_slots: workload.planned_work(),
                options: allocation
                    .levels
                    .iter()
                    .map(|&level| (level, workload.options_at(level)))
                    .collect(),
            }
        })
        .collect()
}

pub fn schedule_rows(roster: &Roster, allocation: &Allocation) -> Vec<ScheduleRow> {
    allocation
        .outcomes
        .iter()
        .map(|(start, outcome)| {
            let assignment = allocation.ledger.get(start);
            let panel = match outcome {
                SlotOutcome::Assigned(emails) => emails
                    .iter()
                    .map(|email| roster.by_email(email).map_or_else(|| email.clone(), format_person_name))
                    .collect(),
                _ => Vec::new(),
            };
            ScheduleRow {
                start: *start,
                outcome: outcome.clone(),
                panel,
                cost: assignment.map(|a| a.cost()),
                missing: allocation
                    .unfilled
                    .iter()
                    .find(|u| u.start == *start)
                    .map(|u| u.missing.clone()),
            }
        })
        .collect()
}

/// Table of everybody's workload, chairs first marked with `*`.
pub fn format_report(rows: &[ReportRow], levels: &[ConflictLevel]) -> String {
    let mut out = String::new();
    let _ = write!(out, "   {:<30} {:>5} {:>7} {:>4}", "name", "work", "recent", "new");
    for level in levels {
        let _ = write!(out, " {:>5}", format!("L{level}"));
    }
    out.push('\n');
    for row in rows {
        let flag = if row.can_chair { "*" } else { " " };
        let _ = write!(
            out,
            "{flag}  {:<30} {:>5} {:>7} {:>4}",
            row.name, row.work, row.recent_slots, row.new_slots
        );
        for level in levels {
            let _ = write!(out, " {:>5}", row.options.get(level).copied().unwrap_or(0));
        }
        out.push('\n');
    }
    out
}

pub fn format_schedule(rows: &[ScheduleRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let when = row.start.format("%a %Y-%m-%d %H:%M");
        let _ = match (&row.outcome, &row.missing) {
            (SlotOutcome::Assigned(_), _) => writeln!(
                out,
                "{when} -> {} (cost {})",
                row.panel.join(", "),
                row.cost.unwrap_or(0)
            ),
            (_, Some(missing)) => writeln!(out, "{when} -> [DROPPED: no {missing}]"),
            (_, None) => writeln!(out, "{when} -> [EMPTY]"),
        };
    }
    out
}

/// Prints the schedule and the per-person report
pub fn print_allocation(roster: &Roster, allocation: &Allocation) {
    let schedule = schedule_rows(roster, allocation);
    println!("\n=== Panels ===");
    println!(
        "Viable panels: {} of {} new slots",
        allocation.viable_count(),
        allocation.outcomes.len()
    );
    if !allocation.unfilled.is_empty() {
        println!("⚠️  Dropped slots ({}):", allocation.unfilled.len());
    }
    print!("{}", format_schedule(&schedule));

    println!("\n=== Workload ===");
    print!("{}", format_report(&report_rows(roster, allocation), &allocation.levels));
}

/// Writes the schedule to a file, one slot per line
pub fn write_schedule_to_file<P: AsRef<Path>>(roster: &Roster, allocation: &Allocation, path: P) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "** Interview panels **")?;
    file.write_all(format_schedule(&schedule_rows(roster, allocation)).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::engine::Allocator;
    use crate::allocation::levels::ConflictTable;
    use crate::allocation::types::Slot;
    use crate::config::AllocatorConfig;
    use crate::writeback::NoWriteBack;
    use chrono::{Duration, TimeZone, Utc};

    fn run() -> (Roster, Allocation) {
        let mut chair = Person::new("Ada", "ada@x");
        chair.can_chair = true;
        let roster = Roster::new(vec![chair, Person::new("Bob", "bob@x")]);
        let start = Utc.with_ymd_and_hms(2024, 3, 11, 10, 15, 0).unwrap();
        let slots = vec![Slot::new(start, start + Duration::minutes(150), true)];
        let config = AllocatorConfig::default();
        let allocation = Allocator::new(slots, &roster, &config)
            .allocate(&ConflictTable::all_free(), &mut NoWriteBack)
            .unwrap();
        (roster, allocation)
    }

    #[test]
    fn report_lists_everyone_with_options() {
        let (roster, allocation) = run();
        let rows = report_rows(&roster, &allocation);
        assert_eq!(rows.len(), 2);
        let ada = rows.iter().find(|r| r.email == "ada@x").unwrap();
        assert!(ada.can_chair);
        assert_eq!(ada.options.get(&ConflictLevel::FREE), Some(&1));

        let text = format_report(&rows, &allocation.levels);
        assert!(text.contains("L1"));
        assert!(text.lines().any(|l| l.starts_with('*') && l.contains("Ada")));
    }

    #[test]
    fn dropped_slots_show_what_was_missing() {
        let (roster, allocation) = run();
        // Two people can never make a panel of three.
        let rows = schedule_rows(&roster, &allocation);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outcome, SlotOutcome::Cleared);
        assert!(rows[0].missing.is_some());
        assert!(format_schedule(&rows).contains("[DROPPED"));
    }

    #[test]
    fn schedule_file_has_a_header() {
        let (roster, allocation) = run();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panels.txt");
        write_schedule_to_file(&roster, &allocation, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("** Interview panels **"));
        assert_eq!(text.lines().count(), 2);
    }
}

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::context::AllocationContext;
use crate::config::WorkShareConfig;
use crate::roster::Person;

/// How many more slots each person should be offered in this pass.
///
/// Everybody's existing work plus the slots to fill is split evenly, scaled
/// by each person's `use_rate`. People already past their share get nothing.
/// The fractional shares are then scaled to the number of slots and rounded
/// up, nudging the rounding point until the total offered reaches
/// `slots_to_fill + rounding_margin` (or the sweep runs out). People whose
/// share rounds to zero are left out.
pub fn work_share(
    slots_to_fill: usize,
    people: &[&Person],
    ctx: &AllocationContext,
    config: &WorkShareConfig,
) -> BTreeMap<String, u32> {
    if slots_to_fill == 0 || people.is_empty() {
        return BTreeMap::new();
    }

    let work_done: f64 = people.iter().map(|p| ctx.work(&p.email) as f64).sum();
    let average_work = (work_done + slots_to_fill as f64) / people.len() as f64;

    let mut raw: BTreeMap<String, f64> = people
        .iter()
        .map(|p| {
            let share = average_work * p.use_rate - ctx.work(&p.email) as f64;
            (p.email.clone(), share.max(0.0))
        })
        .collect();

    if raw.values().sum::<f64>() <= 0.0 {
        // Low use rates can leave everyone over their share; fall back to
        // splitting by use rate alone.
        raw = people
            .iter()
            .map(|p| (p.email.clone(), p.use_rate.max(0.0)))
            .collect();
        if raw.values().sum::<f64>() <= 0.0 {
            warn!(slots_to_fill, "Nobody has a non-zero use rate, no work to share");
            return BTreeMap::new();
        }
    }

    let target = slots_to_fill as u64 + config.rounding_margin as u64;
    let last_step = (config.max_rounding_offset * 10.0).round() as i32;
    let mut shares = BTreeMap::new();
    for step in -9..=last_step {
        shares = normalised_work_share(slots_to_fill, &raw, step as f64 * 0.1);
        if total(&shares) >= target {
            break;
        }
    }

    for (email, share) in &shares {
        debug!(email = %email, share, "Work share");
    }
    debug!(total = total(&shares), slots_to_fill, "Work share total");
    shares
}

/// Scales `raw` to sum to `slots_to_fill`, then rounds each share up after
/// adding `rounding_point`. Zero shares are dropped, whatever the rounding
/// point.
pub fn normalised_work_share(
    slots_to_fill: usize,
    raw: &BTreeMap<String, f64>,
    rounding_point: f64,
) -> BTreeMap<String, u32> {
    let sum: f64 = raw.values().sum();
    if sum <= 0.0 {
        return BTreeMap::new();
    }
    let multiplier = slots_to_fill as f64 / sum;
    raw.iter()
        .filter(|(_, work)| **work > 0.0)
        .map(|(email, work)| {
            let share = (work * multiplier + rounding_point).ceil().max(0.0) as u32;
            (email.clone(), share)
        })
        .filter(|(_, share)| *share > 0)
        .collect()
}

fn total(shares: &BTreeMap<String, u32>) -> u64 {
    shares.values().map(|&s| s as u64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::context::AllocationContext;
    use crate::allocation::ledger::{SlotAssignment, SlotAssignments};
    use crate::allocation::types::{Booking, Guests, Slot};
    use crate::roster::Roster;
    use chrono::{TimeZone, Utc};

    fn roster(n: usize) -> Roster {
        Roster::new(
            (0..n)
                .map(|i| Person::new(&format!("P{i}"), &format!("p{i}@x")))
                .collect(),
        )
    }

    fn earlier() -> WorkShareConfig {
        WorkShareConfig {
            rounding_margin: 0,
            max_rounding_offset: 0.0,
        }
    }

    #[test]
    fn nothing_to_fill_shares_nothing() {
        let roster = roster(3);
        let ctx = AllocationContext::new(&roster, 3);
        let people: Vec<&Person> = roster.iter().collect();
        assert!(work_share(0, &people, &ctx, &WorkShareConfig::default()).is_empty());
    }

    #[test]
    fn equal_people_split_evenly() {
        let roster = roster(4);
        let ctx = AllocationContext::new(&roster, 3);
        let people: Vec<&Person> = roster.iter().collect();
        let shares = work_share(4, &people, &ctx, &earlier());
        // Each raw share is 1.0; offset -0.9 already rounds to 1 each.
        assert_eq!(shares.values().copied().collect::<Vec<_>>(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn busy_people_get_no_share() {
        let roster = roster(3);
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 10, 15, 0).unwrap();
        let old = Slot::new(start, start + chrono::Duration::minutes(150), false).with_booking(Booking {
            summary: "Interview with candidate".into(),
            guests: Guests {
                accepted: vec!["p0@x".into()],
                ..Guests::default()
            },
        });
        let ledger = SlotAssignments::new([SlotAssignment::new(old, &roster)]);
        let ctx = AllocationContext::from_ledger(&roster, &ledger, 3);
        assert_eq!(ctx.work("p0@x"), 4);

        let people: Vec<&Person> = roster.iter().collect();
        let shares = work_share(2, &people, &ctx, &earlier());
        // Average is (4 + 2) / 3 = 2, so p0 is already over.
        assert!(!shares.contains_key("p0@x"));
        assert!(shares.values().sum::<u32>() >= 2);
    }

    #[test]
    fn margin_offers_extra_capacity() {
        let roster = roster(4);
        let ctx = AllocationContext::new(&roster, 3);
        let people: Vec<&Person> = roster.iter().collect();
        let shares = work_share(4, &people, &ctx, &WorkShareConfig::default());
        // Reaching 4 + 5 is impossible, so the sweep ends at +1.0: ceil(2.0).
        assert_eq!(shares.values().sum::<u32>(), 8);
    }

    #[test]
    fn use_rate_scales_share() {
        let mut people_owned: Vec<Person> = (0..2)
            .map(|i| Person::new(&format!("P{i}"), &format!("p{i}@x")))
            .collect();
        people_owned[0].use_rate = 3.0;
        let roster = Roster::new(people_owned);
        let ctx = AllocationContext::new(&roster, 3);
        let people: Vec<&Person> = roster.iter().collect();
        let shares = work_share(4, &people, &ctx, &earlier());
        assert!(shares["p0@x"] > shares.get("p1@x").copied().unwrap_or(0));
    }

    #[test]
    fn zero_use_rate_everywhere_shares_nothing() {
        let mut people_owned = vec![Person::new("A", "a@x")];
        people_owned[0].use_rate = 0.0;
        let roster = Roster::new(people_owned);
        let ctx = AllocationContext::new(&roster, 3);
        let people: Vec<&Person> = roster.iter().collect();
        assert!(work_share(3, &people, &ctx, &earlier()).is_empty());
    }

    #[test]
    fn normalisation_drops_zero_shares() {
        let raw: BTreeMap<String, f64> = [("a".to_string(), 3.0), ("b".to_string(), 0.0)].into();
        let shares = normalised_work_share(3, &raw, 0.0);
        assert_eq!(shares.len(), 1);
        assert_eq!(shares["a"], 3);
        // Rounding up never hands work to someone with no share.
        let shares = normalised_work_share(3, &raw, 0.5);
        assert!(!shares.contains_key("b"));
    }
}

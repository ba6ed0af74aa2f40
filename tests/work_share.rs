use chrono::{NaiveDate, Datelike};
use proptest::prelude::*;

use panel_allocator::allocation::{work_share, AllocationContext};
use panel_allocator::config::WorkShareConfig;
use panel_allocator::{Person, Roster};

fn setup(people: &[(f64, u32)]) -> (Roster, AllocationContext) {
    let roster = Roster::new(
        people
            .iter()
            .enumerate()
            .map(|(i, (use_rate, _))| {
                let mut p = Person::new(&format!("P{i}"), &format!("p{i}@x"));
                p.use_rate = *use_rate;
                p
            })
            .collect(),
    );
    let week = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap().iso_week();
    let mut ctx = AllocationContext::new(&roster, 3);
    for (i, (_, work)) in people.iter().enumerate() {
        for _ in 0..*work {
            ctx.record_assignment(&format!("p{i}@x"), week);
        }
    }
    (roster, ctx)
}

proptest! {
    #[test]
    fn shares_cover_the_slots(
        people in prop::collection::vec((0.0f64..3.0, 0u32..6), 1..8),
        slots in 1usize..20,
        margin in 0u32..6,
        offset in 0.0f64..=1.0,
    ) {
        prop_assume!(people.iter().any(|(rate, _)| *rate > 0.0));
        let (roster, ctx) = setup(&people);
        let everyone: Vec<&Person> = roster.iter().collect();
        let config = WorkShareConfig { rounding_margin: margin, max_rounding_offset: offset };

        let shares = work_share(slots, &everyone, &ctx, &config);
        prop_assert!(shares.values().all(|&s| s > 0));
        prop_assert!(shares.keys().all(|email| roster.by_email(email).is_some()));
        prop_assert!(shares.values().map(|&s| s as usize).sum::<usize>() >= slots);
    }

    #[test]
    fn nothing_to_fill_means_no_shares(
        people in prop::collection::vec((0.0f64..3.0, 0u32..6), 0..8),
    ) {
        let (roster, ctx) = setup(&people);
        let everyone: Vec<&Person> = roster.iter().collect();
        prop_assert!(work_share(0, &everyone, &ctx, &WorkShareConfig::default()).is_empty());
    }

    #[test]
    fn zero_use_rate_gets_nothing_while_others_can_work(
        work in 0u32..4,
        slots in 1usize..10,
    ) {
        let (roster, ctx) = setup(&[(0.0, work), (1.0, 0), (1.0, 0)]);
        let everyone: Vec<&Person> = roster.iter().collect();
        let shares = work_share(slots, &everyone, &ctx, &WorkShareConfig::default());
        prop_assert!(!shares.contains_key("p0@x"));
    }
}

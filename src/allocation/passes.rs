use std::collections::HashMap;
use std::fmt;

use super::ledger::SlotAssignment;
use super::types::ConflictLevel;
use crate::config::{AllocatorConfig, DiversityConfig};
use crate::roster::{Person, Roster};

/// A property a panel needs, and who can supply it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Chair,
    Frontend,
    TwoTechnical,
    Bame(String),
    Gender(String),
    TwoCivilServants,
    FullPanel,
}

impl Requirement {
    /// True while the slot still lacks this property.
    pub fn is_missing(&self, assignment: &SlotAssignment) -> bool {
        match self {
            Requirement::Chair => !assignment.has_chair(),
            Requirement::Frontend => !assignment.can_be_frontend(),
            Requirement::TwoTechnical => !assignment.has_two_tech(),
            Requirement::Bame(category) => !assignment.has_bame(category),
            Requirement::Gender(gender) => !assignment.has_gender(gender),
            Requirement::TwoCivilServants => !assignment.has_two_civil_servants(),
            Requirement::FullPanel => !assignment.is_full(),
        }
    }

    /// True if `person` supplies this property.
    pub fn is_eligible(&self, person: &Person) -> bool {
        match self {
            Requirement::Chair => person.can_chair,
            Requirement::Frontend => person.can_do_frontend_test,
            Requirement::TwoTechnical => person.technical,
            Requirement::Bame(category) => &person.bame == category,
            Requirement::Gender(gender) => &person.gender == gender,
            Requirement::TwoCivilServants => person.civil_servant,
            Requirement::FullPanel => true,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Chair => write!(f, "chair"),
            Requirement::Frontend => write!(f, "frontend interviewer"),
            Requirement::TwoTechnical => write!(f, "two technical people"),
            Requirement::Bame(category) => write!(f, "bame={category}"),
            Requirement::Gender(gender) => write!(f, "gender={gender}"),
            Requirement::TwoCivilServants => write!(f, "two civil servants"),
            Requirement::FullPanel => write!(f, "three people"),
        }
    }
}

/// One step of the allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub requirement: Requirement,
    /// Fraction of all new slots that should end up with the property.
    pub fill_rate: f64,
    pub max_level: Option<ConflictLevel>,
    /// Run again while it keeps making assignments.
    pub repeat: bool,
    /// Drop slots still missing the property afterwards.
    pub drop_unfilled: bool,
}

impl Pass {
    fn required(requirement: Requirement) -> Self {
        Self {
            requirement,
            fill_rate: 1.0,
            max_level: None,
            repeat: false,
            drop_unfilled: true,
        }
    }

    fn repeated(requirement: Requirement) -> Self {
        Self {
            repeat: true,
            ..Self::required(requirement)
        }
    }

    /// Fills only part of the slots and never drops any.
    fn partial(requirement: Requirement, fill_rate: f64) -> Self {
        Self {
            fill_rate,
            drop_unfilled: false,
            ..Self::required(requirement)
        }
    }
}

/// The ordered passes of a run: chair, frontend, technical, bame, gender,
/// civil servants, full panel.
pub fn plan(config: &AllocatorConfig, roster: &Roster) -> Vec<Pass> {
    let mut passes = vec![
        Pass::required(Requirement::Chair),
        Pass::partial(Requirement::Frontend, config.frontend_fill_rate),
        Pass::repeated(Requirement::TwoTechnical),
    ];
    passes.extend(diversity_passes(&config.bame, roster, |p| &p.bame, Requirement::Bame));
    passes.extend(diversity_passes(
        &config.gender,
        roster,
        |p| &p.gender,
        Requirement::Gender,
    ));
    passes.push(Pass::repeated(Requirement::TwoCivilServants));
    passes.push(Pass::repeated(Requirement::FullPanel));
    passes
}

/// One pass per category. The category with strictly the fewest people on
/// the roster is only filled at the axis' scarce rate.
fn diversity_passes(
    axis: &DiversityConfig,
    roster: &Roster,
    value: fn(&Person) -> &String,
    requirement: fn(String) -> Requirement,
) -> Vec<Pass> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for person in roster.iter() {
        *counts.entry(value(person).as_str()).or_insert(0) += 1;
    }
    let count = |category: &String| counts.get(category.as_str()).copied().unwrap_or(0);
    let fewest = axis.categories.iter().map(count).min();
    let ties = axis
        .categories
        .iter()
        .filter(|c| Some(count(c)) == fewest)
        .count();

    axis.categories
        .iter()
        .map(|category| {
            let mut pass = if ties == 1 && Some(count(category)) == fewest && axis.scarce_fill_rate < 1.0 {
                Pass::partial(requirement(category.clone()), axis.scarce_fill_rate)
            } else {
                Pass::required(requirement(category.clone()))
            };
            pass.max_level = axis.max_conflict_level;
            pass
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        let mut people = Vec::new();
        for (i, (gender, bame)) in [("f", "n"), ("m", "n"), ("m", "y"), ("f", "n")].iter().enumerate() {
            let mut p = Person::new(&format!("P{i}"), &format!("p{i}@x"));
            p.gender = gender.to_string();
            p.bame = bame.to_string();
            people.push(p);
        }
        Roster::new(people)
    }

    #[test]
    fn plan_runs_in_the_documented_order() {
        let passes = plan(&AllocatorConfig::default(), &roster());
        let order: Vec<String> = passes.iter().map(|p| p.requirement.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "chair",
                "frontend interviewer",
                "two technical people",
                "bame=y",
                "bame=n",
                "gender=f",
                "gender=m",
                "two civil servants",
                "three people",
            ]
        );
    }

    #[test]
    fn scarce_bame_category_is_partially_filled() {
        let passes = plan(&AllocatorConfig::default(), &roster());
        let bame_y = passes.iter().find(|p| p.requirement == Requirement::Bame("y".into())).unwrap();
        assert_eq!(bame_y.fill_rate, 0.5);
        assert!(!bame_y.drop_unfilled);
        let bame_n = passes.iter().find(|p| p.requirement == Requirement::Bame("n".into())).unwrap();
        assert_eq!(bame_n.fill_rate, 1.0);
        assert!(bame_n.drop_unfilled);
    }

    #[test]
    fn gender_passes_are_capped_and_required() {
        let passes = plan(&AllocatorConfig::default(), &roster());
        let gender: Vec<&Pass> = passes
            .iter()
            .filter(|p| matches!(p.requirement, Requirement::Gender(_)))
            .collect();
        assert_eq!(gender.len(), 2);
        for pass in gender {
            // Two of each gender: a tie, so neither is scarce.
            assert_eq!(pass.fill_rate, 1.0);
            assert_eq!(pass.max_level, Some(ConflictLevel::CONTENDED));
        }
    }

    #[test]
    fn frontend_never_drops() {
        let passes = plan(&AllocatorConfig::default(), &roster());
        assert_eq!(passes[1].fill_rate, 0.5);
        assert!(!passes[1].drop_unfilled);
        assert!(passes[2].repeat);
    }
}

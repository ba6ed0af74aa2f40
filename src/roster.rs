use csv::{Reader, StringRecord};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AllocError, Result};

/// Someone who can sit on interview panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub can_chair: bool,
    #[serde(default)]
    pub technical: bool,
    #[serde(default)]
    pub can_do_frontend_test: bool,
    #[serde(default)]
    pub civil_servant: bool,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub bame: String,
    #[serde(default)]
    pub team: Option<String>,
    /// Multiplier on the fair share of work.
    #[serde(default = "default_use_rate")]
    pub use_rate: f64,
    /// Most slots per ISO week, if capped.
    #[serde(default)]
    pub use_freq: Option<u32>,
}

fn default_use_rate() -> f64 {
    1.0
}

impl Person {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            can_chair: false,
            technical: false,
            can_do_frontend_test: false,
            civil_servant: false,
            gender: String::new(),
            bame: String::new(),
            team: None,
            use_rate: 1.0,
            use_freq: None,
        }
    }

    /// Two people clash when they belong to the same named team.
    pub fn same_team(&self, other: &Person) -> bool {
        match (&self.team, &other.team) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Everyone known to the allocator, addressable by email.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    people: BTreeMap<String, Person>,
}

impl Roster {
    pub fn new(people: Vec<Person>) -> Self {
        let mut map = BTreeMap::new();
        for person in people {
            if let Some(previous) = map.insert(person.email.clone(), person) {
                warn!(email = %previous.email, "Duplicate roster entry, keeping the later one");
            }
        }
        Self { people: map }
    }

    pub fn by_email(&self, email: &str) -> Option<&Person> {
        self.people.get(email)
    }

    /// People in email order.
    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.people.values()
    }

    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.people.keys().map(|e| e.as_str())
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

/// Parses a yes/no column. Anything starting with "y" is yes.
fn parse_bool(value: &str) -> bool {
    value.trim().to_lowercase().starts_with('y')
}

fn parse_category(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Finds a column by header name, ignoring case and surrounding spaces.
fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Loads the roster from a CSV file with a header row.
///
/// Expected columns: `name, email, can_chair, technical,
/// can_do_frontend_test, civil_servant, gender, bame, team, use_rate,
/// use_freq`. Only `email` is required; the rest default to empty/no.
pub fn load_roster<P: AsRef<Path>>(csv_path: P) -> Result<Roster> {
    let file = std::fs::File::open(csv_path)?;
    read_roster(file)
}

pub fn read_roster<R: Read>(input: R) -> Result<Roster> {
    let mut reader = Reader::from_reader(input);
    let headers = reader.headers()?.clone();

    let email_col = column(&headers, "email").ok_or_else(|| AllocError::InvalidRoster {
        row: 0,
        reason: "missing email column".to_string(),
    })?;
    let name_col = column(&headers, "name");
    let chair_col = column(&headers, "can_chair");
    let technical_col = column(&headers, "technical");
    let frontend_col = column(&headers, "can_do_frontend_test");
    let civil_servant_col = column(&headers, "civil_servant");
    let gender_col = column(&headers, "gender");
    let bame_col = column(&headers, "bame");
    let team_col = column(&headers, "team");
    let use_rate_col = column(&headers, "use_rate");
    let use_freq_col = column(&headers, "use_freq");

    let mut people = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        // Header is line 1.
        let row = index + 2;
        let get = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("").trim();

        let email = get(Some(email_col)).to_string();
        if email.is_empty() {
            return Err(AllocError::InvalidRoster {
                row,
                reason: "empty email".to_string(),
            });
        }

        let use_rate = match get(use_rate_col) {
            "" => 1.0,
            value => value.parse::<f64>().map_err(|e| AllocError::InvalidRoster {
                row,
                reason: format!("use_rate {value:?}: {e}"),
            })?,
        };
        if !use_rate.is_finite() || use_rate < 0.0 {
            return Err(AllocError::InvalidRoster {
                row,
                reason: format!("use_rate must be a finite number of at least 0, got {use_rate}"),
            });
        }
        let use_freq = match get(use_freq_col) {
            "" => None,
            value => Some(value.parse::<u32>().map_err(|e| AllocError::InvalidRoster {
                row,
                reason: format!("use_freq {value:?}: {e}"),
            })?),
        };
        let team = match get(team_col) {
            "" => None,
            value => Some(value.to_string()),
        };

        people.push(Person {
            name: get(name_col).to_string(),
            email,
            can_chair: parse_bool(get(chair_col)),
            technical: parse_bool(get(technical_col)),
            can_do_frontend_test: parse_bool(get(frontend_col)),
            civil_servant: parse_bool(get(civil_servant_col)),
            gender: parse_category(get(gender_col)),
            bame: parse_category(get(bame_col)),
            team,
            use_rate,
            use_freq,
        });
    }

    debug!(count = people.len(), "Loaded roster");
    Ok(Roster::new(people))
}

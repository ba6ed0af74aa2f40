use std::path::Path;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};

use crate::allocation::types::ConflictLevel;
use crate::error::{AllocError, Result};

/// Tuning for the work-share calculation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkShareConfig {
    /// How far past the number of slots the rounded shares must reach.
    /// Zero means just reaching the number of slots is enough.
    pub rounding_margin: u32,
    /// Last rounding offset tried. The sweep starts at -0.9 and moves in
    /// steps of 0.1.
    pub max_rounding_offset: f64,
}

impl Default for WorkShareConfig {
    fn default() -> Self {
        Self {
            rounding_margin: 5,
            max_rounding_offset: 1.0,
        }
    }
}

/// One diversity axis (gender, bame) and how hard to push for each value.
#[derive(Debug, Clone, PartialEq)]
pub struct DiversityConfig {
    /// Every value a panel should contain, filled in this order.
    pub categories: Vec<String>,
    /// Fraction of new slots to fill for the category with the fewest
    /// people on the roster.
    pub scarce_fill_rate: f64,
    /// Highest conflict level tried when filling this axis.
    pub max_conflict_level: Option<ConflictLevel>,
}

impl DiversityConfig {
    pub fn bame() -> Self {
        Self {
            categories: vec!["y".to_string(), "n".to_string()],
            scarce_fill_rate: 0.5,
            max_conflict_level: None,
        }
    }

    pub fn gender() -> Self {
        Self {
            categories: vec!["f".to_string(), "m".to_string()],
            scarce_fill_rate: 1.0,
            max_conflict_level: Some(ConflictLevel::CONTENDED),
        }
    }

    fn validate(&self, axis: &str) -> Result<()> {
        if self.categories.is_empty() {
            return Err(AllocError::InvalidConfig(format!("{axis}.categories must not be empty")));
        }
        if !(0.0..=1.0).contains(&self.scarce_fill_rate) {
            return Err(AllocError::InvalidConfig(format!(
                "{axis}.scarce_fill_rate must be within 0..=1, got {}",
                self.scarce_fill_rate
            )));
        }
        Ok(())
    }
}

/// A `[bame]` or `[gender]` table as written. Missing keys keep the
/// axis' own defaults.
#[derive(Debug, Deserialize)]
struct DiversityTable {
    categories: Option<Vec<String>>,
    scarce_fill_rate: Option<f64>,
    max_conflict_level: Option<ConflictLevel>,
}

impl DiversityTable {
    fn over(self, base: DiversityConfig) -> DiversityConfig {
        DiversityConfig {
            categories: self.categories.unwrap_or(base.categories),
            scarce_fill_rate: self.scarce_fill_rate.unwrap_or(base.scarce_fill_rate),
            max_conflict_level: self.max_conflict_level.or(base.max_conflict_level),
        }
    }
}

fn bame_axis<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<DiversityConfig, D::Error> {
    Ok(DiversityTable::deserialize(deserializer)?.over(DiversityConfig::bame()))
}

fn gender_axis<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<DiversityConfig, D::Error> {
    Ok(DiversityTable::deserialize(deserializer)?.over(DiversityConfig::gender()))
}

/// Where slots come from when they are generated rather than supplied.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlotWindowConfig {
    pub lookback_days: i64,
    pub lookahead_days: i64,
    /// Slots on or after `today + new_after_days` are open for allocation.
    pub new_after_days: i64,
    /// Start times of the daily slots, "HH:MM" local time.
    pub start_times: Vec<String>,
    pub length_minutes: i64,
    /// IANA time zone the start times are in.
    pub time_zone: String,
}

impl Default for SlotWindowConfig {
    fn default() -> Self {
        Self {
            lookback_days: 28,
            lookahead_days: 28,
            new_after_days: 10,
            start_times: vec!["10:15".to_string(), "14:15".to_string()],
            length_minutes: 150,
            time_zone: "Europe/London".to_string(),
        }
    }
}

impl SlotWindowConfig {
    pub fn parsed_start_times(&self) -> Result<Vec<NaiveTime>> {
        self.start_times
            .iter()
            .map(|s| {
                NaiveTime::parse_from_str(s.trim(), "%H:%M")
                    .map_err(|e| AllocError::InvalidConfig(format!("slot start time {s:?}: {e}")))
            })
            .collect()
    }

    pub fn parsed_time_zone(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| AllocError::InvalidConfig(format!("time zone {:?}: {e}", self.time_zone)))
    }
}

/// Configuration of one allocation run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Nobody sits on two panels starting closer together than this.
    pub spacing_hours: i64,
    /// A real interview counts this many times as much as a reserved slot.
    pub work_of_interview: u32,
    pub work_share: WorkShareConfig,
    /// Fraction of new slots that should get a frontend-capable person.
    pub frontend_fill_rate: f64,
    #[serde(deserialize_with = "bame_axis")]
    pub bame: DiversityConfig,
    #[serde(deserialize_with = "gender_axis")]
    pub gender: DiversityConfig,
    /// Emit an explicit clear for dropped slots instead of leaving whatever
    /// placeholder they had.
    pub clear_dropped_slots: bool,
    /// Hand the write-back the state of every slot after each pass, not
    /// just at the end.
    pub incremental_write_back: bool,
    pub slots: SlotWindowConfig,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            spacing_hours: 23,
            work_of_interview: 3,
            work_share: WorkShareConfig::default(),
            frontend_fill_rate: 0.5,
            bame: DiversityConfig::bame(),
            gender: DiversityConfig::gender(),
            clear_dropped_slots: true,
            incremental_write_back: false,
            slots: SlotWindowConfig::default(),
        }
    }
}

impl AllocatorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AllocatorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.spacing_hours < 0 {
            return Err(AllocError::InvalidConfig("spacing_hours must not be negative".into()));
        }
        if !(0.0..=1.0).contains(&self.frontend_fill_rate) {
            return Err(AllocError::InvalidConfig(format!(
                "frontend_fill_rate must be within 0..=1, got {}",
                self.frontend_fill_rate
            )));
        }
        self.bame.validate("bame")?;
        self.gender.validate("gender")?;
        // Below zero the rounded shares can fall short of the slots to fill.
        if !(0.0..=1.0).contains(&self.work_share.max_rounding_offset) {
            return Err(AllocError::InvalidConfig(
                "work_share.max_rounding_offset must be within 0..=1".into(),
            ));
        }
        self.slots.parsed_start_times()?;
        self.slots.parsed_time_zone()?;
        Ok(())
    }

    pub fn spacing(&self) -> chrono::Duration {
        chrono::Duration::hours(self.spacing_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AllocatorConfig::from_toml_str("").unwrap();
        assert_eq!(config.spacing_hours, 23);
        assert_eq!(config.work_share.rounding_margin, 5);
        assert_eq!(config.bame.categories, vec!["y", "n"]);
        assert_eq!(config.gender.max_conflict_level, Some(ConflictLevel::CONTENDED));
        assert!(config.clear_dropped_slots);
    }

    #[test]
    fn earlier_rounding_behaviour_is_selectable() {
        let config = AllocatorConfig::from_toml_str(
            "clear_dropped_slots = false\n[work_share]\nrounding_margin = 0\nmax_rounding_offset = 0.0\n",
        )
        .unwrap();
        assert_eq!(config.work_share.rounding_margin, 0);
        assert_eq!(config.work_share.max_rounding_offset, 0.0);
        assert!(!config.clear_dropped_slots);
    }

    #[test]
    fn rejects_fill_rate_above_one() {
        let err = AllocatorConfig::from_toml_str("frontend_fill_rate = 1.5").unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig(_)));
    }

    #[test]
    fn partial_axis_table_keeps_the_axis_defaults() {
        let config = AllocatorConfig::from_toml_str("[gender]\nmax_conflict_level = 2\n").unwrap();
        assert_eq!(config.gender.categories, vec!["f", "m"]);
        assert_eq!(config.gender.max_conflict_level, Some(ConflictLevel::LIGHT));
        assert_eq!(config.gender.scarce_fill_rate, 1.0);

        let config = AllocatorConfig::from_toml_str("[bame]\nscarce_fill_rate = 0.25\n").unwrap();
        assert_eq!(config.bame.categories, vec!["y", "n"]);
        assert_eq!(config.bame.scarce_fill_rate, 0.25);
        assert_eq!(config.bame.max_conflict_level, None);
    }

    #[test]
    fn rejects_empty_axis_categories() {
        let err = AllocatorConfig::from_toml_str("[bame]\ncategories = []\n").unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_unknown_time_zone() {
        let err = AllocatorConfig::from_toml_str("[slots]\ntime_zone = \"Europe/Atlantis\"").unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_bad_slot_time() {
        let err = AllocatorConfig::from_toml_str("[slots]\nstart_times = [\"25:00\"]").unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig(_)));
    }
}

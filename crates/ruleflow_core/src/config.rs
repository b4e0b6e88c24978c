//! Rule tuning knobs supplied by the host.
//!
//! # Invariants
//! - `RuleConfig::default()` reproduces the production constants.
//! - A config is validated once, before any rule is built from it.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Largest page the store is asked for in one round-trip.
pub const MAX_PAGE_SIZE: u32 = 5000;
pub const DEFAULT_NO_MATERIALS_PLACEHOLDER: &str = "No materials required for this course.";
pub const DEFAULT_MATERIALS_SEPARATOR: &str = ",\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    PageSizeOutOfRange(u32),
    EmptyPlaceholder,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageSizeOutOfRange(value) => {
                write!(f, "page_size `{value}` must be within 1..={MAX_PAGE_SIZE}")
            }
            Self::EmptyPlaceholder => write!(f, "no_materials_placeholder must not be blank"),
        }
    }
}

impl Error for ConfigError {}

/// Settings shared by the built-in rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleConfig {
    /// Page size used for every multi-record retrieval.
    pub page_size: u32,
    /// Summary written when a course has no materials.
    pub no_materials_placeholder: String,
    /// Separator between material names in the summary.
    pub materials_separator: String,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            no_materials_placeholder: DEFAULT_NO_MATERIALS_PLACEHOLDER.to_string(),
            materials_separator: DEFAULT_MATERIALS_SEPARATOR.to_string(),
        }
    }
}

impl RuleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::PageSizeOutOfRange(self.page_size));
        }
        if self.no_materials_placeholder.trim().is_empty() {
            return Err(ConfigError::EmptyPlaceholder);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RuleConfig};

    #[test]
    fn defaults_are_valid_production_constants() {
        let config = RuleConfig::default();
        config.validate().unwrap();
        assert_eq!(config.page_size, 5000);
        assert_eq!(
            config.no_materials_placeholder,
            "No materials required for this course."
        );
        assert_eq!(config.materials_separator, ",\n");
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: RuleConfig = serde_json::from_str(r#"{ "page_size": 2 }"#).unwrap();
        assert_eq!(config.page_size, 2);
        assert_eq!(config.materials_separator, ",\n");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = serde_json::from_str::<RuleConfig>(r#"{ "pagesize": 2 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn passing_grade_is_not_configurable() {
        let result = serde_json::from_str::<RuleConfig>(r#"{ "passing_grade": 60 }"#);
        assert!(result.unwrap_err().to_string().contains("passing_grade"));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let oversized = RuleConfig {
            page_size: 5001,
            ..RuleConfig::default()
        };
        assert_eq!(
            oversized.validate().unwrap_err(),
            ConfigError::PageSizeOutOfRange(5001)
        );

        let blank = RuleConfig {
            no_materials_placeholder: "  ".to_string(),
            ..RuleConfig::default()
        };
        assert_eq!(blank.validate().unwrap_err(), ConfigError::EmptyPlaceholder);
    }
}

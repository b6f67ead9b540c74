use crate::error::{LedgerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Amount two split partitions may differ from their source by.
pub const DEFAULT_SPLIT_TOLERANCE: f64 = 0.01;

/// Label used for records with no value in a tag dimension.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Day,
    /// Weeks start on Monday.
    Week,
    #[default]
    Month,
    Year,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LedgerConfig {
    #[schemars(
        description = "Treasury balance immediately before the earliest tracked transaction."
    )]
    pub opening_balance: f64,

    #[schemars(description = "Maximum difference allowed between a split source and the sum of its children.")]
    pub split_tolerance: f64,

    #[schemars(description = "Bucket size used for date charts when none is requested.")]
    pub default_time_unit: TimeUnit,

    #[schemars(description = "Label for records with no category or trip tag.")]
    pub uncategorized_label: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            opening_balance: 0.0,
            split_tolerance: DEFAULT_SPLIT_TOLERANCE,
            default_time_unit: TimeUnit::default(),
            uncategorized_label: UNCATEGORIZED.to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.opening_balance.is_finite() {
            return Err(LedgerError::InvalidConfig(format!(
                "opening_balance must be a finite number, got {}",
                self.opening_balance
            )));
        }

        if !self.split_tolerance.is_finite() || self.split_tolerance < 0.0 {
            return Err(LedgerError::InvalidConfig(format!(
                "split_tolerance must be a non-negative number, got {}",
                self.split_tolerance
            )));
        }

        if self.uncategorized_label.trim().is_empty() {
            return Err(LedgerError::InvalidConfig(
                "uncategorized_label must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(LedgerConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = LedgerConfig::from_json(r#"{"opening_balance": 1500.25}"#).unwrap();
        assert_eq!(config.opening_balance, 1500.25);
        assert_eq!(config.split_tolerance, DEFAULT_SPLIT_TOLERANCE);
        assert_eq!(config.default_time_unit, TimeUnit::Month);
        assert_eq!(config.uncategorized_label, UNCATEGORIZED);
    }

    #[test]
    fn test_time_unit_names() {
        let config = LedgerConfig::from_json(r#"{"default_time_unit": "week"}"#).unwrap();
        assert_eq!(config.default_time_unit, TimeUnit::Week);
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let result = LedgerConfig::from_json(r#"{"split_tolerance": -1.0}"#);
        assert!(matches!(result, Err(LedgerError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let result = LedgerConfig::from_json("{not json");
        assert!(matches!(result, Err(LedgerError::Serialization(_))));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = LedgerConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("opening_balance"));
        assert!(schema_json.contains("split_tolerance"));
    }
}

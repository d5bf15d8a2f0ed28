//! Extraction configuration: which metrics to request and which timezone
//! anchors the default reporting window.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    /// Cost-and-usage metrics to request, e.g. `["AmortizedCost",
    /// "UsageQuantity"]`. This list statically determines the row shape:
    /// each metric contributes one numeric amount column and one string
    /// unit column, for both the per-service values and the daily totals.
    pub metrics: Vec<String>,

    /// IANA timezone used to resolve the default `yesterday..today`
    /// reporting window when no explicit period is given.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

fn default_timezone() -> Tz {
    chrono_tz::UTC
}

impl ExtractConfig {
    /// Validate the extraction configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.metrics.is_empty() {
            return Err("extract.metrics must list at least one metric".to_string());
        }
        if self.metrics.iter().any(|m| m.trim().is_empty()) {
            return Err("extract.metrics must not contain empty metric names".to_string());
        }
        let mut seen = std::collections::BTreeSet::new();
        for metric in &self.metrics {
            if !seen.insert(metric.as_str()) {
                return Err(format!("extract.metrics lists '{}' more than once", metric));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(metrics: &[&str]) -> ExtractConfig {
        ExtractConfig {
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            timezone: chrono_tz::UTC,
        }
    }

    #[test]
    fn test_valid_metrics() {
        assert!(config(&["AmortizedCost", "UsageQuantity"]).validate().is_ok());
    }

    #[test]
    fn test_empty_metric_list_rejected() {
        assert!(config(&[]).validate().is_err());
    }

    #[test]
    fn test_blank_metric_rejected() {
        assert!(config(&["AmortizedCost", "  "]).validate().is_err());
    }

    #[test]
    fn test_duplicate_metric_rejected() {
        assert!(config(&["AmortizedCost", "AmortizedCost"]).validate().is_err());
    }
}

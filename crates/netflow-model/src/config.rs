use std::path::Path;

use netflow_solver::SolverConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Optimizer settings that are not part of a request.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub solver: SolverConfig,
    pub model: ModelConfig,
    pub costs: CostConfig,
    pub time: TimeConfig,
    pub service: ServiceConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Upper bound applied to every variable
    pub variable_upper_bound: f64,
    /// `false` leaves variables unbounded above
    pub bound_variables: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            variable_upper_bound: 100_000.0,
            bound_variables: true,
        }
    }
}

impl ModelConfig {
    pub fn upper_bound(&self) -> Option<f64> {
        self.bound_variables.then_some(self.variable_upper_bound)
    }
}

/// Fallbacks used where the network data leaves a cost undefined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Unit production cost for records without `unit_cost`
    pub default_production_cost: f64,
    /// Per-trip cost for vehicle types without `fixed_cost`
    pub default_trip_cost: f64,
    /// Per-unit, per-distance cost for lanes priced by distance
    pub distance_rate: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            default_production_cost: 50.0,
            default_trip_cost: 500.0,
            distance_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Distance covered per time unit, for lanes without `lead_time`
    pub average_speed: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self { average_speed: 60.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service level assumed for lanes without `service_level`
    pub default_service_level: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_service_level: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Variables at or below this value are left out of the report
    pub display_threshold: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            display_threshold: 0.01,
        }
    }
}

impl OptimizerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: OptimizerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a non-negative number, got {}", value),
                })
            }
        }

        non_negative("model.variable_upper_bound", self.model.variable_upper_bound)?;
        non_negative("costs.default_production_cost", self.costs.default_production_cost)?;
        non_negative("costs.default_trip_cost", self.costs.default_trip_cost)?;
        non_negative("costs.distance_rate", self.costs.distance_rate)?;
        non_negative("report.display_threshold", self.report.display_threshold)?;
        non_negative("solver.tolerance", self.solver.tolerance)?;

        if !(self.time.average_speed.is_finite() && self.time.average_speed > 0.0) {
            return Err(ConfigError::Invalid {
                field: "time.average_speed",
                reason: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.service.default_service_level) {
            return Err(ConfigError::Invalid {
                field: "service.default_service_level",
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netflow_solver::IntegerStrategy;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = OptimizerConfig::from_toml_str("").unwrap();
        assert_eq!(config, OptimizerConfig::default());
        assert_eq!(config.model.upper_bound(), Some(100_000.0));
        assert_eq!(config.costs.default_production_cost, 50.0);
        assert_eq!(config.costs.default_trip_cost, 500.0);
        assert_eq!(config.report.display_threshold, 0.01);
    }

    #[test]
    fn test_partial_sections_override() {
        let source = r#"
            [solver]
            max_iterations = 100
            integer_strategy = "round_up"

            [costs]
            default_trip_cost = 250.0
        "#;
        let config = OptimizerConfig::from_toml_str(source).unwrap();

        assert_eq!(config.solver.max_iterations, 100);
        assert_eq!(config.solver.integer_strategy, IntegerStrategy::RoundUp);
        assert_eq!(config.solver.tolerance, 1e-6);
        assert_eq!(config.costs.default_trip_cost, 250.0);
        assert_eq!(config.costs.default_production_cost, 50.0);
    }

    #[test]
    fn test_variable_bounds_can_be_disabled() {
        let config = OptimizerConfig::from_toml_str("[model]\nbound_variables = false\n").unwrap();
        assert_eq!(config.model.upper_bound(), None);

        let config = OptimizerConfig::from_toml_str("[model]\nvariable_upper_bound = 500.0\n").unwrap();
        assert_eq!(config.model.upper_bound(), Some(500.0));
    }

    #[test]
    fn test_rejects_negative_costs() {
        let err = OptimizerConfig::from_toml_str("[costs]\ndistance_rate = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "costs.distance_rate", .. }));
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let err = OptimizerConfig::from_toml_str("[solver]\ninteger_strategy = \"guess\"\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }
}

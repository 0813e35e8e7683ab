use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::IdentityScheme;
use crate::traffic::Demand;

/// Report formats written by an analysis run
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Machine-readable report
    Json,
    /// Link and node traffic tables
    Text,
    /// Graphviz rendering with tree links highlighted
    Dot,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
            ReportFormat::Dot => "dot",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "text" | "txt" => Ok(ReportFormat::Text),
            "dot" => Ok(ReportFormat::Dot),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// Analysis configuration, usually read from YAML
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// DOT topology file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<PathBuf>,
    /// CSV demand list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demands_file: Option<PathBuf>,
    /// Demands given inline instead of a CSV file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub demands: Vec<Demand>,
    /// Route demands over the spanning tree instead of the full topology
    #[serde(default)]
    pub spanning_tree: bool,
    #[serde(default)]
    pub identity: IdentityScheme,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where and how reports are written
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_formats")]
    pub formats: Vec<ReportFormat>,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("stpflow_output")
}

fn default_formats() -> Vec<ReportFormat> {
    vec![ReportFormat::Json, ReportFormat::Text]
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            formats: default_formats(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            topology: None,
            demands_file: None,
            demands: Vec::new(),
            spanning_tree: false,
            identity: IdentityScheme::default(),
            output: OutputConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.topology {
            None => {
                return Err(ValidationError::InvalidTopology(
                    "a topology file is required".to_string(),
                ))
            }
            Some(path) if path.as_os_str().is_empty() => {
                return Err(ValidationError::InvalidTopology(
                    "topology path cannot be empty".to_string(),
                ))
            }
            Some(_) => {}
        }

        if self.demands_file.is_some() && !self.demands.is_empty() {
            return Err(ValidationError::InvalidDemands(
                "give either demands_file or inline demands, not both".to_string(),
            ));
        }

        for (i, demand) in self.demands.iter().enumerate() {
            if demand.source.trim().is_empty() || demand.target.trim().is_empty() {
                return Err(ValidationError::InvalidDemands(format!(
                    "demand #{} has an empty endpoint",
                    i + 1
                )));
            }
        }

        if self.output.directory.as_os_str().is_empty() {
            return Err(ValidationError::InvalidOutput(
                "output directory cannot be empty".to_string(),
            ));
        }
        if self.output.formats.is_empty() {
            return Err(ValidationError::InvalidOutput(
                "at least one report format is required".to_string(),
            ));
        }

        Ok(())
    }

    pub fn wants(&self, format: ReportFormat) -> bool {
        self.output.formats.contains(&format)
    }
}

/// Validation errors for configuration
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid topology configuration: {0}")]
    InvalidTopology(String),
    #[error("Invalid demand configuration: {0}")]
    InvalidDemands(String),
    #[error("Invalid output configuration: {0}")]
    InvalidOutput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
topology: "lab.dot"
spanning_tree: true
identity: hashed
demands:
  - Source: A
    Target: B
    Flow: 10
  - source: B
    target: C
    amount: 2.5
output:
  directory: "reports"
  formats: [json, dot]
"#;

        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.topology, Some(PathBuf::from("lab.dot")));
        assert!(config.spanning_tree);
        assert_eq!(config.identity, IdentityScheme::Hashed);
        assert_eq!(
            config.demands,
            vec![Demand::new("A", "B", 10.0), Demand::new("B", "C", 2.5)]
        );
        assert!(config.wants(ReportFormat::Dot));
        assert!(!config.wants(ReportFormat::Text));
    }

    #[test]
    fn test_defaults() {
        let config: AnalysisConfig = serde_yaml::from_str("topology: net.dot\n").unwrap();

        assert!(!config.spanning_tree);
        assert_eq!(config.identity, IdentityScheme::LabelCodes);
        assert_eq!(config.output, OutputConfig::default());
        assert_eq!(config.output.directory, PathBuf::from("stpflow_output"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let config = AnalysisConfig::default();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidTopology(_))));

        let mut config = AnalysisConfig {
            topology: Some(PathBuf::from("net.dot")),
            demands_file: Some(PathBuf::from("demands.csv")),
            demands: vec![Demand::new("A", "B", 1.0)],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidDemands(_))));

        config.demands_file = None;
        config.demands.push(Demand::new(" ", "B", 1.0));
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidDemands(
                "demand #2 has an empty endpoint".to_string()
            ))
        );

        config.demands.pop();
        config.output.formats.clear();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidOutput(_))));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let yaml = "topology: net.dot\noutput:\n  formats: [pdf]\n";
        assert!(serde_yaml::from_str::<AnalysisConfig>(yaml).is_err());
    }
}

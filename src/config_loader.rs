use crate::config::{AnalysisConfig, ReportFormat};
use crate::graph::IdentityScheme;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse configuration from a YAML file.
///
/// Relative `topology` and `demands_file` paths are resolved against the
/// directory holding the configuration file. Validation is left to the
/// caller so command-line overrides can fill in missing fields first.
pub fn load_config(config_path: &Path) -> Result<AnalysisConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open config file '{}'", config_path.display()))?;

    let mut config: AnalysisConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse config file '{}'", config_path.display()))?;

    if let Some(base) = config_path.parent() {
        config.topology = config.topology.map(|p| resolve(base, p));
        config.demands_file = config.demands_file.map(|p| resolve(base, p));
    }

    Ok(config)
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() && !base.as_os_str().is_empty() {
        base.join(path)
    } else {
        path
    }
}

/// CLI arguments that take precedence over YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub topology: Option<PathBuf>,
    pub demands_file: Option<PathBuf>,
    pub spanning_tree: bool,
    pub identity: Option<IdentityScheme>,
    pub output_directory: Option<PathBuf>,
    pub formats: Option<Vec<ReportFormat>>,
}

/// Apply CLI overrides and validate the result
pub fn apply_overrides(config: &mut AnalysisConfig, overrides: &CliOverrides) -> Result<()> {
    if let Some(topology) = &overrides.topology {
        debug!("Topology override: {:?}", topology);
        config.topology = Some(topology.clone());
    }

    if let Some(demands_file) = &overrides.demands_file {
        debug!("Demand file override: {:?}", demands_file);
        if !config.demands.is_empty() {
            info!("Demand file given on the command line replaces inline demands");
            config.demands.clear();
        }
        config.demands_file = Some(demands_file.clone());
    }

    // A flag can only switch the tree on
    if overrides.spanning_tree {
        config.spanning_tree = true;
    }

    if let Some(identity) = overrides.identity {
        config.identity = identity;
    }

    if let Some(directory) = &overrides.output_directory {
        config.output.directory = directory.clone();
    }

    if let Some(formats) = &overrides.formats {
        config.output.formats = formats.clone();
    }

    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::Demand;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("analysis.yaml");
        std::fs::write(
            &config_path,
            "topology: nets/lab.dot\ndemands_file: /data/demands.csv\nspanning_tree: true\n",
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.topology, Some(dir.path().join("nets/lab.dot")));
        assert_eq!(config.demands_file, Some(PathBuf::from("/data/demands.csv")));
        assert!(config.spanning_tree);
    }

    #[test]
    fn test_load_config_reports_bad_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "topology: [unclosed").unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AnalysisConfig {
            demands: vec![Demand::new("A", "B", 1.0)],
            ..Default::default()
        };

        // Missing topology fails validation until overridden
        assert!(apply_overrides(&mut config, &CliOverrides::default()).is_err());

        let overrides = CliOverrides {
            topology: Some(PathBuf::from("net.dot")),
            demands_file: Some(PathBuf::from("demands.csv")),
            spanning_tree: true,
            identity: Some(IdentityScheme::Hashed),
            output_directory: Some(PathBuf::from("out")),
            formats: Some(vec![ReportFormat::Dot]),
        };
        apply_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.topology, Some(PathBuf::from("net.dot")));
        assert!(config.demands.is_empty());
        assert!(config.spanning_tree);
        assert_eq!(config.identity, IdentityScheme::Hashed);
        assert_eq!(config.output.directory, PathBuf::from("out"));
        assert_eq!(config.output.formats, vec![ReportFormat::Dot]);
    }
}

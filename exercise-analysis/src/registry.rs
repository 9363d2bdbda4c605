//! Immutable, declaratively-loaded exercise definitions.

use std::fs;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;

/// Alert severity for a form check, mirrored verbatim onto published alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// A named inequality on a joint angle that fires a debounced, cooled-down
/// alert when violated.
#[derive(Debug, Clone, Deserialize)]
pub struct FormCheck {
    pub name: String,
    pub joint: (usize, usize, usize),
    pub min_angle: f64,
    pub max_angle: f64,
    pub alert_key: String,
    pub alert_message: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Warning
}

/// One exercise's geometry and form checks, immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct ExerciseDefinition {
    pub name: String,
    pub primary_joint: (usize, usize, usize),
    pub up_angle: f64,
    pub down_angle: f64,
    #[serde(default)]
    pub form_checks: Vec<FormCheck>,
}

#[derive(Debug, Deserialize)]
struct ExercisesFile {
    exercises: IndexMap<String, ExerciseDefinition>,
}

/// Read-only, process-wide table of exercise definitions keyed by a stable
/// string key (e.g. `"squat"`). Shared across pipelines behind an `Arc`.
#[derive(Debug)]
pub struct ExerciseRegistry {
    definitions: IndexMap<String, ExerciseDefinition>,
    keys_in_load_order: Vec<String>,
}

impl ExerciseRegistry {
    /// Loads and validates the YAML file at `path`. A missing file,
    /// unparsable document, or definition missing a required field is a
    /// [`ConfigError`] that should abort startup.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ExercisesFileUnreadable {
            path: path.to_string(),
            source,
        })?;
        let parsed: ExercisesFile = serde_yaml::from_str(&raw)?;
        let keys_in_load_order = parsed.exercises.keys().cloned().collect();

        Ok(Self {
            definitions: parsed.exercises,
            keys_in_load_order,
        })
    }

    /// Looks up a definition by key. Unknown keys are a recoverable,
    /// per-event error, not a panic.
    pub fn get(&self, key: &str) -> Option<&ExerciseDefinition> {
        self.definitions.get(key)
    }

    /// All registered keys, in load order (the order they appear in the
    /// YAML file).
    pub fn list(&self) -> &[String] {
        &self.keys_in_load_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const SAMPLE_YAML: &str = r#"
exercises:
  squat:
    name: Squat
    primary_joint: [11, 13, 15]
    up_angle: 160
    down_angle: 100
    form_checks:
      - name: knee_cave
        joint: [11, 13, 15]
        min_angle: 80
        max_angle: 180
        alert_key: knee_cave
        alert_message: "Keep your knees aligned over your toes"
        severity: warning
  bicep_curl:
    name: "Bicep Curl"
    primary_joint: [5, 7, 9]
    up_angle: 60
    down_angle: 160
"#;

    #[test]
    fn loads_definitions_from_yaml() {
        let file = write_temp_yaml(SAMPLE_YAML);
        let registry = ExerciseRegistry::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(registry.list(), &["squat".to_string(), "bicep_curl".to_string()]);

        let squat = registry.get("squat").unwrap();
        assert_eq!(squat.primary_joint, (11, 13, 15));
        assert_eq!(squat.form_checks.len(), 1);
        assert_eq!(squat.form_checks[0].severity.as_str(), "warning");
    }

    #[test]
    fn unknown_key_is_none_not_panic() {
        let file = write_temp_yaml(SAMPLE_YAML);
        let registry = ExerciseRegistry::load(file.path().to_str().unwrap()).unwrap();
        assert!(registry.get("deadlift").is_none());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ExerciseRegistry::load("/nonexistent/path/exercises.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::ExercisesFileUnreadable { .. }));
    }

    #[test]
    fn unparsable_yaml_is_a_config_error() {
        let file = write_temp_yaml("not: [valid, yaml: structure");
        let err = ExerciseRegistry::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::ExercisesYamlInvalid(_)));
    }

    #[test]
    fn default_severity_is_warning() {
        let file = write_temp_yaml(SAMPLE_YAML);
        let registry = ExerciseRegistry::load(file.path().to_str().unwrap()).unwrap();
        let bicep = registry.get("bicep_curl").unwrap();
        assert!(bicep.form_checks.is_empty());
    }
}

//! Analysis configuration
//!
//! Loaded from a TOML document (`craftcheck.toml`):
//!
//! ```toml
//! workers = 0                       # 0 = one per core, capped at 16
//! minDuplicateStatements = 3
//! duplicationSimilarityThreshold = 0.8
//! perFileTimeoutMs = 5000
//!
//! [rules.TooManyArguments]
//! enabled = true
//! thresholds = { maxParams = 4 }
//!
//! [rules.magic-literal]             # kebab-case ids work too
//! enabled = false
//! ```
//!
//! Unknown keys, unknown rule ids and out-of-range values are rejected when
//! the config is resolved against the rule catalog, so a typo can never
//! silently turn a rule off.

use crate::detectors::RuleInfo;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MIN_DUPLICATE_STATEMENTS: usize = 3;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_PER_FILE_TIMEOUT_MS: u64 = 5_000;
pub const MAX_WORKERS: usize = 16;

/// Config file name looked up by the CLI when no path is given
pub const CONFIG_FILE_NAME: &str = "craftcheck.toml";

/// A configured value; kept loose so type errors can name their key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl ThresholdValue {
    /// Get as f64 (returns None for non-numeric types)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ThresholdValue::Integer(v) => Some(*v as f64),
            ThresholdValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ThresholdValue::Integer(_) => "integer",
            ThresholdValue::Float(_) => "float",
            ThresholdValue::Boolean(_) => "boolean",
            ThresholdValue::String(_) => "string",
        }
    }
}

/// Per-rule section of the config document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<String, ThresholdValue>,
}

/// Configuration as written by the user, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duplicate_statements: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplication_similarity_threshold: Option<ThresholdValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_file_timeout_ms: Option<ThresholdValue>,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
}

impl AnalysisConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Set one rule's enabled flag
    pub fn with_rule_enabled(mut self, rule: &str, enabled: bool) -> Self {
        self.rules.entry(rule.to_string()).or_default().enabled = Some(enabled);
        self
    }

    /// Set one rule threshold
    pub fn with_threshold(mut self, rule: &str, key: &str, value: f64) -> Self {
        let value = if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            ThresholdValue::Integer(value as i64)
        } else {
            ThresholdValue::Float(value)
        };
        self.rules
            .entry(rule.to_string())
            .or_default()
            .thresholds
            .insert(key.to_string(), value);
        self
    }

    /// Validate against the rule catalog and fill in defaults
    pub fn resolve(&self, catalog: &[RuleInfo]) -> Result<ResolvedConfig, ConfigError> {
        let workers = global_count(self.workers.as_ref(), "workers", 0, Some(256))?;
        let min_duplicate_statements = global_count(
            self.min_duplicate_statements.as_ref(),
            "minDuplicateStatements",
            1,
            None,
        )?
        .unwrap_or(DEFAULT_MIN_DUPLICATE_STATEMENTS);
        let per_file_timeout_ms =
            global_count(self.per_file_timeout_ms.as_ref(), "perFileTimeoutMs", 1, None)?
                .map(|v| v as u64)
                .unwrap_or(DEFAULT_PER_FILE_TIMEOUT_MS);

        let similarity = match &self.duplication_similarity_threshold {
            None => DEFAULT_SIMILARITY_THRESHOLD,
            Some(value) => {
                let v = value.as_f64().ok_or_else(|| ConfigError::InvalidGlobal {
                    key: "duplicationSimilarityThreshold".to_string(),
                    reason: format!("expected a number, got {}", value.type_name()),
                })?;
                if !(v > 0.0 && v <= 1.0) {
                    return Err(ConfigError::InvalidGlobal {
                        key: "duplicationSimilarityThreshold".to_string(),
                        reason: format!("must be in (0, 1], got {v}"),
                    });
                }
                v
            }
        };

        let mut rules: BTreeMap<&'static str, RuleSettings> = catalog
            .iter()
            .map(|info| {
                let thresholds = info
                    .thresholds
                    .iter()
                    .map(|t| (t.name.to_string(), t.default))
                    .collect();
                (
                    info.id,
                    RuleSettings {
                        enabled: true,
                        thresholds,
                    },
                )
            })
            .collect();

        let mut seen: BTreeMap<&'static str, &str> = BTreeMap::new();
        for (key, rule_config) in &self.rules {
            let normalized = normalize_rule_id(key);
            let info = catalog
                .iter()
                .find(|info| normalize_rule_id(info.id) == normalized)
                .ok_or_else(|| ConfigError::UnknownRule(key.clone()))?;

            if let Some(previous) = seen.insert(info.id, key) {
                return Err(ConfigError::Conflict {
                    key: format!("rules.{key}"),
                    reason: format!("`{previous}` and `{key}` both configure {}", info.id),
                });
            }

            let Some(settings) = rules.get_mut(info.id) else {
                continue;
            };
            if let Some(enabled) = rule_config.enabled {
                settings.enabled = enabled;
            }
            for (name, value) in &rule_config.thresholds {
                let spec = info
                    .thresholds
                    .iter()
                    .find(|t| t.name == name)
                    .ok_or_else(|| ConfigError::UnknownThreshold {
                        rule: info.id.to_string(),
                        key: name.clone(),
                    })?;
                let invalid = |reason: String| ConfigError::InvalidThreshold {
                    rule: info.id.to_string(),
                    key: name.clone(),
                    reason,
                };
                let number = value
                    .as_f64()
                    .ok_or_else(|| invalid(format!("expected a number, got {}", value.type_name())))?;
                spec.check(number).map_err(invalid)?;
                settings.thresholds.insert(name.clone(), number);
            }
        }

        let resolved = ResolvedConfig {
            workers: effective_workers(workers.unwrap_or(0)),
            min_duplicate_statements,
            duplication_similarity_threshold: similarity,
            per_file_timeout_ms,
            rules,
        };
        resolved.check_conflicts()?;
        Ok(resolved)
    }
}

fn global_count(
    value: Option<&ThresholdValue>,
    key: &str,
    min: i64,
    max: Option<i64>,
) -> Result<Option<usize>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let invalid = |reason: String| ConfigError::InvalidGlobal {
        key: key.to_string(),
        reason,
    };
    let ThresholdValue::Integer(n) = value else {
        return Err(invalid(format!("expected an integer, got {}", value.type_name())));
    };
    if *n < min {
        return Err(invalid(format!("must be at least {min}, got {n}")));
    }
    if let Some(max) = max {
        if *n > max {
            return Err(invalid(format!("must be at most {max}, got {n}")));
        }
    }
    Ok(Some(*n as usize))
}

/// 0 means one worker per available core, capped at [`MAX_WORKERS`]
fn effective_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_WORKERS)
}

/// Enabled flag and thresholds of one rule after validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSettings {
    pub enabled: bool,
    thresholds: BTreeMap<String, f64>,
}

impl RuleSettings {
    pub fn threshold(&self, name: &str) -> Option<f64> {
        self.thresholds.get(name).copied()
    }
}

/// Validated configuration shared read-only by every worker
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub workers: usize,
    pub min_duplicate_statements: usize,
    pub duplication_similarity_threshold: f64,
    pub per_file_timeout_ms: u64,
    rules: BTreeMap<&'static str, RuleSettings>,
}

impl ResolvedConfig {
    /// Settings of a catalog rule; `None` for ids outside the catalog
    pub fn settings(&self, rule_id: &str) -> Option<&RuleSettings> {
        self.rules.get(rule_id)
    }

    pub fn is_enabled(&self, rule_id: &str) -> bool {
        self.settings(rule_id).is_some_and(|s| s.enabled)
    }

    /// Threshold of a catalog rule, if the rule declares it
    pub fn threshold(&self, rule_id: &str, name: &str) -> Option<f64> {
        self.settings(rule_id).and_then(|s| s.threshold(name))
    }

    /// Canonical id for any spelling of a catalog rule id
    pub fn canonical_rule_id(&self, name: &str) -> Option<&'static str> {
        let normalized = normalize_rule_id(name);
        self.rules
            .keys()
            .copied()
            .find(|id| normalize_rule_id(id) == normalized)
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.keys().copied()
    }

    pub fn per_file_timeout(&self) -> Duration {
        Duration::from_millis(self.per_file_timeout_ms)
    }

    fn check_conflicts(&self) -> Result<(), ConfigError> {
        let edit = self.threshold("SimilarNames", "maxEditDistance");
        let min_len = self.threshold("SimilarNames", "minNameLength");
        if let (Some(edit), Some(min_len)) = (edit, min_len) {
            if edit >= min_len {
                return Err(ConfigError::Conflict {
                    key: "rules.SimilarNames.thresholds.maxEditDistance".to_string(),
                    reason: format!(
                        "maxEditDistance ({edit}) must be below minNameLength ({min_len}), \
                         or every pair of short names collides"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Normalize a rule id for matching
///
/// `TooManyArguments`, `tooManyArguments`, `too_many_arguments` and
/// `too-many-arguments` all map to `too-many-arguments`.
pub fn normalize_rule_id(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.trim().chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            // godClass -> god-class, SQLInjection -> sql-injection
            let prev_is_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let is_acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && i + 1 < chars.len()
                && chars[i + 1].is_lowercase();

            if prev_is_lower || is_acronym_end {
                result.push('-');
            }
            result.extend(c.to_lowercase());
        } else if *c == '_' {
            result.push('-');
        } else {
            result.push(*c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::ThresholdSpec;
    use crate::models::Category;

    const CATALOG: &[RuleInfo] = &[
        RuleInfo {
            id: "TooManyArguments",
            category: Category::Functions,
            description: "",
            thresholds: &[ThresholdSpec::count("maxParams", 3.0)],
        },
        RuleInfo {
            id: "SimilarNames",
            category: Category::Naming,
            description: "",
            thresholds: &[
                ThresholdSpec::count("maxEditDistance", 2.0),
                ThresholdSpec::count("minNameLength", 5.0),
            ],
        },
    ];

    #[test]
    fn test_normalize_rule_id() {
        assert_eq!(normalize_rule_id("TooManyArguments"), "too-many-arguments");
        assert_eq!(normalize_rule_id("too_many_arguments"), "too-many-arguments");
        assert_eq!(normalize_rule_id("too-many-arguments"), "too-many-arguments");
        assert_eq!(normalize_rule_id("SQLInjection"), "sql-injection");
    }

    #[test]
    fn test_defaults_fill_every_rule() {
        let resolved = AnalysisConfig::default().resolve(CATALOG).unwrap();
        assert!(resolved.is_enabled("TooManyArguments"));
        assert_eq!(resolved.threshold("TooManyArguments", "maxParams"), Some(3.0));
        assert_eq!(resolved.min_duplicate_statements, DEFAULT_MIN_DUPLICATE_STATEMENTS);
        assert!(resolved.workers >= 1 && resolved.workers <= MAX_WORKERS);
    }

    #[test]
    fn test_kebab_case_rule_keys() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [rules.too-many-arguments]
            thresholds = { maxParams = 5 }
            "#,
        )
        .unwrap();
        let resolved = config.resolve(CATALOG).unwrap();
        assert_eq!(resolved.threshold("TooManyArguments", "maxParams"), Some(5.0));
        assert_eq!(
            resolved.canonical_rule_id("too_many_arguments"),
            Some("TooManyArguments")
        );
    }

    #[test]
    fn test_rejections_name_the_key() {
        let err = AnalysisConfig::default()
            .with_rule_enabled("NoSuchRule", false)
            .resolve(CATALOG)
            .unwrap_err();
        assert_eq!(err.key().as_deref(), Some("rules.NoSuchRule"));

        let err = AnalysisConfig::default()
            .with_threshold("TooManyArguments", "maxParms", 4.0)
            .resolve(CATALOG)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownThreshold { .. }));

        let err = AnalysisConfig::default()
            .with_threshold("TooManyArguments", "maxParams", -2.0)
            .resolve(CATALOG)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold { .. }));

        let err = AnalysisConfig::default()
            .with_threshold("SimilarNames", "maxEditDistance", 6.0)
            .resolve(CATALOG)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Conflict { .. }));
    }

    #[test]
    fn test_unknown_top_level_key_is_parse_error() {
        let err = AnalysisConfig::from_toml_str("maxWorkers = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_globals() {
        let err = AnalysisConfig::from_toml_str("duplicationSimilarityThreshold = 1.5")
            .unwrap()
            .resolve(CATALOG)
            .unwrap_err();
        assert_eq!(err.key().as_deref(), Some("duplicationSimilarityThreshold"));

        let err = AnalysisConfig::from_toml_str("perFileTimeoutMs = \"soon\"")
            .unwrap()
            .resolve(CATALOG)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGlobal { .. }));
    }
}

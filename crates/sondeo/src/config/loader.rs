use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const ENV_API_KEY: &str = "SONDEO_LLM_API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "GEMINI_API_KEY";
pub const ENV_MODEL: &str = "SONDEO_LLM_MODEL";
pub const ENV_ITEMS_PER_TOPIC: &str = "SONDEO_ITEMS_PER_TOPIC";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// `<config dir>/sondeo/sondeo.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sondeo").join("sondeo.json"))
}

/// Loads `path` if given, otherwise the default location. A missing default
/// file yields the built-in defaults; a missing explicit file is an error.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(p) => load_config(p),
        None => match default_config_path() {
            Some(p) if p.is_file() => load_config(p),
            _ => Ok(Config::default()),
        },
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.items_per_topic == 0 {
        return Err(ConfigError::Validation {
            message: "items_per_topic must be greater than 0".to_string(),
        });
    }

    let limits = [
        ("extraction.max_workers", config.extraction.max_workers as u64),
        ("extraction.task_timeout_secs", config.extraction.task_timeout_secs),
        ("preprocessing.timeout_secs", config.preprocessing.timeout_secs),
        ("analysis.max_workers", config.analysis.max_workers as u64),
        ("analysis.task_timeout_secs", config.analysis.task_timeout_secs),
        ("llm.timeout_secs", config.llm.timeout_secs),
    ];
    for (field, value) in limits {
        if value == 0 {
            return Err(ConfigError::Validation {
                message: format!("{} must be greater than 0", field),
            });
        }
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if !seen.insert(source.name) {
            return Err(ConfigError::InvalidSource {
                name: source.name.file_stem().to_string(),
                reason: "Duplicate source entry".to_string(),
            });
        }
    }

    let enabled = config.enabled_sources().count();
    if enabled == 0 {
        return Err(ConfigError::Validation {
            message: "At least one source must be enabled".to_string(),
        });
    }

    if config.extraction.min_successful_sources > enabled {
        return Err(ConfigError::Validation {
            message: format!(
                "extraction.min_successful_sources ({}) exceeds the {} enabled sources",
                config.extraction.min_successful_sources, enabled
            ),
        });
    }

    Ok(())
}

impl Config {
    /// Applies `SONDEO_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY).or_else(|| non_empty(ENV_API_KEY_FALLBACK)) {
            self.llm.api_key = Some(key.trim().to_string());
        }

        if let Some(model) = non_empty(ENV_MODEL) {
            self.llm.model = model.trim().to_string();
        }

        if let Some(raw) = non_empty(ENV_ITEMS_PER_TOPIC) {
            let items = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidEnv {
                    var: ENV_ITEMS_PER_TOPIC.to_string(),
                    value: raw.clone(),
                    reason: "expected a positive integer".to_string(),
                })?;
            self.items_per_topic = items;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.items_per_topic, 20);
        assert_eq!(config.default_topic, None);
        assert_eq!(config.layout.raw_dir, "datos_extraidos");
        assert_eq!(config.layout.clean_dir, "datos_limpios");
        assert_eq!(config.layout.results_dir, "resultados");
        assert_eq!(config.extraction.max_workers, 4);
        assert_eq!(config.extraction.task_timeout_secs, 600);
        assert_eq!(config.extraction.min_successful_sources, 0);
        assert_eq!(config.preprocessing.timeout_secs, 300);
        assert_eq!(
            config.preprocessing.command.script,
            PathBuf::from("pipeline/preprocesamiento.py")
        );
        assert_eq!(config.analysis.task_timeout_secs, 900);
        assert_eq!(config.sources.len(), 4);
        assert!(config.sources.iter().all(|s| s.enabled));
        assert_eq!(config.llm.model, "gemini-3-flash-preview");
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_load_config_with_sources() {
        let config_json = r#"
        {
            "version": "1.0",
            "default_topic": "ram prices",
            "items_per_topic": 5,
            "extraction": { "max_workers": 2, "task_timeout_secs": 30 },
            "sources": [
                { "name": "reddit" },
                {
                    "name": "twitter",
                    "enabled": false
                },
                {
                    "name": "linkedin",
                    "collector": { "script": "bin/linkedin.sh", "args": ["{output}"] }
                }
            ]
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.default_topic.as_deref(), Some("ram prices"));
        assert_eq!(config.items_per_topic, 5);
        assert_eq!(config.extraction.max_workers, 2);
        assert_eq!(config.enabled_sources().count(), 2);

        let linkedin = config.source(Source::LinkedIn).unwrap();
        let collector = linkedin.collector_command();
        assert_eq!(collector.interpreter, None);
        assert_eq!(collector.script, PathBuf::from("bin/linkedin.sh"));
        assert_eq!(
            linkedin.analyzer_command().script,
            PathBuf::from("Parte2/promptLinkedin.py")
        );
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "analysis": { "max_workers": 0 } }"#);
        match result {
            Err(ConfigError::Validation { message }) => {
                assert!(message.contains("analysis.max_workers"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_sources_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "sources": [ { "name": "reddit" }, { "name": "reddit" } ]
        }
        "#;
        let result = load_config_from_str(config_json);
        assert!(matches!(result, Err(ConfigError::InvalidSource { .. })));
    }

    #[test]
    fn test_unknown_source_rejected() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "sources": [ { "name": "myspace" } ] }"#);
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_all_sources_disabled_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "sources": [ { "name": "reddit", "enabled": false } ]
        }
        "#;
        assert!(load_config_from_str(config_json).is_err());
    }

    #[test]
    fn test_min_successful_sources_bounded() {
        let config_json = r#"
        {
            "version": "1.0",
            "extraction": { "min_successful_sources": 3 },
            "sources": [ { "name": "reddit" }, { "name": "facebook" } ]
        }
        "#;
        assert!(load_config_from_str(config_json).is_err());
    }

    #[test]
    fn test_apply_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_KEY_FALLBACK, "fallback-key"),
            (ENV_MODEL, "gemini-pro"),
            (ENV_ITEMS_PER_TOPIC, " 7 "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("fallback-key"));
        assert_eq!(config.llm.model, "gemini-pro");
        assert_eq!(config.items_per_topic, 7);
    }

    #[test]
    fn test_primary_api_key_wins() {
        let env: HashMap<&str, &str> = [(ENV_API_KEY, "primary"), (ENV_API_KEY_FALLBACK, "fallback")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_invalid_items_env() {
        let mut config = Config::default();
        let err = config
            .apply_env_from(|k| (k == ENV_ITEMS_PER_TOPIC).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
        assert_eq!(config.items_per_topic, 20);
    }

    #[test]
    #[serial]
    fn test_apply_env_reads_process_environment() {
        std::env::set_var(ENV_MODEL, "from-process-env");
        let mut config = Config::default();
        let result = config.apply_env();
        std::env::remove_var(ENV_MODEL);

        result.unwrap();
        assert_eq!(config.llm.model, "from-process-env");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/sondeo.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}

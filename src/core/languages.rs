//! Language configuration for compilation and execution

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::Deserialize;
use tracing::error;

use crate::core::error::JudgeError;

/// Embedded default language definitions
const DEFAULT_LANGUAGES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));

/// Placeholder for the absolute source file path
pub const SOURCE_PLACEHOLDER: &str = "{source}";
/// Placeholder for the absolute build artifact path
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";
/// Placeholder for the absolute workspace directory
pub const WORKDIR_PLACEHOLDER: &str = "{workdir}";

/// Configuration for a supported programming language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Canonical language name (e.g., "cpp")
    pub name: String,
    /// Name of the source file (e.g., "main.cpp")
    pub source_file: String,
    /// Name of the build output (None for interpreted languages)
    pub artifact_file: Option<String>,
    /// Compile command template (None if not needed)
    pub compile_command: Option<Vec<String>>,
    /// Run command template
    pub run_command: Vec<String>,
    /// Time limit multiplier and bonus: (multiplier, bonus_seconds)
    /// actual_time = base_time * multiplier + bonus
    pub time_limit: Option<(u32, u32)>,
    /// Memory limit multiplier and bonus: (multiplier, bonus_mb)
    /// actual_memory = base_memory * multiplier + bonus
    pub memory_limit: Option<(u32, u32)>,
}

impl LanguageConfig {
    /// Calculate actual time limit based on base time limit
    pub fn calculate_time_limit(&self, base_time_ms: u32) -> u32 {
        match self.time_limit {
            Some((multiplier, bonus_seconds)) => base_time_ms
                .saturating_mul(multiplier)
                .saturating_add(bonus_seconds.saturating_mul(1000)),
            None => base_time_ms,
        }
    }

    /// Calculate actual memory limit based on base memory limit
    pub fn calculate_memory_limit(&self, base_memory_mb: u32) -> u32 {
        if base_memory_mb == 0 {
            return 0;
        }
        match self.memory_limit {
            Some((multiplier, bonus_mb)) => base_memory_mb
                .saturating_mul(multiplier)
                .saturating_add(bonus_mb),
            None => base_memory_mb,
        }
    }

    /// Whether the language has a build step
    pub fn is_compiled(&self) -> bool {
        self.compile_command.is_some()
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    artifact_file: Option<String>,
    compile_command: Option<String>,
    run_command: String,
    #[serde(default)]
    time_limit: Vec<String>,
    #[serde(default)]
    memory_limit: Vec<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Global language configurations
static LANGUAGES: OnceLock<HashMap<String, LanguageConfig>> = OnceLock::new();

/// Initialize language configurations from the embedded TOML file
pub fn init_languages() -> Result<(), JudgeError> {
    install(parse_languages(DEFAULT_LANGUAGES)?)
}

/// Initialize language configurations from a TOML file on disk
pub fn init_languages_from(path: impl AsRef<Path>) -> Result<(), JudgeError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| JudgeError::Config(format!("Failed to read {:?}: {}", path, e)))?;
    install(parse_languages(&content)?)
}

fn install(languages: HashMap<String, LanguageConfig>) -> Result<(), JudgeError> {
    LANGUAGES
        .set(languages)
        .map_err(|_| JudgeError::Config("Languages already initialized".into()))
}

fn registry() -> &'static HashMap<String, LanguageConfig> {
    LANGUAGES.get_or_init(|| {
        parse_languages(DEFAULT_LANGUAGES).unwrap_or_else(|e| {
            error!("Embedded language configuration is invalid: {}", e);
            HashMap::new()
        })
    })
}

/// Parse language definitions, registering each language under its name and aliases
pub fn parse_languages(content: &str) -> Result<HashMap<String, LanguageConfig>, JudgeError> {
    let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)
        .map_err(|e| JudgeError::Config(format!("Invalid language configuration: {}", e)))?;

    let mut languages = HashMap::new();

    for (name, raw) in raw_configs {
        let parse_limit =
            |raw_limit: Vec<String>, kind: &str| -> Result<Option<(u32, u32)>, JudgeError> {
                if raw_limit.is_empty() {
                    return Ok(None);
                }
                if raw_limit.len() != 2 {
                    return Err(JudgeError::Config(format!(
                        "Invalid {} limit for {}: {:?}",
                        kind, name, raw_limit
                    )));
                }
                let multiplier = raw_limit[0].parse::<u32>().map_err(|_| {
                    JudgeError::Config(format!(
                        "Invalid {} multiplier for {}: {}",
                        kind, name, raw_limit[0]
                    ))
                })?;
                let offset = raw_limit[1].parse::<u32>().map_err(|_| {
                    JudgeError::Config(format!(
                        "Invalid {} offset for {}: {}",
                        kind, name, raw_limit[1]
                    ))
                })?;
                Ok(Some((multiplier, offset)))
            };

        let run_command = into_command(&raw.run_command);
        if run_command.is_empty() {
            return Err(JudgeError::Config(format!("Empty run_command for {}", name)));
        }

        let compile_command = raw
            .compile_command
            .map(|cmd| into_command(&cmd))
            .filter(|cmd| !cmd.is_empty());
        if compile_command.is_some() && raw.artifact_file.is_none() {
            return Err(JudgeError::Config(format!(
                "Compiled language {} needs an artifact_file",
                name
            )));
        }

        let config = LanguageConfig {
            name: name.to_lowercase(),
            source_file: raw.source_file,
            artifact_file: raw.artifact_file,
            compile_command,
            run_command,
            time_limit: parse_limit(raw.time_limit, "time")?,
            memory_limit: parse_limit(raw.memory_limit, "memory")?,
        };

        // Add main language name
        languages.insert(name.to_lowercase(), config.clone());

        // Add aliases
        for alias in raw.aliases {
            languages.insert(alias.to_lowercase(), config.clone());
        }
    }

    Ok(languages)
}

/// Get language configuration by language name
pub fn get_language_config(language: &str) -> Option<LanguageConfig> {
    registry().get(&language.trim().to_lowercase()).cloned()
}

/// Get all supported language names
pub fn get_supported_languages() -> Vec<String> {
    let mut names: Vec<String> = registry().keys().cloned().collect();
    names.sort();
    names
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[c]
source_file = "main.c"
artifact_file = "main"
compile_command = "gcc -o {{artifact}} {{source}}"
run_command = "{{artifact}}"

[python]
source_file = "main.py"
run_command = "python3 {{source}}"
time_limit = ["3", "2"]
aliases = ["py", "python3"]
"#
        )
        .unwrap();
        file
    }

    #[test]
    fn test_load_languages() {
        let config_file = create_test_config();
        let content = fs::read_to_string(config_file.path()).unwrap();
        let languages = parse_languages(&content).unwrap();

        assert!(languages.contains_key("c"));
        assert!(languages.contains_key("python"));
        assert!(languages.contains_key("py"));
        assert!(languages.contains_key("python3"));
        assert_eq!(languages["py"].name, "python");
        let expected: Vec<String> = ["gcc", "-o", "{artifact}", "{source}"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(languages["c"].compile_command, Some(expected));
        assert!(!languages["python"].is_compiled());
    }

    #[test]
    fn test_time_limit_adjustment() {
        let languages = parse_languages(&fs::read_to_string(create_test_config().path()).unwrap())
            .unwrap();
        assert_eq!(languages["python"].calculate_time_limit(1000), 5000);
        assert_eq!(languages["c"].calculate_time_limit(1000), 1000);
        assert_eq!(languages["c"].calculate_memory_limit(0), 0);
    }

    #[test]
    fn test_invalid_limit_is_rejected() {
        let err = parse_languages(
            r#"
[go]
source_file = "main.go"
run_command = "go run main.go"
time_limit = ["2"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid time limit"));
    }

    #[test]
    fn test_compiled_language_requires_artifact() {
        let err = parse_languages(
            r#"
[rust]
source_file = "main.rs"
compile_command = "rustc {source}"
run_command = "./main"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("artifact_file"));
    }

    #[test]
    fn test_embedded_languages() {
        let cpp = get_language_config("CPP").unwrap();
        assert_eq!(cpp.source_file, "main.cpp");
        assert!(cpp.is_compiled());
        assert_eq!(get_language_config("c++").unwrap().name, "cpp");
        assert!(get_language_config("brainfuck").is_none());
        assert!(get_supported_languages().contains(&"cpp".to_string()));
    }
}

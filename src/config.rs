//! Configuration types.
//!
//! Process-wide settings come from the environment; the option tables the
//! registration flow offers (specialties, languages, universities) form the
//! [`IntakeCatalog`], loaded once at startup and read-only afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registration::prompts;

/// What to do with input whose content type the current state cannot use
/// (a sticker while waiting for a photo, a photo while waiting for a name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedInputPolicy {
    /// Drop the message without replying.
    Ignore,
    /// Repeat the current state's prompt and menu.
    #[default]
    Reprompt,
}

impl std::str::FromStr for UnexpectedInputPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "reprompt" => Ok(Self::Reprompt),
            other => Err(ConfigError::InvalidValue {
                key: "INTAKE_UNEXPECTED_INPUT".to_string(),
                message: format!("expected `ignore` or `reprompt`, got `{other}`"),
            }),
        }
    }
}

/// Bot configuration.
#[derive(Debug)]
pub struct BotConfig {
    /// Telegram bot token. Without one the bot runs on the CLI channel.
    pub telegram_token: Option<SecretString>,
    /// Optional JSON file overriding the built-in catalog.
    pub catalog_path: Option<PathBuf>,
    pub unexpected_input: UnexpectedInputPolicy,
    /// Sessions untouched for this long are pruned.
    pub session_idle_timeout: Duration,
    /// Per-user dispatch workers exit after this long without messages.
    pub worker_idle_timeout: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            catalog_path: None,
            unexpected_input: UnexpectedInputPolicy::default(),
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
            worker_idle_timeout: Duration::from_secs(300),   // 5 minutes
        }
    }
}

impl BotConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        let catalog_path = lookup("INTAKE_CATALOG_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let unexpected_input = match lookup("INTAKE_UNEXPECTED_INPUT") {
            Some(raw) => raw.parse()?,
            None => defaults.unexpected_input,
        };

        let session_idle_timeout = parse_secs(
            &lookup,
            "INTAKE_SESSION_IDLE_SECS",
            defaults.session_idle_timeout,
        )?;
        let worker_idle_timeout = parse_secs(
            &lookup,
            "INTAKE_WORKER_IDLE_SECS",
            defaults.worker_idle_timeout,
        )?;

        Ok(Self {
            telegram_token,
            catalog_path,
            unexpected_input,
            session_idle_timeout,
            worker_idle_timeout,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a positive number of seconds, got `{raw}`"),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
    }
}

/// A specialty and the languages offered for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialtyOptions {
    pub name: String,
    pub languages: Vec<String>,
}

/// Option tables offered by the registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeCatalog {
    /// Specialties in presentation order.
    pub specialties: Vec<SpecialtyOptions>,
    /// Universities the product currently supports.
    pub universities: Vec<String>,
    /// Label for "my university is not listed"; choosing it ends the flow.
    pub unlisted_university: String,
}

impl Default for IntakeCatalog {
    fn default() -> Self {
        fn specialty(name: &str, languages: &[&str]) -> SpecialtyOptions {
            SpecialtyOptions {
                name: name.to_string(),
                languages: languages.iter().map(|l| l.to_string()).collect(),
            }
        }

        Self {
            specialties: vec![
                specialty(
                    "front-разработка",
                    &["JavaScript", "TypeScript", "HTML", "CSS", "React", "Vue.js"],
                ),
                specialty(
                    "back-разработка",
                    &["Python", "Java", "C#", "Node.js", "PHP", "Go", "Ruby"],
                ),
                specialty("ML-разработка", &["Python", "R", "MATLAB", "Julia", "Scala"]),
            ],
            universities: vec!["НИУ ВШЭ".to_string()],
            unlisted_university: "моего вуза нет в списке".to_string(),
        }
    }
}

impl IntakeCatalog {
    /// Load a catalog from a JSON file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let catalog: Self = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::ParseError(format!("catalog {}: {e}", path.display()))
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Use the file at `path` if given, the built-in tables otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn specialty_names(&self) -> impl Iterator<Item = &str> {
        self.specialties.iter().map(|s| s.name.as_str())
    }

    pub fn languages_for(&self, specialty: &str) -> Option<&[String]> {
        self.specialties
            .iter()
            .find(|s| s.name == specialty)
            .map(|s| s.languages.as_slice())
    }

    pub fn is_specialty(&self, label: &str) -> bool {
        self.specialty_names().any(|name| name == label)
    }

    pub fn is_supported_university(&self, label: &str) -> bool {
        self.universities.iter().any(|u| u == label)
    }

    /// Reject catalogs the flow could not drive: empty tables, duplicate
    /// labels, or labels that collide with control words.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.specialties.is_empty() {
            return Err(invalid("specialties", "at least one specialty is required"));
        }
        if self.universities.is_empty() {
            return Err(invalid("universities", "at least one university is required"));
        }
        if self.unlisted_university.trim().is_empty() {
            return Err(invalid("unlisted_university", "label must not be empty"));
        }

        check_labels("specialties", self.specialty_names())?;
        for specialty in &self.specialties {
            if specialty.languages.is_empty() {
                return Err(invalid(
                    "specialties",
                    &format!("`{}` offers no languages", specialty.name),
                ));
            }
            check_labels(
                &format!("languages of `{}`", specialty.name),
                specialty.languages.iter().map(String::as_str),
            )?;
        }
        check_labels(
            "universities",
            self.universities
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(self.unlisted_university.as_str())),
        )?;
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn check_labels<'a>(key: &str, labels: impl Iterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for label in labels {
        if label.trim().is_empty() {
            return Err(invalid(key, "labels must not be empty"));
        }
        if prompts::is_reserved(label) {
            return Err(invalid(key, &format!("`{label}` is a reserved control word")));
        }
        if !seen.insert(label) {
            return Err(invalid(key, &format!("duplicate label `{label}`")));
        }
    }
    Ok(())
}

//! Configuration loaded from `autopost.toml` plus credentials from the environment.
//!
//! [`AppConfig`] holds every tunable; fields missing from the file fall back to
//! defaults. Secrets never live in the file: [`Credentials`] reads them from
//! environment variables once at startup.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::mail::{DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT, MailSettings};
use crate::prompt::PromptTemplate;
use crate::twitter::OAuthCredentials;

pub const DEFAULT_CONFIG_PATH: &str = "autopost.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub schedule: ScheduleConfig,
    pub history: HistoryConfig,
    pub generation: GenerationConfig,
    pub publication: PublicationConfig,
    pub prompt: PromptTemplate,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Firing times as `HH:MM`.
    #[serde(default = "default_times")]
    pub times: Vec<String>,

    /// IANA timezone the times are interpreted in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: String,

    /// How many recent entries are fed back into the prompt.
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Enable Google Search grounding.
    #[serde(default = "default_true")]
    pub grounding: bool,

    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicationConfig {
    #[serde(default = "default_publication_timeout_secs")]
    pub timeout_secs: u64,

    /// Appended on its own line to every published post, e.g. a hashtag.
    #[serde(default)]
    pub footer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_times() -> Vec<String> {
    vec!["08:00".into(), "12:00".into(), "16:00".into()]
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_history_path() -> String {
    "generate.log".to_string()
}

fn default_history_limit() -> usize {
    20
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_true() -> bool {
    true
}

fn default_generation_timeout_secs() -> u64 {
    90
}

fn default_publication_timeout_secs() -> u64 {
    30
}

fn default_subject() -> String {
    "Auto-post bot report".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            times: default_times(),
            timezone: default_timezone(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            limit: default_history_limit(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            grounding: true,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl Default for PublicationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_publication_timeout_secs(),
            footer: None,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
        }
    }
}

impl AppConfig {
    /// Load from `path` if given (it must exist), otherwise from
    /// `autopost.toml` in the working directory, falling back to defaults
    /// when that file is absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let contents = match path {
            Some(p) => std::fs::read_to_string(p)?,
            None => {
                let p = Path::new(DEFAULT_CONFIG_PATH);
                if !p.exists() {
                    return Ok(Self::default());
                }
                std::fs::read_to_string(p)?
            }
        };
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<AppConfig>(contents)?)
    }
}

// Earlier deployments used the GOOGLE_/GMAIL_ names; they are still accepted.
const GEMINI_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];
const MAIL_ADDRESS_VARS: &[&str] = &["MAIL_ADDRESS", "GMAIL_ADDRESS"];
const MAIL_PASSWORD_VARS: &[&str] = &["MAIL_PASSWORD", "GMAIL_APP_PASSWORD"];

/// Reads environment values, remembering every required one that is absent
/// so they can all be reported at once.
struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    missing: Vec<String>,
}

impl<'a> EnvReader<'a> {
    fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&mut self, name: &str) -> String {
        self.require_any(&[name])
    }

    /// Like [`require`](Self::require), accepting the first of several
    /// names. Only the first name is reported when all are absent.
    fn require_any(&mut self, names: &[&str]) -> String {
        if let Some(value) = names.iter().find_map(|name| self.optional(name)) {
            return value;
        }
        let [primary, alternatives @ ..] = names else {
            return String::new();
        };
        if alternatives.is_empty() {
            self.missing.push(primary.to_string());
        } else {
            self.missing.push(format!("{primary} (or {})", alternatives.join(", ")));
        }
        String::new()
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingEnv(self.missing))
        }
    }
}

/// Read the Gemini API key alone (enough for interactive generation).
pub fn gemini_api_key(lookup: &dyn Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    let mut env = EnvReader::new(lookup);
    let key = env.require_any(GEMINI_KEY_VARS);
    env.finish()?;
    Ok(key)
}

fn read_mail(env: &mut EnvReader<'_>) -> Result<MailSettings, ConfigError> {
    let address = env.require_any(MAIL_ADDRESS_VARS);
    let password = env.require_any(MAIL_PASSWORD_VARS);
    let recipient = env.optional("MAIL_TO").unwrap_or_else(|| address.clone());
    let smtp_host = env
        .optional("SMTP_HOST")
        .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string());
    let smtp_port = match env.optional("SMTP_PORT") {
        Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
            name: "SMTP_PORT".into(),
            reason: e.to_string(),
        })?,
        None => DEFAULT_SMTP_PORT,
    };
    Ok(MailSettings {
        address,
        password,
        recipient,
        smtp_host,
        smtp_port,
    })
}

/// Mail settings on their own, used to report a startup failure when the
/// rest of the credentials are incomplete. `None` if any mail value is missing.
pub fn mail_settings(lookup: &dyn Fn(&str) -> Option<String>) -> Option<MailSettings> {
    let mut env = EnvReader::new(lookup);
    let mail = read_mail(&mut env).ok()?;
    env.finish().ok()?;
    Some(mail)
}

/// Every secret the scheduled job needs.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub twitter: OAuthCredentials,
    pub mail: MailSettings,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut env = EnvReader::new(lookup);
        let gemini_api_key = env.require_any(GEMINI_KEY_VARS);
        let twitter = OAuthCredentials {
            consumer_key: env.require("TWITTER_API_KEY"),
            consumer_secret: env.require("TWITTER_API_SECRET_KEY"),
            access_token: env.require("TWITTER_ACCESS_TOKEN"),
            access_token_secret: env.require("TWITTER_ACCESS_TOKEN_SECRET"),
        };
        let mail = read_mail(&mut env)?;
        env.finish()?;

        Ok(Self {
            gemini_api_key,
            twitter,
            mail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const FULL_ENV: &[(&str, &str)] = &[
        ("GEMINI_API_KEY", "g-key"),
        ("TWITTER_API_KEY", "ck"),
        ("TWITTER_API_SECRET_KEY", "cs"),
        ("TWITTER_ACCESS_TOKEN", "at"),
        ("TWITTER_ACCESS_TOKEN_SECRET", "ats"),
        ("MAIL_ADDRESS", "bot@example.com"),
        ("MAIL_PASSWORD", "pw"),
    ];

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.schedule.times, vec!["08:00", "12:00", "16:00"]);
        assert_eq!(config.schedule.timezone, "Asia/Tokyo");
        assert_eq!(config.history.limit, 20);
        assert_eq!(config.history.path, "generate.log");
        assert_eq!(config.generation.model, "gemini-2.0-flash");
        assert!(config.generation.grounding);
        assert!(config.publication.footer.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let config = AppConfig::parse(
            r##"
            [schedule]
            times = ["09:30"]

            [publication]
            footer = "#GenerativeAI"

            [prompt]
            language = "Japanese"
        "##,
        )
        .unwrap();
        assert_eq!(config.schedule.times, vec!["09:30"]);
        assert_eq!(config.schedule.timezone, "Asia/Tokyo");
        assert_eq!(config.schedule.poll_interval_secs, 30);
        assert_eq!(config.publication.footer.as_deref(), Some("#GenerativeAI"));
        assert_eq!(config.publication.timeout_secs, 30);
        assert_eq!(config.prompt.language, "Japanese");
        assert_eq!(config.generation.timeout_secs, 90);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            AppConfig::parse("[schedule\ntimes = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn credentials_from_complete_env() {
        let creds = Credentials::from_lookup(&lookup_from(FULL_ENV)).unwrap();
        assert_eq!(creds.gemini_api_key, "g-key");
        assert_eq!(creds.twitter.consumer_key, "ck");
        assert_eq!(creds.mail.recipient, "bot@example.com");
        assert_eq!(creds.mail.smtp_host, "smtp.gmail.com");
        assert_eq!(creds.mail.smtp_port, 587);
    }

    #[test]
    fn every_missing_variable_is_reported() {
        let err = Credentials::from_lookup(&lookup_from(&[
            ("GEMINI_API_KEY", "g-key"),
            ("TWITTER_API_KEY", "  "),
            ("MAIL_ADDRESS", "bot@example.com"),
        ]))
        .unwrap_err();
        match err {
            ConfigError::MissingEnv(names) => assert_eq!(
                names,
                vec![
                    "TWITTER_API_KEY",
                    "TWITTER_API_SECRET_KEY",
                    "TWITTER_ACCESS_TOKEN",
                    "TWITTER_ACCESS_TOKEN_SECRET",
                    "MAIL_PASSWORD (or GMAIL_APP_PASSWORD)",
                ]
            ),
            other => panic!("expected MissingEnv, got {other:?}"),
        }
    }

    #[test]
    fn legacy_variable_names_are_accepted() {
        let creds = Credentials::from_lookup(&lookup_from(&[
            ("GOOGLE_API_KEY", "g-key"),
            ("TWITTER_API_KEY", "ck"),
            ("TWITTER_API_SECRET_KEY", "cs"),
            ("TWITTER_ACCESS_TOKEN", "at"),
            ("TWITTER_ACCESS_TOKEN_SECRET", "ats"),
            ("GMAIL_ADDRESS", "bot@gmail.com"),
            ("GMAIL_APP_PASSWORD", "app-pw"),
        ]))
        .unwrap();
        assert_eq!(creds.gemini_api_key, "g-key");
        assert_eq!(creds.mail.address, "bot@gmail.com");
        assert_eq!(creds.mail.password, "app-pw");
        assert_eq!(creds.mail.recipient, "bot@gmail.com");
    }

    #[test]
    fn new_variable_names_take_precedence() {
        let mail = mail_settings(&lookup_from(&[
            ("MAIL_ADDRESS", "new@example.com"),
            ("GMAIL_ADDRESS", "old@gmail.com"),
            ("GMAIL_APP_PASSWORD", "app-pw"),
        ]))
        .unwrap();
        assert_eq!(mail.address, "new@example.com");
        assert_eq!(mail.password, "app-pw");
    }

    #[test]
    fn mail_settings_available_without_other_secrets() {
        let mail = mail_settings(&lookup_from(&[
            ("MAIL_ADDRESS", "bot@example.com"),
            ("MAIL_PASSWORD", "pw"),
            ("MAIL_TO", "ops@example.com"),
            ("SMTP_PORT", "2525"),
        ]))
        .unwrap();
        assert_eq!(mail.recipient, "ops@example.com");
        assert_eq!(mail.smtp_port, 2525);
        assert!(mail_settings(&lookup_from(&[("MAIL_ADDRESS", "bot@example.com")])).is_none());
    }

    #[test]
    fn bad_smtp_port_is_invalid() {
        let mut env: Vec<(&str, &str)> = FULL_ENV.to_vec();
        env.push(("SMTP_PORT", "smtp"));
        assert!(matches!(
            Credentials::from_lookup(&lookup_from(&env)),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn gemini_key_alone() {
        assert_eq!(
            gemini_api_key(&lookup_from(&[("GEMINI_API_KEY", "k")])).unwrap(),
            "k"
        );
        assert!(gemini_api_key(&lookup_from(&[])).is_err());
    }
}

//! Template expansion for declared default values
//!
//! Supported in string values, applied in this order:
//!
//! 1. `{{OS}}`, `{{ARCH}}`, `{{USER_HOME}}` literal substitution
//! 2. a leading `~/` becomes `<home>/<rest>` when the home directory is known
//! 3. `%NAME%` is replaced with the value of environment variable `NAME`
//!    (empty when unset)
//!
//! Non-string values pass through untouched.

use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::OnceLock;

/// OS identifier used in templates and `platform_defaults` keys
///
/// `linux`, `darwin`, `windows`; other platforms report their Rust name.
pub fn current_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// CPU architecture identifier used in templates
///
/// `amd64`, `arm64`, `386`, `arm`; others report their Rust name.
pub fn current_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Host environment the expander reads from
///
/// `from_host()` captures the running process; tests build one by hand.
#[derive(Debug, Clone)]
pub struct Expander {
    pub os: String,
    pub arch: String,
    pub home: Option<PathBuf>,
}

impl Default for Expander {
    fn default() -> Self {
        Self::from_host()
    }
}

impl Expander {
    pub fn from_host() -> Self {
        Self {
            os: current_os().to_string(),
            arch: current_arch().to_string(),
            home: dirs::home_dir(),
        }
    }

    /// Expand a JSON value; only strings change
    pub fn expand_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.expand_str(s)),
            other => other.clone(),
        }
    }

    pub fn expand_str(&self, input: &str) -> String {
        let home = self
            .home
            .as_ref()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut result = input
            .replace("{{USER_HOME}}", &home)
            .replace("{{OS}}", &self.os)
            .replace("{{ARCH}}", &self.arch);

        if let (Some(rest), Some(home_dir)) = (result.strip_prefix("~/"), self.home.as_ref()) {
            result = home_dir.join(rest).to_string_lossy().into_owned();
        }

        if result.contains('%') {
            result = expand_env(&result);
        }

        result
    }
}

/// Expand using the running host
pub fn expand_templates(value: &Value) -> Value {
    Expander::from_host().expand_value(value)
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)%").expect("static pattern"))
}

fn expand_env(input: &str) -> String {
    env_pattern()
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

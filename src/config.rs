#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Client configuration: where Themis lives and how patiently we poll it.

use std::{str::FromStr, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Public Themis instance.
pub const DEFAULT_BASE_URL: &str = "https://themis.housing.rug.nl";

/// Browser-like user agent; the portal serves a reduced page to unknown
/// clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, \
                                      like Gecko) Chromium/80.0.3987.160 \
                                      Chrome/80.0.3987.163 Safari/537.36";

/// What to do when no file of a batch matches an accepted suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTypePolicy {
    /// Refuse the batch with `UnknownFileType` before uploading anything.
    #[default]
    Strict,
    /// Upload anyway with the judge language `none` and log a warning.
    Lenient,
}

impl FromStr for FileTypePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown file type policy `{other}`")),
        }
    }
}

/// How display names are compared during child lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameMatch {
    /// Byte-for-byte comparison.
    #[default]
    Exact,
    /// Unicode-lowercased comparison.
    IgnoreCase,
}

impl NameMatch {
    /// Returns true if `candidate` matches `wanted` under this rule.
    pub fn matches(self, candidate: &str, wanted: &str) -> bool {
        match self {
            Self::Exact => candidate == wanted,
            Self::IgnoreCase => candidate.to_lowercase() == wanted.to_lowercase(),
        }
    }
}

impl FromStr for NameMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "ignore-case" | "ignore_case" | "insensitive" => Ok(Self::IgnoreCase),
            other => Err(format!("unknown name matching rule `{other}`")),
        }
    }
}

/// Settings shared by every request a [`crate::Themis`] client makes.
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Scheme and host of the portal, without a trailing slash.
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    base_url:         String,
    /// Sleep between polls while cases are queued.
    #[builder(default = Duration::from_secs(1))]
    poll_interval:    Duration,
    /// Maximum number of result-page fetches per submission.
    #[builder(default = 600)]
    max_polls:        u32,
    /// Wall-clock bound on a single poll session.
    #[builder(default = Duration::from_secs(600))]
    poll_timeout:     Duration,
    /// Maximum number of judge re-triggers for the pending race condition.
    #[builder(default = 10)]
    max_retriggers:   u32,
    /// Behaviour when no file in a batch has an accepted suffix.
    #[builder(default)]
    file_type_policy: FileTypePolicy,
    /// Rule used by child lookups.
    #[builder(default)]
    name_match:       NameMatch,
    /// User agent sent with every request.
    #[builder(into, default = DEFAULT_USER_AGENT.to_string())]
    user_agent:       String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientConfig {
    /// Reads overrides from `THEMIS_*` environment variables, falling back to
    /// the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url:         std::env::var("THEMIS_URL")
                .map(|value| value.trim().trim_end_matches('/').to_owned())
                .unwrap_or(defaults.base_url),
            poll_interval:    read_env::<u64>("THEMIS_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_polls:        read_env("THEMIS_MAX_POLLS").unwrap_or(defaults.max_polls),
            poll_timeout:     read_env::<u64>("THEMIS_POLL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_timeout),
            max_retriggers:   read_env("THEMIS_MAX_RETRIGGERS").unwrap_or(defaults.max_retriggers),
            file_type_policy: read_env("THEMIS_FILE_TYPE_POLICY")
                .unwrap_or(defaults.file_type_policy),
            name_match:       read_env("THEMIS_NAME_MATCH").unwrap_or(defaults.name_match),
            user_agent:       defaults.user_agent,
        }
    }

    /// Scheme and host of the portal.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sleep between polls while cases are queued.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Maximum number of result-page fetches per submission.
    pub fn max_polls(&self) -> u32 {
        self.max_polls
    }

    /// Wall-clock bound on a single poll session.
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Maximum number of judge re-triggers per submission.
    pub fn max_retriggers(&self) -> u32 {
        self.max_retriggers
    }

    /// Behaviour when no file in a batch has an accepted suffix.
    pub fn file_type_policy(&self) -> FileTypePolicy {
        self.file_type_policy
    }

    /// Rule used by child lookups.
    pub fn name_match(&self) -> NameMatch {
        self.name_match
    }

    /// User agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns a copy with a different file type policy.
    pub fn with_file_type_policy(mut self, policy: FileTypePolicy) -> Self {
        self.file_type_policy = policy;
        self
    }

    /// Returns a copy with a different name matching rule.
    pub fn with_name_match(mut self, rule: NameMatch) -> Self {
        self.name_match = rule;
        self
    }
}

/// Parses an environment variable, returning `None` when it is missing or
/// does not parse.
fn read_env<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        let cfg = ClientConfig::builder().build();
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
        assert_eq!(cfg.file_type_policy(), FileTypePolicy::Strict);
        assert_eq!(cfg.name_match(), NameMatch::Exact);
    }

    #[test]
    fn policies_parse_from_strings() {
        assert_eq!("Lenient".parse::<FileTypePolicy>(), Ok(FileTypePolicy::Lenient));
        assert_eq!("ignore-case".parse::<NameMatch>(), Ok(NameMatch::IgnoreCase));
        assert!("sometimes".parse::<FileTypePolicy>().is_err());
    }

    #[test]
    fn name_match_rules() {
        assert!(NameMatch::Exact.matches("Week 1", "Week 1"));
        assert!(!NameMatch::Exact.matches("Week 1", "week 1"));
        assert!(NameMatch::IgnoreCase.matches("Week 1", "week 1"));
    }
}

//! Device class inference.
//!
//! A session's device class is decided once, from what the client declares
//! or from its user agent, and then held for the lifetime of the session.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches user agents of phones and tablets.
static MOBILE_UA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Mobile|Android|iPhone|iPad|iPod").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    #[default]
    Desktop,
}

impl DeviceType {
    /// Parse a client-declared hint. Anything other than `mobile`/`desktop`
    /// (case-insensitive) is not a hint.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "mobile" => Some(Self::Mobile),
            "desktop" => Some(Self::Desktop),
            _ => None,
        }
    }

    /// Classify a session: a recognised hint wins, then the user agent,
    /// then `Desktop`.
    pub fn classify(hint: Option<&str>, user_agent: Option<&str>) -> Self {
        if let Some(declared) = hint.and_then(Self::from_hint) {
            return declared;
        }
        match user_agent {
            Some(ua) if MOBILE_UA_RE.is_match(ua) => Self::Mobile,
            _ => Self::Desktop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36";
    const MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15";

    #[test]
    fn hint_wins_over_user_agent() {
        assert_eq!(
            DeviceType::classify(Some("desktop"), Some(IPHONE_UA)),
            DeviceType::Desktop
        );
        assert_eq!(
            DeviceType::classify(Some("mobile"), Some(MAC_UA)),
            DeviceType::Mobile
        );
    }

    #[test]
    fn hint_is_case_insensitive() {
        assert_eq!(DeviceType::from_hint("MOBILE"), Some(DeviceType::Mobile));
        assert_eq!(DeviceType::from_hint(" Desktop "), Some(DeviceType::Desktop));
    }

    #[test]
    fn unknown_hint_falls_through_to_user_agent() {
        assert_eq!(
            DeviceType::classify(Some("unknown"), Some(ANDROID_UA)),
            DeviceType::Mobile
        );
        assert_eq!(DeviceType::classify(Some(""), Some(MAC_UA)), DeviceType::Desktop);
    }

    #[test]
    fn user_agent_heuristic() {
        assert_eq!(DeviceType::classify(None, Some(IPHONE_UA)), DeviceType::Mobile);
        assert_eq!(DeviceType::classify(None, Some(ANDROID_UA)), DeviceType::Mobile);
        assert_eq!(DeviceType::classify(None, Some(MAC_UA)), DeviceType::Desktop);
    }

    #[test]
    fn nothing_known_is_desktop() {
        assert_eq!(DeviceType::classify(None, None), DeviceType::Desktop);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DeviceType::Mobile).unwrap(),
            "\"mobile\""
        );
        assert_eq!(DeviceType::Desktop.to_string(), "desktop");
    }
}

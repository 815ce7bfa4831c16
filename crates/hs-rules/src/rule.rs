//! Block rule model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identity assigned by the store on insert. `0` marks a rule not yet stored.
pub type RuleId = i64;

/// Returned when rule type text is not one of `Domain`, `URL`, `KeyWord`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown rule type: {0}")]
pub struct ParseRuleTypeError(pub String);

/// How a rule value is compared against a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleType {
    /// Exact host equality
    Domain,
    /// Prefix of the full request URL
    #[serde(rename = "URL")]
    Url,
    /// Substring anywhere in the full request URL
    KeyWord,
}

impl RuleType {
    /// All rule types in matching priority order
    pub const ALL: [RuleType; 3] = [RuleType::Domain, RuleType::Url, RuleType::KeyWord];

    /// Canonical spelling, as stored in the `type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "Domain",
            Self::Url => "URL",
            Self::KeyWord => "KeyWord",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = ParseRuleTypeError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        RuleType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseRuleTypeError(trimmed.to_string()))
    }
}

/// A stored block rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(rename = "url")]
    pub value: String,
}

impl Rule {
    /// A rule that has not been inserted yet
    pub fn new(rule_type: RuleType, value: impl Into<String>) -> Self {
        Self {
            id: 0,
            rule_type,
            value: value.into(),
        }
    }

    pub fn with_id(id: RuleId, rule_type: RuleType, value: impl Into<String>) -> Self {
        Self {
            id,
            rule_type,
            value: value.into(),
        }
    }

    /// Same `(type, value)` entry, regardless of identity
    pub fn same_entry(&self, other: &Rule) -> bool {
        self.rule_type == other.rule_type && self.value == other.value
    }

    /// Check this single rule against a request
    pub fn matches(&self, full_url: &str, host: &str) -> bool {
        match self.rule_type {
            RuleType::Domain => !host.is_empty() && host == self.value,
            RuleType::Url => !full_url.is_empty() && full_url.starts_with(&self.value),
            RuleType::KeyWord => !full_url.is_empty() && full_url.contains(&self.value),
        }
    }

    /// `"<Type>, <value>"`, the line format of rule files
    pub fn to_line(&self) -> String {
        format!("{}, {}", self.rule_type, self.value)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.id, self.rule_type, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_type_case_insensitive() {
        assert_eq!("domain".parse::<RuleType>().unwrap(), RuleType::Domain);
        assert_eq!(" url ".parse::<RuleType>().unwrap(), RuleType::Url);
        assert_eq!("KEYWORD".parse::<RuleType>().unwrap(), RuleType::KeyWord);
        assert!("regex".parse::<RuleType>().is_err());
    }

    #[test]
    fn test_rule_type_canonical_spelling() {
        assert_eq!(RuleType::Url.to_string(), "URL");
        assert_eq!(RuleType::KeyWord.as_str(), "KeyWord");
    }

    #[test]
    fn test_single_rule_matching() {
        let domain = Rule::new(RuleType::Domain, "ads.example.com");
        assert!(domain.matches("https://ads.example.com/x", "ads.example.com"));
        assert!(!domain.matches("https://ads.example.com/x", "sub.ads.example.com"));

        let url = Rule::new(RuleType::Url, "https://track.example.com/px");
        assert!(url.matches("https://track.example.com/px?id=1", "track.example.com"));
        assert!(!url.matches("http://track.example.com/px", "track.example.com"));

        let keyword = Rule::new(RuleType::KeyWord, "banner_ad");
        assert!(keyword.matches("https://cdn.example.com/banner_ad.js", ""));
        assert!(!keyword.matches("", ""));
    }

    #[test]
    fn test_same_entry_ignores_identity() {
        let a = Rule::with_id(3, RuleType::Domain, "a.com");
        let b = Rule::with_id(9, RuleType::Domain, "a.com");
        assert!(a.same_entry(&b));
        assert_ne!(a, b);
        assert_eq!(a.to_line(), "Domain, a.com");
    }
}

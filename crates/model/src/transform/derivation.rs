use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One business derivation applied after projection, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derivation {
    /// Source collection name, optionally with a suffix removed.
    CollectionLabel {
        output: String,
        #[serde(default)]
        strip_suffix: Option<String>,
    },

    /// `International` when the flag is truthy, `Domestic` otherwise.
    FlightType {
        #[serde(default = "default_intl_flag")]
        field: String,
        #[serde(default = "default_flight_type")]
        output: String,
    },

    /// `true` when the fare difference is strictly positive.
    RepriceFlag {
        #[serde(default = "default_fare_difference")]
        field: String,
        #[serde(default = "default_reprice_output")]
        output: String,
    },

    /// Segment label from a username.
    Portal {
        field: String,
        #[serde(default = "default_portal_output")]
        output: String,
        rules: Vec<PortalRule>,
        #[serde(default = "default_portal")]
        default: String,
    },

    /// Replace string codes by labels; unknown codes are kept.
    CategoryMap {
        field: String,
        mapping: BTreeMap<String, String>,
    },

    /// Canonical `DD-MM-YYYY` date.
    NormalizeDate { field: String },

    Uppercase {
        field: String,
        #[serde(default)]
        trim: bool,
    },

    /// Trim and lowercase every string field except `except`.
    CleanText {
        #[serde(default)]
        except: Vec<String>,
    },

    /// First whitespace separated token, uppercased.
    FirstToken { field: String, output: String },

    /// Success/quarantine marker fields.
    IssueFlag {
        #[serde(default = "default_issue_flag")]
        flag: String,
        #[serde(default = "default_issue_reason")]
        reason: String,
    },
}

/// Username match rule. Exact identifiers are compared as-is; tokens are
/// matched as case-insensitive substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalRule {
    pub label: String,
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
}

impl PortalRule {
    pub fn matches(&self, username: &str) -> bool {
        if self.exact.iter().any(|id| id == username) {
            return true;
        }
        let upper = username.to_uppercase();
        self.contains
            .iter()
            .any(|token| upper.contains(&token.to_uppercase()))
    }
}

impl Derivation {
    pub fn kind(&self) -> &'static str {
        match self {
            Derivation::CollectionLabel { .. } => "collection_label",
            Derivation::FlightType { .. } => "flight_type",
            Derivation::RepriceFlag { .. } => "reprice_flag",
            Derivation::Portal { .. } => "portal",
            Derivation::CategoryMap { .. } => "category_map",
            Derivation::NormalizeDate { .. } => "normalize_date",
            Derivation::Uppercase { .. } => "uppercase",
            Derivation::CleanText { .. } => "clean_text",
            Derivation::FirstToken { .. } => "first_token",
            Derivation::IssueFlag { .. } => "issue_flag",
        }
    }
}

fn default_intl_flag() -> String {
    "IsIntl".to_string()
}

fn default_flight_type() -> String {
    "FlightType".to_string()
}

fn default_fare_difference() -> String {
    "faredifference".to_string()
}

fn default_reprice_output() -> String {
    "Actual_Reprice".to_string()
}

fn default_portal_output() -> String {
    "Portal".to_string()
}

fn default_portal() -> String {
    "B2C".to_string()
}

fn default_issue_flag() -> String {
    "is_issue".to_string()
}

fn default_issue_reason() -> String {
    "issue".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_with_defaults() {
        let d: Derivation = serde_json::from_value(json!({ "kind": "flight_type" })).unwrap();
        assert_eq!(
            d,
            Derivation::FlightType {
                field: "IsIntl".into(),
                output: "FlightType".into()
            }
        );
        assert_eq!(d.kind(), "flight_type");
    }

    #[test]
    fn portal_rule_matching() {
        let exact = PortalRule {
            label: "Meta Search".into(),
            exact: vec!["kayak".into()],
            contains: vec![],
        };
        assert!(exact.matches("kayak"));
        assert!(!exact.matches("KAYAK"));

        let token = PortalRule {
            label: "B2B".into(),
            exact: vec![],
            contains: vec!["emtb2bin".into()],
        };
        assert!(token.matches("agent_EMTB2BIN_01"));
        assert!(!token.matches("retail"));
    }
}

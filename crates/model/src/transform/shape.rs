use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static description of what gets copied out of a source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordShape {
    /// Fields copied from the document root.
    #[serde(default)]
    pub root: Vec<String>,

    /// Key of the nested object. `None` for flat sources.
    #[serde(default)]
    pub nested_key: Option<String>,

    /// Fields copied from the nested object.
    #[serde(default)]
    pub nested: Vec<String>,

    /// Millisecond fields converted to seconds.
    #[serde(default)]
    pub durations: Vec<String>,

    /// Fields coerced to float.
    #[serde(default)]
    pub numerics: Vec<String>,

    /// Replacement for absent, null or empty values, applied after derivations.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl RecordShape {
    /// Every output field the projection produces, root first.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.root
            .iter()
            .chain(self.nested.iter())
            .map(String::as_str)
    }

    /// Source-side fields a query projection must keep, including `extra`
    /// (window fields) and `_id`.
    pub fn source_fields(&self, extra: &[&str]) -> Vec<String> {
        let mut fields: Vec<String> = Vec::with_capacity(self.root.len() + extra.len() + 2);
        let mut push = |name: &str| {
            if !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        };

        push("_id");
        for name in &self.root {
            push(name);
        }
        if let Some(key) = &self.nested_key {
            push(key);
        }
        for name in extra {
            push(name);
        }
        fields
    }

    pub fn is_duration(&self, field: &str) -> bool {
        self.durations.iter().any(|f| f == field)
    }

    pub fn is_numeric(&self, field: &str) -> bool {
        self.numerics.iter().any(|f| f == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_fields_are_unique_and_include_id() {
        let shape = RecordShape {
            root: vec!["Date".into(), "level".into()],
            nested_key: Some("Message".into()),
            nested: vec!["traceid".into()],
            ..Default::default()
        };
        assert_eq!(
            shape.source_fields(&["Date"]),
            vec!["_id", "Date", "level", "Message"]
        );
    }

    #[test]
    fn fields_chain_root_then_nested() {
        let shape = RecordShape {
            root: vec!["InsertOn".into()],
            nested: vec!["org".into(), "des".into()],
            ..Default::default()
        };
        assert_eq!(
            shape.fields().collect::<Vec<_>>(),
            vec!["InsertOn", "org", "des"]
        );
    }
}

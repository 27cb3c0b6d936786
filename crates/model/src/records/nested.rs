use bson::{Bson, Document};

/// Decoded nested payload of a source document.
///
/// Producers write the payload either as an object or as a list whose first
/// element is the object; both decode to `Object`.
#[derive(Debug, Clone, PartialEq)]
pub enum NestedPayload {
    Object(Document),
    Absent,
    Malformed(String),
}

impl NestedPayload {
    pub fn decode(doc: &Document, key: &str) -> Self {
        match doc.get(key) {
            None | Some(Bson::Null) => NestedPayload::Absent,
            Some(Bson::Document(inner)) => NestedPayload::Object(inner.clone()),
            Some(Bson::Array(items)) => match items.first() {
                None => NestedPayload::Absent,
                Some(Bson::Document(inner)) => NestedPayload::Object(inner.clone()),
                Some(other) => NestedPayload::Malformed(format!(
                    "first element of '{key}' is {:?}, expected an object",
                    other.element_type()
                )),
            },
            Some(other) => NestedPayload::Malformed(format!(
                "'{key}' is {:?}, expected an object",
                other.element_type()
            )),
        }
    }

    pub fn as_object(&self) -> Option<&Document> {
        match self {
            NestedPayload::Object(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn decodes_object_and_list() {
        let obj = doc! { "Message": { "traceid": "a" } };
        let list = doc! { "Message": [ { "traceid": "b" }, { "traceid": "c" } ] };
        assert_eq!(
            NestedPayload::decode(&obj, "Message"),
            NestedPayload::Object(doc! { "traceid": "a" })
        );
        assert_eq!(
            NestedPayload::decode(&list, "Message"),
            NestedPayload::Object(doc! { "traceid": "b" })
        );
    }

    #[test]
    fn absent_and_empty_list() {
        assert_eq!(
            NestedPayload::decode(&doc! {}, "Message"),
            NestedPayload::Absent
        );
        assert_eq!(
            NestedPayload::decode(&doc! { "Message": [] }, "Message"),
            NestedPayload::Absent
        );
        assert_eq!(
            NestedPayload::decode(&doc! { "Message": null }, "Message"),
            NestedPayload::Absent
        );
    }

    #[test]
    fn scalars_are_malformed() {
        assert!(matches!(
            NestedPayload::decode(&doc! { "Message": "oops" }, "Message"),
            NestedPayload::Malformed(_)
        ));
        assert!(matches!(
            NestedPayload::decode(&doc! { "Message": [1, 2] }, "Message"),
            NestedPayload::Malformed(_)
        ));
    }
}

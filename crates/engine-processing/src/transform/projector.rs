use crate::error::TransformError;
use bson::{Bson, Document};
use model::{
    core::{
        provenance::ID,
        value::{as_f64, is_blank},
    },
    records::nested::NestedPayload,
    transform::shape::RecordShape,
};
use tracing::warn;

/// Flattens a source document into the fields declared by a [`RecordShape`].
#[derive(Debug, Clone)]
pub struct FieldProjector {
    shape: RecordShape,
}

impl FieldProjector {
    pub fn new(shape: RecordShape) -> Self {
        Self { shape }
    }

    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }

    /// Strict projection: a nested key that is declared but absent or
    /// malformed is an error.
    pub fn project(&self, doc: &Document) -> Result<Document, TransformError> {
        let nested = match &self.shape.nested_key {
            Some(key) => match NestedPayload::decode(doc, key) {
                NestedPayload::Object(inner) => Some(inner),
                NestedPayload::Absent => return Err(TransformError::MissingNested(key.clone())),
                NestedPayload::Malformed(reason) => {
                    return Err(TransformError::MalformedNested(reason));
                }
            },
            None => None,
        };
        Ok(self.build(doc, nested.as_ref()))
    }

    /// Best-effort projection for quarantined documents: nested fields that
    /// cannot be reached are null.
    pub fn project_lenient(&self, doc: &Document) -> Document {
        let nested = self
            .shape
            .nested_key
            .as_ref()
            .and_then(|key| match NestedPayload::decode(doc, key) {
                NestedPayload::Object(inner) => Some(inner),
                _ => None,
            });
        self.build(doc, nested.as_ref())
    }

    /// Replaces absent, null and empty values with the declared defaults.
    pub fn fill_defaults(&self, record: &mut Document) {
        for (field, default) in &self.shape.defaults {
            let missing = record.get(field).is_none_or(is_blank);
            if missing {
                record.insert(field.as_str(), default.as_str());
            }
        }
    }

    fn build(&self, doc: &Document, nested: Option<&Document>) -> Document {
        let mut out = Document::new();
        if let Some(id) = doc.get(ID) {
            out.insert(ID, id.clone());
        }

        for field in &self.shape.root {
            out.insert(field.as_str(), self.convert(field, doc.get(field), doc));
        }

        // Flat sources declare no nested key and read nested fields from the root.
        let from = match (&self.shape.nested_key, nested) {
            (None, _) => Some(doc),
            (Some(_), inner) => inner,
        };
        for field in &self.shape.nested {
            let value = from.and_then(|d| d.get(field));
            out.insert(field.as_str(), self.convert(field, value, doc));
        }
        out
    }

    fn convert(&self, field: &str, value: Option<&Bson>, doc: &Document) -> Bson {
        if self.shape.is_duration(field) {
            return match value {
                None => Bson::Null,
                Some(v) => match as_f64(v) {
                    Some(ms) => Bson::Double(ms / 1000.0),
                    None => {
                        warn!(field, value = %v, id = ?doc.get(ID), "Failed to convert duration, using 0.0");
                        Bson::Double(0.0)
                    }
                },
            };
        }

        if self.shape.is_numeric(field) {
            return match value {
                None | Some(Bson::Null) => Bson::Double(0.0),
                Some(v) => match as_f64(v) {
                    Some(n) => Bson::Double(n),
                    None => {
                        warn!(field, value = %v, id = ?doc.get(ID), "Failed to convert to float, using 0.0");
                        Bson::Double(0.0)
                    }
                },
            };
        }

        value.cloned().unwrap_or(Bson::Null)
    }
}

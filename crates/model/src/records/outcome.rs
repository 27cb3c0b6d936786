use bson::{Bson, Document};

/// A document that passed every derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRecord(Document);

impl TransformedRecord {
    pub fn new(doc: Document) -> Self {
        Self(doc)
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.0.get(key)
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

/// A document that failed transformation, kept with its reason and whatever
/// fields could still be populated.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarantinedRecord {
    id: Option<Bson>,
    reason: String,
    record: Document,
}

impl QuarantinedRecord {
    pub fn new(id: Option<Bson>, reason: impl Into<String>, record: Document) -> Self {
        Self {
            id,
            reason: reason.into(),
            record,
        }
    }

    pub fn id(&self) -> Option<&Bson> {
        self.id.as_ref()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.record.get(key)
    }

    pub fn as_document(&self) -> &Document {
        &self.record
    }

    pub fn into_document(self) -> Document {
        self.record
    }
}

/// Result of classifying one source document. Every input yields exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(TransformedRecord),
    Quarantined(QuarantinedRecord),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_quarantined(&self) -> bool {
        matches!(self, Outcome::Quarantined(_))
    }

    pub fn into_document(self) -> Document {
        match self {
            Outcome::Success(record) => record.into_document(),
            Outcome::Quarantined(record) => record.into_document(),
        }
    }
}

use crate::error::TransformError;
use bson::Document;
use std::sync::Arc;

/// Per-collection facts a derivation may read.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub collection: String,
}

impl TransformContext {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }
}

pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, record: Document, ctx: &TransformContext)
    -> Result<Document, TransformError>;

    /// Value written when the record is being quarantined. Defaults to a
    /// best-effort `apply`.
    fn fallback(&self, record: Document, ctx: &TransformContext) -> Document {
        match self.apply(record.clone(), ctx) {
            Ok(applied) => applied,
            Err(_) => record,
        }
    }
}

#[derive(Clone, Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn add_transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn add_boxed(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Runs every transform in order, stopping at the first failure.
    pub fn apply(
        &self,
        record: Document,
        ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        self.transforms
            .iter()
            .try_fold(record, |acc, transform| transform.apply(acc, ctx))
    }

    pub fn fallback(&self, record: Document, ctx: &TransformContext) -> Document {
        self.transforms
            .iter()
            .fold(record, |acc, transform| transform.fallback(acc, ctx))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

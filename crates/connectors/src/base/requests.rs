use model::pagination::{cursor::Cursor, window::WindowPredicate};

/// One keyset page request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub collection: String,
    pub predicate: WindowPredicate,
    pub after: Cursor,
    pub limit: usize,
    pub projection: Option<Vec<String>>,
}

pub struct FetchRequestBuilder {
    collection: String,
    predicate: WindowPredicate,
    after: Cursor,
    limit: usize,
    projection: Option<Vec<String>>,
}

impl FetchRequestBuilder {
    pub fn new(collection: impl Into<String>, predicate: WindowPredicate) -> Self {
        FetchRequestBuilder {
            collection: collection.into(),
            predicate,
            after: Cursor::None,
            limit: 0,
            projection: None,
        }
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.after = cursor;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn projection(mut self, fields: Option<Vec<String>>) -> Self {
        self.projection = fields;
        self
    }

    pub fn build(self) -> FetchRequest {
        FetchRequest {
            collection: self.collection,
            predicate: self.predicate,
            after: self.after,
            limit: self.limit,
            projection: self.projection,
        }
    }
}

/// A single rejected document of an unordered bulk insert.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    pub index: usize,
    pub code: i32,
    pub message: String,
}

/// Result of an unordered bulk insert that reached the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertReport {
    pub attempted: usize,
    pub inserted: usize,
    pub failures: Vec<WriteFailure>,
}

impl InsertReport {
    pub fn from_failures(attempted: usize, failures: Vec<WriteFailure>) -> Self {
        InsertReport {
            attempted,
            inserted: attempted.saturating_sub(failures.len()),
            failures,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

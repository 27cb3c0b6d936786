use crate::pagination::cursor::Cursor;
use bson::Document;

/// One extraction chunk.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub collection: String,
    pub batch_no: usize,
    pub rows: Vec<Document>,
    pub cursor: Cursor, // position this chunk started after
    pub next: Cursor,   // resume-from cursor (last row of this chunk)
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

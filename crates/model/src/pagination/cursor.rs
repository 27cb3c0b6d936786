use crate::{
    core::value::compare_ids,
    pagination::window::{DateTimePair, WindowPredicate},
};
use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Keyset pagination cursor.
///
/// The window field alone is not unique, so every variant carries `_id` as
/// tie-breaker: a page resumes strictly after `(key, _id)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Cursor {
    /// Start of the window.
    None,

    /// Last seen `(timestamp, _id)`.
    Timestamp { ts: DateTime<Utc>, id: Bson },

    /// Last seen `(date, time, _id)`.
    DateTimePair { at: DateTimePair, id: Bson },
}

impl Cursor {
    /// Cursor positioned on `doc`, or `None` when the document lacks the
    /// predicate's sort key.
    pub fn after_document(predicate: &WindowPredicate, doc: &Document) -> Option<Cursor> {
        let id = doc.get("_id")?.clone();
        match predicate {
            WindowPredicate::Timestamp { field, .. } => {
                let ts = doc.get_datetime(field).ok()?.to_chrono();
                Some(Cursor::Timestamp { ts, id })
            }
            WindowPredicate::DateTimePair {
                date_field,
                time_field,
                ..
            } => {
                let at = DateTimePair::from_document(doc, date_field, time_field)?;
                Some(Cursor::DateTimePair { at, id })
            }
        }
    }

    /// True when `doc` sorts strictly after this cursor.
    pub fn precedes(&self, predicate: &WindowPredicate, doc: &Document) -> bool {
        match self {
            Cursor::None => true,
            _ => Cursor::after_document(predicate, doc)
                .and_then(|other| other.compare(self))
                .is_some_and(|ord| ord == Ordering::Greater),
        }
    }

    /// Keyset order between two cursors of the same kind.
    pub fn compare(&self, other: &Cursor) -> Option<Ordering> {
        match (self, other) {
            (Cursor::None, Cursor::None) => Some(Ordering::Equal),
            (Cursor::None, _) => Some(Ordering::Less),
            (_, Cursor::None) => Some(Ordering::Greater),
            (Cursor::Timestamp { ts: a, id: ia }, Cursor::Timestamp { ts: b, id: ib }) => {
                Some(a.cmp(b).then_with(|| compare_ids(ia, ib)))
            }
            (
                Cursor::DateTimePair { at: a, id: ia },
                Cursor::DateTimePair { at: b, id: ib },
            ) => Some(a.cmp(b).then_with(|| compare_ids(ia, ib))),
            _ => None,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Cursor::None)
    }
}

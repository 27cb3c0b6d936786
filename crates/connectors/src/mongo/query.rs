//! Renders typed window predicates and keyset cursors into BSON filters.

use bson::{Bson, Document, doc};
use chrono::{DateTime, Utc};
use model::pagination::{
    cursor::Cursor,
    window::{DateTimePair, WindowPredicate},
};

fn bson_ts(ts: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_chrono(ts))
}

fn field_cond(field: &str, cond: impl Into<Bson>) -> Document {
    let mut d = Document::new();
    d.insert(field, cond);
    d
}

fn pair_eq(date_field: &str, time_field: &str, at: &DateTimePair) -> Document {
    let mut d = Document::new();
    d.insert(date_field, at.date.clone());
    d.insert(time_field, at.time.clone());
    d
}

/// `{ts: {$gt: start, $lte: end}}`, or the lexicographic pair equivalent.
pub fn window_filter(predicate: &WindowPredicate) -> Document {
    match predicate {
        WindowPredicate::Timestamp { field, start, end } => field_cond(
            field,
            doc! { "$gt": bson_ts(*start), "$lte": bson_ts(*end) },
        ),
        WindowPredicate::DateTimePair {
            date_field,
            time_field,
            start,
            end,
        } => {
            // (date, time) > start
            let mut after_start_tie = pair_eq(date_field, time_field, start);
            after_start_tie.insert(time_field, doc! { "$gt": start.time.clone() });
            let after_start = doc! { "$or": [
                field_cond(date_field, doc! { "$gt": start.date.clone() }),
                after_start_tie,
            ] };

            // (date, time) <= end
            let mut before_end_tie = pair_eq(date_field, time_field, end);
            before_end_tie.insert(time_field, doc! { "$lte": end.time.clone() });
            let before_end = doc! { "$or": [
                field_cond(date_field, doc! { "$lt": end.date.clone() }),
                before_end_tie,
            ] };

            doc! { "$and": [after_start, before_end] }
        }
    }
}

/// Keyset seek condition: strictly after the cursor position.
pub fn seek_filter(predicate: &WindowPredicate, cursor: &Cursor) -> Option<Document> {
    match (predicate, cursor) {
        (WindowPredicate::Timestamp { field, .. }, Cursor::Timestamp { ts, id }) => {
            // (ts > ?) OR (ts = ? AND _id > ?)
            let mut tie = field_cond(field, bson_ts(*ts));
            tie.insert("_id", doc! { "$gt": id.clone() });
            Some(doc! { "$or": [field_cond(field, doc! { "$gt": bson_ts(*ts) }), tie] })
        }
        (
            WindowPredicate::DateTimePair {
                date_field,
                time_field,
                ..
            },
            Cursor::DateTimePair { at, id },
        ) => {
            let mut time_tie = field_cond(date_field, at.date.clone());
            time_tie.insert(time_field, doc! { "$gt": at.time.clone() });
            let mut id_tie = pair_eq(date_field, time_field, at);
            id_tie.insert("_id", doc! { "$gt": id.clone() });
            Some(doc! { "$or": [
                field_cond(date_field, doc! { "$gt": at.date.clone() }),
                time_tie,
                id_tie,
            ] })
        }
        _ => None,
    }
}

/// Window filter combined with the seek condition, if any.
pub fn fetch_filter(predicate: &WindowPredicate, cursor: &Cursor) -> Document {
    let window = window_filter(predicate);
    match seek_filter(predicate, cursor) {
        Some(seek) => doc! { "$and": [window, seek] },
        None => window,
    }
}

/// Ascending sort on the keyset fields.
pub fn sort_spec(predicate: &WindowPredicate) -> Document {
    let mut sort = Document::new();
    for field in predicate.sort_fields() {
        sort.insert(field, 1);
    }
    sort
}

pub fn projection(fields: &[String]) -> Document {
    let mut projection = Document::new();
    for field in fields {
        projection.insert(field.as_str(), 1);
    }
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts_predicate() -> WindowPredicate {
        WindowPredicate::Timestamp {
            field: "InsertOn".into(),
            start: Utc.with_ymd_and_hms(2025, 4, 12, 10, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 4, 12, 10, 10, 0).unwrap(),
        }
    }

    #[test]
    fn timestamp_window_is_half_open() {
        let filter = window_filter(&ts_predicate());
        let cond = filter.get_document("InsertOn").unwrap();
        assert!(cond.contains_key("$gt"));
        assert!(cond.contains_key("$lte"));
    }

    #[test]
    fn first_page_has_no_seek() {
        let filter = fetch_filter(&ts_predicate(), &Cursor::None);
        assert_eq!(filter, window_filter(&ts_predicate()));
    }

    #[test]
    fn seek_uses_id_tie_breaker() {
        let cursor = Cursor::Timestamp {
            ts: Utc.with_ymd_and_hms(2025, 4, 12, 10, 5, 0).unwrap(),
            id: Bson::Int32(7),
        };
        let filter = fetch_filter(&ts_predicate(), &cursor);
        let clauses = filter.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 2);

        let seek = seek_filter(&ts_predicate(), &cursor).unwrap();
        let branches = seek.get_array("$or").unwrap();
        let tie = branches[1].as_document().unwrap();
        assert_eq!(tie.get_document("_id").unwrap(), &doc! { "$gt": 7 });
    }

    #[test]
    fn pair_window_and_sort() {
        let predicate = WindowPredicate::DateTimePair {
            date_field: "inserted_date".into(),
            time_field: "inserted_time".into(),
            start: DateTimePair::new("2025-04-12", "10:00:00"),
            end: DateTimePair::new("2025-04-12", "10:10:00"),
        };
        let filter = window_filter(&predicate);
        assert_eq!(filter.get_array("$and").unwrap().len(), 2);
        assert_eq!(
            sort_spec(&predicate),
            doc! { "inserted_date": 1, "inserted_time": 1, "_id": 1 }
        );
    }

    #[test]
    fn projection_keeps_listed_fields() {
        let fields = vec!["_id".to_string(), "price".to_string()];
        assert_eq!(projection(&fields), doc! { "_id": 1, "price": 1 });
    }
}

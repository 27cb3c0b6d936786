use bson::{Bson, Document, doc};
use chrono::{DateTime, TimeZone, Utc};
use engine_core::metrics::CollectionTotals;
use engine_runtime::execution::coordinator::{RunOutcome, RunReport};
use model::core::provenance::PROCESSING_TIME;

/// 2025-04-12 at `h:m` UTC.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 12, h, m, 0).unwrap()
}

pub fn bson_at(h: u32, m: u32) -> bson::DateTime {
    bson::DateTime::from_chrono(at(h, m))
}

pub fn airline_doc(id: i32, h: u32, m: u32, intl: bool, elapsed_ms: i64) -> Document {
    doc! {
        "_id": id,
        "InsertOn": bson_at(h, m),
        "level": "info",
        "Message": { "IsIntl": intl, "elapsed_time": elapsed_ms },
    }
}

/// Airline log line without its nested payload.
pub fn broken_airline_doc(id: i32, h: u32, m: u32) -> Document {
    doc! { "_id": id, "InsertOn": bson_at(h, m), "level": "error" }
}

pub fn ecom_doc(id: &str, time: &str, cabin: &str) -> Document {
    doc! {
        "_id": id,
        "inserted_date": "2025-04-12",
        "inserted_time": time,
        "cabinClass": cabin,
        "travelDate": "Sat-12Apr2025",
        "coupon": " emtfly ",
    }
}

pub fn completed(outcome: RunOutcome) -> RunReport {
    match outcome {
        RunOutcome::Completed(report) => report,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

pub fn collection<'a>(report: &'a RunReport, name: &str) -> &'a CollectionTotals {
    report
        .totals
        .get(name)
        .unwrap_or_else(|| panic!("no totals for {name}"))
}

pub fn processing_time(doc: &Document) -> DateTime<Utc> {
    doc.get_datetime(PROCESSING_TIME)
        .expect("Processing_Time")
        .to_chrono()
}

pub fn ids(docs: &[Document]) -> Vec<String> {
    let mut ids: Vec<String> = docs
        .iter()
        .map(|d| match d.get("_id") {
            Some(Bson::String(id)) => id.clone(),
            Some(id) => id.to_string(),
            None => String::new(),
        })
        .collect();
    ids.sort();
    ids
}

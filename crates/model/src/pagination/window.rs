use bson::Document;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("window start {start} is after its end {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// `(start, end]` processing window, frozen for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl RunWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts > self.start && ts <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Human readable window, e.g. `10:00:00 - 10:10:00 (IST)`.
    pub fn time_range(&self, tz: Tz) -> String {
        let start = self.start.with_timezone(&tz);
        let end = self.end.with_timezone(&tz);
        format!(
            "{} - {} ({})",
            start.format("%H:%M:%S"),
            end.format("%H:%M:%S"),
            end.format("%Z")
        )
    }
}

/// Local `(date, time)` string pair as written by sources that store
/// `YYYY-MM-DD` and `HH:MM:SS` in separate fields. Ordering is lexicographic,
/// date first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateTimePair {
    pub date: String,
    pub time: String,
}

impl DateTimePair {
    pub fn new(date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
        }
    }

    pub fn at(instant: DateTime<Utc>, tz: Tz) -> Self {
        let local = instant.with_timezone(&tz);
        Self {
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M:%S").to_string(),
        }
    }

    pub fn from_document(doc: &Document, date_field: &str, time_field: &str) -> Option<Self> {
        let date = doc.get_str(date_field).ok()?;
        let time = doc.get_str(time_field).ok()?;
        if date.is_empty() || time.is_empty() {
            return None;
        }
        Some(Self::new(date, time))
    }
}

impl fmt::Display for DateTimePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

/// Which source fields carry the window signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowSpec {
    /// A native datetime field.
    Timestamp { field: String },
    /// Separate string date and time fields in the display timezone.
    DateTimePair {
        date_field: String,
        time_field: String,
    },
}

impl WindowSpec {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            WindowSpec::Timestamp { field } => vec![field.as_str()],
            WindowSpec::DateTimePair {
                date_field,
                time_field,
            } => vec![date_field.as_str(), time_field.as_str()],
        }
    }
}

/// Typed extraction predicate for one run window. Connectors render it into
/// their own query language.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowPredicate {
    Timestamp {
        field: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    DateTimePair {
        date_field: String,
        time_field: String,
        start: DateTimePair,
        end: DateTimePair,
    },
}

impl WindowPredicate {
    pub fn new(spec: &WindowSpec, window: &RunWindow, tz: Tz) -> Self {
        match spec {
            WindowSpec::Timestamp { field } => WindowPredicate::Timestamp {
                field: field.clone(),
                start: window.start(),
                end: window.end(),
            },
            WindowSpec::DateTimePair {
                date_field,
                time_field,
            } => WindowPredicate::DateTimePair {
                date_field: date_field.clone(),
                time_field: time_field.clone(),
                start: DateTimePair::at(window.start(), tz),
                end: DateTimePair::at(window.end(), tz),
            },
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            WindowPredicate::Timestamp { field, start, end } => match doc.get_datetime(field) {
                Ok(ts) => {
                    let ts = ts.to_chrono();
                    ts > *start && ts <= *end
                }
                Err(_) => false,
            },
            WindowPredicate::DateTimePair {
                date_field,
                time_field,
                start,
                end,
            } => match DateTimePair::from_document(doc, date_field, time_field) {
                Some(at) => at > *start && at <= *end,
                None => false,
            },
        }
    }

    /// Fields in keyset order, `_id` last.
    pub fn sort_fields(&self) -> Vec<&str> {
        match self {
            WindowPredicate::Timestamp { field, .. } => vec![field.as_str(), "_id"],
            WindowPredicate::DateTimePair {
                date_field,
                time_field,
                ..
            } => vec![date_field.as_str(), time_field.as_str(), "_id"],
        }
    }
}

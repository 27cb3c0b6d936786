use crate::pagination::window::RunWindow;
use bson::Document;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub const ID: &str = "_id";
pub const PROCESSING_TIME: &str = "Processing_Time";
pub const TIME_RANGE: &str = "time_range";
pub const RECORD_DATE: &str = "record_date";
pub const ORIGINAL_DOC: &str = "original_doc";

/// Provenance shared by every record written in one run.
#[derive(Debug, Clone)]
pub struct Provenance {
    processing_time: DateTime<Utc>,
    time_range: String,
    timezone: Tz,
}

impl Provenance {
    /// The run's processing time is the window end.
    pub fn for_window(window: &RunWindow, timezone: Tz) -> Self {
        Self {
            processing_time: window.end(),
            time_range: window.time_range(timezone),
            timezone,
        }
    }

    pub fn processing_time(&self) -> DateTime<Utc> {
        self.processing_time
    }

    pub fn time_range(&self) -> &str {
        &self.time_range
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// `YYYY-MM-DD` of an instant in the display timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format("%Y-%m-%d")
            .to_string()
    }

    pub fn stamp(&self, record: &mut Document, record_date: String) {
        record.insert(TIME_RANGE, self.time_range.clone());
        record.insert(
            PROCESSING_TIME,
            bson::DateTime::from_chrono(self.processing_time),
        );
        record.insert(RECORD_DATE, record_date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stamps_all_provenance_fields() {
        let start = Utc.with_ymd_and_hms(2025, 4, 12, 18, 20, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 4, 12, 18, 30, 0).unwrap();
        let window = RunWindow::new(start, end).unwrap();
        let provenance = Provenance::for_window(&window, chrono_tz::Asia::Kolkata);

        let mut record = Document::new();
        provenance.stamp(&mut record, provenance.local_date(end));

        assert_eq!(record.get_str(TIME_RANGE).unwrap(), "23:50:00 - 00:00:00 (IST)");
        assert_eq!(record.get_str(RECORD_DATE).unwrap(), "2025-04-13");
        assert_eq!(
            record.get_datetime(PROCESSING_TIME).unwrap().to_chrono(),
            end
        );
    }
}

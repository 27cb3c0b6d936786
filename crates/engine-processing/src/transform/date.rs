use chrono::{DateTime, NaiveDate, NaiveDateTime, Weekday};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

pub const OUTPUT_FORMAT: &str = "%d-%m-%Y";

lazy_static! {
    // `Sat-12Apr2025`
    static ref HYPHENATED_WEEKDAY: Regex =
        Regex::new(r"^[A-Za-z]{3}-\d{2}[A-Za-z]{3}\d{4}$").unwrap();
}

#[derive(Debug, Clone, Copy)]
enum Candidate {
    /// `Sat12Apr2025` once hyphens are gone.
    WeekdayCompact,
    /// `2/17/2025 12:00:00 AM`
    UsDateTime,
    /// `Fri Feb 14 00:00:00 GMT+05:30 2025`
    JsDateString,
    Date(&'static str),
}

const CANDIDATES: [Candidate; 6] = [
    Candidate::WeekdayCompact,
    Candidate::UsDateTime,
    Candidate::JsDateString,
    Candidate::Date("%Y-%m-%d"),
    Candidate::Date("%m-%d-%Y"),
    Candidate::Date("%d-%m-%Y"),
];

/// Parses the date encodings found in booking payloads into `DD-MM-YYYY`.
///
/// Formats are tried in a fixed order, so an ambiguous `05-07-2025` reads as
/// month first.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer;

impl DateNormalizer {
    pub fn new() -> Self {
        DateNormalizer
    }

    /// First candidate that parses, as a calendar date.
    pub fn parse(&self, text: &str) -> Option<NaiveDate> {
        let text = text.trim();
        let text = if HYPHENATED_WEEKDAY.is_match(text) {
            text.replace('-', "")
        } else {
            text.to_string()
        };

        CANDIDATES
            .iter()
            .find_map(|candidate| Self::try_candidate(*candidate, &text))
    }

    /// `DD-MM-YYYY`, or the input unchanged with a warning.
    pub fn standardize(&self, text: &str) -> String {
        match self.parse(text) {
            Some(date) => date.format(OUTPUT_FORMAT).to_string(),
            None => {
                warn!(value = %text, "Unable to parse date");
                text.to_string()
            }
        }
    }

    fn try_candidate(candidate: Candidate, text: &str) -> Option<NaiveDate> {
        match candidate {
            Candidate::WeekdayCompact => {
                let rest = strip_weekday(text, "")?;
                NaiveDate::parse_from_str(rest, "%d%b%Y").ok()
            }
            Candidate::UsDateTime => {
                NaiveDateTime::parse_from_str(text, "%m/%d/%Y %I:%M:%S %p")
                    .ok()
                    .map(|dt| dt.date())
            }
            Candidate::JsDateString => {
                let rest = strip_weekday(text, " ")?;
                DateTime::parse_from_str(rest, "%b %d %H:%M:%S GMT%z %Y")
                    .ok()
                    .map(|dt| dt.date_naive())
            }
            Candidate::Date(format) => NaiveDate::parse_from_str(text, format).ok(),
        }
    }
}

/// Drops a leading three letter weekday followed by `separator`. The weekday
/// itself is not checked against the date.
fn strip_weekday<'a>(text: &'a str, separator: &str) -> Option<&'a str> {
    let day = text.get(..3)?;
    day.parse::<Weekday>().ok()?;
    text[3..].strip_prefix(separator)
}

use crate::{
    error::TransformError,
    transform::{
        derivations::pipeline_for_derivations,
        pipeline::{TransformContext, TransformPipeline},
        projector::FieldProjector,
    },
};
use bson::Document;
use engine_config::settings::PipelineSettings;
use model::{
    core::provenance::{ID, ORIGINAL_DOC, Provenance},
    pagination::window::WindowSpec,
    records::outcome::{Outcome, QuarantinedRecord, TransformedRecord},
    transform::{derivation::Derivation, shape::RecordShape},
};
use tracing::warn;

pub const DEFAULT_REASON_FIELD: &str = "issue";

/// Outcomes of one chunk, split by destination.
#[derive(Debug, Default)]
pub struct Classified {
    pub records: Vec<TransformedRecord>,
    pub quarantined: Vec<QuarantinedRecord>,
}

impl Classified {
    pub fn len(&self) -> usize {
        self.records.len() + self.quarantined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns one source document into exactly one success or quarantine record.
pub struct RecordClassifier {
    projector: FieldProjector,
    pipeline: TransformPipeline,
    window: WindowSpec,
    reason_field: String,
    provenance: Provenance,
}

impl RecordClassifier {
    pub fn new(
        shape: RecordShape,
        derivations: &[Derivation],
        window: WindowSpec,
        provenance: Provenance,
    ) -> Self {
        Self {
            projector: FieldProjector::new(shape),
            pipeline: pipeline_for_derivations(derivations),
            window,
            reason_field: DEFAULT_REASON_FIELD.to_string(),
            provenance,
        }
    }

    pub fn for_pipeline(settings: &PipelineSettings, provenance: Provenance) -> Self {
        Self::new(
            settings.shape.clone(),
            &settings.derivations,
            settings.window.clone(),
            provenance,
        )
        .with_reason_field(settings.reason_field.clone())
    }

    pub fn with_reason_field(mut self, field: impl Into<String>) -> Self {
        self.reason_field = field.into();
        self
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn classify(&self, doc: &Document, ctx: &TransformContext) -> Outcome {
        match self.transform(doc, ctx) {
            Ok(record) => Outcome::Success(TransformedRecord::new(record)),
            Err(err) => {
                warn!(
                    collection = %ctx.collection,
                    id = ?doc.get(ID),
                    error = %err,
                    "Document quarantined"
                );
                Outcome::Quarantined(self.quarantine(doc, ctx, &err))
            }
        }
    }

    pub fn classify_all(&self, docs: &[Document], ctx: &TransformContext) -> Classified {
        docs.iter()
            .map(|doc| self.classify(doc, ctx))
            .fold(Classified::default(), |mut acc, outcome| {
                match outcome {
                    Outcome::Success(record) => acc.records.push(record),
                    Outcome::Quarantined(record) => acc.quarantined.push(record),
                }
                acc
            })
    }

    fn transform(
        &self,
        doc: &Document,
        ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        let projected = self.projector.project(doc)?;
        let mut record = self.pipeline.apply(projected, ctx)?;
        self.projector.fill_defaults(&mut record);

        let record_date = self.record_date(doc)?;
        self.provenance.stamp(&mut record, record_date);
        Ok(record)
    }

    fn quarantine(
        &self,
        doc: &Document,
        ctx: &TransformContext,
        err: &TransformError,
    ) -> QuarantinedRecord {
        let projected = self.projector.project_lenient(doc);
        let mut record = self.pipeline.fallback(projected, ctx);
        self.projector.fill_defaults(&mut record);

        let reason = format!("Processing failed: {err}");
        record.insert(ORIGINAL_DOC, doc.clone());
        record.insert(self.reason_field.as_str(), reason.as_str());

        let record_date = self.record_date(doc).unwrap_or_else(|_| {
            self.provenance
                .local_date(self.provenance.processing_time())
        });
        self.provenance.stamp(&mut record, record_date);

        QuarantinedRecord::new(doc.get(ID).cloned(), reason, record)
    }

    /// Date of the document itself: the timestamp's local date, or the
    /// stored date string for date/time pair sources.
    fn record_date(&self, doc: &Document) -> Result<String, TransformError> {
        match &self.window {
            WindowSpec::Timestamp { field } => doc
                .get_datetime(field)
                .map(|ts| self.provenance.local_date(ts.to_chrono()))
                .map_err(|_| TransformError::MissingTimestamp(field.clone())),
            WindowSpec::DateTimePair { date_field, .. } => match doc.get_str(date_field) {
                Ok(date) if !date.is_empty() => Ok(date.to_string()),
                _ => Err(TransformError::MissingTimestamp(date_field.clone())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};
    use chrono::{TimeZone, Utc};
    use model::{
        core::provenance::{PROCESSING_TIME, RECORD_DATE, TIME_RANGE},
        pagination::window::RunWindow,
        transform::derivation::PortalRule,
    };
    use std::collections::BTreeMap;

    fn provenance() -> Provenance {
        let start = Utc.with_ymd_and_hms(2025, 4, 12, 18, 20, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 4, 12, 18, 30, 0).unwrap();
        Provenance::for_window(&RunWindow::new(start, end).unwrap(), chrono_tz::Asia::Kolkata)
    }

    fn airline_classifier() -> RecordClassifier {
        RecordClassifier::new(
            RecordShape {
                root: vec!["InsertOn".into(), "level".into()],
                nested_key: Some("Message".into()),
                nested: vec!["IsIntl".into(), "elapsed_time".into()],
                durations: vec!["elapsed_time".into()],
                ..Default::default()
            },
            &[
                Derivation::CollectionLabel {
                    output: "airline_name".into(),
                    strip_suffix: Some("_RQ_RS".into()),
                },
                Derivation::IssueFlag {
                    flag: "is_issue".into(),
                    reason: "issue".into(),
                },
                Derivation::FlightType {
                    field: "IsIntl".into(),
                    output: "FlightType".into(),
                },
            ],
            WindowSpec::Timestamp {
                field: "InsertOn".into(),
            },
            provenance(),
        )
    }

    fn inserted_at(h: u32, m: u32) -> bson::DateTime {
        bson::DateTime::from_chrono(Utc.with_ymd_and_hms(2025, 4, 12, h, m, 0).unwrap())
    }

    #[test]
    fn well_formed_document_succeeds() {
        let classifier = airline_classifier();
        let ctx = TransformContext::new("Indigo_RQ_RS");
        let doc = doc! {
            "_id": 7,
            "InsertOn": inserted_at(18, 25),
            "level": "info",
            "Message": { "IsIntl": true, "elapsed_time": 1500 },
        };

        let Outcome::Success(record) = classifier.classify(&doc, &ctx) else {
            panic!("expected success");
        };
        assert_eq!(record.get("_id"), Some(&Bson::Int32(7)));
        assert_eq!(record.get("airline_name"), Some(&Bson::from("Indigo")));
        assert_eq!(record.get("FlightType"), Some(&Bson::from("International")));
        assert_eq!(record.get("elapsed_time"), Some(&Bson::Double(1.5)));
        assert_eq!(record.get("is_issue"), Some(&Bson::Boolean(false)));
        assert_eq!(record.get(RECORD_DATE), Some(&Bson::from("2025-04-12")));
        assert_eq!(
            record.get(TIME_RANGE),
            Some(&Bson::from("23:50:00 - 00:00:00 (IST)"))
        );
        assert_eq!(
            record.as_document().get_datetime(PROCESSING_TIME).unwrap().to_chrono(),
            classifier.provenance().processing_time()
        );
    }

    #[test]
    fn missing_nested_object_is_quarantined() {
        let classifier = airline_classifier();
        let ctx = TransformContext::new("Indigo_RQ_RS");
        let doc = doc! { "_id": 8, "InsertOn": inserted_at(18, 25), "level": "error" };

        let Outcome::Quarantined(record) = classifier.classify(&doc, &ctx) else {
            panic!("expected quarantine");
        };
        assert_eq!(record.id(), Some(&Bson::Int32(8)));
        assert!(record.reason().contains("missing nested object 'Message'"));
        assert_eq!(
            record.get("issue"),
            Some(&Bson::from("Processing failed: missing nested object 'Message'"))
        );
        assert_eq!(record.get("is_issue"), Some(&Bson::Boolean(true)));
        assert_eq!(record.get("FlightType"), Some(&Bson::from("Domestic")));
        assert_eq!(record.get("airline_name"), Some(&Bson::from("Indigo")));
        assert_eq!(record.get(ORIGINAL_DOC), Some(&Bson::Document(doc.clone())));
        assert_eq!(record.get(RECORD_DATE), Some(&Bson::from("2025-04-12")));
        assert!(record.get(PROCESSING_TIME).is_some());
    }

    #[test]
    fn missing_timestamp_is_quarantined_with_processing_date() {
        let classifier = airline_classifier();
        let ctx = TransformContext::new("Indigo_RQ_RS");
        let doc = doc! { "_id": 9, "Message": { "IsIntl": false } };

        let Outcome::Quarantined(record) = classifier.classify(&doc, &ctx) else {
            panic!("expected quarantine");
        };
        assert!(record.reason().contains("InsertOn"));
        // processing time 18:30 UTC is already the 13th in IST
        assert_eq!(record.get(RECORD_DATE), Some(&Bson::from("2025-04-13")));
    }

    #[test]
    fn reprice_fallbacks_and_reason_field() {
        let classifier = RecordClassifier::new(
            RecordShape {
                root: vec!["Date".into()],
                nested_key: Some("Message".into()),
                nested: vec!["username".into(), "faredifference".into()],
                numerics: vec!["faredifference".into()],
                ..Default::default()
            },
            &[
                Derivation::RepriceFlag {
                    field: "faredifference".into(),
                    output: "Actual_Reprice".into(),
                },
                Derivation::Portal {
                    field: "username".into(),
                    output: "Portal".into(),
                    rules: vec![PortalRule {
                        label: "B2B".into(),
                        exact: vec!["B2B".into()],
                        contains: vec![],
                    }],
                    default: "B2C".into(),
                },
            ],
            WindowSpec::Timestamp {
                field: "Date".into(),
            },
            provenance(),
        )
        .with_reason_field("error");
        let ctx = TransformContext::new("fs_reprice_rs");

        let ok = doc! { "_id": 1, "Date": inserted_at(18, 21), "Message": { "username": "B2B", "faredifference": "15" } };
        let bad = doc! { "_id": 2, "Date": "yesterday", "Message": { "username": "B2B", "faredifference": "15" } };

        let classified = classifier.classify_all(&[ok, bad], &ctx);
        assert_eq!(classified.len(), 2);
        assert_eq!(classified.records.len(), 1);
        assert_eq!(classified.quarantined.len(), 1);

        let record = &classified.records[0];
        assert_eq!(record.get("Actual_Reprice"), Some(&Bson::Boolean(true)));
        assert_eq!(record.get("Portal"), Some(&Bson::from("B2B")));

        let quarantined = &classified.quarantined[0];
        assert_eq!(quarantined.get("Actual_Reprice"), Some(&Bson::Boolean(false)));
        assert_eq!(quarantined.get("faredifference"), Some(&Bson::Double(15.0)));
        assert_eq!(quarantined.get("Portal"), Some(&Bson::from("B2B")));
        assert!(quarantined.get("error").is_some());
    }

    #[test]
    fn pair_sources_keep_their_date_and_defaults() {
        let classifier = RecordClassifier::new(
            RecordShape {
                nested: vec![
                    "inserted_date".into(),
                    "inserted_time".into(),
                    "airline".into(),
                ],
                defaults: BTreeMap::from([
                    ("airline".to_string(), "unknown".to_string()),
                    ("airline_name".to_string(), "UNKNOWN".to_string()),
                ]),
                ..Default::default()
            },
            &[Derivation::FirstToken {
                field: "airline".into(),
                output: "airline_name".into(),
            }],
            WindowSpec::DateTimePair {
                date_field: "inserted_date".into(),
                time_field: "inserted_time".into(),
            },
            provenance(),
        );
        let ctx = TransformContext::new("SearchData");
        let doc = doc! { "_id": "s1", "inserted_date": "2025-04-12", "inserted_time": "23:55:00", "airline": null };

        let Outcome::Success(record) = classifier.classify(&doc, &ctx) else {
            panic!("expected success");
        };
        assert_eq!(record.get(RECORD_DATE), Some(&Bson::from("2025-04-12")));
        assert_eq!(record.get("airline"), Some(&Bson::from("unknown")));
        assert_eq!(record.get("airline_name"), Some(&Bson::from("UNKNOWN")));
    }
}

//! Business derivations, one [`Transform`] per [`Derivation`] kind.

use crate::{
    error::TransformError,
    transform::{
        date::DateNormalizer,
        pipeline::{Transform, TransformContext, TransformPipeline},
    },
};
use bson::{Bson, Document};
use model::{
    core::{
        provenance::ID,
        value::{as_f64, is_blank, is_truthy},
    },
    transform::derivation::{Derivation, PortalRule},
};
use std::{collections::BTreeMap, sync::Arc};

pub fn pipeline_for_derivations(derivations: &[Derivation]) -> TransformPipeline {
    derivations
        .iter()
        .fold(TransformPipeline::new(), |pipeline, derivation| {
            pipeline.add_boxed(transform_for(derivation))
        })
}

pub fn transform_for(derivation: &Derivation) -> Arc<dyn Transform> {
    match derivation.clone() {
        Derivation::CollectionLabel {
            output,
            strip_suffix,
        } => Arc::new(CollectionLabel {
            output,
            strip_suffix,
        }),
        Derivation::FlightType { field, output } => Arc::new(FlightType { field, output }),
        Derivation::RepriceFlag { field, output } => Arc::new(RepriceFlag { field, output }),
        Derivation::Portal {
            field,
            output,
            rules,
            default,
        } => Arc::new(Portal {
            field,
            output,
            rules,
            default,
        }),
        Derivation::CategoryMap { field, mapping } => Arc::new(CategoryMap { field, mapping }),
        Derivation::NormalizeDate { field } => Arc::new(NormalizeDate {
            field,
            normalizer: DateNormalizer::new(),
        }),
        Derivation::Uppercase { field, trim } => Arc::new(Uppercase { field, trim }),
        Derivation::CleanText { except } => Arc::new(CleanText { except }),
        Derivation::FirstToken { field, output } => Arc::new(FirstToken { field, output }),
        Derivation::IssueFlag { flag, reason } => Arc::new(IssueFlag { flag, reason }),
    }
}

pub struct CollectionLabel {
    output: String,
    strip_suffix: Option<String>,
}

impl Transform for CollectionLabel {
    fn name(&self) -> &'static str {
        "collection_label"
    }

    fn apply(
        &self,
        mut record: Document,
        ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        let label = match &self.strip_suffix {
            Some(suffix) => ctx.collection.replace(suffix.as_str(), ""),
            None => ctx.collection.clone(),
        };
        record.insert(self.output.as_str(), label);
        Ok(record)
    }
}

pub struct FlightType {
    field: String,
    output: String,
}

impl Transform for FlightType {
    fn name(&self) -> &'static str {
        "flight_type"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        let international = record.get(&self.field).is_some_and(is_truthy);
        let label = if international {
            "International"
        } else {
            "Domestic"
        };
        record.insert(self.output.as_str(), label);
        Ok(record)
    }

    fn fallback(&self, mut record: Document, _ctx: &TransformContext) -> Document {
        record.insert(self.output.as_str(), "Domestic");
        record
    }
}

pub struct RepriceFlag {
    field: String,
    output: String,
}

impl Transform for RepriceFlag {
    fn name(&self) -> &'static str {
        "reprice_flag"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        let repriced = match record.get(&self.field) {
            None | Some(Bson::Null) => false,
            Some(value) => match as_f64(value) {
                Some(diff) => diff > 0.0,
                None => {
                    return Err(TransformError::invalid(
                        &self.field,
                        format!("expected a number, got {value}"),
                    ));
                }
            },
        };
        record.insert(self.output.as_str(), repriced);
        Ok(record)
    }

    fn fallback(&self, mut record: Document, _ctx: &TransformContext) -> Document {
        record.insert(self.output.as_str(), false);
        record
    }
}

pub struct Portal {
    field: String,
    output: String,
    rules: Vec<PortalRule>,
    default: String,
}

impl Portal {
    fn classify(&self, value: Option<&Bson>) -> Result<&str, TransformError> {
        match value {
            None => Ok(self.default.as_str()),
            Some(v) if is_blank(v) => Ok(self.default.as_str()),
            Some(Bson::String(username)) => Ok(self
                .rules
                .iter()
                .find(|rule| rule.matches(username))
                .map(|rule| rule.label.as_str())
                .unwrap_or(self.default.as_str())),
            Some(other) => Err(TransformError::invalid(
                &self.field,
                format!("expected a string, got {other}"),
            )),
        }
    }
}

impl Transform for Portal {
    fn name(&self) -> &'static str {
        "portal"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        let label = self.classify(record.get(&self.field))?.to_string();
        record.insert(self.output.as_str(), label);
        Ok(record)
    }

    fn fallback(&self, mut record: Document, _ctx: &TransformContext) -> Document {
        let label = self
            .classify(record.get(&self.field))
            .unwrap_or(self.default.as_str())
            .to_string();
        record.insert(self.output.as_str(), label);
        record
    }
}

pub struct CategoryMap {
    field: String,
    mapping: BTreeMap<String, String>,
}

impl Transform for CategoryMap {
    fn name(&self) -> &'static str {
        "category_map"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        if let Ok(code) = record.get_str(&self.field)
            && let Some(label) = self.mapping.get(code)
        {
            let label = label.clone();
            record.insert(self.field.as_str(), label);
        }
        Ok(record)
    }
}

pub struct NormalizeDate {
    field: String,
    normalizer: DateNormalizer,
}

impl Transform for NormalizeDate {
    fn name(&self) -> &'static str {
        "normalize_date"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        if let Ok(text) = record.get_str(&self.field)
            && !text.is_empty()
        {
            let normalized = self.normalizer.standardize(text);
            record.insert(self.field.as_str(), normalized);
        }
        Ok(record)
    }
}

pub struct Uppercase {
    field: String,
    trim: bool,
}

impl Transform for Uppercase {
    fn name(&self) -> &'static str {
        "uppercase"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        let text = match record.get(&self.field) {
            None | Some(Bson::Null) => return Ok(record),
            Some(Bson::String(s)) => s.clone(),
            Some(value @ (Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))) => value.to_string(),
            Some(other) => {
                return Err(TransformError::invalid(
                    &self.field,
                    format!("cannot uppercase {other}"),
                ));
            }
        };
        let text = if self.trim { text.trim() } else { text.as_str() };
        let upper = text.to_uppercase();
        record.insert(self.field.as_str(), upper);
        Ok(record)
    }
}

pub struct CleanText {
    except: Vec<String>,
}

impl Transform for CleanText {
    fn name(&self) -> &'static str {
        "clean_text"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        for (key, value) in record.iter_mut() {
            if key.as_str() == ID || self.except.iter().any(|f| f == key) {
                continue;
            }
            if let Bson::String(text) = value {
                *text = text.trim().to_lowercase();
            }
        }
        Ok(record)
    }
}

pub struct FirstToken {
    field: String,
    output: String,
}

impl Transform for FirstToken {
    fn name(&self) -> &'static str {
        "first_token"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        let token = match record.get(&self.field) {
            None | Some(Bson::Null) => return Ok(record),
            Some(Bson::String(s)) => s
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_uppercase(),
            Some(other) => {
                return Err(TransformError::invalid(
                    &self.field,
                    format!("expected a string, got {other}"),
                ));
            }
        };
        if !token.is_empty() {
            record.insert(self.output.as_str(), token);
        }
        Ok(record)
    }
}

pub struct IssueFlag {
    flag: String,
    reason: String,
}

impl Transform for IssueFlag {
    fn name(&self) -> &'static str {
        "issue_flag"
    }

    fn apply(
        &self,
        mut record: Document,
        _ctx: &TransformContext,
    ) -> Result<Document, TransformError> {
        record.insert(self.flag.as_str(), false);
        record.insert(self.reason.as_str(), Bson::Null);
        Ok(record)
    }

    fn fallback(&self, mut record: Document, _ctx: &TransformContext) -> Document {
        record.insert(self.flag.as_str(), true);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn ctx() -> TransformContext {
        TransformContext::new("AirArabia_RQ_RS")
    }

    fn run(derivation: Derivation, record: Document) -> Result<Document, TransformError> {
        transform_for(&derivation).apply(record, &ctx())
    }

    #[test]
    fn collection_label_strips_suffix() {
        let out = run(
            Derivation::CollectionLabel {
                output: "airline_name".into(),
                strip_suffix: Some("_RQ_RS".into()),
            },
            doc! {},
        )
        .unwrap();
        assert_eq!(out.get_str("airline_name").unwrap(), "AirArabia");
    }

    #[test]
    fn flight_type_from_flag() {
        let d = || Derivation::FlightType {
            field: "IsIntl".into(),
            output: "FlightType".into(),
        };
        let intl = run(d(), doc! { "IsIntl": true }).unwrap();
        let dom = run(d(), doc! { "IsIntl": null }).unwrap();
        assert_eq!(intl.get_str("FlightType").unwrap(), "International");
        assert_eq!(dom.get_str("FlightType").unwrap(), "Domestic");

        let fallback = transform_for(&d()).fallback(doc! { "IsIntl": true }, &ctx());
        assert_eq!(fallback.get_str("FlightType").unwrap(), "Domestic");
    }

    #[test]
    fn reprice_flag_is_strictly_positive() {
        let d = || Derivation::RepriceFlag {
            field: "faredifference".into(),
            output: "Actual_Reprice".into(),
        };
        let up = run(d(), doc! { "faredifference": 12.0 }).unwrap();
        let zero = run(d(), doc! { "faredifference": 0.0 }).unwrap();
        let down = run(d(), doc! { "faredifference": -3 }).unwrap();
        assert!(up.get_bool("Actual_Reprice").unwrap());
        assert!(!zero.get_bool("Actual_Reprice").unwrap());
        assert!(!down.get_bool("Actual_Reprice").unwrap());

        assert!(run(d(), doc! { "faredifference": "n/a" }).is_err());
        let fallback = transform_for(&d()).fallback(doc! { "faredifference": "n/a" }, &ctx());
        assert!(!fallback.get_bool("Actual_Reprice").unwrap());
    }

    fn portal() -> Derivation {
        Derivation::Portal {
            field: "user_name".into(),
            output: "Portal".into(),
            rules: vec![
                PortalRule {
                    label: "B2B".into(),
                    exact: vec![],
                    contains: vec!["B2B".into(), "EMTB2BIN".into()],
                },
                PortalRule {
                    label: "CORPORATE".into(),
                    exact: vec![],
                    contains: vec!["CORPORATE".into()],
                },
            ],
            default: "B2C".into(),
        }
    }

    #[test]
    fn portal_labels() {
        let label = |record| {
            run(portal(), record)
                .unwrap()
                .get_str("Portal")
                .unwrap()
                .to_string()
        };
        assert_eq!(label(doc! { "user_name": "agent-emtb2bin" }), "B2B");
        assert_eq!(label(doc! { "user_name": "acme corporate" }), "CORPORATE");
        assert_eq!(label(doc! { "user_name": "someone" }), "B2C");
        assert_eq!(label(doc! { "user_name": "" }), "B2C");
        assert_eq!(label(doc! {}), "B2C");

        assert!(run(portal(), doc! { "user_name": 7 }).is_err());
        let fallback = transform_for(&portal()).fallback(doc! { "user_name": 7 }, &ctx());
        assert_eq!(fallback.get_str("Portal").unwrap(), "B2C");
    }

    #[test]
    fn category_map_keeps_unknown_codes() {
        let d = || Derivation::CategoryMap {
            field: "class".into(),
            mapping: BTreeMap::from([
                ("0".to_string(), "Economy".to_string()),
                ("2".to_string(), "Business".to_string()),
            ]),
        };
        assert_eq!(
            run(d(), doc! { "class": "2" }).unwrap().get_str("class").unwrap(),
            "Business"
        );
        assert_eq!(
            run(d(), doc! { "class": "9" }).unwrap().get_str("class").unwrap(),
            "9"
        );
        assert_eq!(run(d(), doc! { "class": 0 }).unwrap().get_i32("class").unwrap(), 0);
    }

    #[test]
    fn normalize_date_rewrites_strings_only() {
        let d = || Derivation::NormalizeDate {
            field: "travelDate".into(),
        };
        let out = run(d(), doc! { "travelDate": "2025-02-02" }).unwrap();
        assert_eq!(out.get_str("travelDate").unwrap(), "02-02-2025");
        let out = run(d(), doc! { "travelDate": null }).unwrap();
        assert_eq!(out.get("travelDate"), Some(&Bson::Null));
    }

    #[test]
    fn uppercase_with_trim() {
        let d = || Derivation::Uppercase {
            field: "coupon".into(),
            trim: true,
        };
        let out = run(d(), doc! { "coupon": "  save10 " }).unwrap();
        assert_eq!(out.get_str("coupon").unwrap(), "SAVE10");
        let out = run(d(), doc! { "coupon": 42 }).unwrap();
        assert_eq!(out.get_str("coupon").unwrap(), "42");
        assert!(run(d(), doc! { "coupon": [1] }).is_err());
    }

    #[test]
    fn clean_text_skips_exceptions() {
        let out = run(
            Derivation::CleanText {
                except: vec!["coupon".into()],
            },
            doc! { "_id": "AbC", "app": "  Android ", "coupon": " Save ", "count": 3 },
        )
        .unwrap();
        assert_eq!(out.get_str("_id").unwrap(), "AbC");
        assert_eq!(out.get_str("app").unwrap(), "android");
        assert_eq!(out.get_str("coupon").unwrap(), " Save ");
        assert_eq!(out.get_i32("count").unwrap(), 3);
    }

    #[test]
    fn first_token_uppercased() {
        let d = || Derivation::FirstToken {
            field: "airline".into(),
            output: "airline_name".into(),
        };
        let out = run(d(), doc! { "airline": "qr 134" }).unwrap();
        assert_eq!(out.get_str("airline_name").unwrap(), "QR");
        let out = run(d(), doc! { "airline": null }).unwrap();
        assert!(!out.contains_key("airline_name"));
    }

    #[test]
    fn issue_flag_marks_success_and_failure() {
        let d = Derivation::IssueFlag {
            flag: "is_issue".into(),
            reason: "issue".into(),
        };
        let ok = run(d.clone(), doc! {}).unwrap();
        assert!(!ok.get_bool("is_issue").unwrap());
        assert_eq!(ok.get("issue"), Some(&Bson::Null));

        let failed = transform_for(&d).fallback(doc! {}, &ctx());
        assert!(failed.get_bool("is_issue").unwrap());
    }

    #[test]
    fn pipeline_follows_declaration_order() {
        let pipeline = pipeline_for_derivations(&[
            Derivation::CleanText { except: vec![] },
            Derivation::FirstToken {
                field: "airline".into(),
                output: "airline_name".into(),
            },
        ]);
        let out = pipeline.apply(doc! { "airline": " Ek 501" }, &ctx()).unwrap();
        assert_eq!(out.get_str("airline").unwrap(), "ek 501");
        assert_eq!(out.get_str("airline_name").unwrap(), "EK");
    }
}

use anyhow::{anyhow, Context};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::geofile::feature::Feature;

/// How an axis reads its bounds from the filter form and compares them to an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    DateRange {
        min_field: &'static str,
        max_field: &'static str,
    },
    NumericRange {
        min_field: &'static str,
        max_field: &'static str,
    },
    Toggle {
        field: &'static str,
    },
}

/// One independent filter dimension of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisDescriptor {
    /// Feature attribute the axis compares against.
    pub attribute: &'static str,
    /// Phrase used in the map description, e.g. "magnitudes".
    pub label: &'static str,
    pub kind: AxisKind,
}

/// Serialized values of the filter form.
pub trait PredicateSource {
    /// Raw value of a form field, if the form has it.
    fn value(&self, field: &str) -> Option<&str>;

    /// All fields in submission order, including empty ones.
    fn serialize(&self) -> Vec<(String, String)>;
}

/// Value of `field`, with blank input treated as absent.
pub fn non_empty<'a>(source: &'a dyn PredicateSource, field: &str) -> Option<&'a str> {
    source
        .value(field)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Filter form held as field name to value. Fields serialize in name order.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(from = "BTreeMap<String, FormScalar>")]
pub struct FormValues(BTreeMap<String, String>);

/// Form values as written in a config file, where numbers and checkboxes are not quoted.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum FormScalar {
    Text(String),
    Number(f64),
    Flag(bool),
    Blank(()),
}

impl From<BTreeMap<String, FormScalar>> for FormValues {
    fn from(value: BTreeMap<String, FormScalar>) -> Self {
        Self(
            value
                .into_iter()
                .map(|(field, scalar)| {
                    let text = match scalar {
                        FormScalar::Text(text) => text,
                        FormScalar::Number(number) => number.to_string(),
                        FormScalar::Flag(flag) => flag.to_string(),
                        FormScalar::Blank(()) => String::new(),
                    };
                    (field, text)
                })
                .collect(),
        )
    }
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: &str) {
        self.0.insert(field.to_string(), value.to_string());
    }
}

impl PredicateSource for FormValues {
    fn value(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    fn serialize(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

/// A resolved inclusion test on one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    DateRange {
        attribute: String,
        min: Option<DateTime<FixedOffset>>,
        max: Option<DateTime<FixedOffset>>,
    },
    NumericRange {
        attribute: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Retains features whose attribute is exactly `true`.
    Flag { attribute: String },
}

impl Predicate {
    /// Features with a missing or malformed attribute never match.
    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            Predicate::DateRange {
                attribute,
                min,
                max,
            } => {
                let time = match feature
                    .attribute(attribute)
                    .and_then(Value::as_str)
                    .and_then(|text| parse_timestamp(text).ok())
                {
                    Some(time) => time,
                    None => return false,
                };
                min.map_or(true, |min| min <= time) && max.map_or(true, |max| time <= max)
            }
            Predicate::NumericRange {
                attribute,
                min,
                max,
            } => {
                let number = match feature.attribute(attribute).and_then(numeric_value) {
                    Some(number) => number,
                    None => return false,
                };
                min.map_or(true, |min| min <= number) && max.map_or(true, |max| number <= max)
            }
            Predicate::Flag { attribute } => {
                matches!(feature.attribute(attribute), Some(Value::Bool(true)))
            }
        }
    }
}

/// Numbers, or strings holding a number as REST serializers emit decimals.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

/// Conjunction of predicates. An empty set retains everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateSet {
    predicates: Vec<Predicate>,
}

impl PredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Read the bounds of every axis from the form. Axes without a bound are left out; a bound
    /// that does not parse is an error.
    pub fn from_source(
        axes: &[AxisDescriptor],
        source: &dyn PredicateSource,
    ) -> anyhow::Result<Self> {
        let mut predicates = Vec::new();
        for axis in axes {
            let attribute = axis.attribute.to_string();
            let predicate = match axis.kind {
                AxisKind::DateRange {
                    min_field,
                    max_field,
                } => {
                    let min = date_bound(source, min_field)?;
                    let max = date_bound(source, max_field)?;
                    (min.is_some() || max.is_some()).then(|| Predicate::DateRange {
                        attribute,
                        min,
                        max,
                    })
                }
                AxisKind::NumericRange {
                    min_field,
                    max_field,
                } => {
                    let min = numeric_bound(source, min_field)?;
                    let max = numeric_bound(source, max_field)?;
                    (min.is_some() || max.is_some()).then(|| Predicate::NumericRange {
                        attribute,
                        min,
                        max,
                    })
                }
                AxisKind::Toggle { field } => {
                    is_asserted(source, field).then(|| Predicate::Flag { attribute })
                }
            };
            predicates.extend(predicate);
        }
        Ok(Self { predicates })
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(feature))
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Predicate> {
        self.predicates.iter()
    }
}

fn date_bound(
    source: &dyn PredicateSource,
    field: &str,
) -> anyhow::Result<Option<DateTime<FixedOffset>>> {
    non_empty(source, field)
        .map(|value| {
            parse_timestamp(value)
                .with_context(|| format!("Invalid value for filter field '{}'", field))
        })
        .transpose()
}

fn numeric_bound(source: &dyn PredicateSource, field: &str) -> anyhow::Result<Option<f64>> {
    non_empty(source, field)
        .map(|value| {
            value
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .ok_or_else(|| anyhow!("Invalid value '{}' for filter field '{}'", value, field))
        })
        .transpose()
}

/// Checkbox semantics: only an explicit yes asserts the toggle.
fn is_asserted(source: &dyn PredicateSource, field: &str) -> bool {
    matches!(
        non_empty(source, field).map(str::to_ascii_lowercase).as_deref(),
        Some("on" | "true" | "1" | "yes")
    )
}

const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an event or form timestamp. Values without an offset are taken as UTC; bare dates
/// are midnight UTC.
pub fn parse_timestamp(value: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time);
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(time) = DateTime::parse_from_str(value, format) {
            return Ok(time);
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&time).into());
        }
    }
    let midnight = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("Could not parse timestamp '{}'", value))?;
    Ok(Utc.from_utc_datetime(&midnight).into())
}

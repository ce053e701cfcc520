use anyhow::{anyhow, Context};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    dashboard::{
        notice::UserNotice,
        query::{fetch, QueryOutcome, QueryTransport},
    },
    filter::{domain::Domain, predicate::parse_timestamp},
    geofile::feature::{Feature, FeatureCollection},
};

use super::render::esc;

const SHAKE_ID_PLACEHOLDER: &str = "000";
const FLOOD_ID_PLACEHOLDER: &str = "0000000000-6-rw";
const VOLCANO_NAME_PLACEHOLDER: &str = "VOLCANOTEMPLATENAME";
const EVENT_TIME_PLACEHOLDER: &str = "1234567890123456789";

/// A downloadable document attached to an event.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    ShakeReport,
    FloodReport,
    FloodImpactMap,
    AshReport,
}

impl ReportKind {
    pub fn domain(&self) -> Domain {
        match self {
            ReportKind::ShakeReport => Domain::Earthquake,
            ReportKind::FloodReport | ReportKind::FloodImpactMap => Domain::Flood,
            ReportKind::AshReport => Domain::Ash,
        }
    }

    /// Field of the report lookup response holding the document URL.
    pub fn link_field(&self) -> &'static str {
        match self {
            ReportKind::ShakeReport => "report_pdf",
            ReportKind::FloodReport => "impact_report",
            ReportKind::FloodImpactMap => "impact_map",
            ReportKind::AshReport => "report_map_url",
        }
    }
}

/// Where to download a report from, and the name to save it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLink {
    pub href: String,
    pub filename: Option<String>,
}

impl ReportLink {
    pub fn to_anchor(&self, new_tab: bool) -> String {
        let mut anchor = format!("<a href=\"{}\"", esc(&self.href));
        if let Some(filename) = &self.filename {
            anchor.push_str(&format!(" download=\"{}\"", esc(filename)));
        }
        if new_tab {
            anchor.push_str(" target=\"_blank\"");
        }
        anchor.push_str(" rel=\"nofollow\"></a>");
        anchor
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Link(ReportLink),
    /// The report cannot be offered; the notice says why.
    Unavailable(UserNotice),
    /// The lookup succeeded but carried no document.
    Empty,
}

/// Report lookup URL template with the domain's placeholders.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ReportEndpoint {
    pub url_template: String,
    pub kind: ReportKind,
}

impl ReportEndpoint {
    pub fn new(url_template: impl Into<String>, kind: ReportKind) -> Self {
        Self {
            url_template: url_template.into(),
            kind,
        }
    }

    /// Substitute the event's placeholders into the template. Only the first occurrence of each
    /// placeholder is replaced.
    pub fn expand(&self, feature: &Feature) -> anyhow::Result<Url> {
        let url = match self.kind {
            ReportKind::ShakeReport => {
                let shake_id = required_text(feature, "shake_id")?;
                self.url_template.replacen(SHAKE_ID_PLACEHOLDER, &shake_id, 1)
            }
            ReportKind::FloodReport | ReportKind::FloodImpactMap => {
                let event_id = required_text(feature, "event_id")?;
                self.url_template.replacen(FLOOD_ID_PLACEHOLDER, &event_id, 1)
            }
            ReportKind::AshReport => {
                let volcano_name = volcano_name(feature)
                    .ok_or_else(|| anyhow!("Event has no volcano name"))?;
                let event_time = required_text(feature, "event_time")?;
                let event_time = parse_timestamp(&event_time)?
                    .format("%Y%m%d%H%M%S%z")
                    .to_string();
                self.url_template
                    .replacen(VOLCANO_NAME_PLACEHOLDER, &volcano_name, 1)
                    .replacen(EVENT_TIME_PLACEHOLDER, &event_time, 1)
            }
        };
        Url::parse(&url).with_context(|| format!("Invalid report URL '{}'", url))
    }

    /// Look up the report of `feature`. A 404 becomes a notice; other failures are errors.
    pub fn resolve(
        &self,
        transport: &dyn QueryTransport,
        feature: &Feature,
    ) -> anyhow::Result<ReportOutcome> {
        if self.kind == ReportKind::AshReport {
            match feature.attribute_text("task_status").as_deref() {
                Some("PENDING") => return Ok(ReportOutcome::Unavailable(UserNotice::report_pending())),
                Some("FAILED") => return Ok(ReportOutcome::Unavailable(UserNotice::report_failed())),
                _ => {}
            }
        }

        let url = self.expand(feature)?;
        log::info!("Looking up report at {}", url);
        let data = match fetch(transport, &url)? {
            QueryOutcome::NotFound => return Ok(ReportOutcome::Unavailable(UserNotice::no_report())),
            QueryOutcome::Payload(data) => data,
        };
        let href = match data.get(self.kind.link_field()) {
            Some(Value::String(href)) if !href.is_empty() => href.clone(),
            _ => return Ok(ReportOutcome::Empty),
        };
        let filename = match self.kind {
            ReportKind::ShakeReport => download_name(&data, "shake_id"),
            ReportKind::FloodReport | ReportKind::FloodImpactMap => download_name(&data, "event_id"),
            ReportKind::AshReport => feature.attribute_text("report_map_filename"),
        };
        Ok(ReportOutcome::Link(ReportLink { href, filename }))
    }
}

/// Hazard layer archive of a flood event in the held collection.
pub fn hazard_layer_link(collection: &FeatureCollection, event_id: &str) -> ReportOutcome {
    let event = match collection.find("event_id", event_id) {
        Some(event) => event,
        None => return ReportOutcome::Unavailable(UserNotice::event_not_found()),
    };
    match event.attribute_text("hazard_layer") {
        Some(href) if !href.is_empty() => ReportOutcome::Link(ReportLink {
            href,
            filename: Some(format!("{}-hazard.zip", event_id)),
        }),
        _ => ReportOutcome::Empty,
    }
}

fn required_text(feature: &Feature, key: &str) -> anyhow::Result<String> {
    feature
        .attribute_text(key)
        .ok_or_else(|| anyhow!("Event has no '{}' attribute", key))
}

fn volcano_name(feature: &Feature) -> Option<String> {
    match feature.attribute("volcano") {
        Some(Value::Object(volcano)) => volcano
            .get("volcano_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => feature.attribute_text("volcano_name"),
    }
}

/// `<id>-<language>.pdf` from the lookup response.
fn download_name(data: &Value, id_field: &str) -> Option<String> {
    let id = text_of(data.get(id_field)?)?;
    let language = text_of(data.get("language")?)?;
    Some(format!("{}-{}.pdf", id, language))
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

extern crate log;
pub mod actions;
pub mod dashboard;
pub mod filter;
pub mod geofile;
use crate::actions::render::{RowWriter, TableConfig};
use crate::actions::report::{hazard_layer_link, ReportEndpoint, ReportOutcome};
use crate::dashboard::handler::{
    FilterMode, FilterOrchestrator, FilterResult, ResultSink, StaticViewport, Trigger,
};
use crate::dashboard::notice::UserNotice;
use crate::dashboard::query::{HttpTransport, QueryTransport};
use crate::filter::domain::Domain;
use crate::filter::predicate::FormValues;
use crate::geofile::feature::FeatureCollection;
use crate::geofile::geojson::{parse_payload, read_collection_from_file, write_collection_to_file};
use anyhow::{anyhow, Context};
use clap::Parser;
use reqwest::Url;
use serde::Deserialize;
use std::path::PathBuf;
use std::{fs::read_to_string, path::Path};

/// Filter disaster events the way the realtime dashboard does.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,

    /// Refilter as the form's reset button does, ignoring the location filter.
    #[arg(long)]
    reset: bool,

    /// Resolve the report link of the event with this id.
    #[arg(long)]
    report: Option<String>,

    /// Resolve the hazard layer link of the flood event with this id.
    #[arg(long)]
    hazard_layer: Option<String>,
}

#[derive(Deserialize, Debug)]
enum SourceConfig {
    Server { endpoint: String },
    Client { collection_filepath: PathBuf },
}

#[derive(Deserialize, Debug)]
struct Config {
    domain: Domain,
    data_dir: PathBuf,
    source: SourceConfig,
    #[serde(default)]
    filter: FormValues,
    #[serde(default)]
    viewport: StaticViewport,
    #[serde(default)]
    table: Option<TableConfig>,
    #[serde(default)]
    report: Option<ReportEndpoint>,
}

fn load_config(config_filepath: &Path) -> anyhow::Result<Config> {
    if !config_filepath.exists() {
        return Err(anyhow!("Config file {:?} not found", config_filepath));
    }
    let config_contents = read_to_string(config_filepath)?;
    let config: Config = serde_yaml::from_str(&config_contents)?;
    if let Some(report) = &config.report {
        if report.kind.domain() != config.domain {
            return Err(anyhow!(
                "Report kind {:?} does not belong to the {} domain",
                report.kind,
                config.domain
            ));
        }
    }
    Ok(config)
}

/// Writes filter results into the data directory.
struct OutputSink {
    data_dir: PathBuf,
    row_writer: Option<RowWriter>,
    notices: Vec<UserNotice>,
}

impl OutputSink {
    fn new(data_dir: PathBuf, row_writer: Option<RowWriter>) -> Self {
        Self {
            data_dir,
            row_writer,
            notices: Vec::new(),
        }
    }

    fn geojson_filepath(&self) -> PathBuf {
        self.data_dir.join("filtered.geojson")
    }

    fn table_filepath(&self) -> PathBuf {
        self.data_dir.join("table.html")
    }

    fn write_table(&self, collection: &FeatureCollection) -> anyhow::Result<()> {
        if let Some(row_writer) = &self.row_writer {
            let table = format!(
                "<table>\n<tbody>\n{}\n</tbody>\n</table>\n",
                row_writer.write_rows(collection)
            );
            let filepath = self.table_filepath();
            log::info!("Writing event table to {:?}", &filepath);
            std::fs::write(&filepath, table)
                .with_context(|| format!("Writing table to {:?}", &filepath))?;
        }
        Ok(())
    }
}

impl ResultSink for OutputSink {
    fn render(&mut self, result: FilterResult) -> anyhow::Result<()> {
        let filepath = self.geojson_filepath();
        log::info!("Writing filtered events to {:?}", &filepath);
        match result {
            FilterResult::Payload(payload) => {
                std::fs::write(&filepath, serde_json::to_string_pretty(&payload)?)
                    .with_context(|| format!("Writing response to {:?}", &filepath))?;
                match parse_payload(payload) {
                    Ok(collection) => self.write_table(&collection),
                    Err(err) => {
                        log::warn!("Response holds no events to tabulate: {}", err);
                        Ok(())
                    }
                }
            }
            FilterResult::Collection(collection) => {
                write_collection_to_file(&collection, &filepath)?;
                self.write_table(&collection)
            }
        }
    }

    fn notify(&mut self, notice: UserNotice) {
        log::warn!("{}", notice);
        self.notices.push(notice);
    }
}

fn print_report_outcome(outcome: ReportOutcome) {
    match outcome {
        ReportOutcome::Link(link) => println!("{}", link.to_anchor(true)),
        ReportOutcome::Unavailable(notice) => log::warn!("{}", notice),
        ReportOutcome::Empty => log::warn!("The event has no document to download"),
    }
}

fn resolve_report<T: QueryTransport>(
    orchestrator: &FilterOrchestrator<T>,
    endpoint: &ReportEndpoint,
    event_id: &str,
) -> anyhow::Result<ReportOutcome> {
    let id_attribute = orchestrator.domain().id_attribute();
    match orchestrator.session().find_feature(id_attribute, event_id) {
        Some(feature) => endpoint.resolve(orchestrator.transport(), feature),
        None => Ok(ReportOutcome::Unavailable(UserNotice::event_not_found())),
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let config = load_config(Path::new(&args.config_filepath))?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Creating data dir {:?}", &config.data_dir))?;

    let row_writer = match &config.table {
        Some(table) => Some(RowWriter::from_config(config.domain, table)?),
        None => None,
    };
    let mode = match &config.source {
        SourceConfig::Server { endpoint } => FilterMode::Server {
            endpoint: Url::parse(endpoint)
                .with_context(|| format!("Invalid endpoint '{}'", endpoint))?,
        },
        SourceConfig::Client { .. } => FilterMode::Client,
    };
    let mut orchestrator = FilterOrchestrator::new(config.domain, mode, HttpTransport::new()?);
    if let SourceConfig::Client {
        collection_filepath,
    } = &config.source
    {
        log::info!("Reading {} events from {:?}", config.domain, collection_filepath);
        let collection = read_collection_from_file(collection_filepath)?;
        orchestrator.session_mut().replace_collection(collection);
    }

    let trigger = if args.reset {
        Trigger::Reset
    } else {
        Trigger::Submit
    };
    log::info!("{}", config.domain.describe(&config.filter));
    let mut sink = OutputSink::new(config.data_dir.clone(), row_writer);
    orchestrator.on_filter_change(trigger, &config.filter, &config.viewport, &mut sink)?;

    if let Some(event_id) = &args.report {
        let endpoint = config
            .report
            .as_ref()
            .ok_or_else(|| anyhow!("No report endpoint configured"))?;
        print_report_outcome(resolve_report(&orchestrator, endpoint, event_id)?);
    }
    if let Some(event_id) = &args.hazard_layer {
        if config.domain != Domain::Flood {
            return Err(anyhow!("Hazard layers exist for flood events only"));
        }
        let collection = orchestrator
            .session()
            .held_collection()
            .ok_or_else(|| anyhow!("No flood events loaded"))?;
        print_report_outcome(hazard_layer_link(&collection, event_id));
    }
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testdir::testdir;

    use crate::actions::render::{RowWriter, TableConfig};
    use crate::actions::report::{ReportEndpoint, ReportKind, ReportOutcome};
    use crate::dashboard::handler::{FilterMode, FilterOrchestrator, FilterResult, ResultSink};
    use crate::dashboard::notice::UserNotice;
    use crate::dashboard::query::{testing::CannedTransport, TransportResponse};
    use crate::filter::bbox::WgsBoundingBox;
    use crate::filter::domain::Domain;
    use crate::filter::feature_filter::fixtures::record;
    use crate::filter::predicate::PredicateSource;
    use crate::geofile::feature::{CollectionKind, FeatureCollection};
    use crate::geofile::geojson::read_collection_from_file;

    use super::{load_config, resolve_report, OutputSink, SourceConfig};

    #[test]
    fn test_load_server_config() {
        let test_dir = testdir!();
        let filepath = test_dir.join("config.yaml");
        std::fs::write(
            &filepath,
            r#"
domain: earthquake
data_dir: /tmp/quake
source: !Server
  endpoint: http://realtime.example.org/realtime/api/v1/earthquake/
filter:
  minimum_magnitude: 5
  start_date: "2020-02-01"
  felt: true
viewport:
  enabled: true
  bounding_box:
    left_lon: 100.0
    right_lon: 110.0
    bottom_lat: -10.0
    top_lat: 0.0
table:
  columns: [time, magnitude]
  actions:
    - type: simple-button
      name: Show Report
      css_class: icon-report
      handler: showReport
report:
  url_template: http://realtime.example.org/realtime/api/v1/earthquake-report/000/en/
  kind: shake_report
"#,
        )
        .unwrap();

        let config = load_config(&filepath).unwrap();
        assert_eq!(config.domain, Domain::Earthquake);
        assert!(matches!(config.source, SourceConfig::Server { .. }));
        assert_eq!(config.filter.value("minimum_magnitude"), Some("5"));
        assert_eq!(config.filter.value("felt"), Some("true"));
        assert!(config.viewport.enabled);
        assert_eq!(
            config.viewport.bounding_box,
            Some(WgsBoundingBox::new(100.0, -10.0, 110.0, 0.0))
        );
        assert_eq!(config.table.unwrap().actions.len(), 1);
        assert_eq!(config.report.unwrap().kind, ReportKind::ShakeReport);
    }

    #[test]
    fn test_load_minimal_client_config() {
        let test_dir = testdir!();
        let filepath = test_dir.join("config.yaml");
        std::fs::write(
            &filepath,
            "domain: flood\ndata_dir: out\nsource: !Client\n  collection_filepath: floods.json\n",
        )
        .unwrap();

        let config = load_config(&filepath).unwrap();
        assert_eq!(config.domain, Domain::Flood);
        assert!(config.filter.serialize().is_empty());
        assert!(!config.viewport.enabled);
        assert!(config.table.is_none());
    }

    #[test]
    fn test_load_config_rejects_report_of_other_domain() {
        let test_dir = testdir!();
        let filepath = test_dir.join("config.yaml");
        std::fs::write(
            &filepath,
            "domain: ash\ndata_dir: out\nsource: !Client\n  collection_filepath: ash.json\n\
             report:\n  url_template: http://example.org/000/\n  kind: shake_report\n",
        )
        .unwrap();
        assert!(load_config(&filepath).is_err());
        assert!(load_config(&test_dir.join("missing.yaml")).is_err());
    }

    #[test]
    fn test_output_sink_writes_collection_and_table() {
        let test_dir = testdir!();
        let table = TableConfig {
            columns: vec!["event_id".to_string(), "total_affected".to_string()],
            date_format: None,
            actions: vec![],
        };
        let row_writer = RowWriter::from_config(Domain::Flood, &table).unwrap();
        let mut sink = OutputSink::new(test_dir.clone(), Some(row_writer));
        let floods = FeatureCollection::new(
            CollectionKind::Records,
            vec![record(json!({"event_id": "2020010112-6-rw", "total_affected": 120}))],
        );

        sink.render(FilterResult::Collection(floods)).unwrap();
        sink.notify(UserNotice::no_record());

        let written = read_collection_from_file(&sink.geojson_filepath()).unwrap();
        assert_eq!(written.len(), 1);
        let html = std::fs::read_to_string(sink.table_filepath()).unwrap();
        assert!(html.contains("<tr><td>2020010112-6-rw</td><td>120</td><td></td></tr>"));
        assert_eq!(sink.notices, vec![UserNotice::no_record()]);
    }

    #[test]
    fn test_output_sink_keeps_raw_payload() {
        let test_dir = testdir!();
        let mut sink = OutputSink::new(test_dir.clone(), None);
        let payload = json!({"detail": "unexpected"});

        sink.render(FilterResult::Payload(payload.clone())).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(sink.geojson_filepath()).unwrap())
                .unwrap();
        assert_eq!(written, payload);
        assert!(!sink.table_filepath().exists());
    }

    #[test]
    fn test_resolve_report_of_unknown_event() {
        let mut orchestrator = FilterOrchestrator::new(
            Domain::Earthquake,
            FilterMode::Client,
            CannedTransport::new(vec![TransportResponse::new(404, "")]),
        );
        orchestrator.session_mut().replace_collection(FeatureCollection::new(
            CollectionKind::Records,
            vec![record(json!({"shake_id": "20200101120000"}))],
        ));
        let endpoint = ReportEndpoint::new("http://example.org/report/000/", ReportKind::ShakeReport);

        assert_eq!(
            resolve_report(&orchestrator, &endpoint, "19990101000000").unwrap(),
            ReportOutcome::Unavailable(UserNotice::event_not_found())
        );
        assert_eq!(
            resolve_report(&orchestrator, &endpoint, "20200101120000").unwrap(),
            ReportOutcome::Unavailable(UserNotice::no_report())
        );
    }
}

use anyhow::anyhow;
use reqwest::Url;
use serde::Deserialize;

use crate::{
    filter::{
        bbox::WgsBoundingBox,
        domain::Domain,
        feature_filter::filter,
        predicate::{PredicateSet, PredicateSource},
    },
    geofile::{feature::FeatureCollection, geojson::parse_payload},
};

use super::{
    notice::UserNotice,
    query::{build_query_url, interpret_response, QueryOutcome, QueryTransport, TransportResponse},
    session::{RequestTicket, SessionContext},
};

/// User action that asks for the view to be refiltered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Submit,
    /// Clears the spatial axis only; form bounds still apply.
    Reset,
    ViewportChange,
}

/// The map's location filter.
pub trait ViewportSource {
    fn is_enabled(&self) -> bool;

    /// The drawn rectangle, if any.
    fn bounds(&self) -> Option<WgsBoundingBox>;
}

/// A viewport fixed up front, e.g. from a config file.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticViewport {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bounding_box: Option<WgsBoundingBox>,
}

impl ViewportSource for StaticViewport {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn bounds(&self) -> Option<WgsBoundingBox> {
        self.bounding_box
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult {
    /// Raw server response, in server mode.
    Payload(serde_json::Value),
    /// Filtered copy of the held collection, in client mode.
    Collection(FeatureCollection),
}

/// Updates the map layer and the table with a result.
pub trait ResultSink {
    fn render(&mut self, result: FilterResult) -> anyhow::Result<()>;

    fn notify(&mut self, notice: UserNotice);
}

/// Where filtering happens, fixed by deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterMode {
    Server { endpoint: Url },
    Client,
}

/// An issued server query waiting for its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub ticket: RequestTicket,
    pub url: Url,
}

pub struct FilterOrchestrator<T: QueryTransport> {
    domain: Domain,
    mode: FilterMode,
    transport: T,
    session: SessionContext,
}

impl<T: QueryTransport> FilterOrchestrator<T> {
    pub fn new(domain: Domain, mode: FilterMode, transport: T) -> Self {
        Self {
            domain,
            mode,
            transport,
            session: SessionContext::new(),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    /// Refilter after `trigger` and hand the result to `sink`.
    pub fn on_filter_change(
        &mut self,
        trigger: Trigger,
        predicates: &dyn PredicateSource,
        viewport: &dyn ViewportSource,
        sink: &mut dyn ResultSink,
    ) -> anyhow::Result<()> {
        match self.mode {
            FilterMode::Client => self.filter_held_collection(trigger, predicates, viewport, sink),
            FilterMode::Server { .. } => {
                let pending = self.prepare_query(trigger, predicates, viewport)?;
                log::info!("Querying {}", pending.url);
                let response = self.transport.get(&pending.url);
                self.complete_query(pending, response, sink)
            }
        }
    }

    /// Bounding box to filter by, or `None` when the spatial axis is off for this trigger.
    pub fn spatial_bounds(
        &self,
        trigger: Trigger,
        viewport: &dyn ViewportSource,
    ) -> Option<WgsBoundingBox> {
        if trigger == Trigger::Reset || !viewport.is_enabled() {
            return None;
        }
        if !self.domain.supports_spatial_filter() {
            log::warn!(
                "Location filter is enabled but {} events have no location, ignoring it",
                self.domain
            );
            return None;
        }
        viewport.bounds().filter(WgsBoundingBox::is_valid)
    }

    /// Build the server query for the current form and viewport and take a ticket for it.
    pub fn prepare_query(
        &mut self,
        trigger: Trigger,
        predicates: &dyn PredicateSource,
        viewport: &dyn ViewportSource,
    ) -> anyhow::Result<PendingQuery> {
        let endpoint = match &self.mode {
            FilterMode::Server { endpoint } => endpoint,
            FilterMode::Client => return Err(anyhow!("Server queries are disabled in client mode")),
        };
        let bbox = self.spatial_bounds(trigger, viewport);
        let url = build_query_url(endpoint, predicates, bbox.as_ref());
        Ok(PendingQuery {
            ticket: self.session.begin_request(),
            url,
        })
    }

    /// Deliver the response of `pending`. Responses to superseded queries are dropped.
    ///
    /// A 404 becomes a user notice. Any other failure is logged and returned without retry.
    pub fn complete_query(
        &mut self,
        pending: PendingQuery,
        response: anyhow::Result<TransportResponse>,
        sink: &mut dyn ResultSink,
    ) -> anyhow::Result<()> {
        if !self.session.is_current(pending.ticket) {
            log::debug!("Dropping stale response for {}", pending.url);
            return Ok(());
        }
        let outcome = match response.and_then(|response| interpret_response(&pending.url, response))
        {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("Filter query failed: {:?}", err);
                return Err(err);
            }
        };
        match outcome {
            QueryOutcome::NotFound => {
                let notice = UserNotice::no_record();
                log::warn!("{}", notice);
                sink.notify(notice);
                Ok(())
            }
            QueryOutcome::Payload(payload) => {
                match parse_payload(payload.clone()) {
                    Ok(collection) => self.session.replace_collection(collection),
                    Err(err) => log::debug!("Response is not a collection, not holding it: {}", err),
                }
                sink.render(FilterResult::Payload(payload))
            }
        }
    }

    fn filter_held_collection(
        &self,
        trigger: Trigger,
        predicates: &dyn PredicateSource,
        viewport: &dyn ViewportSource,
        sink: &mut dyn ResultSink,
    ) -> anyhow::Result<()> {
        let collection = self
            .session
            .held_collection()
            .ok_or_else(|| anyhow!("No collection loaded for client-side filtering"))?;
        let predicates = PredicateSet::from_source(self.domain.axes(), predicates)?;
        let bbox = self.spatial_bounds(trigger, viewport);
        let filtered = filter(&collection, &predicates, bbox.as_ref());
        log::info!(
            "{} of {} {} events match",
            filtered.len(),
            collection.len(),
            self.domain
        );
        sink.render(FilterResult::Collection(filtered))
    }
}

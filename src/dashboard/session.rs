use std::sync::Arc;

use crate::geofile::feature::{Feature, FeatureCollection};

/// Identifies one outbound filter query. Only the latest ticket may update the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

/// UI context shared by the dashboard handlers. Sole owner of the held collection.
///
/// The held collection is replaced wholesale and handed out as a shared read-only reference, so a
/// filter pass in progress keeps working on the collection it started with.
#[derive(Debug, Default)]
pub struct SessionContext {
    held: Option<Arc<FeatureCollection>>,
    latest_ticket: u64,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(collection: FeatureCollection) -> Self {
        let mut session = Self::new();
        session.replace_collection(collection);
        session
    }

    pub fn replace_collection(&mut self, collection: FeatureCollection) {
        log::debug!("Holding {} features", collection.len());
        self.held = Some(Arc::new(collection));
    }

    pub fn held_collection(&self) -> Option<Arc<FeatureCollection>> {
        self.held.clone()
    }

    pub fn find_feature(&self, attribute: &str, id: &str) -> Option<&Feature> {
        self.held.as_deref()?.find(attribute, id)
    }

    /// Start a query, superseding every ticket handed out before.
    pub fn begin_request(&mut self) -> RequestTicket {
        self.latest_ticket += 1;
        RequestTicket(self.latest_ticket)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.latest_ticket
    }
}

use anyhow::{anyhow, Context};
use reqwest::Url;

use crate::filter::{bbox::WgsBoundingBox, predicate::PredicateSource};

const USER_AGENT: &str = "quake-filter";

/// Status and body of a completed GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues read requests. Errors are reserved for requests that got no response at all.
pub trait QueryTransport {
    fn get(&self, url: &Url) -> anyhow::Result<TransportResponse>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl QueryTransport for HttpTransport {
    fn get(&self, url: &Url) -> anyhow::Result<TransportResponse> {
        let response = self.client.get(url.clone()).send()?;
        let status = response.status().as_u16();
        let body = response.text().or(Err(anyhow!("No response text")))?;
        Ok(TransportResponse { status, body })
    }
}

/// Append the serialized form and, when given, `in_bbox=west,south,east,north` to `endpoint`.
pub fn build_query_url(
    endpoint: &Url,
    predicates: &dyn PredicateSource,
    bbox: Option<&WgsBoundingBox>,
) -> Url {
    let mut pairs = predicates.serialize();
    if let Some(bbox) = bbox {
        pairs.push(("in_bbox".to_string(), bbox.to_bbox_string()));
    }
    let mut url = endpoint.clone();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    url
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Payload(serde_json::Value),
    /// The server answered 404.
    NotFound,
}

/// Map a response to an outcome. 404 is an outcome; every other non-success status is an error.
pub fn interpret_response(url: &Url, response: TransportResponse) -> anyhow::Result<QueryOutcome> {
    if response.status == 404 {
        return Ok(QueryOutcome::NotFound);
    }
    if !response.is_success() {
        return Err(anyhow!(
            "Request to {} failed with status {}",
            url,
            response.status
        ));
    }
    let payload = serde_json::from_str(&response.body)
        .with_context(|| format!("Decoding response from {}", url))?;
    Ok(QueryOutcome::Payload(payload))
}

pub fn fetch(transport: &dyn QueryTransport, url: &Url) -> anyhow::Result<QueryOutcome> {
    interpret_response(url, transport.get(url)?)
}

use std::fmt;

/// A message meant for the person using the dashboard rather than the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice(String);

impl UserNotice {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// A filter query matched nothing on the server.
    pub fn no_record() -> Self {
        Self::new("No record found.")
    }

    pub fn no_report() -> Self {
        Self::new("No Report recorded for this event.")
    }

    pub fn report_pending() -> Self {
        Self::new("Report is currently being generated. Refresh this page later.")
    }

    pub fn report_failed() -> Self {
        Self::new("Report failed to generate.")
    }

    pub fn event_not_found() -> Self {
        Self::new("Event not found")
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

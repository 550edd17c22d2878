//! Per-request state handed over by the transport.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

pub use header::*;

use crate::route::Method;

pub mod header;

/// Elapsed time of one handler, recorded by the chain walker.
#[derive(Debug, Clone)]
pub struct Timer {
    pub name: String,
    pub duration: Duration,
}

/// An HTTP request, already parsed by the transport.
///
/// Routing fills in `params` and `route`; the chain walker appends to
/// `timers`. The abort flag is shared with the transport so a dropped
/// connection can stop the chain mid-flight.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HashMap<Header, String>,
    pub body: Option<Vec<u8>>,
    pub params: HashMap<String, String>,
    pub timers: Vec<Timer>,
    /// Name of the matched route, set after routing succeeds.
    pub route: Option<String>,
    /// Correlation id carried by every lifecycle event for this request.
    pub id: String,
    aborted: Arc<AtomicBool>,
    pub(crate) redirected: bool,
}

impl Request {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: String::new(),
            headers: HashMap::new(),
            body: None,
            params: HashMap::new(),
            timers: Vec::new(),
            route: None,
            id: Uuid::new_v4().to_string(),
            aborted: Arc::new(AtomicBool::new(false)),
            redirected: false,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(Header::new(name), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(&Header::new(name))
    }

    pub fn accept(&self) -> Result<Option<Accept>, HeaderParseError> {
        match self.header("accept") {
            Some(s) => Ok(Some(str::parse::<Accept>(s)?)),
            None => Ok(None),
        }
    }

    /// The requested version range, `"*"` when the client sent none.
    pub fn version_header(&self) -> &str {
        self.header("accept-version")
            .map(|s| s.as_str())
            .unwrap_or("*")
    }

    /// Handle the transport keeps to signal a dropped connection.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.aborted.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, "/")
    }
}

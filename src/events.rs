//! Request lifecycle events.
//!
//! Sinks observe the engine without being in the data path: the server
//! fans every lifecycle event out to all registered sinks. Default method
//! bodies are empty so a sink implements only what it cares about.
use crate::errors::HttpError;
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteSpec;

/// Route label events carry while the pre-chain is running.
pub const PRE_CHAIN: &str = "pre";

pub trait EventSink: Send + Sync {
    /// A route was added to the table.
    fn mount(&self, _route: &RouteSpec) {}

    /// A request entered dispatch.
    fn request(&self, _req: &Request) {}

    fn route_start(&self, _server: &str, _route: &str, _request_id: &str) {}

    fn route_done(&self, _server: &str, _route: &str, _request_id: &str, _status: u16) {}

    fn handler_start(&self, _server: &str, _route: &str, _handler: &str, _request_id: &str) {}

    fn handler_done(&self, _server: &str, _route: &str, _handler: &str, _request_id: &str) {}

    /// Fires exactly once per request, on every branch, with the matched
    /// route (if any) and the terminal error (if any).
    fn after(
        &self,
        _req: &Request,
        _res: &Response,
        _route: Option<&RouteSpec>,
        _err: Option<&HttpError>,
    ) {
    }

    /// A handler panicked; the fault was contained to this request.
    fn uncaught_exception(&self, _req: &Request, _res: &Response, _route: &str, _err: &HttpError) {}

    /// The server is shutting down.
    fn close(&self, _server: &str) {}
}

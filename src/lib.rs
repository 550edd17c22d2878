//! An embeddable HTTP routing and dispatch engine.
//! * Versioned, pattern-based [request routing](crate::router::Router)
//! * Ordered [middleware chains](crate::chain::ChainRunner) with explicit
//!   continuation outcomes
//! * [Content negotiation](crate::content::FormatterRegistry) over a ranked
//!   formatter list, with [JSON](crate::content::json) via
//!   [`serde_json`](serde_json)
//! * Per-request [fault isolation](crate::fault::FaultDomain)
//!
//! The transport is an external collaborator: it parses bytes into a
//! [`Request`](crate::request::Request), calls
//! [`Server::dispatch`](crate::server::Server::dispatch), and writes the
//! returned response out however it likes.
//!
//! # Example
//! ```
//! use switchboard::prelude::*;
//!
//! let mut server = Server::new(ServerOptions::default());
//! server
//!     .get("/widgets/:id", |req: &mut Request, res: &mut Response| {
//!         let id = req.params.get("id").cloned().unwrap_or_default();
//!         res.send(Body::Json(serde_json::json!({ "id": id })));
//!         Outcome::Continue
//!     })
//!     .unwrap();
//!
//! let mut request = Request::new(Method::GET, "/widgets/42")
//!     .with_header("accept", "application/json");
//! let response = server.dispatch(&mut request);
//!
//! assert_eq!(response.status_code, 200);
//! assert_eq!(response.payload.as_deref(), Some(&br#"{"id":"42"}"#[..]));
//! ```
pub mod chain;
pub mod content;
pub mod errors;
pub mod events;
pub mod fault;
pub mod prelude;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

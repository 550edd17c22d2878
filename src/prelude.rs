pub use crate::chain::{named, Handler, HandlerChain, Outcome};
pub use crate::errors::{ErrorBody, HttpError, MountError};
pub use crate::events::EventSink;
pub use crate::handlers;
pub use crate::request::{Header, Request};
pub use crate::response::{Body, Response};
pub use crate::route::{Method, RouteOptions};
pub use crate::server::{Server, ServerOptions};

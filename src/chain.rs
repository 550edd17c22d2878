//! Handler chains and the walker that executes them.
//!
//! Handlers communicate by returning an [`Outcome`] instead of calling a
//! continuation, so "continue exactly once" holds by construction and the
//! walker stays an ordinary loop: no handler i+1 starts before handler i
//! has returned.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, trace};

use crate::errors::HttpError;
use crate::events::{EventSink, PRE_CHAIN};
use crate::fault::FaultDomain;
use crate::request::{Request, Timer};
use crate::response::Response;
use crate::route::RouteSpec;
use crate::router::Router;

/// What a handler wants the walker to do next.
pub enum Outcome {
    /// Advance to the next handler; finalize if the chain is exhausted.
    Continue,
    /// Stop advancing without an error; the handler already responded.
    Stop,
    /// Adopt the named route's chain, minus handlers that already ran.
    /// Allowed once per request.
    Redirect(String),
    /// Send the error response and stop advancing.
    Fail(HttpError),
}

/// One link of a chain. The optional name shows up in lifecycle events
/// and per-handler timers; anonymous handlers fall back to a positional
/// `handler-N` label.
pub trait Handler: Send + Sync {
    fn call(&self, req: &mut Request, res: &mut Response) -> Outcome;

    fn name(&self) -> Option<&str> {
        None
    }
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> Outcome + Send + Sync,
{
    fn call(&self, req: &mut Request, res: &mut Response) -> Outcome {
        (self)(req, res)
    }
}

/// Attach a name to a handler.
pub struct Named<H> {
    name: String,
    inner: H,
}

impl<H: Handler> Handler for Named<H> {
    fn call(&self, req: &mut Request, res: &mut Response) -> Outcome {
        self.inner.call(req, res)
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

pub fn named<H: Handler>(name: &str, handler: H) -> Named<H> {
    Named {
        name: name.to_string(),
        inner: handler,
    }
}

/// Ordered handlers for one route, frozen at mount time.
pub type HandlerChain = Vec<Arc<dyn Handler>>;

/// Conversion into a chain, accepted by the registration calls.
///
/// The marker parameter exists only so the closure impl, the shared-arc
/// impl and the chain impl do not collide; inference always picks the
/// single applicable one.
pub trait IntoChain<M> {
    fn into_chain(self) -> HandlerChain;
}

pub struct HandlerMarker;
pub struct SharedMarker;
pub struct ChainMarker;

impl<H: Handler + 'static> IntoChain<HandlerMarker> for H {
    fn into_chain(self) -> HandlerChain {
        vec![Arc::new(self)]
    }
}

impl IntoChain<SharedMarker> for Arc<dyn Handler> {
    fn into_chain(self) -> HandlerChain {
        vec![self]
    }
}

impl IntoChain<ChainMarker> for HandlerChain {
    fn into_chain(self) -> HandlerChain {
        self
    }
}

/// Build a [`HandlerChain`] from handlers, shared handlers and nested
/// chains, flattened depth-first in order.
///
/// ```
/// use switchboard::handlers;
/// use switchboard::chain::{named, Outcome};
/// use switchboard::request::Request;
/// use switchboard::response::Response;
///
/// let audit = named("audit", |_req: &mut Request, _res: &mut Response| Outcome::Continue);
/// let chain = handlers![audit, |_req: &mut Request, _res: &mut Response| {
///     Outcome::Continue
/// }];
/// assert_eq!(chain.len(), 2);
/// ```
#[macro_export]
macro_rules! handlers {
    ( $($part:expr),* $(,)? ) => {{
        #[allow(unused_mut)]
        let mut chain = $crate::chain::HandlerChain::new();
        $( chain.extend($crate::chain::IntoChain::into_chain($part)); )*
        chain
    }};
}

/// Executes a chain against one request.
///
/// The walker owns continuation semantics: outcome handling, the
/// one-redirect rule, per-handler timers and the paired lifecycle events.
/// Every handler invocation runs inside the request's [`FaultDomain`], so
/// a panic lands in the same terminal-error path as [`Outcome::Fail`].
pub struct ChainRunner<'a> {
    pub server_name: &'a str,
    pub router: &'a Router,
    pub chains: &'a HashMap<String, HandlerChain>,
    pub sinks: &'a [Box<dyn EventSink>],
    pub fault: &'a FaultDomain,
}

impl ChainRunner<'_> {
    /// Walk the chain. Returns the terminal error, if the request ended in
    /// one; the response carries whatever was sent either way.
    pub fn run(
        &self,
        chain: &HandlerChain,
        route: Option<RouteSpec>,
        req: &mut Request,
        res: &mut Response,
    ) -> Option<HttpError> {
        let mut chain: HandlerChain = chain.clone();
        let mut route = route;
        let mut i = 0;
        let mut terminal: Option<HttpError> = None;
        for sink in self.sinks {
            sink.route_start(self.server_name, route_label(&route), &req.id);
        }
        while i < chain.len() {
            if req.is_aborted() {
                debug!("request {} aborted, stopping chain", req.id);
                break;
            }
            let handler = chain[i].clone();
            let handler_name = handler
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("handler-{}", i));
            let label = route_label(&route).to_string();
            trace!("running {}", handler_name);
            for sink in self.sinks {
                sink.handler_start(self.server_name, &label, &handler_name, &req.id);
            }
            let started = Instant::now();
            let outcome = self.fault.guard(|| handler.call(req, res));
            req.timers.push(Timer {
                name: handler_name.clone(),
                duration: started.elapsed(),
            });
            for sink in self.sinks {
                sink.handler_done(self.server_name, &label, &handler_name, &req.id);
            }
            match outcome {
                Ok(Outcome::Continue) => {
                    i += 1;
                }
                Ok(Outcome::Stop) => break,
                Ok(Outcome::Fail(err)) => {
                    debug!("handler {} failed: {} ({})", handler_name, err, err.code());
                    res.send_error(&err);
                    terminal = Some(err);
                    break;
                }
                Ok(Outcome::Redirect(name)) => {
                    if req.redirected {
                        let err = HttpError::ChainRedirectMisuse;
                        error!("request {}: {}", req.id, err);
                        res.send_error(&err);
                        terminal = Some(err);
                        break;
                    }
                    match self.router.find_by_name(&name, req) {
                        Ok(m) => {
                            let spec = m.spec.clone();
                            let params = m.params;
                            debug!("request {} redirected to route '{}'", req.id, spec.name);
                            req.redirected = true;
                            req.params = params;
                            req.route = Some(spec.name.clone());
                            let executed = chain[..=i].to_vec();
                            let mut adopted =
                                self.chains.get(&spec.name).cloned().unwrap_or_default();
                            adopted.retain(|h| !executed.iter().any(|e| Arc::ptr_eq(e, h)));
                            chain = adopted;
                            route = Some(spec);
                            i = 0;
                            for sink in self.sinks {
                                sink.route_start(self.server_name, route_label(&route), &req.id);
                            }
                        }
                        Err(err) => {
                            debug!("redirect target '{}' failed: {}", name, err);
                            res.send_error(&err);
                            terminal = Some(err);
                            break;
                        }
                    }
                }
                Err(fault) => {
                    let err = HttpError::Internal(fault.message);
                    let label = route_label(&route).to_string();
                    for sink in self.sinks {
                        sink.uncaught_exception(req, res, &label, &err);
                    }
                    if !res.sent() {
                        res.send_error(&err);
                    }
                    terminal = Some(err);
                    break;
                }
            }
        }
        for sink in self.sinks {
            sink.route_done(self.server_name, route_label(&route), &req.id, res.status_code);
        }
        terminal
    }
}

fn route_label(route: &Option<RouteSpec>) -> &str {
    route.as_ref().map(|r| r.name.as_str()).unwrap_or(PRE_CHAIN)
}

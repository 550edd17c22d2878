//! The server façade: registration surface and per-request orchestration.
//!
//! A `Server` is built once during setup (routes, global chains, formatter
//! registry, sinks) and then shared immutably across request threads;
//! [`Server::dispatch`] takes `&self`, so cross-request parallelism needs
//! no locking. Per request it runs setup -> pre-chain -> routing -> main
//! chain -> formatting, and fires the `after` event exactly once on every
//! branch.
use std::collections::HashMap;
use std::time::Instant;

use log::{debug, error, info, trace};
use semver::Version;

use crate::chain::{named, ChainRunner, HandlerChain, IntoChain, Outcome};
use crate::content::FormatterRegistry;
use crate::errors::{HttpError, MountError};
use crate::events::EventSink;
use crate::fault::FaultDomain;
use crate::request::Request;
use crate::response::Response;
use crate::route::{Method, RouteOptions, RouteSpec};
use crate::router::{max_satisfying, Found, Router};

type ErrorListener = Box<dyn Fn(&mut Request, &mut Response) -> bool + Send + Sync>;

pub struct ServerOptions {
    pub name: String,
    /// Default version set applied to mounts that declare none.
    pub versions: Vec<Version>,
    pub formatters: FormatterRegistry,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            name: "switchboard".to_string(),
            versions: vec![],
            formatters: FormatterRegistry::new(),
        }
    }
}

pub struct Server {
    name: String,
    versions: Vec<Version>,
    router: Router,
    registry: FormatterRegistry,
    /// Global chain prepended to every route mounted afterwards.
    chain: HandlerChain,
    /// Pre-chain, run before routing.
    before: HandlerChain,
    routes: HashMap<String, HandlerChain>,
    sinks: Vec<Box<dyn EventSink>>,
    error_listeners: HashMap<String, ErrorListener>,
}

impl Server {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            name: options.name,
            versions: options.versions,
            router: Router::new(),
            registry: options.formatters,
            chain: HandlerChain::new(),
            before: HandlerChain::new(),
            routes: HashMap::new(),
            sinks: vec![],
            error_listeners: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Media types this server can produce, best first.
    pub fn acceptable(&self) -> &[String] {
        self.registry.acceptable()
    }

    /// Mount a GET route. The route's chain is frozen now: the global
    /// `use` chain as registered so far, then the given handlers.
    pub fn get<M, C: IntoChain<M>>(
        &mut self,
        opts: impl Into<RouteOptions>,
        chain: C,
    ) -> Result<String, MountError> {
        self.mount(Method::GET, opts.into(), chain)
    }

    pub fn head<M, C: IntoChain<M>>(
        &mut self,
        opts: impl Into<RouteOptions>,
        chain: C,
    ) -> Result<String, MountError> {
        self.mount(Method::HEAD, opts.into(), chain)
    }

    pub fn post<M, C: IntoChain<M>>(
        &mut self,
        opts: impl Into<RouteOptions>,
        chain: C,
    ) -> Result<String, MountError> {
        self.mount(Method::POST, opts.into(), chain)
    }

    pub fn put<M, C: IntoChain<M>>(
        &mut self,
        opts: impl Into<RouteOptions>,
        chain: C,
    ) -> Result<String, MountError> {
        self.mount(Method::PUT, opts.into(), chain)
    }

    pub fn patch<M, C: IntoChain<M>>(
        &mut self,
        opts: impl Into<RouteOptions>,
        chain: C,
    ) -> Result<String, MountError> {
        self.mount(Method::PATCH, opts.into(), chain)
    }

    pub fn del<M, C: IntoChain<M>>(
        &mut self,
        opts: impl Into<RouteOptions>,
        chain: C,
    ) -> Result<String, MountError> {
        self.mount(Method::DELETE, opts.into(), chain)
    }

    pub fn opts<M, C: IntoChain<M>>(
        &mut self,
        opts: impl Into<RouteOptions>,
        chain: C,
    ) -> Result<String, MountError> {
        self.mount(Method::OPTIONS, opts.into(), chain)
    }

    fn mount<M, C: IntoChain<M>>(
        &mut self,
        method: Method,
        mut opts: RouteOptions,
        chain: C,
    ) -> Result<String, MountError> {
        if opts.versions.is_empty() {
            opts.versions = self.versions.clone();
        }
        let spec = self.router.mount(method, opts)?;
        let mut full = self.chain.clone();
        full.extend(chain.into_chain());
        self.routes.insert(spec.name.clone(), full);
        for sink in &self.sinks {
            sink.mount(&spec);
        }
        Ok(spec.name)
    }

    /// Append handlers to the global chain. Routes mounted earlier keep
    /// the chain they were mounted with.
    pub fn use_handler<M, C: IntoChain<M>>(&mut self, chain: C) -> &mut Self {
        self.chain.extend(chain.into_chain());
        self
    }

    /// Append handlers to the pre-chain, run before routing. Params are
    /// not set yet when these run.
    pub fn pre<M, C: IntoChain<M>>(&mut self, chain: C) -> &mut Self {
        self.before.extend(chain.into_chain());
        self
    }

    /// Global middleware that fires only when the named param was
    /// extracted from the path, receiving its value.
    pub fn param<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, &str, &str) -> Outcome + Send + Sync + 'static,
    {
        let param = name.to_string();
        let label = format!("param-{}", name);
        self.use_handler(named(&label, move |req: &mut Request, res: &mut Response| {
            match req.params.get(&param).cloned() {
                Some(value) => f(req, res, &value, &param),
                None => Outcome::Continue,
            }
        }))
    }

    /// Global middleware that fires only when the request's version is a
    /// wildcard or satisfies one of `versions`; the matched version is
    /// passed through (None for wildcard requests).
    pub fn versioned_use<F>(&mut self, versions: Vec<Version>, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Option<&Version>) -> Outcome + Send + Sync + 'static,
    {
        self.use_handler(named(
            "versioned-use",
            move |req: &mut Request, res: &mut Response| {
                let header = req.version_header().trim().to_string();
                if header.is_empty() || header == "*" {
                    return f(req, res, None);
                }
                match max_satisfying(&versions, &header) {
                    Some(version) => f(req, res, Some(&version)),
                    None => Outcome::Continue,
                }
            },
        ))
    }

    /// Remove a route and its chain. Returns whether anything was removed.
    pub fn rm(&mut self, name: &str) -> bool {
        let removed = self.router.unmount(name);
        if removed {
            self.routes.remove(name);
        }
        removed
    }

    /// Register a lifecycle event sink.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) -> &mut Self {
        self.sinks.push(sink);
        self
    }

    /// Register a listener that gets first chance at a routing or
    /// negotiation failure. The event name is the error kind with its
    /// `Error` suffix stripped (`NotFound`, `BadMethod`,
    /// `VersionNotAllowed`, `NotAcceptable`). Return true after sending a
    /// response to suppress the default error body.
    pub fn on_error<F>(&mut self, event: &str, listener: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> bool + Send + Sync + 'static,
    {
        self.error_listeners
            .insert(event.to_string(), Box::new(listener));
        self
    }

    /// Announce shutdown to the sinks. The transport owns the listener;
    /// the engine only reports the event.
    pub fn close(&self) {
        debug!("{} closing", self.name);
        for sink in &self.sinks {
            sink.close(&self.name);
        }
    }

    /// Serve one request.
    ///
    /// The transport hands over a parsed request and writes out the
    /// returned response. Exactly one `after` event fires per call,
    /// whatever branch the request took; an aborted request produces no
    /// payload but still completes.
    pub fn dispatch(&self, req: &mut Request) -> Response {
        let started = Instant::now();
        debug!("{} {} ({})", req.method, req.path, req.id);
        for sink in &self.sinks {
            sink.request(req);
        }
        let mut res = Response::new(200).with_header("Server", &self.name);
        let mut route: Option<RouteSpec> = None;
        let mut terminal: Option<HttpError> = None;

        // Negotiate before anything runs: a request that would end 406
        // must cause no handler side effects.
        match req.accept() {
            Ok(accept) => match self.registry.select(accept.as_ref()) {
                Ok(media_type) => res.media_type = Some(media_type),
                Err(err) => terminal = Some(self.route_error(req, &mut res, err)),
            },
            Err(parse_err) => {
                let err = HttpError::NotAcceptable(parse_err.to_string());
                terminal = Some(self.route_error(req, &mut res, err));
            }
        }

        if terminal.is_none() {
            let fault = FaultDomain::new(&req.id);
            let runner = ChainRunner {
                server_name: self.name.as_str(),
                router: &self.router,
                chains: &self.routes,
                sinks: self.sinks.as_slice(),
                fault: &fault,
            };
            if !self.before.is_empty() {
                terminal = runner.run(&self.before, None, req, &mut res);
            }
            if terminal.is_none() && !res.sent() && !req.is_aborted() {
                match self.router.find(req) {
                    Ok(Found::Preflight) => {
                        trace!("request {} answered as preflight", req.id);
                        res.send_status(200);
                    }
                    Ok(Found::Match(m)) => {
                        let spec = m.spec.clone();
                        req.params = m.params;
                        req.route = Some(spec.name.clone());
                        if let Some(version) = &m.version {
                            res.set_header("Api-Version", &version.to_string());
                        }
                        let chain = self.routes.get(&spec.name).cloned().unwrap_or_default();
                        route = Some(spec.clone());
                        terminal = runner.run(&chain, Some(spec), req, &mut res);
                    }
                    Err(err) => {
                        terminal = Some(self.route_error(req, &mut res, err));
                    }
                }
            }
        }

        if !req.is_aborted() {
            self.render(req, &mut res);
        }
        info!(
            "{} - {}ms - {} {} -> {} {}",
            req.id,
            started.elapsed().as_millis(),
            req.method,
            req.path,
            res.status_code,
            res.status,
        );
        for sink in &self.sinks {
            sink.after(req, &res, route.as_ref(), terminal.as_ref());
        }
        res
    }

    /// Resolve a routing or negotiation failure: a listener registered
    /// for the mapped event name gets first chance, otherwise the default
    /// serialized error body is sent.
    fn route_error(&self, req: &mut Request, res: &mut Response, err: HttpError) -> HttpError {
        let event = err.event_name().to_string();
        debug!("request {} failed routing: {} ({})", req.id, err, event);
        match self.error_listeners.get(&event) {
            Some(listener) if listener(req, res) => {
                trace!("listener handled '{}' for request {}", event, req.id);
            }
            _ => res.send_error(&err),
        }
        err
    }

    /// Turn the structured body into payload bytes with the negotiated
    /// formatter. HEAD responses keep the headers but drop the payload.
    fn render(&self, req: &Request, res: &mut Response) {
        let body = match &res.body {
            Some(body) => body.clone(),
            None => return,
        };
        // negotiation can fail before a type is selected; error bodies
        // then fall back to the default JSON formatter
        let media_type = res
            .media_type
            .clone()
            .unwrap_or_else(|| "application/json".to_string());
        let formatter = match self.registry.formatter_for(&media_type) {
            Some(formatter) => formatter,
            None => {
                error!("request {}: no formatter for {}", req.id, media_type);
                res.set_status(500);
                return;
            }
        };
        match formatter.format(&body) {
            Ok(bytes) => {
                res.set_header("Content-Type", &media_type);
                if req.method != Method::HEAD {
                    res.payload = Some(bytes);
                }
            }
            Err(e) => {
                error!("request {}: {}", req.id, e);
                res.set_status(500);
                res.payload = None;
            }
        }
    }
}

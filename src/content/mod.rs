//! Content negotiation over a ranked formatter list.
//!
//! The registry merges built-in and custom formatters into an ordered
//! "acceptable" list; per request, [`FormatterRegistry::select`] picks the
//! best match between that list and the client's Accept header. Selection
//! runs before any handler so a request that would end 406 causes no side
//! effects.
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::errors::HttpError;
use crate::request::Accept;
use crate::response::Body;

pub mod json;

pub use json::JsonFormatter;

#[derive(Debug, Clone, Error)]
#[error("serialization error: {reason}")]
pub struct SerializationError {
    reason: String,
}

impl SerializationError {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// Serializes one structured body for one media type.
pub trait Formatter: Send + Sync {
    fn format(&self, body: &Body) -> Result<Vec<u8>, SerializationError>;
}

/// Plain-text formatter; JSON bodies render as their compact JSON text.
pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format(&self, body: &Body) -> Result<Vec<u8>, SerializationError> {
        match body {
            Body::Json(v) => Ok(v.to_string().into_bytes()),
            Body::Text(s) => Ok(s.clone().into_bytes()),
            Body::Bytes(b) => Ok(b.clone()),
        }
    }
}

/// Pass-through formatter for opaque payloads.
pub struct BinaryFormatter;

impl Formatter for BinaryFormatter {
    fn format(&self, body: &Body) -> Result<Vec<u8>, SerializationError> {
        match body {
            Body::Json(v) => serde_json::to_vec(v).map_err(|e| SerializationError::new(&e.to_string())),
            Body::Text(s) => Ok(s.clone().into_bytes()),
            Body::Bytes(b) => Ok(b.clone()),
        }
    }
}

// Short aliases accepted as registration keys, resolved like the usual
// extension -> media type tables. Unknown aliases fall back to
// application/octet-stream.
fn lookup_alias(key: &str) -> &'static str {
    match key {
        "json" => "application/json",
        "text" | "txt" => "text/plain",
        "html" => "text/html",
        "bin" => "application/octet-stream",
        _ => "application/octet-stream",
    }
}

struct Entry {
    media_type: String,
    builtin: bool,
    // explicit q from the registration key, scaled by 10; None ranks the
    // entry after every explicitly weighted custom
    weight: Option<f32>,
    index: usize,
}

/// Mapping media type -> formatter plus the ranked acceptable list.
///
/// Built once at setup: built-ins first (`application/json`, `text/plain`,
/// `application/octet-stream`), then customs. A custom key may carry an
/// explicit weight (`"application/msgpack; q=0.7"`) or a short alias
/// (`"json"`). Built-ins always outrank customs; customs order by explicit
/// weight, then registration order.
pub struct FormatterRegistry {
    entries: Vec<Entry>,
    formatters: HashMap<String, Arc<dyn Formatter>>,
    acceptable: Vec<String>,
}

impl FormatterRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            entries: vec![],
            formatters: HashMap::new(),
            acceptable: vec![],
        };
        registry.add("application/json", true, None, Arc::new(JsonFormatter));
        registry.add("text/plain", true, None, Arc::new(TextFormatter));
        registry.add("application/octet-stream", true, None, Arc::new(BinaryFormatter));
        registry
    }

    /// Register a custom formatter under a media type key, optionally
    /// weighted: `"type/subtype"`, `"type/subtype; q=0.N"`, or an alias.
    pub fn with_formatter<F>(mut self, key: &str, formatter: F) -> Self
    where
        F: Formatter + 'static,
    {
        let (media_type, weight) = parse_key(key);
        self.add(&media_type, false, weight, Arc::new(formatter));
        self
    }

    fn add(&mut self, media_type: &str, builtin: bool, weight: Option<f32>, f: Arc<dyn Formatter>) {
        let index = self.entries.len();
        self.entries.push(Entry {
            media_type: media_type.to_string(),
            builtin,
            weight,
            index,
        });
        self.formatters.insert(media_type.to_string(), f);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let mut order: Vec<&Entry> = self.entries.iter().collect();
        order.sort_by(|a, b| {
            b.builtin
                .cmp(&a.builtin)
                .then_with(|| {
                    let wa = a.weight.unwrap_or(f32::NEG_INFINITY);
                    let wb = b.weight.unwrap_or(f32::NEG_INFINITY);
                    wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.index.cmp(&b.index))
        });
        self.acceptable = order.iter().map(|e| e.media_type.clone()).collect();
    }

    /// Media types the server can produce, best first.
    pub fn acceptable(&self) -> &[String] {
        &self.acceptable
    }

    pub fn formatter_for(&self, media_type: &str) -> Option<Arc<dyn Formatter>> {
        self.formatters.get(media_type).cloned()
    }

    /// Pick the media type to respond with. A missing Accept header means
    /// the client takes anything; `q=0` ranges are never selected.
    pub fn select(&self, accept: Option<&Accept>) -> Result<String, HttpError> {
        let accept = match accept {
            Some(accept) => accept,
            None => {
                return self
                    .acceptable
                    .first()
                    .cloned()
                    .ok_or_else(|| HttpError::NotAcceptable("no formatters registered".to_string()))
            }
        };
        let mut best: Option<(f32, usize)> = None;
        for (rank, media_type) in self.acceptable.iter().enumerate() {
            let (mime_type, mime_subtype) = match split_media_type(media_type) {
                Some(parts) => parts,
                None => continue,
            };
            let quality = accept
                .iter()
                .filter(|p| p.quality > 0.0 && p.matches(mime_type, mime_subtype))
                .map(|p| p.quality)
                .fold(None, |acc: Option<f32>, q| {
                    Some(acc.map_or(q, |best| best.max(q)))
                });
            if let Some(q) = quality {
                let better = match best {
                    None => true,
                    Some((best_q, _)) => q > best_q,
                };
                if better {
                    best = Some((q, rank));
                }
            }
        }
        match best {
            Some((_, rank)) => Ok(self.acceptable[rank].clone()),
            None => Err(HttpError::NotAcceptable(format!(
                "server accepts: {}",
                self.acceptable.join(", ")
            ))),
        }
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_key(key: &str) -> (String, Option<f32>) {
    let mut weight = None;
    let mut media_type = key.trim();
    if let Some((head, tail)) = key.split_once(';') {
        media_type = head.trim();
        let tail = tail.trim();
        if let Some(q) = tail.strip_prefix("q=") {
            if let Ok(q) = q.parse::<f32>() {
                weight = Some(q * 10.0);
            }
        }
    }
    let media_type = if media_type.contains('/') {
        media_type.to_string()
    } else {
        lookup_alias(media_type).to_string()
    };
    (media_type, weight)
}

fn split_media_type(media_type: &str) -> Option<(&str, &str)> {
    let mut parts = media_type.splitn(2, '/');
    Some((parts.next()?, parts.next()?))
}

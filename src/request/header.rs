use std::fmt;
use std::hash;
use std::str::FromStr;

use thiserror::Error;

/// Case-insensitive header name.
#[derive(Debug, Clone)]
pub struct Header(String);

impl Header {
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }
}

impl Eq for Header {}

impl hash::Hash for Header {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.0.to_lowercase().hash(state);
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Header {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Header> for String {
    fn from(s: Header) -> Self {
        s.0
    }
}

#[derive(Debug, Clone, Error)]
#[error("error parsing header '{header}': {reason}")]
pub struct HeaderParseError {
    header: String,
    reason: String,
}

impl HeaderParseError {
    pub fn new(header: &str, reason: &str) -> Self {
        Self {
            header: header.to_string(),
            reason: reason.to_string(),
        }
    }
}

type Result<T> = std::result::Result<T, HeaderParseError>;

/// One media range of an Accept header, with its quality.
#[derive(Debug, Clone)]
pub struct MediaTypePreference {
    pub mime_type: String,
    pub mime_subtype: String,
    pub quality: f32,
}

impl MediaTypePreference {
    pub fn matches(&self, mime_type: &str, mime_subtype: &str) -> bool {
        if &self.mime_type[..] == "*" {
            true
        } else if self.mime_type == mime_type {
            if &self.mime_subtype[..] == "*" {
                true
            } else {
                self.mime_subtype == mime_subtype
            }
        } else {
            false
        }
    }
}

// Accept: <MIME_type>/<MIME_subtype>
// Accept: <MIME_type>/*
// Accept: */*
// Multiple types, weighted with the quality value syntax:
// Accept: text/html, application/xhtml+xml, application/xml;q=0.9, image/webp, */*;q=0.8
impl FromStr for MediaTypePreference {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(';').collect();
        let (content_type, q) = match &parts[..] {
            [content_type] => (content_type.to_string(), 1.0),
            [content_type, q] => {
                let q = q.trim();
                let q = q.strip_prefix("q=").unwrap_or(q);
                match str::parse::<f32>(q) {
                    Ok(q) => (content_type.to_string(), q),
                    Err(_) => return Err(HeaderParseError::new("Accept", "invalid q value")),
                }
            }
            _ => return Err(HeaderParseError::new("Accept", "invalid mimetype format")),
        };
        let parts: Vec<&str> = content_type.trim().split('/').collect();
        let (mime_type, mime_subtype) = match &parts[..] {
            [mime_type, mime_subtype] => (mime_type.to_string(), mime_subtype.to_string()),
            _ => return Err(HeaderParseError::new("Accept", "invalid mimetype format")),
        };
        Ok(MediaTypePreference {
            mime_type,
            mime_subtype,
            quality: q,
        })
    }
}

/// A parsed Accept header. Preferences are ordered by descending quality,
/// so iteration visits the client's best choice first.
#[derive(Debug, Clone)]
pub struct Accept {
    prefs: Vec<MediaTypePreference>,
}

impl Accept {
    pub fn iter(&self) -> std::slice::Iter<MediaTypePreference> {
        self.prefs.iter()
    }
}

impl FromStr for Accept {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self> {
        let mut vec = vec![];
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            vec.push(str::parse::<MediaTypePreference>(part)?);
        }
        if vec.is_empty() {
            return Err(HeaderParseError::new("Accept", "no media types"));
        }
        vec.sort_by(|a, b| {
            b.quality
                .partial_cmp(&a.quality)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self { prefs: vec })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_name_case_insensitive() {
        assert_eq!(Header::new("Accept-Version"), Header::new("accept-version"));
    }

    #[test]
    fn test_accept_orders_by_quality() {
        let accept: Accept = "text/plain;q=0.5, application/json".parse().unwrap();
        let first = accept.iter().next().unwrap();
        assert_eq!(first.mime_subtype, "json");
        assert!((first.quality - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_wildcard_preference() {
        let pref: MediaTypePreference = "*/*;q=0.8".parse().unwrap();
        assert!(pref.matches("application", "json"));
        let partial: MediaTypePreference = "text/*".parse().unwrap();
        assert!(partial.matches("text", "plain"));
        assert!(!partial.matches("application", "json"));
    }

    #[test]
    fn test_garbage_accept_rejected() {
        assert!("not a media type".parse::<Accept>().is_err());
    }
}

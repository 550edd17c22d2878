//! HTTP response head, structured body and formatted payload.
use std::collections::HashMap;

use crate::errors::HttpError;

pub mod status;

/// Structured response body, produced by handlers and serialized by the
/// formatter the content negotiator selected for the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
}

/// An HTTP response.
///
/// Handlers fill in the head and a structured [`Body`]; dispatch turns the
/// body into `payload` bytes with the negotiated formatter before the
/// response goes back to the transport.
///
/// # Example
/// ```
/// use switchboard::response::{Body, Response};
///
/// let mut response = Response::new(200).with_header("Connection", "close");
/// response.send(Body::Text("hello".to_string()));
///
/// assert!(response.sent());
/// ```
#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub status: String,
    headers: Vec<(String, String)>,
    pub body: Option<Body>,
    /// Formatted body bytes, present once dispatch has run the formatter.
    pub payload: Option<Vec<u8>>,
    sent: bool,
    pub(crate) media_type: Option<String>,
}

impl Response {
    /// Create a new Response. Status is automatically set to the default
    /// status for the given code (200 -> "OK", etc.)
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            status: status::default(status_code),
            headers: vec![],
            body: None,
            payload: None,
            sent: false,
            media_type: None,
        }
    }

    pub fn headers(&self) -> HashMap<String, String> {
        self.headers.iter().cloned().collect()
    }

    /// Add header.
    pub fn with_header(mut self, header: &str, value: &str) -> Self {
        self.headers.push((header.to_string(), value.to_string()));
        self
    }

    pub fn set_header(&mut self, header: &str, value: &str) {
        self.headers.push((header.to_string(), value.to_string()));
    }

    pub fn set_status(&mut self, status_code: u16) {
        self.status_code = status_code;
        self.status = status::default(status_code);
    }

    /// Media type of the negotiated formatter for this request.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// Record a body and mark the response as sent. The chain can keep
    /// running afterwards; later sends do not overwrite an earlier one.
    pub fn send(&mut self, body: Body) {
        if self.sent {
            return;
        }
        self.body = Some(body);
        self.sent = true;
    }

    /// Mark the response as sent with a bare status and no body.
    pub fn send_status(&mut self, status_code: u16) {
        if self.sent {
            return;
        }
        self.set_status(status_code);
        self.sent = true;
    }

    pub fn sent(&self) -> bool {
        self.sent
    }

    /// Send the serialized form of an error, replacing whatever body was
    /// staged but not yet sent. BadMethod failures advertise the allowed
    /// methods.
    pub(crate) fn send_error(&mut self, err: &HttpError) {
        if self.sent {
            return;
        }
        if let HttpError::BadMethod { allowed, .. } = err {
            let allowed = allowed
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            self.set_header("Allow", &allowed);
        }
        self.set_status(err.status_code());
        self.body = Some(err.to_body());
        self.sent = true;
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::route::Method;

    #[test]
    fn test_first_send_wins() {
        let mut response = Response::new(200);
        response.send(Body::Text("first".to_string()));
        response.send(Body::Text("second".to_string()));
        assert_eq!(response.body, Some(Body::Text("first".to_string())));
    }

    #[test]
    fn test_send_error_sets_allow_header() {
        let mut response = Response::new(200);
        response.send_error(&HttpError::BadMethod {
            method: Method::DELETE,
            path: "/widgets".to_string(),
            allowed: vec![Method::GET, Method::PUT],
        });
        assert_eq!(response.status_code, 405);
        assert_eq!(response.status, "Method Not Allowed");
        assert_eq!(response.headers().get("Allow"), Some(&"GET, PUT".to_string()));
    }

    #[test]
    fn test_error_does_not_overwrite_sent_response() {
        let mut response = Response::new(200);
        response.send(Body::Text("done".to_string()));
        response.send_error(&HttpError::Internal("late".to_string()));
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, Some(Body::Text("done".to_string())));
    }
}

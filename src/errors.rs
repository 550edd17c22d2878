//! Error taxonomy and wire mapping.
//!
//! Every failure a client can observe is an [`HttpError`]: it knows its
//! status code, the `code` string sent in the response body, and the event
//! name consulted when listeners want first chance at the response.
//! Setup-time misuse is a separate [`MountError`] returned by the
//! registration calls, never sent on the wire.
use serde_json::json;
use thiserror::Error;

use crate::response::Body;
use crate::route::Method;

#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// No route pattern matched the request path.
    #[error("{0} does not exist")]
    ResourceNotFound(String),

    /// A pattern matched the path, but not with this method.
    #[error("{method} is not allowed")]
    BadMethod {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    /// No mounted version satisfies the requested version range.
    #[error("{0}")]
    InvalidVersion(String),

    /// No formatter satisfies the Accept header.
    #[error("{0}")]
    NotAcceptable(String),

    /// Malformed request input.
    #[error("{0}")]
    BadRequest(String),

    /// Unexpected failure, including a panic caught by the fault domain.
    #[error("{0}")]
    Internal(String),

    /// A second chain redirect was attempted within one request.
    #[error("multiple chain redirects are not supported")]
    ChainRedirectMisuse,

    /// Handler-defined failure with its own status and code.
    #[error("{message}")]
    Custom {
        status: u16,
        code: String,
        message: String,
    },
}

impl HttpError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ResourceNotFound(_) => 404,
            Self::BadMethod { .. } => 405,
            Self::InvalidVersion(_) => 400,
            Self::NotAcceptable(_) => 406,
            Self::BadRequest(_) => 400,
            Self::Internal(_) => 500,
            Self::ChainRedirectMisuse => 500,
            Self::Custom { status, .. } => *status,
        }
    }

    /// The `code` field of the serialized error body.
    pub fn code(&self) -> &str {
        match self {
            Self::ResourceNotFound(_) => "ResourceNotFound",
            Self::BadMethod { .. } => "BadMethod",
            Self::InvalidVersion(_) => "InvalidVersion",
            Self::NotAcceptable(_) => "NotAcceptable",
            Self::BadRequest(_) => "BadRequest",
            Self::Internal(_) => "Internal",
            Self::ChainRedirectMisuse => "Internal",
            Self::Custom { code, .. } => code,
        }
    }

    /// The event name a listener registers under to intercept this error
    /// before the default response is sent.
    pub fn event_name(&self) -> &str {
        match self {
            Self::ResourceNotFound(_) => "NotFound",
            Self::InvalidVersion(_) => "VersionNotAllowed",
            _ => self.code(),
        }
    }

    /// The structured `{code, message}` body every failure surfaces as.
    pub fn to_body(&self) -> Body {
        Body::Json(json!({
            "code": self.code(),
            "message": self.to_string(),
        }))
    }
}

/// Decoded form of the default error body, mostly useful to clients and
/// tests reading a formatted error payload back.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Registration-time failures. These reject the mount call; nothing is
/// ever sent to a client.
#[derive(Debug, Clone, Error)]
pub enum MountError {
    #[error("route '{0}' is already mounted")]
    DuplicateRouteName(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(HttpError::ResourceNotFound("/x".into()).event_name(), "NotFound");
        assert_eq!(
            HttpError::InvalidVersion("no".into()).event_name(),
            "VersionNotAllowed"
        );
        let err = HttpError::BadMethod {
            method: Method::DELETE,
            path: "/x".into(),
            allowed: vec![Method::GET],
        };
        assert_eq!(err.event_name(), "BadMethod");
        assert_eq!(err.status_code(), 405);
    }

    #[test]
    fn test_redirect_misuse_degrades_to_internal() {
        let err = HttpError::ChainRedirectMisuse;
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.code(), "Internal");
    }

    #[test]
    fn test_body_shape() {
        let body = HttpError::ResourceNotFound("/nope".into()).to_body();
        match body {
            Body::Json(v) => {
                assert_eq!(v["code"], "ResourceNotFound");
                assert_eq!(v["message"], "/nope does not exist");
            }
            _ => panic!("expected json body"),
        }
    }
}

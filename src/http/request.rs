use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::http::response::StatusCode;

/// HTTP request methods.
///
/// The server only serves files, so GET is the only method a request line
/// may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
}

impl Method {
    /// Parses a method token, ignoring ASCII case.
    ///
    /// # Example
    ///
    /// ```
    /// # use filesrv::http::request::Method;
    /// assert_eq!(Method::from_token("get"), Some(Method::GET));
    /// assert_eq!(Method::from_token("POST"), None);
    /// ```
    pub fn from_token(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("GET") {
            Some(Method::GET)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
        }
    }
}

/// A validated request line.
///
/// Only the parser builds these, and only from syntactically valid lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method
    pub method: Method,
    /// The requested path exactly as received (e.g., "/index.html")
    pub path: String,
    /// Protocol version without the `HTTP/` prefix, always "1.1"
    pub version: String,
}

impl Request {
    /// Joins the requested path onto `root`.
    ///
    /// No percent-decoding is done. A path containing a `..` component is
    /// refused with a 404 so that it can never name a file outside `root`.
    pub fn resolve(&self, root: &Path) -> Result<PathBuf, RequestError> {
        let relative = Path::new(self.path.trim_start_matches('/'));

        if relative.components().any(|c| matches!(c, Component::ParentDir)) {
            tracing::warn!(path = %self.path, "Rejected path escaping the document root");
            return Err(RequestError::not_found());
        }

        Ok(root.join(relative))
    }
}

/// A classified failure of one request.
///
/// `code` is optional; an error without one is reported as
/// 500 Internal Server Error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub message: String,
    pub code: Option<StatusCode>,
}

impl RequestError {
    /// An error without a status code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: StatusCode) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }

    pub fn not_found() -> Self {
        Self::with_code("Not Found", StatusCode::NotFound)
    }

    pub fn connection_closed() -> Self {
        Self::new("Connection closed")
    }

    /// The status reported to the client.
    pub fn status(&self) -> StatusCode {
        self.code.unwrap_or(StatusCode::InternalServerError)
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code.as_u16()),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RequestError {}

use crate::http::mime::ContentType;
use crate::http::request::RequestError;

const HTTP_VERSION: &str = "HTTP/1.1";
const CRLF: &[u8] = b"\r\n";

/// HTTP status codes the server emits.
///
/// - `Ok` (200): File found and sent
/// - `NotFound` (404): No regular file at the resolved path
/// - `InternalServerError` (500): Every other failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use filesrv::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// The outcome of handling one request, ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A file was found; `body` holds its exact bytes
    Ok {
        content_type: ContentType,
        body: Vec<u8>,
    },
    /// The request failed and is answered with a bare status line
    Error(RequestError),
}

impl Response {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>, content_type: ContentType) -> Self {
        Response::Ok {
            content_type,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Response::Ok { .. } => StatusCode::Ok,
            Response::Error(err) => err.status(),
        }
    }

    /// Serializes the response into wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Ok { content_type, body } => encode_success(body, *content_type),
            Response::Error(err) => encode_error(err),
        }
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        Response::Error(err)
    }
}

/// Frames a successful response: status line, content type, a blank line,
/// then the body followed by a line break.
///
/// No Content-Length is sent, the peer reads until the connection closes.
pub fn encode_success(body: &[u8], content_type: ContentType) -> Vec<u8> {
    let mut buf = Vec::with_capacity(body.len() + 64);

    let status = StatusCode::Ok;
    let status_line = format!(
        "{} {} {}",
        HTTP_VERSION,
        status.as_u16(),
        status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());
    buf.extend_from_slice(CRLF);

    buf.extend_from_slice(b"Content-Type: ");
    buf.extend_from_slice(content_type.as_str().as_bytes());
    buf.extend_from_slice(CRLF);

    buf.extend_from_slice(CRLF);

    buf.extend_from_slice(body);
    buf.extend_from_slice(CRLF);

    buf
}

/// Frames an error as a single status line `HTTP/1.1 <code> <message>`.
///
/// The message replaces the reason phrase; a missing code becomes 500.
pub fn encode_error(err: &RequestError) -> Vec<u8> {
    let line = format!("{} {} {}", HTTP_VERSION, err.status().as_u16(), err.message);

    let mut buf = Vec::with_capacity(line.len() + CRLF.len());
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(CRLF);
    buf
}

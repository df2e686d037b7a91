use crate::http::request::{Method, Request, RequestError};

const SCHEME_PREFIX: &str = "HTTP/";
const SUPPORTED_VERSION: &str = "1.1";

/// Parses one request line of the form `GET <path> HTTP/1.1`.
///
/// The path is every token between the method and the version, re-joined
/// with single spaces, so paths with embedded whitespace survive.
pub fn parse_request_line(line: &str) -> Result<Request, RequestError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(RequestError::new("Invalid empty request"));
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    // Non-empty after trim, so there is at least one token
    let first = tokens[0];
    let last = tokens[tokens.len() - 1];

    let method = Method::from_token(first)
        .ok_or_else(|| RequestError::new(format!("Unknown method: {}", first)))?;

    if !has_scheme_prefix(last) {
        return Err(RequestError::new(format!("Unknown scheme: {}", last)));
    }

    // Only the exact-case prefix is stripped; `http/1.1` keeps its whole token
    let version = last.strip_prefix(SCHEME_PREFIX).unwrap_or(last);
    if version != SUPPORTED_VERSION {
        return Err(RequestError::new(format!(
            "Unknown HTTP version: {}",
            version
        )));
    }

    let path = if tokens.len() > 2 {
        tokens[1..tokens.len() - 1].join(" ")
    } else {
        String::new()
    };

    Ok(Request {
        method,
        path,
        version: version.to_string(),
    })
}

fn has_scheme_prefix(token: &str) -> bool {
    token
        .get(..SCHEME_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(SCHEME_PREFIX))
}

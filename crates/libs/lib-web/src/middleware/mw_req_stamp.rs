//! # Request Stamping Middleware
//!
//! Gives every request an id and arrival time, available to handlers and the
//! trace span as `Extension<RequestStamp>` and echoed in the `X-Request-ID`
//! response header.
//!
//! An id supplied by the client in `X-Request-ID` is kept when it is short and
//! printable, so a proxy's id can be followed through the logs.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::SystemTime;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_FORWARDED_ID_LEN: usize = 64;

/// Request metadata for tracing and debugging.
#[derive(Clone, Debug)]
pub struct RequestStamp {
    /// Unique request identifier
    pub id: String,
    /// Request arrival time
    pub timestamp: SystemTime,
}

impl RequestStamp {
    fn new(forwarded_id: Option<&str>) -> Self {
        let id = forwarded_id
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_FORWARDED_ID_LEN)
            .filter(|id| id.chars().all(|c| c.is_ascii_graphic()))
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            id,
            timestamp: SystemTime::now(),
        }
    }
}

pub async fn stamp_req(mut req: Request, next: Next) -> Response {
    let forwarded = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok());
    let stamp = RequestStamp::new(forwarded);

    req.extensions_mut().insert(stamp.clone());

    let mut res = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&stamp.id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_id_is_kept() {
        assert_eq!(RequestStamp::new(Some("abc-123")).id, "abc-123");
    }

    #[test]
    fn test_unusable_forwarded_id_is_replaced() {
        let long = "x".repeat(MAX_FORWARDED_ID_LEN + 1);
        for bad in [None, Some(""), Some("has space"), Some(long.as_str())] {
            let stamp = RequestStamp::new(bad);
            assert!(Uuid::parse_str(&stamp.id).is_ok(), "{:?} should be replaced", bad);
        }
    }
}

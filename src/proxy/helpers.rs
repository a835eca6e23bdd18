//! Proxy utility functions.
//!
//! This module contains helper functions for request processing:
//! - Building a `FetchRequest` from a Pingora request header
//! - Client IP detection (X-Forwarded-For aware)
//! - Writing endpoint and strategy responses to the session
//! - Reading bounded control-endpoint bodies

use bytes::{Bytes, BytesMut};
use pingora_core::Result;
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::Session;

use super::special_endpoints::EndpointResponse;
use crate::constants::CACHE_SOURCE_HEADER;
use crate::fetch::{FetchRequest, RequestDestination, RequestMode};
use crate::security::{validate_body_size, SecurityError};
use crate::strategy::StrategyResponse;

/// Headers that describe the stored message framing and must not be replayed
const SKIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "transfer-encoding",
];

/// Build the controller's view of an incoming request.
///
/// Mode and destination come from `Sec-Fetch-Mode` / `Sec-Fetch-Dest`. Without
/// them, an `Accept: image/*` request is treated as an image load.
pub fn fetch_request_from_header(req: &RequestHeader) -> FetchRequest {
    let url = req
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut request = FetchRequest::get(url).with_method(req.method.clone());
    for (name, value) in req.headers.iter() {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }

    if let Some(mode) = request.header("sec-fetch-mode") {
        request.mode = RequestMode::from_header(mode);
    }
    request.destination = match request.header("sec-fetch-dest") {
        Some(dest) => RequestDestination::from_header(dest),
        None if request
            .header("accept")
            .map(|a| a.trim_start().starts_with("image/"))
            .unwrap_or(false) =>
        {
            RequestDestination::Image
        }
        None => RequestDestination::Empty,
    };
    if request.mode == RequestMode::Navigate && request.destination == RequestDestination::Empty {
        request.destination = RequestDestination::Document;
    }
    request
}

/// Extract client IP address from session (X-Forwarded-For aware).
///
/// The header can contain multiple IPs: `"client, proxy1, proxy2"`.
/// The first IP is the original client, which is what we return.
pub fn get_client_ip(session: &Session) -> String {
    if let Some(forwarded_for) = session
        .req_header()
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(client_ip) = forwarded_for.split(',').next() {
            return client_ip.trim().to_string();
        }
    }

    session
        .client_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Response header for a strategy response
pub fn strategy_response_header(
    response: &StrategyResponse,
    request_id: &str,
) -> Result<ResponseHeader> {
    let mut header = ResponseHeader::build(response.response.status, None)?;
    for (name, value) in &response.response.headers {
        if SKIPPED_RESPONSE_HEADERS
            .iter()
            .any(|skipped| name.eq_ignore_ascii_case(skipped))
        {
            continue;
        }
        header.append_header(name.clone(), value.as_str())?;
    }
    header.insert_header("Content-Length", response.response.body.len().to_string())?;
    header.insert_header(CACHE_SOURCE_HEADER, response.source.as_str())?;
    header.insert_header("X-Request-ID", request_id)?;
    Ok(header)
}

pub async fn write_strategy_response(
    session: &mut Session,
    response: &StrategyResponse,
    request_id: &str,
) -> Result<()> {
    let header = strategy_response_header(response, request_id)?;
    session
        .write_response_header(Box::new(header), false)
        .await?;
    session
        .write_response_body(Some(response.response.body.clone()), true)
        .await?;
    Ok(())
}

pub async fn write_endpoint_response(
    session: &mut Session,
    response: EndpointResponse,
    request_id: &str,
) -> Result<()> {
    let mut header = ResponseHeader::build(response.status, None)?;
    header.insert_header("Content-Type", response.content_type)?;
    header.insert_header("Content-Length", response.body.len().to_string())?;
    header.insert_header("X-Request-ID", request_id)?;

    session
        .write_response_header(Box::new(header), false)
        .await?;
    session
        .write_response_body(Some(response.body.into()), true)
        .await?;
    Ok(())
}

/// Read the whole request body, rejecting it once it grows past `limit`
pub async fn read_body(
    session: &mut Session,
    limit: usize,
) -> Result<std::result::Result<Bytes, SecurityError>> {
    let declared = session
        .req_header()
        .headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if let Err(e) = validate_body_size(declared, limit) {
        return Ok(Err(e));
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = session.read_request_body().await? {
        body.extend_from_slice(&chunk);
        if let Err(e) = validate_body_size(Some(body.len()), limit) {
            return Ok(Err(e));
        }
    }
    Ok(Ok(body.freeze()))
}

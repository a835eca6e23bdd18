// Proxy module - Pingora ProxyHttp implementation
// Serves classified requests from the offline controller and proxies the rest to
// the upstream content API

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::build_storage;
use crate::config::Config;
use crate::controller::OfflineController;
use crate::error::ControllerError;
use crate::fetch::HttpFetcher;
use crate::metrics::ControllerMetrics;
use crate::pipeline::RequestContext;
use crate::router::Classification;
use crate::security::{self, SecurityError, SecurityLimits};

pub mod control;
pub mod helpers;
pub mod special_endpoints;

use control::{handle_control, is_control_path};
use helpers::{
    fetch_request_from_header, get_client_ip, read_body, write_endpoint_response,
    write_strategy_response,
};
use special_endpoints::{handle_health, handle_metrics, EndpointResponse};

/// OfflineProxy implements the Pingora ProxyHttp trait
pub struct OfflineProxy {
    config: Arc<Config>,
    controller: Arc<OfflineController>,
    /// (host, port, tls) of the content API
    upstream: (String, u16, bool),
    security_limits: SecurityLimits,
    /// Proxy start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl OfflineProxy {
    /// Create the proxy with the configured storage backend and an HTTP fetcher
    pub fn new(config: Config) -> std::result::Result<Self, ControllerError> {
        let storage = build_storage(&config.cache);
        let fetcher = HttpFetcher::new(
            &config.upstream.base_url,
            Duration::from_secs(config.upstream.timeout_secs),
        )?;
        let controller = OfflineController::new(
            Arc::new(config.controller.clone()),
            storage,
            Arc::new(fetcher),
        );
        Self::with_controller(config, Arc::new(controller))
    }

    /// Create the proxy around an existing controller
    pub fn with_controller(
        config: Config,
        controller: Arc<OfflineController>,
    ) -> std::result::Result<Self, ControllerError> {
        let upstream = config.upstream.endpoint().map_err(ControllerError::Config)?;
        let security_limits = config.server.security_limits.to_security_limits();
        Ok(Self {
            config: Arc::new(config),
            controller,
            upstream,
            security_limits,
            start_time: Instant::now(),
        })
    }

    pub fn controller(&self) -> Arc<OfflineController> {
        Arc::clone(&self.controller)
    }

    async fn reject(
        &self,
        session: &mut Session,
        ctx: &RequestContext,
        error: SecurityError,
    ) -> Result<bool> {
        tracing::warn!(
            request_id = %ctx.request_id(),
            client_ip = %get_client_ip(session),
            path = %ctx.path(),
            error = %error,
            "Request rejected by front-door checks"
        );
        ControllerMetrics::global()
            .rejected_requests
            .with_label_values(&[error.reason()])
            .inc();

        let response = match error.status_code() {
            413 => EndpointResponse::error(413, "Payload Too Large", &error.to_string()),
            414 => EndpointResponse::error(414, "URI Too Long", &error.to_string()),
            status => EndpointResponse::error(status, "Bad Request", &error.to_string()),
        };
        write_endpoint_response(session, response, ctx.request_id()).await?;
        Ok(true)
    }
}

#[async_trait]
impl ProxyHttp for OfflineProxy {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::default()
    }

    /// Route bypassed requests to the content API
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let (host, port, tls) = &self.upstream;
        let mut peer = Box::new(HttpPeer::new((host.clone(), *port), *tls, host.clone()));

        let timeout = Duration::from_secs(self.config.upstream.timeout_secs);
        peer.options.connection_timeout = Some(timeout);
        peer.options.read_timeout = Some(timeout);
        peer.options.write_timeout = Some(timeout);

        tracing::debug!(
            request_id = %ctx.request_id(),
            upstream = %format!("{}:{}", host, port),
            timeout_seconds = self.config.upstream.timeout_secs,
            "Proxying bypassed request"
        );
        Ok(peer)
    }

    /// Front-door checks, built-in endpoints, then classification
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.clone();
        let path = req.uri.path().to_string();
        let uri = req.uri.to_string();
        let query = req.uri.query().map(str::to_string);
        ctx.set_request(method.as_str(), &path);

        if let Err(e) = security::validate_request(&uri, query.as_deref(), &self.security_limits) {
            return self.reject(session, ctx, e).await;
        }

        match (method.as_str(), path.as_str()) {
            ("GET", "/health") => {
                let active = self.controller.lifecycle().active_generation();
                let response = handle_health(self.start_time, active.as_deref());
                write_endpoint_response(session, response, ctx.request_id()).await?;
                return Ok(true);
            }
            ("GET", "/metrics") => {
                write_endpoint_response(session, handle_metrics(), ctx.request_id()).await?;
                return Ok(true);
            }
            _ => {}
        }

        if is_control_path(&path) {
            let client_id = session
                .req_header()
                .headers
                .get("x-client-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = match read_body(session, self.security_limits.max_body_size).await? {
                Ok(body) => body,
                Err(e) => return self.reject(session, ctx, e).await,
            };
            let response = handle_control(
                &self.controller,
                &method,
                &path,
                client_id.as_deref(),
                &body,
            )
            .await;
            write_endpoint_response(session, response, ctx.request_id()).await?;
            return Ok(true);
        }

        let request = fetch_request_from_header(session.req_header());
        match self.controller.fetch(&request).await {
            Ok(Some(response)) => {
                ctx.set_classification(self.controller.router().classify(&request));
                ctx.set_source(response.source);
                write_strategy_response(session, &response, ctx.request_id()).await?;
                Ok(true)
            }
            Ok(None) => {
                ctx.set_classification(Classification::Bypass);
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    path = %path,
                    error = %e,
                    "Controller could not answer request"
                );
                let response = EndpointResponse::from_controller_error(&e);
                write_endpoint_response(session, response, ctx.request_id()).await?;
                Ok(true)
            }
        }
    }

    /// Point the Host header at the content API
    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        _ctx: &mut Self::CTX,
    ) -> Result<()> {
        let (host, port, tls) = &self.upstream;
        let default_port = if *tls { 443 } else { 80 };
        let host_header = if *port == default_port {
            host.clone()
        } else {
            format!("{}:{}", host, port)
        };
        upstream_request.insert_header(http::header::HOST, host_header)?;
        Ok(())
    }

    /// Filter upstream responses to add custom headers (request correlation)
    fn upstream_response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        upstream_response
            .insert_header("X-Request-ID", ctx.request_id())
            .map_err(|e| {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    error = ?e,
                    "Failed to add X-Request-ID header"
                );
                e
            })?;
        Ok(())
    }

    /// Log request completion
    async fn logging(
        &self,
        session: &mut Session,
        e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);
        let duration_ms = ctx.elapsed().as_secs_f64() * 1000.0;
        let classification = ctx.classification().map(|c| c.as_str()).unwrap_or("none");
        let source = ctx.source().map(|s| s.as_str()).unwrap_or("upstream");

        if let Some(error) = e {
            tracing::warn!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                error = %error,
                "Upstream request failed"
            );
        }

        tracing::info!(
            request_id = %ctx.request_id(),
            client_ip = %get_client_ip(session),
            method = %ctx.method(),
            path = %ctx.path(),
            status_code = status_code,
            classification = classification,
            source = source,
            duration_ms = duration_ms,
            "Request completed"
        );
    }
}

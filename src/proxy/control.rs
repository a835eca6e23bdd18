//! Control endpoints under `/__sw/`
//!
//! These routes let page views and operators drive the controller events that
//! have no HTTP request of their own: messages, sync, push, notification clicks,
//! client registration and lifecycle transitions.

use http::Method;
use serde::Deserialize;
use tokio::sync::oneshot;

use super::special_endpoints::{handle_status, EndpointResponse};
use crate::constants::CONTROL_PATH_PREFIX;
use crate::controller::{ControllerEvent, EventOutcome, OfflineController};
use crate::error::ControllerError;
use crate::message::ClientMessage;

#[derive(Debug, Default, Deserialize)]
struct InstallRequest {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClickRequest {
    #[serde(default)]
    action: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisterClientRequest {
    #[serde(default = "default_client_url")]
    url: String,
}

fn default_client_url() -> String {
    "/".to_string()
}

pub fn is_control_path(path: &str) -> bool {
    path.starts_with(CONTROL_PATH_PREFIX)
}

/// Parse an optional JSON body; an empty body yields `T::default()`
fn parse_optional<T: Default + for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, ControllerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

fn not_found(path: &str) -> EndpointResponse {
    EndpointResponse::error(404, "Not Found", &format!("no control route for {}", path))
}

fn method_not_allowed(method: &Method, path: &str) -> EndpointResponse {
    EndpointResponse::error(
        405,
        "Method Not Allowed",
        &format!("{} is not supported on {}", method, path),
    )
}

fn outcome(result: Result<EventOutcome, ControllerError>) -> EndpointResponse {
    match result {
        Ok(outcome) => EndpointResponse::json_value(200, &outcome),
        Err(e) => {
            tracing::warn!(error = %e, kind = e.kind(), "Control request failed");
            EndpointResponse::from_controller_error(&e)
        }
    }
}

/// Dispatch a control request
///
/// `path` must start with `/__sw/`. `client_id` comes from the `x-client-id` header.
pub async fn handle_control(
    controller: &OfflineController,
    method: &Method,
    path: &str,
    client_id: Option<&str>,
    body: &[u8],
) -> EndpointResponse {
    let route = path.trim_start_matches(CONTROL_PATH_PREFIX).trim_end_matches('/');
    let segments: Vec<&str> = route.split('/').collect();

    match segments.as_slice() {
        ["status"] => match *method {
            Method::GET => handle_status(&controller.status().await),
            _ => method_not_allowed(method, path),
        },
        ["message"] => match *method {
            Method::POST => handle_message(controller, client_id, body).await,
            _ => method_not_allowed(method, path),
        },
        ["sync", tag] => match *method {
            Method::POST => {
                outcome(
                    controller
                        .handle(ControllerEvent::Sync {
                            tag: tag.to_string(),
                        })
                        .await,
                )
            }
            Method::PUT => {
                let registered = controller.register_sync(tag);
                EndpointResponse::json(
                    if registered { 201 } else { 200 },
                    serde_json::json!({ "tag": tag, "registered": registered }).to_string(),
                )
            }
            _ => method_not_allowed(method, path),
        },
        ["periodic-sync", tag] => match *method {
            Method::POST => {
                outcome(
                    controller
                        .handle(ControllerEvent::PeriodicSync {
                            tag: tag.to_string(),
                        })
                        .await,
                )
            }
            _ => method_not_allowed(method, path),
        },
        ["push"] => match *method {
            Method::POST => {
                let data = if body.is_empty() {
                    None
                } else {
                    Some(bytes::Bytes::copy_from_slice(body))
                };
                outcome(controller.handle(ControllerEvent::Push { data }).await)
            }
            _ => method_not_allowed(method, path),
        },
        ["notification-click"] => match *method {
            Method::POST => match serde_json::from_slice::<ClickRequest>(body) {
                Ok(click) => outcome(
                    controller
                        .handle(ControllerEvent::NotificationClick {
                            action: click.action,
                            url: click.url,
                        })
                        .await,
                ),
                Err(e) => EndpointResponse::from_controller_error(&e.into()),
            },
            _ => method_not_allowed(method, path),
        },
        ["clients"] => match *method {
            Method::POST => {
                let url = if body.is_empty() {
                    default_client_url()
                } else {
                    match serde_json::from_slice::<RegisterClientRequest>(body) {
                        Ok(request) => request.url,
                        Err(e) => return EndpointResponse::from_controller_error(&e.into()),
                    }
                };
                EndpointResponse::json_value(201, &controller.register_client(&url))
            }
            Method::GET => EndpointResponse::json_value(200, &controller.clients().list()),
            _ => method_not_allowed(method, path),
        },
        ["clients", id] => match *method {
            Method::DELETE => {
                if controller.clients().get(id).is_none() {
                    return not_found(path);
                }
                match controller.unregister_client(id).await {
                    Ok(activated) => EndpointResponse::json(
                        200,
                        serde_json::json!({ "closed": id, "activated": activated }).to_string(),
                    ),
                    Err(e) => EndpointResponse::from_controller_error(&e),
                }
            }
            _ => method_not_allowed(method, path),
        },
        ["clients", id, "messages"] => match *method {
            Method::GET => match controller.clients().drain(id) {
                Some(messages) => EndpointResponse::json_value(200, &messages),
                None => not_found(path),
            },
            _ => method_not_allowed(method, path),
        },
        ["lifecycle", "install"] => match *method {
            Method::POST => match parse_optional::<InstallRequest>(body) {
                Ok(request) => outcome(
                    controller
                        .handle(ControllerEvent::Install {
                            version: request.version,
                        })
                        .await,
                ),
                Err(e) => EndpointResponse::from_controller_error(&e),
            },
            _ => method_not_allowed(method, path),
        },
        ["lifecycle", "activate"] => match *method {
            Method::POST => outcome(controller.handle(ControllerEvent::Activate).await),
            _ => method_not_allowed(method, path),
        },
        ["lifecycle", "quota-exceeded"] => match *method {
            Method::POST => outcome(controller.handle(ControllerEvent::QuotaExceeded).await),
            _ => method_not_allowed(method, path),
        },
        _ => not_found(path),
    }
}

async fn handle_message(
    controller: &OfflineController,
    client_id: Option<&str>,
    body: &[u8],
) -> EndpointResponse {
    let message = match ClientMessage::parse(body) {
        Ok(message) => message,
        Err(e) => return EndpointResponse::from_controller_error(&e),
    };

    if message == ClientMessage::GetVersion {
        let (tx, rx) = oneshot::channel();
        let event = ControllerEvent::Message {
            message,
            client_id: client_id.map(str::to_string),
            reply: Some(tx),
        };
        if let Err(e) = controller.handle(event).await {
            return EndpointResponse::from_controller_error(&e);
        }
        return match rx.await {
            Ok(reply) => EndpointResponse::json_value(200, &reply),
            Err(_) => EndpointResponse::error(500, "Internal Server Error", "version reply dropped"),
        };
    }

    outcome(
        controller
            .handle(ControllerEvent::Message {
                message,
                client_id: client_id.map(str::to_string),
                reply: None,
            })
            .await,
    )
}

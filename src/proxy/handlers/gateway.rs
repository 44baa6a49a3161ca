// Gateway handlers: capability query and forwarding
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::Response,
    Extension, Json,
};
use serde_json::{json, Value};

use crate::auth::modules_for_role;
use crate::error::{GatewayError, GatewayResult};
use crate::models::Identity;
use crate::proxy::path_resolver::resolve_target_url;
use crate::proxy::relay::relay;
use crate::proxy::server::AppState;

const API_PREFIX: &str = "/api/";

/// GET /api/modules
pub async fn handle_modules(Extension(identity): Extension<Identity>) -> Json<Value> {
    Json(json!({
        "role": identity.role,
        "modules": modules_for_role(identity.role),
        "user": identity,
    }))
}

/// ANY /api/{service}/{rest}
pub async fn handle_forward(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<Response> {
    let (service, remainder) = split_service_path(uri.path())
        .ok_or_else(|| GatewayError::ServiceNotConfigured(String::new()))?;

    let base = state
        .registry
        .lookup(&service)
        .ok_or_else(|| GatewayError::ServiceNotConfigured(service.clone()))?;

    let mut target = resolve_target_url(&service, base, remainder);
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }

    let payload = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice::<Value>(&body)
                .map_err(|e| GatewayError::InvalidRequestBody(e.to_string()))?,
        )
    };

    tracing::info!(
        "Forwarding {} {} -> {} (user {})",
        method,
        uri.path(),
        target,
        identity.id
    );

    let forwarded = state
        .upstream
        .forward(
            &target,
            method,
            &headers,
            payload,
            state.upstream.default_deadline(),
        )
        .await?;

    Ok(relay(forwarded))
}

/// Split `/api/{service}/{rest}` into the lowercased service name and the raw
/// remainder, keeping the remainder's percent-encoding intact.
fn split_service_path(path: &str) -> Option<(String, &str)> {
    let rest = path.strip_prefix(API_PREFIX)?;
    let (service, remainder) = rest.split_once('/').unwrap_or((rest, ""));
    if service.is_empty() {
        return None;
    }
    Some((service.to_lowercase(), remainder))
}

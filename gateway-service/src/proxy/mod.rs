//! Generic proxy scaffold for backend REST resources.
//!
//! Every resource route forwards to exactly one backend endpoint: the inbound
//! sub-path and query string are appended to a fixed backend path, the tenant
//! identifier is injected (query filter for list reads, body field for
//! writes), and the backend's status and body are relayed verbatim.

use crate::services::backend::BackendRequest;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;

/// Query parameter the backend uses to filter list endpoints by tenant.
pub const TENANT_FILTER_PARAM: &str = "tenantId.equals";

/// Upper bound for buffered JSON bodies on proxied writes. File uploads go
/// through the streaming handler instead and are not subject to this.
const MAX_JSON_BODY_BYTES: usize = 2 * 1024 * 1024;

const ALL_METHODS: &[Method] = &[
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// One proxied backend resource.
#[derive(Debug)]
pub struct ProxyResource {
    /// Route segment under `/api/proxy/`.
    pub name: &'static str,
    /// Fixed backend path the resource maps to.
    pub backend_path: &'static str,
    pub allowed: &'static [Method],
    /// Whether list-style GETs are scoped to the configured tenant.
    pub list_tenant_filter: bool,
}

/// Backend resources exposed through the proxy, one route pair each.
pub static RESOURCES: &[ProxyResource] = &[
    ProxyResource {
        name: "event-sponsors",
        backend_path: "/api/event-sponsors",
        allowed: ALL_METHODS,
        list_tenant_filter: true,
    },
    ProxyResource {
        name: "event-poll-options",
        backend_path: "/api/event-poll-options",
        allowed: ALL_METHODS,
        list_tenant_filter: true,
    },
    ProxyResource {
        name: "event-contacts",
        backend_path: "/api/event-contacts",
        allowed: ALL_METHODS,
        list_tenant_filter: true,
    },
    ProxyResource {
        name: "event-emails",
        backend_path: "/api/event-emails",
        allowed: &[Method::GET, Method::POST],
        list_tenant_filter: true,
    },
    ProxyResource {
        name: "event-type-details",
        backend_path: "/api/event-type-details",
        allowed: ALL_METHODS,
        list_tenant_filter: true,
    },
    ProxyResource {
        name: "tenant-organizations",
        backend_path: "/api/tenant-organizations",
        allowed: ALL_METHODS,
        list_tenant_filter: true,
    },
    ProxyResource {
        name: "tenant-settings",
        backend_path: "/api/tenant-settings",
        allowed: ALL_METHODS,
        list_tenant_filter: true,
    },
    ProxyResource {
        name: "user-profiles",
        backend_path: "/api/user-profiles",
        allowed: ALL_METHODS,
        list_tenant_filter: true,
    },
];

/// Fixed payload for requests arriving before the backend URL is configured.
pub fn unconfigured_backend_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "API base URL not configured" })),
    )
        .into_response()
}

fn method_not_allowed(resource: &ProxyResource, method: &Method) -> Response {
    let allow = resource
        .allowed
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut response = (
        StatusCode::METHOD_NOT_ALLOWED,
        format!("Method {} Not Allowed", method),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

/// Handler for all verbs on a proxied resource. The resource descriptor is
/// attached per-route via `Extension` in `startup::build_router`.
pub async fn proxy_resource(
    Extension(resource): Extension<&'static ProxyResource>,
    State(state): State<AppState>,
    req: Request,
) -> Response {
    let Some(base_url) = state.settings.backend.base_url().map(str::to_string) else {
        return unconfigured_backend_response();
    };

    let (parts, body) = req.into_parts();
    let method = parts.method.clone();

    if !resource.allowed.contains(&method) {
        return method_not_allowed(resource, &method);
    }

    let prefix = format!("/api/proxy/{}", resource.name);
    let sub_path = parts
        .uri
        .path()
        .strip_prefix(prefix.as_str())
        .unwrap_or("")
        .trim_end_matches('/')
        .to_string();
    let is_list = sub_path.is_empty();

    let query = match build_query(
        parts.uri.query(),
        resource,
        &method,
        is_list,
        &state.settings.backend.tenant_id,
    ) {
        Ok(query) => query,
        Err(err) => return err.into_response(),
    };

    let mut url = format!("{}{}{}", base_url, resource.backend_path, sub_path);
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }

    tracing::debug!(resource = resource.name, %method, %url, "Forwarding to backend");

    let outbound = if method == Method::GET || method == Method::DELETE {
        BackendRequest::new(method.clone(), url)
    } else if method == Method::POST || method == Method::PUT || method == Method::PATCH {
        let bytes = match axum::body::to_bytes(body, MAX_JSON_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return AppError::BadRequest(anyhow::anyhow!("Failed to read request body: {}", e))
                    .into_response()
            }
        };
        let payload = match with_tenant_id(&bytes, &state.settings.backend.tenant_id) {
            Ok(payload) => payload,
            Err(err) => return err.into_response(),
        };
        let content_type = if method == Method::PATCH {
            "application/merge-patch+json"
        } else {
            "application/json"
        };
        BackendRequest::new(method.clone(), url).with_json_body(content_type, payload)
    } else {
        return method_not_allowed(resource, &method);
    };

    match state.backend.send_with_retry(&outbound).await {
        Ok(response) => relay_response(&method, response).await,
        Err(e) => {
            tracing::error!(resource = resource.name, error = %e, "Proxy request failed");
            AppError::InternalError(e).into_response()
        }
    }
}

/// Rebuild the outbound query string, appending the tenant filter for
/// list-style GETs unless the caller already supplied one.
fn build_query(
    raw: Option<&str>,
    resource: &ProxyResource,
    method: &Method,
    is_list: bool,
    tenant_id: &str,
) -> Result<String, AppError> {
    let mut pairs: Vec<(String, String)> = match raw {
        Some(raw) if !raw.is_empty() => serde_urlencoded::from_str(raw)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid query string: {}", e)))?,
        _ => Vec::new(),
    };

    let wants_tenant_filter = resource.list_tenant_filter && is_list && *method == Method::GET;
    if wants_tenant_filter && !pairs.iter().any(|(k, _)| k == TENANT_FILTER_PARAM) {
        pairs.push((TENANT_FILTER_PARAM.to_string(), tenant_id.to_string()));
    }

    serde_urlencoded::to_string(&pairs)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode query: {}", e)))
}

/// Inject the configured tenant into a JSON object body. An empty body becomes
/// `{"tenantId": ...}`; non-object JSON (arrays for bulk calls) passes through
/// untouched.
fn with_tenant_id(bytes: &Bytes, tenant_id: &str) -> Result<Vec<u8>, AppError> {
    let mut value: Value = if bytes.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(bytes)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Request body is not valid JSON: {}", e)))?
    };

    if let Value::Object(map) = &mut value {
        map.insert("tenantId".to_string(), Value::String(tenant_id.to_string()));
    }

    serde_json::to_vec(&value)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode body: {}", e)))
}

/// Relay the backend's status and body verbatim; GETs additionally carry the
/// backend's pagination total through to the caller.
pub async fn relay_response(method: &Method, response: reqwest::Response) -> Response {
    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
        if let Ok(value) = HeaderValue::from_bytes(content_type.as_bytes()) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    if *method == Method::GET {
        if let Some(total) = response.headers().get("x-total-count") {
            if let Ok(value) = HeaderValue::from_bytes(total.as_bytes()) {
                headers.insert("x-total-count", value);
            }
        }
    }

    match response.bytes().await {
        Ok(bytes) => (status, headers, bytes).into_response(),
        Err(e) => {
            tracing::error!("Failed to read backend response body: {}", e);
            AppError::InternalError(anyhow::anyhow!("Failed to read backend response: {}", e))
                .into_response()
        }
    }
}

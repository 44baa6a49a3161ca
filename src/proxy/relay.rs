// Relay a normalized backend response to the client

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::Response,
};

use crate::proxy::upstream::{ForwardedBody, ForwardedResponse};

/// Connection-layer headers the gateway recomputes itself
const HOP_BY_HOP_HEADERS: [header::HeaderName; 3] = [
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
    header::CONNECTION,
];

pub fn relay(forwarded: ForwardedResponse) -> Response {
    let ForwardedResponse {
        status,
        headers,
        body,
    } = forwarded;

    let (payload, is_json) = match body {
        ForwardedBody::Json(value) => (
            Body::from(serde_json::to_vec(&value).unwrap_or_default()),
            true,
        ),
        ForwardedBody::Text(bytes) => (Body::from(bytes), false),
    };

    let mut response = Response::new(payload);
    *response.status_mut() = status;

    let out = response.headers_mut();
    for (name, value) in headers.iter() {
        if HOP_BY_HOP_HEADERS.contains(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    if is_json {
        out.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    response
}

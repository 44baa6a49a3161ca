// Bearer token authentication middleware
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::GatewayError;
use crate::proxy::server::AppState;

/// Validate the bearer token and attach the caller's `Identity` to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    tracing::info!("Request: {} {}", request.method(), request.uri());

    let token = credential(request.headers())?;
    let identity = state.token_service.verify_access(token)?;

    tracing::debug!("Authenticated user {} ({})", identity.id, identity.role);
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Missing or blank header is `MissingCredential`; anything present but
/// unusable is `InvalidCredential`.
fn credential(headers: &HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(GatewayError::MissingCredential)?;
    let raw = value
        .to_str()
        .map_err(|_| GatewayError::InvalidCredential)?
        .trim();
    if raw.is_empty() {
        return Err(GatewayError::MissingCredential);
    }
    bearer_token(raw).ok_or(GatewayError::InvalidCredential)
}

/// Token part of `Bearer <token>`; the scheme is case-insensitive
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc"), Some("abc"));
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_credential_missing_vs_invalid() {
        use axum::http::HeaderValue;

        let mut headers = HeaderMap::new();
        assert!(matches!(
            credential(&headers),
            Err(GatewayError::MissingCredential)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("   "));
        assert!(matches!(
            credential(&headers),
            Err(GatewayError::MissingCredential)
        ));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer caf\xe9").unwrap(),
        );
        assert!(matches!(
            credential(&headers),
            Err(GatewayError::InvalidCredential)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t0k"));
        assert_eq!(credential(&headers).unwrap(), "t0k");
    }
}

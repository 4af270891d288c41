use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;

/// Authenticated identity supplied by the upstream session/auth layer.
/// The core trusts this boundary and never re-derives it.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub tenant_id: String,
    pub user_id: String,
}

pub async fn api_auth(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let tenant_id = header_value(&request, "X-Tenant-Id");
    let user_id = header_value(&request, "X-User-Id");

    let (Some(tenant_id), Some(user_id)) = (tenant_id, user_id) else {
        return Err(ApiError::Unauthorized(
            "You have to be authenticated".to_string(),
        ));
    };

    request
        .extensions_mut()
        .insert(AuthContext { tenant_id, user_id });

    Ok(next.run(request).await)
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::jwt::{JwtKeys, SESSION_COOKIE};
use crate::auth::repo_types::{Role, User};
use crate::state::AppState;

/// Authenticated caller, resolved from a verified session token against the
/// store. This is the request-scoped identity handed to protected handlers.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Token source precedence: Authorization bearer header, else the session
/// cookie.
fn token_from_parts(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")));
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthIdentity {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or(AuthError::MissingToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token)?;

        // The token proves possession; the store decides whether the subject
        // still exists. Role comes from the store, not the claims.
        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token subject no longer exists");
                AuthError::UserNotFound
            })?;

        Ok(AuthIdentity {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}

pub(crate) fn role_permitted(allowed: &[Role], role: Role) -> bool {
    allowed.contains(&role)
}

/// Re-fetch the caller's current role from the store and check it against
/// the allowed set. Returns the identity with its role refreshed to the
/// authoritative value, so a role gone stale since token issuance cannot
/// keep old privileges.
pub async fn role_gate(
    state: &AppState,
    identity: AuthIdentity,
    allowed: &[Role],
) -> Result<AuthIdentity, AuthError> {
    let role = User::role_of(&state.db, identity.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    if !role_permitted(allowed, role) {
        warn!(user_id = %identity.id, role = %role, "role not permitted");
        return Err(AuthError::Forbidden);
    }
    Ok(AuthIdentity { role, ..identity })
}

/// Route layer for admin-only routes: auth gate, then role gate over
/// {ADMIN}, then the refreshed identity goes into request extensions for
/// the handler.
pub async fn admin_gate(
    State(state): State<AppState>,
    identity: AuthIdentity,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = role_gate(&state, identity, &[Role::Admin]).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(axum::http::HeaderName, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn bearer_header_takes_precedence_over_cookie() {
        let parts = parts_with_headers(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "token=from-cookie"),
        ]);
        assert_eq!(token_from_parts(&parts).as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_is_the_fallback_source() {
        let parts = parts_with_headers(&[(header::COOKIE, "other=x; token=from-cookie")]);
        assert_eq!(token_from_parts(&parts).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn no_token_source_yields_none() {
        let parts = parts_with_headers(&[(header::COOKIE, "unrelated=x")]);
        assert_eq!(token_from_parts(&parts), None);
        let parts = parts_with_headers(&[]);
        assert_eq!(token_from_parts(&parts), None);
    }

    #[test]
    fn non_bearer_authorization_falls_through_to_cookie() {
        let parts = parts_with_headers(&[
            (header::AUTHORIZATION, "Basic dXNlcjpwYXNz"),
            (header::COOKIE, "token=from-cookie"),
        ]);
        assert_eq!(token_from_parts(&parts).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn allowed_set_membership_decides() {
        assert!(!role_permitted(&[Role::Doctor], Role::Patient));
        assert!(role_permitted(&[Role::Doctor], Role::Doctor));
        assert!(role_permitted(&[Role::Doctor, Role::Admin], Role::Admin));
        assert!(!role_permitted(&[], Role::Admin));
    }
}

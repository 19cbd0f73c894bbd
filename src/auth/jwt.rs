use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::error::AuthError;
use crate::auth::repo_types::Role;
use crate::state::AppState;

/// Cookie carrying the session token. The same name is used on the write
/// side (login/register) and the read side (auth gate).
pub const SESSION_COOKIE: &str = "token";

/// Fixed session validity window.
const SESSION_TTL_DAYS: i64 = 7;

/// Holds JWT signing and verification keys plus cookie policy.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub secure_cookies: bool,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let secret = state.config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            secure_cookies: state.config.is_production(),
        }
    }
}

impl JwtKeys {
    /// Issue a session token bound to the user's identity, valid for 7 days.
    pub fn sign(&self, user_id: Uuid, email: &str, role: Role) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + Duration::days(SESSION_TTL_DAYS);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))?;
        debug!(user_id = %user_id, role = %role, "session token signed");
        Ok(token)
    }

    /// Verify signature and expiry. Validation is pinned to HS256, so a
    /// token re-signed under another algorithm is rejected outright. Every
    /// failure collapses to `InvalidToken`; the client learns nothing about
    /// whether the token was expired or tampered with.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "session token rejected");
            AuthError::InvalidToken
        })?;
        Ok(data.claims)
    }

    /// Build the session cookie carrying a freshly signed token.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure_cookies)
            .path("/")
            .max_age(Duration::days(SESSION_TTL_DAYS))
            .build()
    }

    /// Expired cookie that overwrites the session cookie on the client.
    pub fn clear_session_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure_cookies)
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_roundtrip() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id, "a@x.com", Role::Patient).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::Patient);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_DAYS * 24 * 60 * 60);
    }

    #[tokio::test]
    async fn verify_rejects_tampered_token() {
        let keys = make_keys();
        let token = keys.sign(Uuid::new_v4(), "a@x.com", Role::Patient).expect("sign");
        let mut tampered = token.clone();
        tampered.pop();
        let err = keys.verify(&tampered).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_secret() {
        let keys = make_keys();
        let other = JwtKeys {
            encoding: EncodingKey::from_secret(b"another-secret"),
            decoding: DecodingKey::from_secret(b"another-secret"),
            secure_cookies: false,
        };
        let token = other.sign(Uuid::new_v4(), "a@x.com", Role::Doctor).expect("sign");
        assert!(matches!(keys.verify(&token).unwrap_err(), AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@x.com".into(),
            role: Role::Patient,
            iat: now - 1000,
            exp: now - 500, // past the 60s default leeway
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).unwrap();
        assert!(matches!(keys.verify(&token).unwrap_err(), AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn verify_rejects_other_algorithms() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@x.com".into(),
            role: Role::Admin,
            iat: now,
            exp: now + 3600,
        };
        // Same secret, different HMAC algorithm: must not verify.
        let token = encode(&Header::new(Algorithm::HS384), &claims, &keys.encoding).unwrap();
        assert!(matches!(keys.verify(&token).unwrap_err(), AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn session_cookie_attributes() {
        let keys = make_keys();
        let cookie = keys.session_cookie("tok".into());
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn production_cookies_are_secure() {
        let keys = JwtKeys {
            encoding: EncodingKey::from_secret(b"s"),
            decoding: DecodingKey::from_secret(b"s"),
            secure_cookies: true,
        };
        assert_eq!(keys.session_cookie("tok".into()).secure(), Some(true));
        assert_eq!(keys.clear_session_cookie().secure(), Some(true));
    }

    #[tokio::test]
    async fn clear_cookie_expires_immediately() {
        let keys = make_keys();
        let cookie = keys.clear_session_cookie();
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}

use anyhow::Context;

/// Runtime mode; controls the `secure` attribute on the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub client_origin: String,
    pub env: RuntimeEnv,
    pub jwt_secret: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        // No fallback secret, in any environment: anyone knowing the default
        // could mint valid session tokens.
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let client_origin =
            std::env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let env = match std::env::var("APP_ENV").as_deref() {
            Ok("production") => RuntimeEnv::Production,
            _ => RuntimeEnv::Development,
        };
        Ok(Self {
            database_url,
            client_origin,
            env,
            jwt_secret,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env == RuntimeEnv::Production
    }
}

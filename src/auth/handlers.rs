use axum::{
    extract::{Extension, FromRef, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, PublicUser, RegisterRequest,
            RegisterResponse, UsersResponse, UserWithProfile,
        },
        error::AuthError,
        extractors::{admin_gate, AuthIdentity},
        jwt::JwtKeys,
        password,
        repo_types::{Profile, User},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(state, admin_gate))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<RegisterResponse>), AuthError> {
    let account = payload.into_new_account()?;

    if User::find_by_email(&state.db, &account.email).await?.is_some() {
        warn!(email = %account.email, "registration with existing email");
        return Err(AuthError::UserExists);
    }

    let hash = password::hash_password(&account.password)?;

    let (user, profile) =
        User::create_with_profile(&state.db, &account.email, &hash, &account.profile).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email, user.role)?;
    let jar = jar.add(keys.session_cookie(token.clone()));

    info!(user_id = %user.id, role = %user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        jar,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user: PublicUser::from(&user),
            profile,
            token,
        }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    let email = payload
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let password = payload.password.filter(|p| !p.is_empty());
    let (email, password) = match (email, password) {
        (Some(e), Some(p)) => (e, p),
        _ => {
            return Err(AuthError::Validation(
                "Email and password are required".into(),
            ))
        }
    };

    // Unknown email and wrong password must be indistinguishable to the
    // client; the distinction lives only in the server log.
    let user = match User::find_by_email(&state.db, &email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login with unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !password::verify_password(&password, &user.password_hash) {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    // Best effort; the login stays valid even if the bump fails.
    if let Err(e) = User::update_last_login(&state.db, user.id).await {
        warn!(user_id = %user.id, error = %e, "failed to update last login");
    }

    let profile = Profile::find_for_user(&state.db, user.role, user.id).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email, user.role)?;
    let jar = jar.add(keys.session_cookie(token));

    info!(user_id = %user.id, "user logged in");
    Ok((
        jar,
        Json(LoginResponse {
            message: "Login successful".into(),
            user: UserWithProfile {
                id: user.id,
                email: user.email,
                role: user.role,
                profile,
            },
        }),
    ))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let keys = JwtKeys::from_ref(&state);
    (
        jar.add(keys.clear_session_cookie()),
        Json(MessageResponse {
            message: "Logged out successfully".into(),
        }),
    )
}

#[instrument(skip(state, identity))]
pub async fn me(
    State(state): State<AppState>,
    identity: AuthIdentity,
) -> Result<Json<UserWithProfile>, AuthError> {
    let profile = Profile::find_for_user(&state.db, identity.role, identity.id).await?;
    Ok(Json(UserWithProfile {
        id: identity.id,
        email: identity.email,
        role: identity.role,
        profile,
    }))
}

#[instrument(skip(state, identity))]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<UsersResponse>, AuthError> {
    let users = User::list(&state.db).await?;
    info!(admin_id = %identity.id, count = users.len(), "listed users");
    Ok(Json(UsersResponse {
        users: users.iter().map(PublicUser::from).collect(),
    }))
}

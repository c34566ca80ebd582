use anyhow::anyhow;
use argon2::{
    Algorithm, Argon2, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::{
    Form,
    cookie::{Cookie, CookieJar, SameSite},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use itsm_db::{format_timestamp, is_constraint_violation};
use itsm_types::api::{Claims, LoginRequest, RegisterRequest};
use itsm_types::models::{Role, RoleFlags, User};
use itsm_types::session::SessionContext;

use crate::convert;
use crate::error::{ApiResult, ItsmError};
use crate::middleware::{SESSION_COOKIE, extract_token};
use crate::state::{AppState, AppStateInner, blocking};

const MAX_USERNAME_LEN: usize = 64;
const MAX_PASSWORD_LEN: usize = 256;

/// What a successful login hands back: the caller's context plus the signed
/// token that identifies the server-side session.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub session: SessionContext,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// -- Credential store --

pub fn register_user(state: &AppStateInner, username: &str, password: &str) -> ApiResult<Uuid> {
    let username = validate_username(username)?;
    if password.is_empty() {
        return Err(ItsmError::validation("password is required"));
    }
    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err(ItsmError::validation("password is too long"));
    }

    if state.db.get_user_by_username(username)?.is_some() {
        return Err(ItsmError::DuplicateUsername);
    }

    let password_hash = hash_password(&state.auth.password_params, password)?;
    let user_id = Uuid::new_v4();

    state
        .db
        .create_user(
            &user_id.to_string(),
            username,
            &password_hash,
            &format_timestamp(Utc::now()),
        )
        .map_err(|e| {
            // Lost a race against a concurrent registration.
            if is_constraint_violation(&e) {
                ItsmError::DuplicateUsername
            } else {
                ItsmError::Internal(e)
            }
        })?;

    info!("Registered user {} ({})", username, user_id);
    Ok(user_id)
}

/// Unknown username and wrong password are indistinguishable to the caller.
pub fn authenticate(state: &AppStateInner, username: &str, password: &str) -> ApiResult<SessionIdentity> {
    let Some(user) = state.db.get_user_by_username(username.trim())? else {
        let dummy = PasswordHash::new(dummy_hash(state)?)
            .map_err(|e| anyhow!("dummy hash is unreadable: {}", e))?;
        let _ = Argon2::default().verify_password(password.as_bytes(), &dummy);
        warn!("Rejected login for unknown user");
        return Err(ItsmError::InvalidCredentials);
    };

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow!("stored hash for user {} is unreadable: {}", user.id, e))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!("Rejected login for {}", user.username);
        return Err(ItsmError::InvalidCredentials);
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow!("corrupt user id '{}': {}", user.id, e))?;
    let role = Role::from_flags(convert::role_flags(&user));

    let session_id = Uuid::new_v4();
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(state.auth.session_ttl)
        .ok_or_else(|| anyhow!("session ttl {} is out of range", state.auth.session_ttl))?;

    state.db.create_session(
        &session_id.to_string(),
        &user.id,
        role.as_str(),
        &format_timestamp(now),
        &format_timestamp(expires_at),
    )?;

    let token = create_token(&state.auth.jwt_secret, user_id, session_id, &user.username, expires_at)?;

    info!("User {} logged in as {}", user.username, role);
    Ok(SessionIdentity {
        session: SessionContext {
            session_id,
            user_id,
            username: user.username,
            role,
        },
        token,
        expires_at,
    })
}

/// Verify a token and load the live session it points at.
pub fn resolve_session(state: &AppStateInner, token: &str) -> ApiResult<SessionContext> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ItsmError::Unauthorized)?
    .claims;

    let session = state
        .db
        .get_session(&claims.sid.to_string())?
        .ok_or(ItsmError::Unauthorized)?;

    if session.user_id != claims.sub.to_string() {
        warn!("Session {} presented with a token for another user", session.id);
        return Err(ItsmError::Unauthorized);
    }

    let expires_at = convert::timestamp(&session.expires_at, "session expires_at");
    if expires_at <= Utc::now() {
        state.db.delete_session(&session.id)?;
        return Err(ItsmError::Unauthorized);
    }

    let role: Role = session.role.parse().map_err(|e| {
        warn!("Corrupt role on session {}: {}", session.id, e);
        ItsmError::Unauthorized
    })?;

    Ok(SessionContext {
        session_id: claims.sid,
        user_id: claims.sub,
        username: session.username,
        role,
    })
}

pub fn end_session(state: &AppStateInner, session: &SessionContext) -> ApiResult<()> {
    state.db.delete_session(&session.session_id.to_string())?;
    info!("User {} logged out", session.username);
    Ok(())
}

/// Admin tooling: overwrite a user's role flags. Live sessions keep the
/// role they were opened with.
pub fn set_user_roles(state: &AppStateInner, user_id: Uuid, flags: RoleFlags) -> ApiResult<()> {
    let found = state.db.set_user_roles(
        &user_id.to_string(),
        flags.is_admin,
        flags.is_tech_officer,
        flags.is_default_officer,
    )?;
    if !found {
        return Err(ItsmError::NotFound("user"));
    }
    Ok(())
}

/// Create the bootstrap admin, or promote the existing user of that name.
pub fn ensure_admin(state: &AppStateInner, username: &str, password: &str) -> ApiResult<Uuid> {
    let user_id = match state.db.get_user_by_username(username.trim())? {
        Some(existing) => convert::id(&existing.id, "user id"),
        None => register_user(state, username, password)?,
    };
    set_user_roles(state, user_id, RoleFlags::ADMIN)?;
    info!("Bootstrap admin {} is ready", username.trim());
    Ok(user_id)
}

pub fn list_tech_officers(state: &AppStateInner) -> ApiResult<Vec<User>> {
    let rows = state.db.list_tech_officers()?;
    Ok(rows.iter().map(convert::user).collect())
}

/// Build the unknown-user hash ahead of the first login attempt.
pub fn prime_login(state: &AppStateInner) -> ApiResult<()> {
    dummy_hash(state).map(|_| ())
}

/// Built on first use with the configured cost, then reused.
fn dummy_hash(state: &AppStateInner) -> ApiResult<&str> {
    if let Some(hash) = state.auth.dummy_hash.get() {
        return Ok(hash);
    }
    let hash = hash_password(&state.auth.password_params, "unknown-user-placeholder")?;
    Ok(state.auth.dummy_hash.get_or_init(|| hash))
}

pub fn hash_password(params: &argon2::Params, password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

fn validate_username(username: &str) -> ApiResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ItsmError::validation("username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ItsmError::validation("username is too long"));
    }
    if username.chars().any(char::is_control) {
        return Err(ItsmError::validation("username contains invalid characters"));
    }
    Ok(username)
}

fn create_token(
    secret: &str,
    user_id: Uuid,
    session_id: Uuid,
    username: &str,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        sid: session_id,
        username: username.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn session_cookie(state: &AppStateInner, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.auth.cookie_secure)
        .build()
}

// -- Handlers --

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Form(req): Form<RegisterRequest>,
) -> ApiResult<Redirect> {
    blocking(&state, move |st| register_user(st, &req.username, &req.password)).await?;
    Ok(Redirect::to("/"))
}

/// POST / and POST /auth
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(req): Form<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let identity = blocking(&state, move |st| authenticate(st, &req.username, &req.password)).await?;
    let jar = jar.add(session_cookie(&state, identity.token));
    Ok((jar, Redirect::to("/dashboard")))
}

/// GET|POST /logout. Works without a live session too; the cookie is
/// cleared either way.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = extract_token(&jar, &headers) {
        blocking(&state, move |st| match resolve_session(st, &token) {
            Ok(session) => end_session(st, &session),
            Err(ItsmError::Unauthorized) => Ok(()),
            Err(e) => Err(e),
        })
        .await?;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_trimmed_and_checked() {
        assert_eq!(validate_username("  alice ").unwrap(), "alice");
        assert!(validate_username("   ").is_err());
        assert!(validate_username("bad\u{7}name").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
    }

    #[test]
    fn unknown_user_login_verifies_a_hash() {
        let mut auth = crate::AuthSettings::new("unit-secret");
        auth.password_params = argon2::Params::new(8, 1, 1, None).unwrap();
        let state = crate::AppStateInner::new(itsm_db::Database::open_in_memory().unwrap(), auth);
        assert!(state.auth.dummy_hash.get().is_none());

        let err = authenticate(&state, "ghost", "nope").unwrap_err();
        assert!(matches!(err, ItsmError::InvalidCredentials));

        let dummy = state.auth.dummy_hash.get().expect("dummy hash built on the miss path");
        assert!(dummy.starts_with("$argon2id$v=19$m=8,t=1,p=1$"));

        // Reused, not rebuilt.
        authenticate(&state, "ghost", "again").unwrap_err();
        assert_eq!(state.auth.dummy_hash.get(), Some(dummy));
    }

    #[test]
    fn password_limit_counts_characters() {
        let mut auth = crate::AuthSettings::new("unit-secret");
        auth.password_params = argon2::Params::new(8, 1, 1, None).unwrap();
        let state = crate::AppStateInner::new(itsm_db::Database::open_in_memory().unwrap(), auth);

        // 256 two-byte characters: 512 bytes, within the limit.
        assert!(register_user(&state, "zoe", &"é".repeat(256)).is_ok());
        assert!(matches!(
            register_user(&state, "yan", &"é".repeat(257)).unwrap_err(),
            ItsmError::Validation(_)
        ));
    }

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let params = argon2::Params::new(8, 1, 1, None).unwrap();
        let a = hash_password(&params, "pw1").unwrap();
        let b = hash_password(&params, "pw1").unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("pw1"));

        let parsed = PasswordHash::new(&a).unwrap();
        assert!(Argon2::default().verify_password(b"pw1", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"pw2", &parsed).is_err());
    }
}

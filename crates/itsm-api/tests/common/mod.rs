#![allow(dead_code)]

use itsm_api::auth::{authenticate, register_user, set_user_roles};
use itsm_api::{AppState, AppStateInner, AuthSettings};
use itsm_db::Database;
use itsm_types::models::RoleFlags;
use itsm_types::session::SessionContext;

pub const SECRET: &str = "integration-test-secret";

fn settings(secret: &str) -> AuthSettings {
    let mut auth = AuthSettings::new(secret);
    auth.password_params = argon2::Params::new(8, 1, 1, None).expect("argon2 params");
    auth
}

fn build(auth: AuthSettings) -> AppState {
    let db = Database::open_in_memory().expect("in-memory db");
    AppStateInner::new(db, auth)
}

/// Fresh in-memory state with cheap password hashing.
pub fn state() -> AppState {
    build(settings(SECRET))
}

pub fn state_with_secret(secret: &str) -> AppState {
    build(settings(secret))
}

pub fn state_with_ttl(ttl: chrono::Duration) -> AppState {
    let mut auth = settings(SECRET);
    auth.session_ttl = ttl;
    build(auth)
}

/// Register `username` (password `pw-<username>`), apply `roles`, and log in.
pub fn login_as(state: &AppState, username: &str, roles: RoleFlags) -> SessionContext {
    let password = format!("pw-{username}");
    let id = register_user(state, username, &password).expect("register");
    set_user_roles(state, id, roles).expect("set roles");
    authenticate(state, username, &password)
        .expect("authenticate")
        .session
}

pub fn client(state: &AppState, username: &str) -> SessionContext {
    login_as(state, username, RoleFlags::CLIENT)
}

pub fn admin(state: &AppState, username: &str) -> SessionContext {
    login_as(state, username, RoleFlags::ADMIN)
}

pub fn tech(state: &AppState, username: &str) -> SessionContext {
    login_as(state, username, RoleFlags::TECH_OFFICER)
}

pub fn officer(state: &AppState, username: &str) -> SessionContext {
    login_as(state, username, RoleFlags::DEFAULT_OFFICER)
}

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// One year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
];

/// Bootstrap administrator created (or promoted) at startup.
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Second listener serving the same routes.
    pub client_port: Option<u16>,
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    pub cookie_secure: bool,
    pub admin: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("ITSM_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ITSM_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port = parse_var("ITSM_PORT")?.unwrap_or(8080);
        let client_port = parse_var("ITSM_CLIENT_PORT")?;
        if client_port == Some(port) {
            bail!("ITSM_CLIENT_PORT must differ from ITSM_PORT");
        }

        let session_ttl = session_ttl(parse_var("ITSM_SESSION_TTL_HOURS")?.unwrap_or(24))?;

        let admin = match (env::var("ITSM_ADMIN_USERNAME"), env::var("ITSM_ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.trim().is_empty() && !password.is_empty() => {
                Some(AdminSeed { username, password })
            }
            (Ok(_), _) | (_, Ok(_)) => {
                bail!("ITSM_ADMIN_USERNAME and ITSM_ADMIN_PASSWORD must be set together")
            }
            _ => None,
        };

        Ok(Self {
            db_path: PathBuf::from(env::var("ITSM_DB_PATH").unwrap_or_else(|_| "itsm.db".into())),
            host: env::var("ITSM_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            client_port,
            jwt_secret,
            session_ttl,
            cookie_secure: parse_var("ITSM_COOKIE_SECURE")?.unwrap_or(false),
            admin,
        })
    }
}

fn session_ttl(hours: i64) -> Result<chrono::Duration> {
    if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        bail!("ITSM_SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}, got {hours}");
    }
    chrono::Duration::try_hours(hours).context("ITSM_SESSION_TTL_HOURS is out of range")
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {name}: '{raw}'")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ttl_bounds() {
        assert_eq!(session_ttl(24).unwrap(), chrono::Duration::hours(24));
        assert_eq!(
            session_ttl(MAX_SESSION_TTL_HOURS).unwrap(),
            chrono::Duration::hours(MAX_SESSION_TTL_HOURS)
        );
        assert!(session_ttl(0).is_err());
        assert!(session_ttl(-1).is_err());
        assert!(session_ttl(MAX_SESSION_TTL_HOURS + 1).is_err());
        assert!(session_ttl(i64::MAX).is_err());
    }
}

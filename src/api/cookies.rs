//! Transport adapter: the session pair travels as two protocol-level
//! cookies. Names and flags are part of the external contract.

use crate::config::AuthConfig;
use crate::domain::session::AuthSession;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn session_cookie(name: &'static str, value: String, max_age: time::Duration, config: &AuthConfig) -> Cookie<'static> {
    let builder = Cookie::build((name, value)).path("/").http_only(true).max_age(max_age);

    // Behind TLS the dashboard runs on another origin, so cross-site cookies
    // need Secure + SameSite=None; plain Lax is enough for local development.
    let builder = if config.cookie_secure {
        builder.secure(true).same_site(SameSite::None)
    } else {
        builder.same_site(SameSite::Lax)
    };

    builder.build()
}

/// Sets both session cookies on the outbound response.
#[must_use]
pub fn write_session(jar: CookieJar, session: &AuthSession, config: &AuthConfig) -> CookieJar {
    let access_ttl = time::Duration::seconds(config.access_token_ttl_secs.min(i64::MAX as u64) as i64);
    let refresh_ttl = time::Duration::days(config.refresh_token_ttl_days);

    jar.add(session_cookie(ACCESS_COOKIE, session.token.clone(), access_ttl, config))
        .add(session_cookie(REFRESH_COOKIE, session.refresh_token.clone(), refresh_ttl, config))
}

/// Clears both session cookies regardless of server-side revocation outcome.
#[must_use]
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((ACCESS_COOKIE, "")).path("/"))
        .remove(Cookie::build((REFRESH_COOKIE, "")).path("/"))
}

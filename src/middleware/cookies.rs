use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use time::Duration;

use super::config::{CookieSettings, SESSION_COOKIE_NAME};

/// Create session cookie.
pub(super) fn session_cookie(settings: &CookieSettings, session_id: &str) -> Cookie<'static> {
    build(settings, session_id, settings.max_age)
}

/// Create the expired form of the session cookie, telling the browser to drop it.
pub(super) fn expired_session_cookie(settings: &CookieSettings, session_id: &str) -> Cookie<'static> {
    build(settings, session_id, Duration::seconds(-1))
}

/// Get the session id from cookies.
pub(super) fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn build(settings: &CookieSettings, session_id: &str, max_age: Duration) -> Cookie<'static> {
    let mut builder = Cookie::build((SESSION_COOKIE_NAME, session_id.to_string()))
        .path(settings.path.clone())
        .max_age(max_age)
        .http_only(settings.http_only)
        .secure(settings.secure);

    if let Some(domain) = &settings.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(same_site) = settings.same_site {
        builder = builder.same_site(same_site);
    }

    builder.build()
}

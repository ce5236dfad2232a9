use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of a session identifier.
pub const SESSION_ID_LEN: usize = 64;

/// Generates an opaque session identifier for the session cookie.
///
/// Returns a 64-character string over `[A-Za-z0-9]` drawn from the
/// thread-local CSPRNG.
#[must_use]
pub fn generate_session_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

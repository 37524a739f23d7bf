//! Authentication for the study planner backend
//!
//! Email/password login issues a JWT access/refresh pair; the pair is kept
//! in the token store and renewed transparently by the API client.

pub mod session;
pub mod tokens;

pub use session::{login, logout, register, status, whoami};
#[cfg(test)]
pub use tokens::MemoryTokenStore;
pub use tokens::{Session, TokenState, TokenStore};

/// Boundary the user is sent to when the session cannot be recovered.
pub const LOGIN_PATH: &str = "/login";

/// Navigation hook invoked after a session teardown.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, path: &str);
}

/// Terminal flavour of the login redirect: tell the user how to log in again.
pub struct TerminalRedirect;

impl LoginRedirect for TerminalRedirect {
    fn redirect_to_login(&self, path: &str) {
        tracing::debug!("Redirecting to {}", path);
        eprintln!("Not signed in. Run 'study-planner login' to sign in.");
    }
}

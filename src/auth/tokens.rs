//! Token storage and management

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Access/refresh token pair issued by `/auth/login`, `/auth/register` and
/// `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

/// Validity of a stored access token, judged from its JWT `exp` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Valid { expires_at: u64 },
    Expired { expired_at: u64 },
    /// Token present but not a JWT we can read; the server decides.
    Opaque,
    Absent,
}

impl TokenState {
    pub fn of(token: Option<&str>) -> Self {
        let Some(token) = token else {
            return TokenState::Absent;
        };
        match jwt_expiry(token) {
            Some(exp) if exp > unix_now() => TokenState::Valid { expires_at: exp },
            Some(exp) => TokenState::Expired { expired_at: exp },
            None => TokenState::Opaque,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Read the `exp` claim from a JWT without verifying its signature.
pub fn jwt_expiry(token: &str) -> Option<u64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_u64()
}

/// Session storage backend.
///
/// Mirrors the two fixed keys `access_token` / `refresh_token`. Reads and
/// writes are synchronous; `persist` flushes to durable storage.
pub trait TokenStore: Send {
    fn get_access_token(&self) -> Option<String>;
    fn get_refresh_token(&self) -> Option<String>;
    /// Replace both tokens wholesale.
    fn set_session(&mut self, session: &Session);
    fn clear_tokens(&mut self);

    fn persist(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: &Session) -> Self {
        Self {
            access_token: Some(session.access_token.clone()),
            refresh_token: Some(session.refresh_token.clone()),
        }
    }

    pub fn with_tokens(access_token: Option<&str>, refresh_token: Option<&str>) -> Self {
        Self {
            access_token: access_token.map(String::from),
            refresh_token: refresh_token.map(String::from),
        }
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn get_access_token(&self) -> Option<String> {
        self.access_token.clone()
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_session(&mut self, session: &Session) {
        self.access_token = Some(session.access_token.clone());
        self.refresh_token = Some(session.refresh_token.clone());
    }

    fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp: u64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"7","exp":{}}}"#, exp));
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_jwt_expiry_reads_exp_claim() {
        assert_eq!(jwt_expiry(&jwt_with_exp(1_700_000_000)), Some(1_700_000_000));
    }

    #[test]
    fn test_jwt_expiry_rejects_garbage() {
        assert_eq!(jwt_expiry("not-a-jwt"), None);
        assert_eq!(jwt_expiry("a.!!!.c"), None);
    }

    #[test]
    fn test_token_state() {
        assert_eq!(TokenState::of(None), TokenState::Absent);
        assert_eq!(TokenState::of(Some("opaque")), TokenState::Opaque);
        assert_eq!(
            TokenState::of(Some(&jwt_with_exp(10))),
            TokenState::Expired { expired_at: 10 }
        );
        let future = unix_now() + 3600;
        assert_eq!(
            TokenState::of(Some(&jwt_with_exp(future))),
            TokenState::Valid { expires_at: future }
        );
    }

    #[test]
    fn test_memory_store_replace_and_clear() {
        let mut store = MemoryTokenStore::with_tokens(Some("a1"), Some("r1"));
        store.set_session(&Session {
            access_token: "a2".into(),
            refresh_token: "r2".into(),
        });
        assert_eq!(store.get_access_token().as_deref(), Some("a2"));
        assert_eq!(store.get_refresh_token().as_deref(), Some("r2"));

        store.clear_tokens();
        assert!(store.get_access_token().is_none());
        assert!(store.get_refresh_token().is_none());
    }
}

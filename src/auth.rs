//! The auth gate.
//!
//! Users log in with HTTP basic auth on `/authenticate`, and get a `user` cookie in return. This cookie holds the
//! user name and an HMAC-SHA256 signature of it, keyed by the server secret. Every protected route checks this
//! signature. There is no expiry and no role: a valid cookie grants access to everything.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    extract::{Request, State},
    http::{header::{AUTHORIZATION, COOKIE}, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "user";


/// A user name and password, as sent in a `Authorization: Basic` header
#[derive(Clone, Debug, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<S: ToString, T: ToString>(username: S, password: T) -> Self {
        Self { username: username.to_string(), password: password.to_string() }
    }

    /// Extract basic auth credentials from request headers
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if scheme.eq_ignore_ascii_case("basic") == false {
            return None;
        }

        let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self::new(username, password))
    }

    /// The value of an `Authorization` header carrying these credentials
    pub fn to_header_value(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", self.username, self.password)))
    }
}


/// Signs and verifies session cookie values
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(key: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self { mac: HmacSha256::new_from_slice(key)? })
    }

    /// Returns `<payload>.<signature>`, both URL-safe base64
    pub fn sign(&self, username: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(username);
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", payload, signature)
    }

    /// Returns the user name carried by `value`, if its signature is valid
    pub fn verify(&self, value: &str) -> Option<String> {
        let (payload, signature) = value.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        String::from_utf8(URL_SAFE_NO_PAD.decode(payload).ok()?).ok()
    }
}

/// `Set-Cookie` value that opens a session for `username`
pub fn session_cookie(signer: &CookieSigner, username: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, signer.sign(username))
}

/// `Set-Cookie` value that clears the session cookie
pub fn cleared_session_cookie() -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", SESSION_COOKIE)
}

/// Returns the user whose valid session cookie is in these headers, if any
pub fn session_user(headers: &HeaderMap, signer: &CookieSigner) -> Option<String> {
    headers.get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE)
        .find_map(|(_, value)| signer.verify(value.trim()))
}


/// Known users, and a keyed digest of their passwords
pub struct UserRegistry {
    hasher: HmacSha256,
    users: RwLock<HashMap<String, Vec<u8>>>,
}

impl UserRegistry {
    pub fn new(key: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            hasher: HmacSha256::new_from_slice(key)?,
            users: RwLock::new(HashMap::new()),
        })
    }

    fn keyed_digest(&self, credentials: &Credentials) -> HmacSha256 {
        let mut mac = self.hasher.clone();
        mac.update(credentials.username.as_bytes());
        mac.update(&[0]);
        mac.update(credentials.password.as_bytes());
        mac
    }

    /// Whether these credentials belong to a known user
    pub fn authenticate(&self, credentials: &Credentials) -> bool {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        match users.get(&credentials.username) {
            None => false,
            Some(stored) => self.keyed_digest(credentials).verify_slice(stored).is_ok(),
        }
    }

    /// Create a user, or change the password of an existing one.
    ///
    /// Empty names or passwords are refused. Existing users can only be updated by themselves, i.e. when
    /// `session_user` is the same user.
    /// Returns whether the credentials have been stored
    pub fn upsert(&self, credentials: &Credentials, session_user: Option<&str>) -> bool {
        if credentials.username.is_empty() || credentials.password.is_empty() {
            return false;
        }

        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&credentials.username) && session_user != Some(credentials.username.as_str()) {
            log::warn!("Refusing to update user {} without a session of this user", credentials.username);
            return false;
        }

        let digest = self.keyed_digest(credentials).finalize().into_bytes().to_vec();
        users.insert(credentials.username.clone(), digest);
        true
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


/// The user a request has been authenticated as
#[derive(Clone, Debug, PartialEq)]
pub struct SessionUser(pub String);

/// Route layer for protected routes: rejects requests that do not carry a valid session cookie
pub async fn require_session(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Result<Response, AppError> {
    match session_user(request.headers(), &state.signer) {
        None => {
            log::debug!("Rejecting unauthenticated request to {}", request.uri().path());
            Err(AppError::Unauthorized)
        },
        Some(user) => {
            request.extensions_mut().insert(SessionUser(user));
            Ok(next.run(request).await)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn basic_auth_header() {
        let creds = Credentials::new("alice", "pass:with:colons");
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&creds.to_header_value()).unwrap());
        assert_eq!(Credentials::from_headers(&headers), Some(creds));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abcdef"));
        assert_eq!(Credentials::from_headers(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic !!!not-base64"));
        assert_eq!(Credentials::from_headers(&headers), None);
    }

    #[test]
    fn signed_cookies() {
        let signer = CookieSigner::new(b"server secret").unwrap();
        let value = signer.sign("alice");
        assert_eq!(signer.verify(&value).as_deref(), Some("alice"));

        // Another user name with the same signature
        let (_, signature) = value.split_once('.').unwrap();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode("mallory"), signature);
        assert_eq!(signer.verify(&forged), None);

        // Signed with another key
        let other = CookieSigner::new(b"another secret").unwrap();
        assert_eq!(other.verify(&value), None);

        assert_eq!(signer.verify("alice"), None);
        assert_eq!(signer.verify(""), None);
    }

    #[test]
    fn cookie_header_parsing() {
        let signer = CookieSigner::new(b"server secret").unwrap();
        let mut headers = HeaderMap::new();
        let cookie = format!("theme=dark; {}={}; other=1", SESSION_COOKIE, signer.sign("bob"));
        headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());
        assert_eq!(session_user(&headers, &signer).as_deref(), Some("bob"));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("user=bob"));
        assert_eq!(session_user(&headers, &signer), None);
        assert_eq!(session_user(&HeaderMap::new(), &signer), None);
    }

    #[test]
    fn user_registry() {
        let registry = UserRegistry::new(b"server secret").unwrap();
        let alice = Credentials::new("alice", "wonderland");
        assert!(registry.is_empty());
        assert_eq!(registry.authenticate(&alice), false);

        assert!(registry.upsert(&alice, None));
        assert!(registry.authenticate(&alice));
        assert_eq!(registry.authenticate(&Credentials::new("alice", "wrong")), false);

        // Only alice may change her password
        let new_alice = Credentials::new("alice", "looking-glass");
        assert_eq!(registry.upsert(&new_alice, None), false);
        assert_eq!(registry.upsert(&new_alice, Some("bob")), false);
        assert!(registry.upsert(&new_alice, Some("alice")));
        assert!(registry.authenticate(&new_alice));
        assert_eq!(registry.authenticate(&alice), false);

        assert_eq!(registry.upsert(&Credentials::new("", "pw"), None), false);
        assert_eq!(registry.upsert(&Credentials::new("carol", ""), None), false);
        assert_eq!(registry.len(), 1);
    }
}

//! User authentication for mutating operations.
//!
//! A single operator account is configured in [`Settings`]. Logging in
//! yields an HS256-signed access token valid for eight hours; verifying
//! that token yields a [`Principal`], which every mutating catalog
//! operation requires.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::Settings;
use crate::logging::{self, Source};
use crate::model::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of an access token issued by `login`.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(8 * 60 * 60);

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// An authenticated caller. Only obtainable from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: String,
    expires_at: i64,
}

impl Principal {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Ports
// ═══════════════════════════════════════════════════════════

pub trait TokenProvider {
    fn create_access_token(&self, subject: &str, ttl: Duration) -> Result<String, AuthError>;

    fn verify_token(&self, token: &str) -> Result<Claims, AuthError>;
}

pub trait Authenticator {
    fn authenticate(&self, username: &str, password: &str) -> Result<TokenResponse, AuthError>;

    /// Check a bearer token and return the caller it identifies.
    fn authorize(&self, token: &str) -> Result<Principal, AuthError>;
}

// ═══════════════════════════════════════════════════════════
// HS256 tokens
// ═══════════════════════════════════════════════════════════

/// Compact JWT signed with HMAC-SHA256.
pub struct HmacTokenProvider {
    secret: Vec<u8>,
}

impl HmacTokenProvider {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidToken)
    }

    fn sign(&self, signing_input: &str) -> Result<String, AuthError> {
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        let payload = serde_json::to_vec(claims).map_err(|_| AuthError::InvalidToken)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(JWT_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.sign(&signing_input)?;
        Ok(format!("{}.{}", signing_input, signature))
    }
}

impl TokenProvider for HmacTokenProvider {
    fn create_access_token(&self, subject: &str, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: Utc::now().timestamp() + ttl.as_secs() as i64,
        };
        self.encode_claims(&claims)
    }

    fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidToken);
        };

        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;
        // `hmac` verifies in constant time.
        let mut mac = self.mac()?;
        mac.update(format!("{}.{}", header, payload).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| AuthError::InvalidToken)?;

        let header_json = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| AuthError::InvalidToken)?;
        let header: serde_json::Value =
            serde_json::from_slice(&header_json).map_err(|_| AuthError::InvalidToken)?;
        if header.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
            return Err(AuthError::InvalidToken);
        }

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

// ═══════════════════════════════════════════════════════════
// Static-credential authenticator
// ═══════════════════════════════════════════════════════════

/// Accepts exactly one configured username/password pair.
pub struct CredentialAuthenticator<P> {
    username: String,
    password: String,
    tokens: P,
}

impl<P: TokenProvider> CredentialAuthenticator<P> {
    pub fn new(username: impl Into<String>, password: impl Into<String>, tokens: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            tokens,
        }
    }
}

impl CredentialAuthenticator<HmacTokenProvider> {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.user_name,
            &settings.user_password,
            HmacTokenProvider::new(settings.token_secret()),
        )
    }
}

fn same(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

impl<P: TokenProvider> Authenticator for CredentialAuthenticator<P> {
    fn authenticate(&self, username: &str, password: &str) -> Result<TokenResponse, AuthError> {
        // Evaluate both comparisons so timing does not reveal which one failed.
        let user_ok = same(username, &self.username);
        let password_ok = same(password, &self.password);
        if !(user_ok && password_ok) {
            logging::warn(Source::Auth, None, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.create_access_token(username, ACCESS_TOKEN_TTL)?;
        logging::info(Source::Auth, None, &format!("token issued for {}", username));
        Ok(TokenResponse::bearer(token))
    }

    fn authorize(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.tokens.verify_token(token)?;
        if !same(&claims.sub, &self.username) {
            return Err(AuthError::Forbidden);
        }
        Ok(Principal {
            subject: claims.sub,
            expires_at: claims.exp,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

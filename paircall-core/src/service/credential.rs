use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::TransportConfig;
use crate::{Error, Result};

/// Claims carried by a room join token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinClaims {
    /// API key that minted the token
    pub iss: String,
    /// Participant identity
    pub sub: String,
    /// Participant display name
    pub name: String,
    /// Room the token grants entry to
    pub room: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Mints and verifies short-lived HS256 join tokens for the media
/// transport, keyed by the configured API key/secret pair.
#[derive(Clone)]
pub struct JoinCredentialService {
    api_key: String,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    ttl: Duration,
}

impl std::fmt::Debug for JoinCredentialService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinCredentialService")
            .field("api_key", &self.api_key)
            .finish()
    }
}

impl JoinCredentialService {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(Error::CredentialAcquisition(
                "transport API key/secret not configured".to_string(),
            ));
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            encoding_key: Arc::new(EncodingKey::from_secret(config.api_secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(config.api_secret.as_bytes())),
            ttl: Duration::seconds(config.token_ttl_seconds as i64),
        })
    }

    /// Sign a join token granting `identity` entry to `room_id`.
    pub fn mint(&self, room_id: &str, identity: &str, display_name: &str) -> Result<String> {
        let now = Utc::now();
        let claims = JoinClaims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            name: display_name.to_string(),
            room: room_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::CredentialAcquisition(format!("failed to sign join token: {e}")))
    }

    /// Verify a join token and extract its claims.
    pub fn verify(&self, token: &str) -> Result<JoinClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 60; // clock skew

        let token_data: TokenData<JoinClaims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::CredentialAcquisition("join token expired".to_string())
                }
                _ => Error::CredentialAcquisition(format!("invalid join token: {e}")),
            })?;

        Ok(token_data.claims)
    }
}

//! services/api/src/adapters/identity.rs
//!
//! Resolves bearer credentials to identities. Implements the `IdentityService`
//! port from the `core` crate.
//!
//! A credential is first decoded as an HS256 access token carrying a `user_id`
//! claim. Anything that fails to decode is then looked up as an opaque API token.

use async_trait::async_trait;
use faq_core::{
    domain::{Identity, UserId},
    ports::{ApiTokenStore, IdentityService, PortResult},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// The claims we rely on in an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub exp: usize,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct TokenIdentityAdapter {
    decoding_key: DecodingKey,
    validation: Validation,
    api_tokens: Arc<dyn ApiTokenStore>,
}

impl TokenIdentityAdapter {
    pub fn new(jwt_secret: &str, api_tokens: Arc<dyn ApiTokenStore>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            api_tokens,
        }
    }

    fn decode_access_token(&self, credential: &str) -> Option<UserId> {
        match decode::<AccessClaims>(credential, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims.user_id),
            Err(e) => {
                debug!("Credential is not a valid access token: {}", e);
                None
            }
        }
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for TokenIdentityAdapter {
    async fn resolve(&self, credential: &str) -> PortResult<Option<Identity>> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Ok(None);
        }

        if let Some(user_id) = self.decode_access_token(credential) {
            return Ok(Some(Identity { user_id }));
        }

        let user_id = self.api_tokens.user_for_token(credential).await?;
        Ok(user_id.map(|user_id| Identity { user_id }))
    }
}

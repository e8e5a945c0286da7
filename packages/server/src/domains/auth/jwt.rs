use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{SiaeId, TenderId, UserId};

/// Session claims - data stored in the bearer token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,    // Subject (user_id as string)
    pub user_id: Uuid,  // User UUID
    pub is_admin: bool, // Moderator flag
    pub exp: i64,       // Expiration timestamp
    pub iat: i64,       // Issued at timestamp
    pub iss: String,    // Issuer
    pub jti: String,    // JWT ID (unique token identifier)
}

/// What a signed survey link is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyPurpose {
    AuthorTransaction { tender_id: TenderId },
    SupplierTransaction { tender_id: TenderId, siae_id: SiaeId },
}

impl SurveyPurpose {
    pub fn as_claim(&self) -> String {
        match self {
            SurveyPurpose::AuthorTransaction { tender_id } => {
                format!("author_transaction_survey:{}", tender_id)
            }
            SurveyPurpose::SupplierTransaction { tender_id, siae_id } => {
                format!("supplier_transaction_survey:{}:{}", tender_id, siae_id)
            }
        }
    }
}

/// Claims carried by survey links: who may answer, and to what.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SurveyClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub purpose: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

/// JWT Service - creates and verifies session tokens and survey tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    /// Create new JWT service with secret and issuer
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Create a session token, valid 24 hours
    pub fn create_token(&self, user_id: UserId, is_admin: bool) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(24);

        let claims = Claims {
            sub: user_id.to_string(),
            user_id: user_id.into_uuid(),
            is_admin,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify and decode a session token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(Into::into)
    }

    /// Mint the token embedded in a survey link.
    pub fn create_survey_token(
        &self,
        user_id: UserId,
        purpose: SurveyPurpose,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = SurveyClaims {
            sub: user_id.to_string(),
            user_id: user_id.into_uuid(),
            purpose: purpose.as_claim(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify a survey token for the expected purpose and return the user it
    /// was minted for.
    pub fn verify_survey_token(&self, token: &str, expected: SurveyPurpose) -> Result<UserId> {
        let claims = decode::<SurveyClaims>(token, &self.decoding_key, &self.validation())?.claims;

        if claims.purpose != expected.as_claim() {
            bail!("survey token purpose mismatch");
        }

        Ok(UserId::from_uuid(claims.user_id))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        validation
    }
}

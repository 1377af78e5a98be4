use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dealflow_core::{CompanyId, TeamId, UserId};

use crate::{Actor, RoleFields};

/// Verified token claims (transport-agnostic).
///
/// Signature verification and decoding happen upstream; this is what the request
/// layer hands over once a token has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorClaims {
    pub sub: UserId,
    pub company_id: CompanyId,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub manager_id: Option<UserId>,
    #[serde(flatten)]
    pub roles: RoleFields,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claim time window.
pub fn validate_claims(claims: &ActorClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

impl ActorClaims {
    /// Validate the time window and produce the canonical actor.
    pub fn into_actor(self, now: DateTime<Utc>) -> Result<Actor, TokenValidationError> {
        validate_claims(&self, now)?;

        Ok(Actor {
            id: self.sub,
            company_id: self.company_id,
            team_id: self.team_id,
            role: self.roles.effective(),
            manager_id: self.manager_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::Duration;

    fn claims(role: &str) -> ActorClaims {
        let now = Utc::now();
        ActorClaims {
            sub: UserId::new(),
            company_id: CompanyId::new(),
            team_id: None,
            manager_id: None,
            roles: RoleFields {
                role: Some(role.to_string()),
                normalized_role: None,
            },
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn valid_claims_produce_normalized_actor() {
        let c = claims("Sales Manager");
        let company = c.company_id;
        let actor = c.into_actor(Utc::now()).unwrap();
        assert_eq!(actor.role, Some(Role::SalesManager));
        assert_eq!(actor.company_id, company);
    }

    #[test]
    fn expired_claims_are_rejected() {
        let c = claims("sales_rep");
        let later = c.expires_at + Duration::seconds(1);
        assert_eq!(validate_claims(&c, later), Err(TokenValidationError::Expired));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut c = claims("sales_rep");
        c.expires_at = c.issued_at;
        assert_eq!(validate_claims(&c, Utc::now()), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn role_fields_deserialize_flattened() {
        let c = claims("admin");
        let mut json = serde_json::to_value(&c).unwrap();
        json["normalized_role"] = serde_json::json!("company_user");
        let back: ActorClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back.roles.effective(), Some(Role::CompanyUser));
    }
}

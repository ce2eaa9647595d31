use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::shared::error::CrmError;
use crate::core::shared::state::AppState;

pub const PRIVILEGED_ROLES: [&str; 2] = ["ADMIN", "SUPERADMIN"];

/// Claims carried by bearer tokens issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: String,
    pub company_id: Uuid,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize,
}

/// Caller identity attached to every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub role: String,
    pub company_id: Uuid,
    pub permissions: Vec<String>,
}

impl AuthenticatedUser {
    pub fn new(id: Uuid, role: impl Into<String>, company_id: Uuid) -> Self {
        Self {
            id,
            role: role.into(),
            company_id,
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn is_privileged(&self) -> bool {
        PRIVILEGED_ROLES
            .iter()
            .any(|r| self.role.eq_ignore_ascii_case(r))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_privileged() || self.permissions.iter().any(|p| p == permission)
    }
}

impl TryFrom<TokenClaims> for AuthenticatedUser {
    type Error = CrmError;

    fn try_from(claims: TokenClaims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| CrmError::Unauthorized("Invalid user ID in token".to_string()))?;
        Ok(AuthenticatedUser::new(id, claims.role, claims.company_id)
            .with_permissions(claims.permissions))
    }
}

fn validate_jwt(token: &str, secret: &str) -> Result<TokenClaims, CrmError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["sub", "exp"]);

    let key = DecodingKey::from_secret(secret.as_bytes());
    decode::<TokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Rejected token: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    CrmError::Unauthorized("Token expired".to_string())
                }
                _ => CrmError::Unauthorized("Invalid token".to_string()),
            }
        })
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the bearer token and stores the caller in request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return CrmError::Unauthorized("Authentication required".to_string()).into_response();
    };

    let user = match validate_jwt(token, &state.config.auth.jwt_secret)
        .and_then(AuthenticatedUser::try_from)
    {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Route layer gating on a named permission; privileged roles always pass.
pub async fn require_permission(
    permission: &'static str,
    request: Request<Body>,
    next: Next,
) -> Response {
    let allowed = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.has_permission(permission));

    match allowed {
        Some(true) => next.run(request).await,
        Some(false) => {
            CrmError::permission(format!("Missing permission: {permission}")).into_response()
        }
        None => CrmError::Unauthorized("Authentication required".to_string()).into_response(),
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = CrmError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| CrmError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, claims: &TokenClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp_offset: i64) -> TokenClaims {
        TokenClaims {
            sub: Uuid::new_v4().to_string(),
            role: "EMPLOYEE".to_string(),
            company_id: Uuid::new_v4(),
            permissions: vec!["proposals".to_string()],
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        }
    }

    #[test]
    fn test_validate_jwt_accepts_valid_token() {
        let c = claims(3600);
        let decoded = validate_jwt(&token("secret", &c), "secret").unwrap();
        assert_eq!(decoded.company_id, c.company_id);
        assert_eq!(decoded.permissions, vec!["proposals"]);
    }

    #[test]
    fn test_validate_jwt_rejects_wrong_secret_and_expired() {
        let c = claims(3600);
        assert!(validate_jwt(&token("secret", &c), "other").is_err());

        let expired = claims(-3600);
        assert!(matches!(
            validate_jwt(&token("secret", &expired), "secret"),
            Err(CrmError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_privileged_roles_bypass_permissions() {
        let admin = AuthenticatedUser::new(Uuid::new_v4(), "admin", Uuid::new_v4());
        assert!(admin.is_privileged());
        assert!(admin.has_permission("proposals"));

        let employee = AuthenticatedUser::new(Uuid::new_v4(), "EMPLOYEE", Uuid::new_v4());
        assert!(!employee.has_permission("proposals"));
        let employee = employee.with_permissions(vec!["proposals".into()]);
        assert!(employee.has_permission("proposals"));
    }

    #[test]
    fn test_non_uuid_subject_is_unauthorized() {
        let mut c = claims(3600);
        c.sub = "someone@example.com".to_string();
        assert!(AuthenticatedUser::try_from(c).is_err());
    }
}

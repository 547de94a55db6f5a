// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor resolving the request principal.
//!
//! Use the `Caller` extractor in handlers and gate inside the service call:
//!
//! ```rust,ignore
//! async fn my_handler(Caller(principal): Caller) -> impl IntoResponse {
//!     let user = principal.require_user()?;
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, decode_header, Validation};
use tracing::debug;

use super::{AuthError, AuthenticatedUser, IdentityClaims, Principal, Role};
use crate::state::{AppState, AuthConfig};
use crate::storage::{LoginProfile, UserRepository};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Extractor for the request principal.
///
/// A request without an `Authorization` header resolves to
/// [`Principal::Anonymous`]. A header that is present but invalid is rejected
/// with 401. A valid token upserts the local user row (created on first
/// login) and yields `Member` or `Admin`.
///
/// ## Authentication Modes
///
/// - **Production mode** (AUTH_JWKS_URL set): Full JWT verification against the provider JWKS
/// - **Development mode** (`dev` feature, no AUTH_JWKS_URL): Structure validation only (no signature check)
/// - Otherwise every bearer token is refused with 503
pub struct Caller(pub Principal);

impl FromRequestParts<AppState> for Caller {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Upstream layers may already have verified the token
        let identity = match parts.extensions.get::<AuthenticatedUser>().cloned() {
            Some(identity) => identity,
            None => {
                let Some(header) = parts.headers.get(AUTHORIZATION) else {
                    return Ok(Caller(Principal::Anonymous));
                };
                let header = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
                let token = header
                    .strip_prefix("Bearer ")
                    .ok_or(AuthError::InvalidAuthHeader)?;
                verify_jwt(token, &state.auth_config).await?
            }
        };

        let role = if identity.is_admin() || state.auth_config.is_admin_subject(&identity.subject)
        {
            Role::Admin
        } else {
            Role::User
        };

        let user = UserRepository::new(&state.db)
            .upsert_login(&LoginProfile {
                external_id: &identity.subject,
                display_name: identity.display_name.as_deref(),
                email: identity.email.as_deref(),
                role,
            })
            .map_err(|e| AuthError::InternalError(format!("user upsert failed: {e}")))?;

        debug!(user_id = user.id, role = %user.role, "Resolved principal");
        Ok(Caller(Principal::from_user(user)))
    }
}

/// Verify JWT and extract the identity.
///
/// In production mode (JWKS configured), verifies signature against the provider JWKS.
/// Without JWKS, tokens are only structure-checked when unsigned tokens are
/// allowed and the build carries the `dev` feature; otherwise they are refused.
async fn verify_jwt(token: &str, auth_config: &AuthConfig) -> Result<AuthenticatedUser, AuthError> {
    match auth_config.jwks {
        Some(ref jwks) => verify_jwt_production(token, jwks, auth_config).await,
        None if auth_config.allow_unsigned => verify_unsigned(token),
        None => Err(AuthError::NotConfigured),
    }
}

#[cfg(any(test, feature = "dev"))]
fn verify_unsigned(token: &str) -> Result<AuthenticatedUser, AuthError> {
    verify_jwt_development(token)
}

#[cfg(not(any(test, feature = "dev")))]
fn verify_unsigned(_token: &str) -> Result<AuthenticatedUser, AuthError> {
    Err(AuthError::NotConfigured)
}

/// Production JWT verification with JWKS.
async fn verify_jwt_production(
    token: &str,
    jwks: &super::JwksManager,
    auth_config: &AuthConfig,
) -> Result<AuthenticatedUser, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

    let (decoding_key, algorithm) = if let Some(kid) = &header.kid {
        jwks.get_decoding_key(kid).await?
    } else {
        jwks.get_any_decoding_key().await?
    };

    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;

    if let Some(ref issuer) = auth_config.issuer {
        validation.set_issuer(&[issuer]);
    }

    if let Some(ref audience) = auth_config.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    let token_data = decode::<IdentityClaims>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            _ => AuthError::MalformedToken,
        }
    })?;

    Ok(AuthenticatedUser::from_claims(token_data.claims))
}

/// Development JWT verification (no signature check).
///
/// WARNING: This should only be used in development environments.
#[cfg(any(test, feature = "dev"))]
fn verify_jwt_development(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<IdentityClaims>(token)
        .map_err(|_e| AuthError::MalformedToken)?;

    let claims = token_data.claims;
    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedUser::from_claims(claims))
}

/// Helper to create an unsigned test JWT (development mode only).
#[cfg(test)]
pub(crate) fn create_test_jwt(subject: &str, role: Option<&str>) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let header = r#"{"alg":"RS256","typ":"JWT"}"#;
    let metadata = role
        .map(|r| format!(r#","publicMetadata":{{"role":"{r}"}}"#))
        .unwrap_or_default();
    let claims = format!(
        r#"{{"sub":"{subject}","iat":1609459200,"exp":9999999999,"iss":"test","sid":"sess_123","name":"Player {subject}","email":"{subject}@example.com"{metadata}}}"#
    );

    let header_b64 = URL_SAFE_NO_PAD.encode(header.as_bytes());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.as_bytes());

    // Signature doesn't matter in development mode
    format!("{header_b64}.{claims_b64}.fake_signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_auth(None);

        let Caller(principal) = Caller::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(principal, Principal::Anonymous);
        assert!(UserRepository::new(&state.db).list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        let (state, _dir) = test_state();

        let mut parts = parts_with_auth(Some("Token abc"));
        let result = Caller::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));

        let mut parts = parts_with_auth(Some("Bearer not-a-jwt"));
        let result = Caller::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn valid_token_upserts_member() {
        let (state, _dir) = test_state();
        let token = create_test_jwt("user_123", None);
        let header = format!("Bearer {token}");

        let mut parts = parts_with_auth(Some(&header));
        let Caller(first) = Caller::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        let mut parts = parts_with_auth(Some(&header));
        let Caller(second) = Caller::from_request_parts(&mut parts, &state)
            .await
            .unwrap();

        let Principal::Member(user) = first else {
            panic!("expected member principal");
        };
        assert_eq!(user.external_id, "user_123");
        assert_eq!(user.email.as_deref(), Some("user_123@example.com"));
        assert_eq!(second.user().unwrap().id, user.id);
        assert_eq!(UserRepository::new(&state.db).list_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsigned_token_is_refused_without_opt_in() {
        let (mut state, _dir) = test_state();
        state.auth_config.allow_unsigned = false;
        let token = create_test_jwt("user_123", None);
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));

        let result = Caller::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::NotConfigured)));
        assert!(UserRepository::new(&state.db).list_all().unwrap().is_empty());

        // Anonymous requests still resolve
        let mut parts = parts_with_auth(None);
        let Caller(principal) = Caller::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(principal, Principal::Anonymous);
    }

    #[test]
    fn default_auth_config_does_not_allow_unsigned() {
        assert!(!AuthConfig::default().allow_unsigned);
    }

    #[tokio::test]
    async fn admin_role_claim_yields_admin() {
        let (state, _dir) = test_state();
        let token = create_test_jwt("boss", Some("admin"));
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));

        let Caller(principal) = Caller::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(matches!(principal, Principal::Admin(_)));
    }

    #[tokio::test]
    async fn admin_subject_list_elevates_role() {
        let (mut state, _dir) = test_state();
        state.auth_config.admin_subjects = vec!["owner".to_string()];
        let token = create_test_jwt("owner", None);
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));

        let Caller(principal) = Caller::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(principal.user().unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn caller_prefers_extensions() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_auth(None);
        parts.extensions.insert(AuthenticatedUser {
            subject: "from_layer".to_string(),
            role: Role::User,
            session_id: None,
            display_name: None,
            email: None,
            expires_at: 0,
        });

        let Caller(principal) = Caller::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(principal.user().unwrap().external_id, "from_layer");
    }
}

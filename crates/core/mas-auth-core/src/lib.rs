//! Core identity model for the mock authentication stack.
//!
//! This crate defines the simulated [`Identity`] attached to admitted
//! requests, the partial-update value used to reconfigure it, and the
//! fixed set of unauthorized errors the request gate can produce.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Header prefix the request gate requires on the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Conventional token that is always admitted. Any other non-magic token
/// is admitted too; this constant exists for readable tests.
pub const VALID_TOKEN: &str = "valid-token";

/// Magic token rejected with [`AuthError::InvalidToken`].
pub const INVALID_TOKEN: &str = "invalid-token";

/// Magic token rejected with [`AuthError::ExpiredToken`].
pub const EXPIRED_TOKEN: &str = "expired-token";

/// Errors produced by the request gate. Every variant maps to HTTP 401
/// with a fixed human-readable message.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// The `Authorization` header was missing or not a bearer value.
    #[error("Unauthorized - No token provided")]
    NoToken,

    /// The bearer value was the magic invalid token.
    #[error("Unauthorized - Invalid token")]
    InvalidToken,

    /// The bearer value was the magic expired token.
    #[error("Unauthorized - Expired token")]
    ExpiredToken,
}

impl AuthError {
    /// HTTP status code for this rejection. Always 401.
    pub fn status_code(&self) -> u16 {
        401
    }
}

/// Session claims carried by a signed-in [`Identity`].
///
/// The timestamps (`nbf`, `exp`, `iat`) are inert data: the request gate
/// never performs expiry arithmetic on them, they exist for handlers to
/// inspect. Arbitrary additional claims round-trip through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Raw token placeholder. The mock never signs anything, so this is
    /// empty unless a test sets it.
    pub raw: String,
    pub sub: String,
    pub iss: String,
    pub sid: String,
    pub nbf: i64,
    pub exp: i64,
    pub iat: i64,
    /// Informational role list. Never consulted for admission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Impersonation actor: the principal acting on behalf of the current
/// identity. Presence on an [`Identity`] marks the session as an
/// admin-as-user impersonation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub sub: String,
    pub sid: String,
}

impl Actor {
    /// Default session id used when only the acting subject is supplied.
    pub const DEFAULT_SID: &'static str = "sess_actor";

    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            sid: Self::DEFAULT_SID.to_string(),
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = sid.into();
        self
    }
}

/// The simulated principal attached to admitted requests.
///
/// Two shapes share this struct: signed-in (at minimum `user_id` is
/// `Some`) and signed-out (every field `None`, as produced by
/// [`Identity::signed_out`]). Exactly one identity is current in a store
/// at any time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Option<String>,
    pub org_id: Option<String>,
    pub session_id: Option<String>,
    pub session_claims: Option<SessionClaims>,
    pub actor: Option<Actor>,
    pub org_role: Option<String>,
    pub org_slug: Option<String>,
    pub org_permissions: Option<Vec<String>>,
    pub factor_verification_age: Option<(i64, i64)>,
}

impl Identity {
    /// The fully signed-out shape: every field explicitly `None`.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Whether this identity represents a signed-in principal.
    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }

    /// Whether this session is an admin-as-user impersonation.
    pub fn is_impersonated(&self) -> bool {
        self.actor.is_some()
    }
}

/// Boxed future for capability calls that are async in calling
/// convention only.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = String> + Send + 'a>>;

/// The capability surface the real authentication object exposes to
/// downstream handlers. The mock [`Identity`] implements it with fixed
/// answers; tests that need richer behavior wrap the identity in their
/// own implementation.
pub trait AuthCapabilities {
    /// Retrieve a session token. The mock performs no signing and always
    /// resolves immediately with the empty placeholder token.
    fn get_token(&self) -> TokenFuture<'_>;

    /// Permission check. Always `false` for the mock identity.
    fn has(&self, permission: &str) -> bool;

    /// Debug payload. Always an empty JSON object for the mock identity.
    fn debug(&self) -> Value;
}

impl AuthCapabilities for Identity {
    fn get_token(&self) -> TokenFuture<'_> {
        Box::pin(async { String::new() })
    }

    fn has(&self, _permission: &str) -> bool {
        false
    }

    fn debug(&self) -> Value {
        Value::Object(Map::new())
    }
}

/// Partial identity used for merges.
///
/// Every field mirrors an [`Identity`] field; `Some` overrides the target
/// field wholesale, `None` keeps the current value. A provided
/// `session_claims` replaces the stored claims entirely, sub-fields are
/// never merged. There is no way to null out a single field through an
/// update: switching to the signed-out shape goes through the store's
/// `mock_unauthenticated`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_claims: Option<SessionClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_permissions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor_verification_age: Option<(i64, i64)>,
}

impl IdentityUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Replaces the stored claims wholesale when applied.
    pub fn session_claims(mut self, claims: SessionClaims) -> Self {
        self.session_claims = Some(claims);
        self
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn org_role(mut self, org_role: impl Into<String>) -> Self {
        self.org_role = Some(org_role.into());
        self
    }

    pub fn org_slug(mut self, org_slug: impl Into<String>) -> Self {
        self.org_slug = Some(org_slug.into());
        self
    }

    pub fn org_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.org_permissions = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    pub fn factor_verification_age(mut self, age: (i64, i64)) -> Self {
        self.factor_verification_age = Some(age);
        self
    }

    /// Shallow-merges this update onto `base`: provided fields override,
    /// absent fields keep the base value.
    pub fn apply(self, base: Identity) -> Identity {
        Identity {
            user_id: self.user_id.or(base.user_id),
            org_id: self.org_id.or(base.org_id),
            session_id: self.session_id.or(base.session_id),
            session_claims: self.session_claims.or(base.session_claims),
            actor: self.actor.or(base.actor),
            org_role: self.org_role.or(base.org_role),
            org_slug: self.org_slug.or(base.org_slug),
            org_permissions: self.org_permissions.or(base.org_permissions),
            factor_verification_age: self
                .factor_verification_age
                .or(base.factor_verification_age),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_identity() -> Identity {
        Identity {
            user_id: Some("user_1".to_string()),
            org_id: Some("org_1".to_string()),
            session_id: Some("sess_1".to_string()),
            session_claims: Some(SessionClaims {
                sub: "user_1".to_string(),
                sid: "sess_1".to_string(),
                roles: Some(vec!["org:member".to_string()]),
                ..Default::default()
            }),
            actor: None,
            org_role: Some("org:member".to_string()),
            org_slug: None,
            org_permissions: None,
            factor_verification_age: None,
        }
    }

    #[test]
    fn apply_overrides_only_provided_fields() {
        let merged = IdentityUpdate::new()
            .user_id("user_2")
            .org_slug("acme")
            .apply(sample_identity());

        assert_eq!(merged.user_id.as_deref(), Some("user_2"));
        assert_eq!(merged.org_slug.as_deref(), Some("acme"));
        // Untouched fields keep the base value.
        assert_eq!(merged.org_id.as_deref(), Some("org_1"));
        assert_eq!(merged.org_role.as_deref(), Some("org:member"));
    }

    #[test]
    fn apply_replaces_session_claims_wholesale() {
        let replacement = SessionClaims {
            sub: "user_2".to_string(),
            ..Default::default()
        };
        let merged = IdentityUpdate::new()
            .session_claims(replacement.clone())
            .apply(sample_identity());

        let claims = merged.session_claims.unwrap();
        assert_eq!(claims, replacement);
        // Sub-fields of the old claims must not leak through.
        assert_eq!(claims.roles, None);
        assert_eq!(claims.sid, "");
    }

    #[test]
    fn empty_update_is_identity_preserving() {
        let base = sample_identity();
        assert_eq!(IdentityUpdate::new().apply(base.clone()), base);
    }

    #[test]
    fn signed_out_is_all_none() {
        let identity = Identity::signed_out();
        assert_eq!(identity.user_id, None);
        assert_eq!(identity.org_id, None);
        assert_eq!(identity.session_id, None);
        assert_eq!(identity.session_claims, None);
        assert_eq!(identity.actor, None);
        assert_eq!(identity.org_role, None);
        assert_eq!(identity.org_slug, None);
        assert_eq!(identity.org_permissions, None);
        assert_eq!(identity.factor_verification_age, None);
        assert!(!identity.is_signed_in());
    }

    #[test]
    fn impersonation_is_derived_from_actor_presence() {
        let mut identity = sample_identity();
        assert!(!identity.is_impersonated());

        identity.actor = Some(Actor::new("admin_x"));
        assert!(identity.is_impersonated());
        assert_eq!(identity.actor.as_ref().unwrap().sid, Actor::DEFAULT_SID);
    }

    #[tokio::test]
    async fn capabilities_have_fixed_answers() {
        let signed_in = sample_identity();
        let signed_out = Identity::signed_out();

        // Capability behavior is identical for both shapes.
        for identity in [signed_in, signed_out] {
            assert_eq!(identity.get_token().await, "");
            assert!(!identity.has("org:billing:manage"));
            assert_eq!(identity.debug(), serde_json::json!({}));
        }
    }

    #[test]
    fn auth_error_messages_are_fixed() {
        assert_eq!(
            AuthError::NoToken.to_string(),
            "Unauthorized - No token provided"
        );
        assert_eq!(
            AuthError::InvalidToken.to_string(),
            "Unauthorized - Invalid token"
        );
        assert_eq!(
            AuthError::ExpiredToken.to_string(),
            "Unauthorized - Expired token"
        );
        assert_eq!(AuthError::ExpiredToken.status_code(), 401);
    }

    #[test]
    fn extra_claims_round_trip_through_serde() {
        let mut claims = SessionClaims {
            sub: "user_1".to_string(),
            ..Default::default()
        };
        claims
            .extra
            .insert("azp".to_string(), Value::String("http://localhost".into()));

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["azp"], "http://localhost");

        let back: SessionClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back, claims);
    }
}

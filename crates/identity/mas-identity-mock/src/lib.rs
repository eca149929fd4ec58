//! Mutable identity store backing the mock authentication stack.
//!
//! A [`MockAuthStore`] holds one current simulated [`Identity`] and the
//! default identity captured at construction. Test code reconfigures the
//! current identity through presets (`mock_admin`, `mock_user`,
//! `mock_unauthenticated`) or field-level updates (`set_user`), and the
//! request gate reads it on every evaluation. Mutations are globally
//! visible to whatever shares the store, so suites either serialize tests
//! or reconfigure at the start of each one.

use std::sync::Arc;

use mas_auth_core::{Identity, IdentityUpdate, SessionClaims};
use once_cell::sync::Lazy;
use tokio::sync::RwLock;

/// User id of the baseline identity installed at construction.
pub const DEFAULT_USER_ID: &str = "user_default";
/// Organization id of the baseline identity.
pub const DEFAULT_ORG_ID: &str = "org_default";
/// Session id of the baseline identity.
pub const DEFAULT_SESSION_ID: &str = "sess_default";

/// User id installed by [`MockAuthStore::mock_admin`].
pub const ADMIN_USER_ID: &str = "user_admin";
/// Organization id installed by [`MockAuthStore::mock_admin`].
pub const ADMIN_ORG_ID: &str = "org_admin";
/// Session id installed by [`MockAuthStore::mock_admin`].
pub const ADMIN_SESSION_ID: &str = "sess_admin";

/// User id installed by [`MockAuthStore::mock_user`].
pub const MEMBER_USER_ID: &str = "user_regular";
/// Organization id installed by [`MockAuthStore::mock_user`].
pub const MEMBER_ORG_ID: &str = "org_regular";
/// Session id installed by [`MockAuthStore::mock_user`].
pub const MEMBER_SESSION_ID: &str = "sess_regular";

/// Issuer placeholder carried in preset session claims.
pub const MOCK_ISSUER: &str = "https://mock.auth.test";

pub const ROLE_ADMIN: &str = "org:admin";
pub const ROLE_MEMBER: &str = "org:member";

/// Fixed issued-at timestamp for preset claims. The gate never does
/// expiry arithmetic, so these only need to be stable for assertions.
pub const MOCK_IAT: i64 = 1_700_000_000;
/// Fixed expiry timestamp for preset claims, one hour after issuance.
pub const MOCK_EXP: i64 = MOCK_IAT + 3600;

fn preset_claims(sub: &str, sid: &str, role: &str) -> SessionClaims {
    SessionClaims {
        raw: String::new(),
        sub: sub.to_string(),
        iss: MOCK_ISSUER.to_string(),
        sid: sid.to_string(),
        nbf: MOCK_IAT,
        exp: MOCK_EXP,
        iat: MOCK_IAT,
        roles: Some(vec![role.to_string()]),
        extra: Default::default(),
    }
}

fn preset_identity(user_id: &str, org_id: &str, session_id: &str, role: &str) -> Identity {
    Identity {
        user_id: Some(user_id.to_string()),
        org_id: Some(org_id.to_string()),
        session_id: Some(session_id.to_string()),
        session_claims: Some(preset_claims(user_id, session_id, role)),
        actor: None,
        org_role: Some(role.to_string()),
        org_slug: None,
        org_permissions: None,
        factor_verification_age: None,
    }
}

fn baseline_identity() -> Identity {
    preset_identity(
        DEFAULT_USER_ID,
        DEFAULT_ORG_ID,
        DEFAULT_SESSION_ID,
        ROLE_MEMBER,
    )
}

fn admin_identity() -> Identity {
    preset_identity(ADMIN_USER_ID, ADMIN_ORG_ID, ADMIN_SESSION_ID, ROLE_ADMIN)
}

fn member_identity() -> Identity {
    preset_identity(
        MEMBER_USER_ID,
        MEMBER_ORG_ID,
        MEMBER_SESSION_ID,
        ROLE_MEMBER,
    )
}

struct StoreState {
    current: Identity,
    default: Identity,
}

/// Holds the current simulated identity.
///
/// Cloning is cheap and every clone shares the same state, so a store can
/// be handed to the request gate and kept by the test at the same time.
/// None of the operations fail.
#[derive(Clone)]
pub struct MockAuthStore {
    inner: Arc<RwLock<StoreState>>,
}

impl MockAuthStore {
    /// Creates a store whose current and default identity are the
    /// built-in baseline signed-in member.
    pub fn new() -> Self {
        Self::with_initial(IdentityUpdate::default())
    }

    /// Creates a store from the baseline identity merged with `initial`.
    /// The merged result becomes both the current identity and the
    /// default that [`reset`](Self::reset) restores.
    pub fn with_initial(initial: IdentityUpdate) -> Self {
        let identity = initial.apply(baseline_identity());
        Self {
            inner: Arc::new(RwLock::new(StoreState {
                current: identity.clone(),
                default: identity,
            })),
        }
    }

    /// Process-wide convenience instance for tests that do not thread a
    /// store around. Prefer explicit instances where suites run in
    /// parallel.
    pub fn global() -> &'static MockAuthStore {
        static GLOBAL: Lazy<MockAuthStore> = Lazy::new(MockAuthStore::new);
        &GLOBAL
    }

    /// Sets the current identity to the admin preset merged with
    /// `overrides` (overrides win; a provided `session_claims` replaces
    /// the preset claims wholesale). Returns the resulting snapshot.
    pub async fn mock_admin(&self, overrides: IdentityUpdate) -> Identity {
        self.install(overrides.apply(admin_identity())).await
    }

    /// Sets the current identity to the regular-member preset merged
    /// with `overrides`. Returns the resulting snapshot.
    pub async fn mock_user(&self, overrides: IdentityUpdate) -> Identity {
        self.install(overrides.apply(member_identity())).await
    }

    /// Sets the current identity to the fully signed-out shape. Takes no
    /// overrides; the signed-out state is absolute.
    pub async fn mock_unauthenticated(&self) {
        self.install(Identity::signed_out()).await;
    }

    /// Shallow-merges `update` onto the current identity and returns the
    /// resulting snapshot.
    pub async fn set_user(&self, update: IdentityUpdate) -> Identity {
        let mut state = self.inner.write().await;
        state.current = update.apply(state.current.clone());
        state.current.clone()
    }

    /// Snapshot of the current identity. The returned value is
    /// independent of the store; mutating it does not affect later reads.
    pub async fn get_user(&self) -> Identity {
        self.inner.read().await.current.clone()
    }

    /// Restores the current identity to the default captured at
    /// construction.
    pub async fn reset(&self) {
        let mut state = self.inner.write().await;
        state.current = state.default.clone();
    }

    async fn install(&self, identity: Identity) -> Identity {
        let mut state = self.inner.write().await;
        state.current = identity;
        state.current.clone()
    }
}

impl Default for MockAuthStore {
    fn default() -> Self {
        Self::new()
    }
}

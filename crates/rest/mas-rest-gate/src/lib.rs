//! Request gate middleware standing in for a real authentication plugin.
//!
//! The gate inspects the `Authorization` header of every request routed
//! through it. Three magic bearer values short-circuit with a 401; any
//! other bearer token is admitted, and the current [`Identity`] snapshot
//! from the backing [`MockAuthStore`] is attached to the request
//! extensions as [`Auth`] for handlers to extract.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use http::StatusCode;
use http::header::AUTHORIZATION;
use mas_auth_core::{AuthError, BEARER_PREFIX, EXPIRED_TOKEN, INVALID_TOKEN, Identity};
use mas_identity_mock::MockAuthStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Identity snapshot attached to admitted requests. Extract it in
/// handlers with `Extension<Auth>`.
#[derive(Debug, Clone)]
pub struct Auth(pub Identity);

/// Opaque options bag forwarded by the host at plugin registration
/// (name + seed). The gate carries it but never interprets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockAuthOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<serde_json::Value>,
}

/// Shared state handed to [`request_gate`].
#[derive(Clone)]
pub struct GateState {
    store: MockAuthStore,
    options: Arc<MockAuthOptions>,
}

impl GateState {
    pub fn new(store: MockAuthStore, options: MockAuthOptions) -> Self {
        Self {
            store,
            options: Arc::new(options),
        }
    }

    pub fn store(&self) -> &MockAuthStore {
        &self.store
    }

    pub fn options(&self) -> &MockAuthOptions {
        &self.options
    }
}

/// Installable plugin wrapping the gate for a host router.
///
/// ```no_run
/// use axum::{Router, routing::get};
/// use mas_identity_mock::MockAuthStore;
/// use mas_rest_gate::{MockAuthOptions, MockAuthPlugin};
///
/// let store = MockAuthStore::new();
/// let plugin = MockAuthPlugin::new(store, MockAuthOptions::default());
/// let app = plugin.install(Router::new().route("/me", get(|| async { "ok" })));
/// ```
pub struct MockAuthPlugin {
    state: GateState,
}

impl MockAuthPlugin {
    pub fn new(store: MockAuthStore, options: MockAuthOptions) -> Self {
        Self {
            state: GateState::new(store, options),
        }
    }

    /// Layers the request gate onto every route of `router`.
    pub fn install(&self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(
            self.state.clone(),
            request_gate,
        ))
    }
}

/// The gate itself, usable directly with
/// `axum::middleware::from_fn_with_state` for routers with custom state.
///
/// Evaluation never mutates the store; the identity snapshot is read at
/// the moment the request is processed, so store mutations between
/// requests are visible without re-installing the gate.
pub async fn request_gate(State(state): State<GateState>, mut req: Request, next: Next) -> Response {
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX));

    let token = match bearer {
        Some(token) => token,
        None => return unauthorized(AuthError::NoToken),
    };

    match token {
        INVALID_TOKEN => unauthorized(AuthError::InvalidToken),
        EXPIRED_TOKEN => unauthorized(AuthError::ExpiredToken),
        _ => {
            let identity = state.store.get_user().await;
            debug!(
                user_id = identity.user_id.as_deref().unwrap_or("<signed-out>"),
                "request admitted"
            );
            req.extensions_mut().insert(Auth(identity));
            next.run(req).await
        }
    }
}

fn unauthorized(error: AuthError) -> Response {
    debug!(%error, "request rejected");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": error.to_string() })),
    )
        .into_response()
}

/// Coarse signed-in state reported by [`AuthClient::auth_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInStatus {
    SignedIn,
    SignedOut,
}

/// Status summary for code paths that branch on signed-in/out rather
/// than reading the full identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub status: SignInStatus,
    pub user_id: Option<String>,
    pub org_id: Option<String>,
}

/// Companion client over the same store, mirroring the status surface
/// the real authentication client exposes.
#[derive(Clone)]
pub struct AuthClient {
    store: MockAuthStore,
}

impl AuthClient {
    pub fn new(store: MockAuthStore) -> Self {
        Self { store }
    }

    /// Derives the coarse status from the current identity and echoes
    /// its `user_id` / `org_id`.
    pub async fn auth_status(&self) -> AuthStatus {
        let identity = self.store.get_user().await;
        AuthStatus {
            status: if identity.is_signed_in() {
                SignInStatus::SignedIn
            } else {
                SignInStatus::SignedOut
            },
            user_id: identity.user_id,
            org_id: identity.org_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mas_auth_core::IdentityUpdate;

    #[tokio::test]
    async fn auth_status_tracks_store_mutations() {
        let store = MockAuthStore::new();
        let client = AuthClient::new(store.clone());

        store.mock_admin(IdentityUpdate::new()).await;
        let status = client.auth_status().await;
        assert_eq!(status.status, SignInStatus::SignedIn);
        assert_eq!(status.user_id.as_deref(), Some("user_admin"));
        assert_eq!(status.org_id.as_deref(), Some("org_admin"));

        store.mock_unauthenticated().await;
        let status = client.auth_status().await;
        assert_eq!(status.status, SignInStatus::SignedOut);
        assert_eq!(status.user_id, None);
        assert_eq!(status.org_id, None);
    }

    #[test]
    fn options_round_trip_untouched() {
        let options: MockAuthOptions = serde_json::from_value(json!({
            "name": "mock-auth",
            "seed": { "users": ["user_1", "user_2"] },
        }))
        .unwrap();

        assert_eq!(options.name.as_deref(), Some("mock-auth"));
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({
                "name": "mock-auth",
                "seed": { "users": ["user_1", "user_2"] },
            })
        );
    }

    #[test]
    fn gate_state_exposes_uninterpreted_options() {
        let state = GateState::new(
            MockAuthStore::new(),
            MockAuthOptions {
                name: Some("mock-auth".to_string()),
                seed: None,
            },
        );
        assert_eq!(state.options().name.as_deref(), Some("mock-auth"));
        assert_eq!(state.options().seed, None);
    }
}

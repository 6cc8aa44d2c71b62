//! # REST API
//!
//! Builds the axum router that exposes the staking ledger over HTTP. All
//! endpoints share application state through axum's `State` extractor; every
//! mutating request takes the registry's write lock for the full transition,
//! which is the node-level realization of the ledger's single global
//! serialization -- no request ever observes a half-applied operation.
//!
//! ## Endpoints
//!
//! | Method | Path                              | Description                    |
//! |--------|-----------------------------------|--------------------------------|
//! | GET    | `/health`                         | Liveness probe                 |
//! | GET    | `/status`                         | Ledger status summary          |
//! | POST   | `/profiles`                       | Register a profile + controller|
//! | GET    | `/vouches/:id`                    | Vouch record by id             |
//! | POST   | `/vouches`                        | Create a vouch                 |
//! | POST   | `/vouches/:id/unvouch`            | Withdraw a vouch               |
//! | POST   | `/vouches/:id/unhealthy`          | Flag an unvouched vouch        |
//! | POST   | `/vouches/:id/unvouch-unhealthy`  | Withdraw and flag atomically   |
//! | GET    | `/vaults/:subject`                | Vault snapshot                 |
//! | GET    | `/escrow/:profile`                | Native escrow balance          |
//! | POST   | `/escrow/:profile/withdraw`       | Withdraw escrowed funds        |
//! | POST   | `/admin/fees`                     | Set a fee rate                 |
//! | POST   | `/admin/minimum`                  | Set the minimum vouch amount   |
//! | POST   | `/admin/slash`                    | Slash a profile                |
//!
//! Authorization stays at the collaborator boundary: requests carry the
//! caller address and the profile directory decides whether it controls the
//! profile. Signature verification belongs to the identity subsystem, not
//! to this surface.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aval_ledger::asset::AssetKind;
use aval_ledger::directory::InMemoryDirectory;
use aval_ledger::escrow::EscrowError;
use aval_ledger::fees::FeeRateKind;
use aval_ledger::registry::{RegistryError, UnvouchReceipt, VouchRegistry};
use aval_ledger::vouch::Vouch;
use aval_ledger::{ProfileId, VouchId};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone -- everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The ledger, behind one write lock: one transition at a time.
    pub registry: Arc<RwLock<VouchRegistry>>,
    /// Handle to the same directory the registry validates against, so
    /// profiles can be registered at runtime.
    pub directory: InMemoryDirectory,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// JSON error body returned for every rejected request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable description of the rejection.
    pub error: String,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Total vouch records ever created.
    pub vouch_count: usize,
    /// Asset units currently staked across all vaults.
    pub total_staked: u64,
    /// Asset units currently escrowed.
    pub total_escrowed: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Request payload for `POST /profiles`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterProfileRequest {
    /// Profile id to register (or reactivate).
    pub profile: ProfileId,
    /// Controller address authorized to act for the profile.
    pub controller: String,
}

/// Request payload for `POST /vouches`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateVouchRequest {
    /// The staking profile.
    pub author: ProfileId,
    /// Address the author acts from; must control the author profile.
    pub author_address: String,
    /// The profile being vouched for.
    pub subject: ProfileId,
    /// Stake amount in smallest units.
    pub amount: u64,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
    /// Opaque metadata.
    #[serde(default)]
    pub metadata: String,
}

/// Response payload for `POST /vouches`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateVouchResponse {
    /// Id of the created vouch.
    pub vouch_id: VouchId,
}

/// Request payload for the unvouch and unhealthy endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallerRequest {
    /// Address performing the action; must control the vouch's author.
    pub caller_address: String,
}

/// Request payload for `POST /escrow/:profile/withdraw`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EscrowWithdrawRequest {
    /// Address performing the withdrawal; must control the profile.
    pub caller_address: String,
    /// Destination address for the funds.
    pub to: String,
    /// Amount in smallest units.
    pub amount: u64,
}

/// Response payload for `GET /escrow/:profile`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EscrowResponse {
    /// The profile queried.
    pub profile: ProfileId,
    /// Native balance in smallest units.
    pub amount: u64,
}

/// Request payload for `POST /admin/fees`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetFeeRateRequest {
    /// Which of the four rates to set.
    pub kind: FeeRateKind,
    /// New rate in basis points.
    pub bps: u64,
}

/// Request payload for `POST /admin/minimum`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetMinimumRequest {
    /// New minimum vouch amount in smallest units.
    pub amount: u64,
}

/// Request payload for `POST /admin/slash`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SlashRequest {
    /// The profile to punish.
    pub profile: ProfileId,
    /// Penalty over the engine's pinned scale.
    pub penalty: u64,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/profiles", post(register_profile_handler))
        .route("/vouches", post(create_vouch_handler))
        .route("/vouches/:id", get(get_vouch_handler))
        .route("/vouches/:id/unvouch", post(unvouch_handler))
        .route("/vouches/:id/unhealthy", post(mark_unhealthy_handler))
        .route(
            "/vouches/:id/unvouch-unhealthy",
            post(unvouch_unhealthy_handler),
        )
        .route("/vaults/:subject", get(vault_handler))
        .route("/escrow/:profile", get(escrow_handler))
        .route("/escrow/:profile/withdraw", post(escrow_withdraw_handler))
        .route("/admin/fees", post(set_fee_rate_handler))
        .route("/admin/minimum", post(set_minimum_handler))
        .route("/admin/slash", post(slash_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Maps a registry error to an HTTP response.
///
/// Missing entities are 404, authorization failures 403, everything else
/// (validation and state preconditions) 400. The error's display string is
/// the response body -- the library already phrases these for humans.
fn error_response(e: RegistryError) -> Response {
    let status = match &e {
        RegistryError::UnknownVouch(_) | RegistryError::ProfileNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        RegistryError::Unauthorized { .. }
        | RegistryError::Escrow(EscrowError::NotController { .. }) => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry.read();
    Json(StatusResponse {
        version: state.version.clone(),
        vouch_count: registry.vouch_count(),
        total_staked: registry.total_staked_assets(),
        total_escrowed: registry.total_escrowed(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn register_profile_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterProfileRequest>,
) -> impl IntoResponse {
    state.directory.register(req.profile, &req.controller);
    tracing::info!(profile = req.profile, "profile registered");
    StatusCode::CREATED
}

async fn create_vouch_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateVouchRequest>,
) -> Response {
    let mut registry = state.registry.write();
    match registry.vouch(
        req.author,
        &req.author_address,
        req.subject,
        req.amount,
        &req.comment,
        &req.metadata,
    ) {
        Ok(vouch_id) => {
            state.metrics.vouches_created_total.inc();
            state
                .metrics
                .staked_assets
                .set(registry.total_staked_assets() as i64);
            state
                .metrics
                .escrowed_assets
                .set(registry.total_escrowed() as i64);
            (StatusCode::CREATED, Json(CreateVouchResponse { vouch_id })).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn get_vouch_handler(
    State(state): State<AppState>,
    Path(id): Path<VouchId>,
) -> Response {
    let registry = state.registry.read();
    match registry.vouch_record(id) {
        Some(vouch) => Json::<Vouch>(vouch.clone()).into_response(),
        None => error_response(RegistryError::UnknownVouch(id)),
    }
}

async fn unvouch_handler(
    State(state): State<AppState>,
    Path(id): Path<VouchId>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let mut registry = state.registry.write();
    match registry.unvouch(id, &req.caller_address) {
        Ok(receipt) => {
            state.metrics.vouches_archived_total.inc();
            state
                .metrics
                .staked_assets
                .set(registry.total_staked_assets() as i64);
            Json::<UnvouchReceipt>(receipt).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn mark_unhealthy_handler(
    State(state): State<AppState>,
    Path(id): Path<VouchId>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let mut registry = state.registry.write();
    match registry.mark_unhealthy(id, &req.caller_address) {
        Ok(()) => {
            state.metrics.vouches_unhealthy_total.inc();
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn unvouch_unhealthy_handler(
    State(state): State<AppState>,
    Path(id): Path<VouchId>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let mut registry = state.registry.write();
    match registry.unvouch_unhealthy(id, &req.caller_address) {
        Ok(receipt) => {
            state.metrics.vouches_archived_total.inc();
            state.metrics.vouches_unhealthy_total.inc();
            state
                .metrics
                .staked_assets
                .set(registry.total_staked_assets() as i64);
            Json::<UnvouchReceipt>(receipt).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn vault_handler(
    State(state): State<AppState>,
    Path(subject): Path<ProfileId>,
) -> impl IntoResponse {
    let registry = state.registry.read();
    Json(registry.vault_snapshot(subject))
}

async fn escrow_handler(
    State(state): State<AppState>,
    Path(profile): Path<ProfileId>,
) -> impl IntoResponse {
    let registry = state.registry.read();
    Json(EscrowResponse {
        profile,
        amount: registry.escrow_balance(profile, &AssetKind::Native),
    })
}

async fn escrow_withdraw_handler(
    State(state): State<AppState>,
    Path(profile): Path<ProfileId>,
    Json(req): Json<EscrowWithdrawRequest>,
) -> Response {
    let mut registry = state.registry.write();
    match registry.withdraw_escrow(
        profile,
        &req.caller_address,
        AssetKind::Native,
        &req.to,
        req.amount,
    ) {
        Ok(remaining) => {
            state
                .metrics
                .escrowed_assets
                .set(registry.total_escrowed() as i64);
            Json(EscrowResponse {
                profile,
                amount: remaining,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn set_fee_rate_handler(
    State(state): State<AppState>,
    Json(req): Json<SetFeeRateRequest>,
) -> Response {
    let mut registry = state.registry.write();
    match registry.set_fee_rate(req.kind, req.bps) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_minimum_handler(
    State(state): State<AppState>,
    Json(req): Json<SetMinimumRequest>,
) -> Response {
    let mut registry = state.registry.write();
    match registry.set_minimum_vouch_amount(req.amount) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn slash_handler(
    State(state): State<AppState>,
    Json(req): Json<SlashRequest>,
) -> Response {
    let mut registry = state.registry.write();
    match registry.slash(req.profile, req.penalty) {
        Ok(event) => {
            state.metrics.slashes_total.inc();
            state
                .metrics
                .staked_assets
                .set(registry.total_staked_assets() as i64);
            Json(event).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

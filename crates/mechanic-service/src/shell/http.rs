// HTTP shell for the mechanic service.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::application::errors::MechanicError;
use crate::core::repair::{Location, MechanicInfo, Repair, RepairCost};
use crate::shell::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/repairs/nearby/:mechanic_id", get(list_nearby))
        .route("/repairs/:repair_id/assign", post(assign))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct CostResponse {
    pub id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "repairType")]
    pub repair_type: String,
    #[serde(rename = "totalPrice")]
    pub total_price: f64,
    #[serde(rename = "userLocation", skip_serializing_if = "Option::is_none")]
    pub user_location: Option<Location>,
    pub mechanics: Vec<MechanicInfo>,
}

impl From<RepairCost> for CostResponse {
    fn from(cost: RepairCost) -> Self {
        Self {
            id: cost.id,
            user_id: cost.user_id,
            repair_type: cost.repair_type,
            total_price: cost.total_price,
            user_location: cost.user_location,
            mechanics: cost.mechanics,
        }
    }
}

#[derive(Serialize)]
pub struct RepairResponse {
    pub id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub status: String,
    #[serde(rename = "repairCost")]
    pub repair_cost: CostResponse,
    #[serde(rename = "assignedTo", skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl From<Repair> for RepairResponse {
    fn from(repair: Repair) -> Self {
        Self {
            id: repair.id,
            user_id: repair.user_id,
            status: repair.status,
            repair_cost: repair.repair_cost.into(),
            assigned_to: repair.assigned_to,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn list_nearby(State(state): State<AppState>, Path(mechanic_id): Path<String>) -> Response {
    match state.ops.list_nearby_repairs(&mechanic_id).await {
        Ok(repairs) => Json(
            repairs
                .into_iter()
                .map(RepairResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct AssignBody {
    #[serde(rename = "mechanicID")]
    mechanic_id: String,
}

async fn assign(
    State(state): State<AppState>,
    Path(repair_id): Path<String>,
    body: Result<Json<AssignBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(_) => return StatusCode::UNPROCESSABLE_ENTITY.into_response(),
    };
    match state.ops.assign_repair(&repair_id, &body.mechanic_id).await {
        Ok(repair) => Json(RepairResponse::from(repair)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: MechanicError) -> Response {
    let status = match &err {
        MechanicError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MechanicError::NotFound => StatusCode::NOT_FOUND,
        MechanicError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

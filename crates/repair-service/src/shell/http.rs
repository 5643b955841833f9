// HTTP shell for the repair service.
//
// Responsibilities
// - Decode bodies, call the application layer, map RepairError onto status
//   codes. Status updates additionally fan out to the websocket hub; a
//   failed broadcast never fails the request.

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::application::commands::CostInput;
use crate::application::errors::RepairError;
use crate::core::repair::{Location, MechanicInfo, Repair, RepairCost};
use crate::shell::hub::StatusUpdate;
use crate::shell::state::AppState;
use crate::shell::ws;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/repairs", post(create_repair).get(list_repairs))
        .route("/repairs/estimate", post(estimate))
        .route("/repairs/cost/:cost_id", get(get_cost))
        .route("/repairs/:repair_id", get(get_repair).put(update_repair))
        .route("/ws", get(websocket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
pub struct CreateRepairBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "repairType")]
    pub repair_type: String,
    #[serde(rename = "totalPrice")]
    pub total_price: f64,
    #[serde(rename = "userLocation", default)]
    pub user_location: Option<Location>,
    #[serde(default)]
    pub mechanics: Vec<MechanicInfo>,
}

impl From<CreateRepairBody> for CostInput {
    fn from(body: CreateRepairBody) -> Self {
        CostInput {
            id: body.id,
            user_id: body.user_id,
            repair_type: body.repair_type,
            total_price: body.total_price,
            user_location: body.user_location,
            mechanics: body.mechanics,
        }
    }
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
            repair_type: cost.repair_type.to_string(),
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
}

impl From<Repair> for RepairResponse {
    fn from(repair: Repair) -> Self {
        Self {
            id: repair.id,
            user_id: repair.user_id,
            status: repair.status.to_string(),
            repair_cost: repair.repair_cost.into(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn create_repair(
    State(state): State<AppState>,
    body: Result<Json<CreateRepairBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(_) => return StatusCode::UNPROCESSABLE_ENTITY.into_response(),
    };
    match state.commands.create_repair(body.into()).await {
        Ok(repair) => (StatusCode::CREATED, Json(RepairResponse::from(repair))).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct EstimateBody {
    #[serde(rename = "repairType")]
    repair_type: String,
    #[serde(rename = "userID")]
    user_id: String,
    location: Location,
}

async fn estimate(
    State(state): State<AppState>,
    body: Result<Json<EstimateBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(_) => return StatusCode::UNPROCESSABLE_ENTITY.into_response(),
    };
    match state
        .estimator
        .estimate(&body.repair_type, &body.user_id, body.location)
        .await
    {
        Ok(cost) => Json(CostResponse::from(cost)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct UserQuery {
    #[serde(rename = "userID")]
    user_id: String,
}

async fn get_cost(
    State(state): State<AppState>,
    Path(cost_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Response {
    match state.estimator.cost_for_user(&cost_id, &query.user_id).await {
        Ok(cost) => Json(CostResponse::from(cost)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_repair(State(state): State<AppState>, Path(repair_id): Path<String>) -> Response {
    match state.store.repair(&repair_id).await {
        Ok(Some(repair)) => Json(RepairResponse::from(repair)).into_response(),
        Ok(None) => error_response(RepairError::NotFound),
        Err(err) => error_response(err.into()),
    }
}

async fn list_repairs(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    match state.store.repairs_for_user(&query.user_id).await {
        Ok(repairs) => Json(
            repairs
                .into_iter()
                .map(RepairResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => error_response(err.into()),
    }
}

#[derive(Deserialize)]
struct UpdateRepairBody {
    status: String,
}

async fn update_repair(
    State(state): State<AppState>,
    Path(repair_id): Path<String>,
    body: Result<Json<UpdateRepairBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(_) => return StatusCode::UNPROCESSABLE_ENTITY.into_response(),
    };
    match state.commands.update_repair(&repair_id, &body.status).await {
        Ok(repair) => {
            state.hub.broadcast(&StatusUpdate {
                repair_id: repair.id.clone(),
                user_id: repair.user_id.clone(),
                status: repair.status.to_string(),
            });
            Json(RepairResponse::from(repair)).into_response()
        }
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
struct WsQuery {
    #[serde(rename = "userID")]
    user_id: String,
}

async fn websocket(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    upgrade: WebSocketUpgrade,
) -> Response {
    if query.user_id.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let hub = state.hub.clone();
    upgrade.on_upgrade(move |socket| ws::client_session(hub, query.user_id, socket))
}

fn error_response(err: RepairError) -> Response {
    let status = match &err {
        RepairError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RepairError::NotFound => StatusCode::NOT_FOUND,
        RepairError::Upstream(_) => StatusCode::BAD_GATEWAY,
        RepairError::Storage(_) | RepairError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

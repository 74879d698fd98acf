// HBNB - HTTP layer
// Thin axum routes over the same Storage contract the console uses

use crate::entities::{related, Entity, EntityClass, PROTECTED};
use crate::errors::{HbnbError, Missing};
use crate::storage::Storage;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    storage: Arc<Mutex<Box<dyn Storage>>>,
}

impl AppState {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn Storage>>, ApiError> {
        self.storage
            .lock()
            .map_err(|_| ApiError(HbnbError::backend("lock", "storage mutex poisoned")))
    }
}

/// HbnbError rendered as `{"error": "..."}` with a matching status
pub struct ApiError(HbnbError);

impl From<HbnbError> for ApiError {
    fn from(err: HbnbError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            HbnbError::MissingArgument(_) | HbnbError::UnknownClass(_) => StatusCode::BAD_REQUEST,
            HbnbError::NotFound(_) => StatusCode::NOT_FOUND,
            HbnbError::Backend { .. } | HbnbError::Config(_) => {
                error!(error = %self.0, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Resolve a path segment by table name (`states`) or class name (`State`)
fn class_from_path(segment: &str) -> Result<EntityClass, HbnbError> {
    EntityClass::ALL
        .iter()
        .copied()
        .find(|c| c.table() == segment)
        .or_else(|| EntityClass::from_name(segment))
        .ok_or_else(|| HbnbError::UnknownClass(segment.to_string()))
}

fn fetch(storage: &dyn Storage, class: EntityClass, id: &str) -> Result<Entity, HbnbError> {
    storage
        .get(class, id)?
        .ok_or_else(|| HbnbError::NotFound(crate::entities::registry_key(class, id)))
}

// ============================================================================
// Plain-text routes
// ============================================================================

async fn hello() -> &'static str {
    "Hello HBNB!"
}

async fn hbnb() -> &'static str {
    "HBNB"
}

async fn c_route(Path(text): Path<String>) -> String {
    format!("C {}", text.replace('_', " "))
}

async fn python_default() -> String {
    "Python is cool".to_string()
}

async fn python_route(Path(text): Path<String>) -> String {
    format!("Python {}", text.replace('_', " "))
}

async fn number_route(Path(n): Path<String>) -> Response {
    if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) {
        format!("{} is a number", n).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

// ============================================================================
// API routes
// ============================================================================

/// GET /api/v1/:class
async fn list_entities(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> ApiResult<Json<Vec<Map<String, Value>>>> {
    let class = class_from_path(&class)?;
    let storage = state.lock()?;
    let dicts = storage
        .all(Some(class.name()))?
        .values()
        .map(Entity::to_dict)
        .collect();
    Ok(Json(dicts))
}

/// GET /api/v1/:class/:id
async fn get_entity(
    State(state): State<AppState>,
    Path((class, id)): Path<(String, String)>,
) -> ApiResult<Json<Map<String, Value>>> {
    let class = class_from_path(&class)?;
    let storage = state.lock()?;
    Ok(Json(fetch(&**storage, class, &id)?.to_dict()))
}

/// POST /api/v1/:class
async fn create_entity(
    State(state): State<AppState>,
    Path(class): Path<String>,
    body: Option<Json<Map<String, Value>>>,
) -> ApiResult<(StatusCode, Json<Map<String, Value>>)> {
    let class = class_from_path(&class)?;
    let Json(mut body) = body.ok_or(HbnbError::MissingArgument(Missing::Value))?;
    // Clients never choose identity or timestamps
    for key in PROTECTED {
        body.remove(key);
    }

    let mut entity = Entity::construct(class, &body)?;
    let mut storage = state.lock()?;
    entity.persist(&mut **storage)?;
    Ok((StatusCode::CREATED, Json(entity.to_dict())))
}

/// DELETE /api/v1/:class/:id
async fn delete_entity(
    State(state): State<AppState>,
    Path((class, id)): Path<(String, String)>,
) -> ApiResult<Json<Map<String, Value>>> {
    let class = class_from_path(&class)?;
    let mut storage = state.lock()?;
    let entity = fetch(&**storage, class, &id)?;
    entity.delete(&mut **storage)?;
    Ok(Json(Map::new()))
}

/// GET /api/v1/states/:id/cities
async fn state_cities(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Map<String, Value>>>> {
    let storage = state.lock()?;
    let parent = fetch(&**storage, EntityClass::State, &id)?;
    let cities = related(&**storage, &parent, EntityClass::City, "state_id")?;
    Ok(Json(cities.iter().map(Entity::to_dict).collect()))
}

/// Build the full router
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/states/:id/cities", get(state_cities))
        .route("/:class", get(list_entities).post(create_entity))
        .route("/:class/:id", get(get_entity).delete(delete_entity))
        .with_state(state);

    Router::new()
        .route("/", get(hello))
        .route("/hbnb", get(hbnb))
        .route("/c/:text", get(c_route))
        .route("/python/", get(python_default))
        .route("/python/:text", get(python_route))
        .route("/number/:n", get(number_route))
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
}

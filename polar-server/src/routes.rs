//! # routes
//!
//! HTTP surface over the table registry:
//!
//! | method | path                   | |
//! |--------|------------------------|-|
//! | GET    | `/polarTables`         | every table, `{ "polars": { "<uuid>": table } }` |
//! | GET    | `/polarTables/active`  | the active table |
//! | PUT    | `/polarTables/active`  | select the active table, `{ "id": "<uuid>" }` |
//! | POST   | `/polarTables`         | import a table from CSV/`.pol` text |
//! | GET    | `/polarTables/:id`     | one table |
//! | DELETE | `/polarTables/:id`     | drop a table from registry and store |
//! | GET    | `/performance`         | result of the last performance tick |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use polar_engine::{build_table, ImportOptions, PerformanceOutput, PolarTable};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppContext;

type ApiResult<T> = Result<T, ApiError>;

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/polarTables", get(list_tables).post(import_table))
        .route("/polarTables/active", get(active_table).put(select_active))
        .route("/polarTables/:id", get(get_table).delete(delete_table))
        .route("/performance", get(performance))
        .with_state(ctx)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn list_tables(State(ctx): State<AppContext>) -> ApiResult<Json<Value>> {
    let state = ctx.state.read().await;
    let mut polars = Map::new();
    for table in state.engine.registry().list() {
        polars.insert(table.id.to_string(), serde_json::to_value(&*table).map_err(internal)?);
    }
    Ok(Json(json!({ "polars": polars })))
}

async fn active_table(State(ctx): State<AppContext>) -> ApiResult<Json<PolarTable>> {
    let state = ctx.state.read().await;
    state
        .engine
        .registry()
        .active()
        .map(|t| Json(PolarTable::clone(&t)))
        .ok_or_else(|| ApiError::NotFound("no active polar table".to_string()))
}

#[derive(Debug, Deserialize)]
struct SelectActive {
    id: Uuid,
}

async fn select_active(
    State(ctx): State<AppContext>,
    Json(body): Json<SelectActive>,
) -> ApiResult<StatusCode> {
    let mut state = ctx.state.write().await;
    state.engine.registry_mut().set_active(body.id)?;
    info!("Active polar set to {}", body.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_table(State(ctx): State<AppContext>, Path(id): Path<Uuid>) -> ApiResult<Json<PolarTable>> {
    let state = ctx.state.read().await;
    state
        .engine
        .registry()
        .get(id)
        .map(|t| Json(PolarTable::clone(&t)))
        .ok_or_else(|| ApiError::NotFound(format!("polar table {id} not found")))
}

async fn delete_table(State(ctx): State<AppContext>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let mut state = ctx.state.write().await;
    if state.engine.registry().dynamic_id() == Some(id) {
        return Err(ApiError::Conflict("the dynamic polar cannot be deleted".to_string()));
    }
    if !state.engine.registry().contains(id) {
        return Err(ApiError::NotFound(format!("polar table {id} not found")));
    }

    // disk first: a failed delete leaves the table in place on both sides
    let store = ctx.store.clone();
    tokio::task::spawn_blocking(move || store.delete(id))
        .await
        .map_err(internal)??;

    if let Some(removed) = state.engine.registry_mut().remove(id) {
        info!("Deleted polar {} ({id})", removed.name);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ImportRequest {
    name: String,
    #[serde(default)]
    description: String,
    id: Option<Uuid>,
    csv: String,
    #[serde(flatten)]
    options: ImportOptions,
}

async fn import_table(
    State(ctx): State<AppContext>,
    Json(req): Json<ImportRequest>,
) -> ApiResult<(StatusCode, Json<PolarTable>)> {
    let id = req.id.unwrap_or_else(Uuid::new_v4);
    let table = build_table(id, &req.name, &req.description, &req.csv, &req.options)?;

    // hold the lock across the save so a concurrent import of the same id cannot interleave
    let mut state = ctx.state.write().await;
    if state.engine.registry().dynamic_id() == Some(id) {
        return Err(ApiError::Conflict("cannot import over the dynamic polar".to_string()));
    }

    let store = ctx.store.clone();
    let saved = table.clone();
    tokio::task::spawn_blocking(move || store.save(saved.id, &saved))
        .await
        .map_err(internal)??;

    let registry = state.engine.registry_mut();
    let replaced = registry.insert(table.clone()).is_some();
    if registry.active_id().is_none() {
        registry.set_active(id)?;
    }
    info!(
        "{} polar {} ({id}) with {} data points",
        if replaced { "Replaced" } else { "Imported" },
        table.name,
        table.data_points()
    );
    Ok((StatusCode::CREATED, Json(table)))
}

async fn performance(State(ctx): State<AppContext>) -> Json<PerformanceOutput> {
    Json(ctx.state.read().await.latest.unwrap_or_default())
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use polar_engine::{DynamicUpdater, GateConfig, GridSpec, MemoryStore, StoreError, TableRegistry, TableStore};
    use tower::ServiceExt;

    use crate::engine::PolarEngine;
    use crate::state::AppState;

    /// Store whose deletes always fail.
    struct ReadOnlyStore(MemoryStore);

    impl TableStore for ReadOnlyStore {
        fn load(&self, id: Uuid) -> Result<Option<PolarTable>, StoreError> {
            self.0.load(id)
        }
        fn save(&self, id: Uuid, table: &PolarTable) -> Result<(), StoreError> {
            self.0.save(id, table)
        }
        fn list_tables(&self) -> Result<Vec<PolarTable>, StoreError> {
            self.0.list_tables()
        }
        fn delete(&self, _id: Uuid) -> Result<bool, StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    fn context() -> (AppContext, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let (ctx, dynamic_id) = context_with(store.clone());
        (ctx, store, dynamic_id)
    }

    fn context_with(store: Arc<dyn TableStore>) -> (AppContext, Uuid) {
        let grid = GridSpec::new(4.0, 15.0, 1.0).unwrap();
        let dynamic = grid.empty_table(Uuid::new_v4(), "dynamicPolar", "");
        let dynamic_id = dynamic.id;
        let mut registry = TableRegistry::new();
        registry.set_dynamic(dynamic);

        let engine = PolarEngine::new(registry, GateConfig::default(), Some(DynamicUpdater::new(grid)), "polar-server");
        (AppContext::new(AppState::new(engine), store), dynamic_id)
    }

    async fn send(ctx: &AppContext, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                request = request.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = router(ctx.clone()).oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn import_body() -> Value {
        json!({
            "name": "Design",
            "csv": "twa/tws;5;10\n45;4.0;6.0\n150;5.0;7.0",
            "windSpeedUnit": "ms",
            "boatSpeedUnit": "ms",
        })
    }

    #[tokio::test]
    async fn test_import_then_list_and_fetch() {
        let (ctx, store, dynamic_id) = context();

        let (status, table) = send(&ctx, Method::POST, "/polarTables", Some(import_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(table["name"], "Design");
        assert_eq!(table["windData"][0]["trueWindSpeed"], 5.0);
        let id: Uuid = serde_json::from_value(table["id"].clone()).unwrap();
        assert!(store.load(id).unwrap().is_some());

        let (status, all) = send(&ctx, Method::GET, "/polarTables", None).await;
        assert_eq!(status, StatusCode::OK);
        let polars = all["polars"].as_object().unwrap();
        assert_eq!(polars.len(), 2);
        assert!(polars.contains_key(&id.to_string()));
        assert!(polars.contains_key(&dynamic_id.to_string()));

        let (status, one) = send(&ctx, Method::GET, &format!("/polarTables/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(one["windData"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_error_is_bad_request() {
        let (ctx, _, _) = context();
        let body = json!({ "name": "Broken", "csv": "twa/tws;5;10\n45;4.0" });
        let (status, err) = send(&ctx, Method::POST, "/polarTables", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(err["error"].as_str().unwrap().contains("row 2"));
    }

    #[tokio::test]
    async fn test_import_over_dynamic_is_refused() {
        let (ctx, _, dynamic_id) = context();
        let mut body = import_body();
        body["id"] = json!(dynamic_id);
        let (status, _) = send(&ctx, Method::POST, "/polarTables", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_active_selection() {
        let (ctx, _, dynamic_id) = context();

        let (status, _) = send(&ctx, Method::GET, "/polarTables/active", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            send(&ctx, Method::PUT, "/polarTables/active", Some(json!({ "id": Uuid::new_v4() }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&ctx, Method::PUT, "/polarTables/active", Some(json!({ "id": dynamic_id }))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, active) = send(&ctx, Method::GET, "/polarTables/active", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(active["name"], "dynamicPolar");
    }

    #[tokio::test]
    async fn test_delete() {
        let (ctx, store, dynamic_id) = context();
        let (_, table) = send(&ctx, Method::POST, "/polarTables", Some(import_body())).await;
        let id = table["id"].as_str().unwrap().to_string();

        let (status, _) = send(&ctx, Method::DELETE, &format!("/polarTables/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(store.list_tables().unwrap().is_empty());

        let (status, _) = send(&ctx, Method::GET, &format!("/polarTables/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&ctx, Method::DELETE, &format!("/polarTables/{dynamic_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_failed_store_delete_keeps_table() {
        let (ctx, _) = context_with(Arc::new(ReadOnlyStore(MemoryStore::new())));
        let (status, table) = send(&ctx, Method::POST, "/polarTables", Some(import_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = table["id"].as_str().unwrap().to_string();

        let (status, _) = send(&ctx, Method::DELETE, &format!("/polarTables/{id}"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, one) = send(&ctx, Method::GET, &format!("/polarTables/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(one["name"], "Design");

        let (status, _) = send(&ctx, Method::DELETE, &format!("/polarTables/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_performance_before_first_tick() {
        let (ctx, _, _) = context();
        let (status, perf) = send(&ctx, Method::GET, "/performance", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(perf["polarSpeed"].is_null());
    }
}

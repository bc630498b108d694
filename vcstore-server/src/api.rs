use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use vcstore_core::{
    CommitSummary, Committer, Credential, Error, ObjectDiff, ObjectStore, RemoteConfig,
    SecretStore, StatusSnapshot,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ObjectStore>,
    pub secrets: Arc<dyn SecretStore>,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/uncommitted", get(list_uncommitted))
        .route("/uncommitted/count", get(count_uncommitted))
        .route("/sync", post(trigger_sync))
        .route("/discard", post(discard))
        .route("/credential", put(set_credential))
        .route("/push", post(request_push))
        .route("/committer", get(get_committer))
        .route("/remote", get(get_remote))
        .route("/objects", get(list_objects).post(create_object))
        .route(
            "/objects/*id",
            get(get_object).put(update_object).delete(delete_object),
        )
        .route("/diff/*id", get(diff_object))
        .route("/commits", get(get_commits).post(create_commit))
        .with_state(state)
}

fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::AlreadyExists(_) | Error::LocalChanges(_) => StatusCode::CONFLICT,
        Error::NotFound(_) | Error::RevisionNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidReference(_) | Error::MultiFileReference(_) => StatusCode::BAD_REQUEST,
        Error::LockTimeout | Error::LockContended => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", err);
    }
    (status, err.to_string())
}

async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "ok", "time": chrono::Utc::now()}))
}

async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.store.status())
}

async fn list_uncommitted(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    state
        .store
        .list_uncommitted()
        .await
        .map(Json)
        .map_err(error_response)
}

async fn count_uncommitted(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let count = state
        .store
        .count_uncommitted()
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "count": count })))
}

async fn trigger_sync(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let outcome = state.store.synchronize().await.map_err(error_response)?;
    Ok(Json(json!({
        "outcome": outcome,
        "status": state.store.status(),
    })))
}

#[derive(Deserialize, Default)]
struct DiscardRequest {
    ids: Option<Vec<String>>,
}

async fn discard(
    State(state): State<AppState>,
    body: Option<Json<DiscardRequest>>,
) -> ApiResult<Json<Value>> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let discarded = match request.ids {
        Some(ids) => state.store.discard(&ids).await,
        None => state.store.discard_all().await,
    }
    .map_err(error_response)?;
    Ok(Json(json!({ "discarded": discarded })))
}

#[derive(Deserialize)]
struct CredentialRequest {
    identity: String,
    secret: Option<String>,
    format: Option<String>,
    #[serde(default)]
    persist: bool,
}

async fn set_credential(
    State(state): State<AppState>,
    Json(req): Json<CredentialRequest>,
) -> ApiResult<StatusCode> {
    let mut credential = Credential::new(req.identity);
    credential.secret = req.secret.filter(|s| !s.is_empty());
    credential.format = req.format;

    if req.persist {
        let key = state.store.remote_config().url;
        state
            .secrets
            .set_secret(&key, credential.secret.as_deref())
            .map_err(error_response)?;
    }

    info!(identity = %credential.identity, persist = req.persist, "credential updated");
    state.store.set_credential(Some(credential));
    Ok(StatusCode::NO_CONTENT)
}

async fn request_push(State(state): State<AppState>) -> impl IntoResponse {
    state.store.request_deferred_push();
    (StatusCode::ACCEPTED, Json(json!({ "deferred": true })))
}

async fn get_committer(State(state): State<AppState>) -> Json<Committer> {
    Json(state.store.committer())
}

async fn get_remote(State(state): State<AppState>) -> Json<RemoteConfig> {
    Json(state.store.remote_config())
}

#[derive(Deserialize)]
struct ScopeQuery {
    scope: Option<String>,
}

async fn list_objects(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let scope = query.scope.unwrap_or_else(|| ".".to_string());
    state
        .store
        .list_ids(&scope)
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct CreateObjectRequest {
    id: String,
    data: Value,
}

async fn create_object(
    State(state): State<AppState>,
    Json(req): Json<CreateObjectRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let reference = req.id.trim_matches('/');
    state
        .store
        .create(&req.data, reference, &[])
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(req.data)))
}

#[derive(Deserialize)]
struct RevisionQuery {
    rev: Option<String>,
}

async fn get_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RevisionQuery>,
) -> ApiResult<Json<Value>> {
    let found = match query.rev {
        Some(rev) => state.store.read_version(&id, &rev).await,
        None => state.store.read(&id, &[]),
    }
    .map_err(error_response)?;

    found
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Object not found: {}", id)))
}

async fn update_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(data): Json<Value>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .update(&id, &data, &[])
        .map_err(error_response)?;
    Ok(Json(data))
}

async fn delete_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete(&id).map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn diff_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RevisionQuery>,
) -> ApiResult<Json<ObjectDiff>> {
    let rev = query.rev.unwrap_or_else(|| "HEAD".to_string());
    state
        .store
        .diff(&id, &rev)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_commits(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<CommitSummary>>> {
    state
        .store
        .history(query.limit.unwrap_or(50))
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct CreateCommitRequest {
    ids: Option<Vec<String>>,
    message: String,
    #[serde(default)]
    removing: bool,
}

async fn create_commit(
    State(state): State<AppState>,
    Json(req): Json<CreateCommitRequest>,
) -> ApiResult<Json<Value>> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Commit message is empty".to_string()));
    }

    let committed = match &req.ids {
        Some(ids) => state.store.commit(ids, &req.message, req.removing).await,
        None => state.store.commit_all(&req.message, req.removing).await,
    }
    .map_err(error_response)?;

    Ok(Json(json!({ "committed": committed })))
}

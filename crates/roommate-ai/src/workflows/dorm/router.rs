use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{DormId, JoinRequestId, JoinRequestView, JoinSubmission};
use super::layout::DormLayout;
use super::repository::{DormRepository, RepositoryError};
use super::service::{DormAllocationService, DormServiceError};
use crate::workflows::allocation::{AdvisoryOracle, ApplicantId};

/// Body of a reject call: the user acting on the request.
#[derive(Debug, Clone, Deserialize)]
pub struct RejectPayload {
    pub user_id: u64,
}

/// Query string naming the user behind a read.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ActingUser {
    pub user_id: u64,
}

/// Body of a dorm registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDormPayload {
    pub name: String,
    pub creator_user_id: u64,
    #[serde(flatten)]
    pub layout: DormLayout,
}

/// Router builder exposing dorm registration, join-request tracking and allocation runs.
pub fn dorm_router<R, O>(service: Arc<DormAllocationService<R, O>>) -> Router
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    Router::new()
        .route("/api/v1/dorms", post(register_handler::<R, O>))
        .route(
            "/api/v1/dorms/:dorm_id/requests",
            post(submit_handler::<R, O>).get(pending_handler::<R, O>),
        )
        .route(
            "/api/v1/dorms/:dorm_id/requests/status",
            get(request_status_handler::<R, O>),
        )
        .route(
            "/api/v1/requests/:request_id/reject",
            post(reject_handler::<R, O>),
        )
        .route(
            "/api/v1/dorms/:dorm_id/allocations",
            post(allocate_handler::<R, O>),
        )
        .route(
            "/api/v1/dorms/:dorm_id/occupancy",
            get(occupancy_handler::<R, O>),
        )
        .with_state(service)
}

/// HTTP status for a service failure.
pub fn status_for(error: &DormServiceError) -> StatusCode {
    match error {
        DormServiceError::Layout(_)
        | DormServiceError::CreatorCannotApply
        | DormServiceError::NoPendingRequests(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DormServiceError::DormNotFound(_) | DormServiceError::RequestNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        DormServiceError::DuplicatePendingRequest | DormServiceError::RequestNotPending(_) => {
            StatusCode::CONFLICT
        }
        DormServiceError::NotDormCreator => StatusCode::FORBIDDEN,
        DormServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        DormServiceError::Repository(
            RepositoryError::Conflict | RepositoryError::CapacityExceeded { .. },
        ) => StatusCode::CONFLICT,
        DormServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: DormServiceError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (status_for(&error), axum::Json(payload)).into_response()
}

pub(crate) async fn register_handler<R, O>(
    State(service): State<Arc<DormAllocationService<R, O>>>,
    axum::Json(payload): axum::Json<RegisterDormPayload>,
) -> Response
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    match service.register_dorm(
        payload.name.trim(),
        ApplicantId(payload.creator_user_id),
        payload.layout,
    ) {
        Ok(dorm) => (StatusCode::CREATED, axum::Json(dorm)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, O>(
    State(service): State<Arc<DormAllocationService<R, O>>>,
    Path(dorm_id): Path<u64>,
    axum::Json(submission): axum::Json<JoinSubmission>,
) -> Response
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    match service.submit(DormId(dorm_id), submission) {
        Ok(request) => (StatusCode::ACCEPTED, axum::Json(request.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pending_handler<R, O>(
    State(service): State<Arc<DormAllocationService<R, O>>>,
    Path(dorm_id): Path<u64>,
    Query(acting): Query<ActingUser>,
) -> Response
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    match service.pending(DormId(dorm_id), ApplicantId(acting.user_id)) {
        Ok(requests) => {
            let views: Vec<JoinRequestView> =
                requests.iter().map(|request| request.view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn request_status_handler<R, O>(
    State(service): State<Arc<DormAllocationService<R, O>>>,
    Path(dorm_id): Path<u64>,
    Query(acting): Query<ActingUser>,
) -> Response
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    match service.request_status(DormId(dorm_id), ApplicantId(acting.user_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reject_handler<R, O>(
    State(service): State<Arc<DormAllocationService<R, O>>>,
    Path(request_id): Path<u64>,
    axum::Json(payload): axum::Json<RejectPayload>,
) -> Response
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    match service.reject(JoinRequestId(request_id), ApplicantId(payload.user_id)) {
        Ok(request) => (StatusCode::OK, axum::Json(request.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn allocate_handler<R, O>(
    State(service): State<Arc<DormAllocationService<R, O>>>,
    Path(dorm_id): Path<u64>,
) -> Response
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    match service.allocate(DormId(dorm_id)).await {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn occupancy_handler<R, O>(
    State(service): State<Arc<DormAllocationService<R, O>>>,
    Path(dorm_id): Path<u64>,
) -> Response
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    match service.occupancy(DormId(dorm_id)) {
        Ok(map) => {
            let payload = json!({
                "dorm_id": dorm_id,
                "occupancy": map,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

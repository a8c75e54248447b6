use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    pipeline::{AddExperience, RemoveExperience},
    session::Session,
    state::AppState,
};

pub async fn pipeline_handler(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let pipeline = state.pipelines.get_pipeline(&session, &id).await?;

    Ok((StatusCode::OK, Json(pipeline)))
}

pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    payload: Result<Json<AddExperience>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|_| AppError::MalformedPayload)?;
    let profile = state.pipelines.add_experience(&session, &id, request).await?;

    Ok((StatusCode::OK, Json(profile)))
}

pub async fn remove_handler(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    payload: Result<Json<RemoveExperience>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|_| AppError::MalformedPayload)?;
    let profile = state.pipelines.remove_experience(&session, &id, request).await?;

    Ok((StatusCode::OK, Json(profile)))
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(query): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profiles = state.pipelines.search_by_company(&session, &query).await?;

    if profiles.is_empty() {
        return Err(AppError::NoResults);
    }

    Ok((StatusCode::OK, Json(profiles)))
}

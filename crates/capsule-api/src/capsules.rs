use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use capsule_db::OpenOutcome;
use capsule_types::api::{
    CapsuleView, CreateCapsuleResponse, OpenCapsuleResponse, PositionRequest, UnlockCheckResponse,
};
use capsule_types::models::{NewCapsule, RequestContext};
use capsule_unlock::evaluate;

use crate::error::ApiError;
use crate::media::{MediaStore, check_attachable};
use crate::state::{AppState, blocking};

/// POST /capsules
pub async fn create_capsule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<NewCapsule>,
) -> Result<impl IntoResponse, ApiError> {
    let id = blocking(&state, move |s| {
        check_attachable(&s.db, &ctx, &req.media_urls)?;
        let creator_name = Some(ctx.username.clone());
        Ok(s.store.create(&ctx, creator_name, req)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CreateCapsuleResponse { id })))
}

/// GET /capsules: the caller's capsules, newest first.
pub async fn list_capsules(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let capsules = blocking(&state, move |s| Ok(s.store.list_by_user(ctx.user_id)?)).await?;

    let views: Vec<CapsuleView> = capsules.into_iter().map(CapsuleView::from).collect();
    Ok(Json(views))
}

/// GET /capsules/{capsule_id}
pub async fn get_capsule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(capsule_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let capsule = blocking(&state, move |s| Ok(s.store.get_owned(&ctx, capsule_id)?)).await?;
    Ok(Json(CapsuleView::from(capsule)))
}

/// A request without a JSON body carries no position.
fn position_or_default(body: Option<Json<PositionRequest>>) -> PositionRequest {
    body.map(|Json(req)| req).unwrap_or_default()
}

/// POST /capsules/{capsule_id}/check: would opening succeed right now?
/// Read-only.
pub async fn check_capsule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(capsule_id): Path<Uuid>,
    body: Option<Json<PositionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let req = position_or_default(body);
    let decision = blocking(&state, move |s| {
        let capsule = s.store.get_owned(&ctx, capsule_id)?;
        Ok(evaluate(&capsule, req.position(), s.store.now()))
    })
    .await?;

    Ok(Json(UnlockCheckResponse {
        can_open: decision.can_open,
        message: decision.message,
    }))
}

/// POST /capsules/{capsule_id}/open: evaluate, then perform the one-way
/// transition. Opening an already opened capsule succeeds with
/// `transitioned: false` unless the caller sets `expect_sealed`.
pub async fn open_capsule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(capsule_id): Path<Uuid>,
    body: Option<Json<PositionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let req = position_or_default(body);
    let (outcome, message, capsule) = blocking(&state, move |s| {
        let capsule = s.store.get_owned(&ctx, capsule_id)?;
        let decision = evaluate(&capsule, req.position(), s.store.now());
        if !decision.can_open {
            warn!("Capsule {} still locked for {}: {}", capsule_id, ctx.user_id, decision.message);
            return Err(ApiError::Locked(decision.message));
        }

        let outcome = s.store.open(capsule_id)?;
        if req.expect_sealed {
            outcome.require_transition()?;
        }

        let capsule = match outcome {
            OpenOutcome::Transitioned { .. } => s.store.get(capsule_id)?,
            OpenOutcome::AlreadyOpened if capsule.is_opened() => capsule,
            // Opened by a concurrent request between our read and update.
            OpenOutcome::AlreadyOpened => s.store.get(capsule_id)?,
        };
        Ok((outcome, decision.message, capsule))
    })
    .await?;

    let opened_at = capsule.status.opened_at();
    Ok(Json(OpenCapsuleResponse {
        transitioned: outcome.transitioned(),
        opened_at,
        message,
        capsule: CapsuleView::from(capsule),
    }))
}

/// DELETE /capsules/{capsule_id}: removes the record, then releases the
/// caller's media that no other capsule still references.
pub async fn delete_capsule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(capsule_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = ctx.user_id;
    let removed = blocking(&state, move |s| Ok(s.store.delete_owned(&ctx, capsule_id)?)).await?;

    let urls = removed.media_urls;
    let released = blocking(&state, move |s| {
        let mut released = Vec::new();
        for url in &urls {
            if let Some(id) = MediaStore::id_from_url(url) {
                if s.db.release_media(id, owner, url)? {
                    released.push(id);
                }
            }
        }
        Ok(released)
    })
    .await
    .unwrap_or_else(|e| {
        // The record is already gone; leftover blobs are logged, not fatal.
        warn!("Failed to release media of capsule {}: {}", capsule_id, e);
        Vec::new()
    });

    for id in &released {
        if let Err(e) = state.media.remove(*id).await {
            warn!("Failed to remove media {} of capsule {}: {:#}", id, capsule_id, e);
        }
    }

    info!("Capsule {} removed, {} media released", capsule_id, released.len());
    Ok(StatusCode::NO_CONTENT)
}

use crate::api::{Data, LikeCreated, LikeDeleted};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use skillnet::domain::{CountScope, CurrentUser, PostId};
use tracing::info;

/// POST /auth/likes/{post_id}
pub async fn like_post(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<PostId>,
) -> Result<(StatusCode, Json<Data<LikeCreated>>), ApiError> {
    info!("LIKE: post={}, user={}", post_id, user.user_id);

    let post = state.engagement.post_owner(post_id).await?;
    let like = state.engagement.create_like(&user.user_id, post_id).await?;
    let like_count = state
        .counters
        .set_cache_val(CountScope::Likes, post_id)
        .await?;

    state.notifier.notify_like(&user, &post).await;

    Ok((
        StatusCode::CREATED,
        Json(Data::new(LikeCreated {
            like,
            like_count,
        })),
    ))
}

/// DELETE /auth/likes/{post_id}
pub async fn unlike_post(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(post_id): Path<PostId>,
) -> Result<Json<Data<LikeDeleted>>, ApiError> {
    info!("UNLIKE: post={}, user={}", post_id, user.user_id);

    state.engagement.delete_like(&user.user_id, post_id).await?;
    let like_count = state
        .counters
        .set_cache_val(CountScope::Likes, post_id)
        .await?;

    Ok(Json(Data::new(LikeDeleted { like_count })))
}

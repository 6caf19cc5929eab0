use crate::api::{Data, PostCounts, PostCreated};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use skillnet::domain::{CountScope, CurrentUser, PostId};

/// POST /auth/posts
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<(StatusCode, Json<Data<PostCreated>>), ApiError> {
    let post = state.engagement.create_post(&user.user_id).await?;
    Ok((StatusCode::CREATED, Json(Data::new(PostCreated { post }))))
}

/// GET /auth/posts/{post_id}/counts
pub async fn post_counts(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
) -> Result<Json<Data<PostCounts>>, ApiError> {
    let (like_count, comment_count) = tokio::try_join!(
        state.counters.get_cache_val(CountScope::Likes, post_id),
        state.counters.get_cache_val(CountScope::Comments, post_id),
    )?;

    Ok(Json(Data::new(PostCounts {
        post_id,
        like_count,
        comment_count,
    })))
}

use crate::api::{CommentCreated, CommentDeleted, CommentQuery, Data, NewComment};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use skillnet::domain::{CommentId, CountScope, CurrentUser};
use tracing::info;

/// POST /auth/comments?post={post_id}
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<CommentQuery>,
    Json(body): Json<NewComment>,
) -> Result<(StatusCode, Json<Data<CommentCreated>>), ApiError> {
    info!("COMMENT: post={}, user={}", query.post, user.user_id);

    let post = state.engagement.post_owner(query.post).await?;
    let comment = state
        .engagement
        .create_comment(&user.user_id, query.post, &body.text)
        .await?;
    let comment_count = state
        .counters
        .set_cache_val(CountScope::Comments, query.post)
        .await?;

    state.notifier.notify_comment(&user, &post, comment.id).await;

    Ok((
        StatusCode::CREATED,
        Json(Data::new(CommentCreated {
            comment,
            comment_count,
        })),
    ))
}

/// DELETE /auth/comments/{comment_id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(comment_id): Path<CommentId>,
) -> Result<Json<Data<CommentDeleted>>, ApiError> {
    info!("UNCOMMENT: comment={}, user={}", comment_id, user.user_id);

    let post_id = state
        .engagement
        .delete_comment(&user.user_id, comment_id)
        .await?;
    let comment_count = state
        .counters
        .set_cache_val(CountScope::Comments, post_id)
        .await?;

    Ok(Json(Data::new(CommentDeleted { comment_count })))
}

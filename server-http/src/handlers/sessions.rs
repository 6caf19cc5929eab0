use crate::api::{Data, IssueSessionRequest, SessionIssued, SessionsRevoked};
use crate::error::ApiError;
use crate::middleware::BearerToken;
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use shared::Error;
use skillnet::domain::CurrentUser;
use tracing::info;

pub const SESSION_SECRET_HEADER: &str = "x-session-secret";

/// POST /sessions
///
/// Called by the service that owns user accounts once it has authenticated
/// someone. The shared secret stands in for that trust relationship.
pub async fn issue_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IssueSessionRequest>,
) -> Result<(StatusCode, Json<Data<SessionIssued>>), ApiError> {
    let presented = headers
        .get(SESSION_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(state.config.session_secret.as_str()) {
        return Err(Error::Unauthorized.into());
    }

    let session = state
        .sessions
        .issue(CurrentUser {
            user_id: req.user_id,
            username: req.username,
        })
        .await?;
    info!("Issued session for user '{}'", session.user.user_id);

    Ok((
        StatusCode::CREATED,
        Json(Data::new(SessionIssued {
            token: session.token,
            expires_at: session.expires_at,
            user: session.user,
        })),
    ))
}

/// DELETE /auth/sessions
///
/// Logout: ends the session the request was made with.
pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<Json<Data<SessionsRevoked>>, ApiError> {
    let revoked = usize::from(state.sessions.invalidate(&token).await?);
    info!("User '{}' logged out", user.user_id);

    Ok(Json(Data::new(SessionsRevoked { revoked })))
}

/// DELETE /auth/sessions/all
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Data<SessionsRevoked>>, ApiError> {
    let revoked = state.sessions.invalidate_user(&user.user_id).await?;
    info!("Ended {} session(s) for user '{}'", revoked, user.user_id);

    Ok(Json(Data::new(SessionsRevoked { revoked })))
}

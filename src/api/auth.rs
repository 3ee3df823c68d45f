use crate::api::AppState;
use crate::api::cookies::{self, REFRESH_COOKIE};
use crate::api::middleware::AuthUser;
use crate::api::schemas::{ChangePassword, Login, Message, Registration};
use crate::error::{AppError, Result};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<Login>,
) -> Result<impl IntoResponse> {
    let session = state.auth_service.login(payload.username, payload.password).await?;
    let jar = cookies::write_session(jar, &session, &state.config.auth);
    Ok((jar, Json(Message::new("Login successful"))))
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<Registration>,
) -> Result<impl IntoResponse> {
    let session = state.auth_service.register(payload.username, payload.password).await?;
    let jar = cookies::write_session(jar, &session, &state.config.auth);
    Ok((StatusCode::CREATED, jar, Json(Message::new("Registration successful"))))
}

pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let refresh_token =
        jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()).ok_or(AppError::MissingToken)?;

    let session = state.auth_service.refresh_session(refresh_token).await?;
    let jar = cookies::write_session(jar, &session, &state.config.auth);
    Ok((jar, Json(Message::new("Token refreshed successfully"))))
}

/// Logout always clears the cookies, even when no server-side record could
/// be identified; a stuck logged-in client is worse than a stray record.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let refresh_token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    state.auth_service.logout(refresh_token).await?;
    let jar = cookies::clear_session(jar);
    Ok((jar, Json(Message::new("Logged out successfully"))))
}

pub async fn logout_all(
    auth_user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    state.auth_service.logout_all(auth_user.user_id).await?;
    let jar = cookies::clear_session(jar);
    Ok((jar, Json(Message::new("Logged out successfully"))))
}

pub async fn change_password(
    auth_user: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ChangePassword>,
) -> Result<impl IntoResponse> {
    state
        .auth_service
        .change_password(auth_user.user_id, payload.current_password, payload.new_password)
        .await?;

    // Every refresh record is gone now; leave no dead cookies behind.
    let jar = cookies::clear_session(jar);
    Ok((jar, Json(Message::new("Password changed successfully"))))
}

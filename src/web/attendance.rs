//! CAPTCHA and attendance handlers — the two halves of the scrape flow.

use axum::Json;
use axum::extract::State;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::portal::{self, AttendanceRecord};
use crate::session::mask_roll_no;
use crate::state::AppState;
use crate::web::error::ApiError;

/// Pause before closing the browser after a scrape, so a user watching the
/// (visible) window sees the final page or the failure.
const CLEANUP_GRACE: Duration = Duration::from_secs(3);

/// Run browser work on its own task.
///
/// The request timeout layer drops the handler future when the deadline
/// fires, and a cancelled future would leave an orphaned Chrome behind.
/// A spawned task keeps running through the quit even when nobody is
/// awaiting it anymore.
async fn detached<F, T>(fut: F) -> Result<T, ApiError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|_| ApiError::internal("Browser task failed"))
}

#[derive(Debug, Deserialize)]
pub struct CaptchaRequest {
    #[serde(default)]
    pub roll_no: String,
}

#[derive(Debug, Serialize)]
pub struct CaptchaResponse {
    pub success: bool,
    pub captcha_base64: String,
    pub session_id: Uuid,
    pub roll_no: String,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub captcha: String,
    #[serde(default)]
    pub year: usize,
    #[serde(default)]
    pub semester: usize,
}

#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    pub success: bool,
    pub data: Vec<AttendanceRecord>,
    pub total_subjects: usize,
}

/// `POST /api/captcha` — open a browser on the login form and return the
/// CAPTCHA image for the human to solve.
pub(super) async fn captcha(
    State(state): State<AppState>,
    Json(req): Json<CaptchaRequest>,
) -> Result<Json<CaptchaResponse>, ApiError> {
    let roll_no = req.roll_no.trim();
    if roll_no.is_empty() {
        return Err(ApiError::bad_request("roll_no required"));
    }

    let config = state.config.clone();
    let roll = roll_no.to_string();
    let challenge = detached(async move { portal::begin_login(&config, &roll).await }).await??;
    let encoded = BASE64_STANDARD.encode(&challenge.image_png);
    let session_id = state.sessions.insert(challenge.driver, roll_no.to_string());

    info!(
        session_id = %session_id,
        roll_no = %mask_roll_no(roll_no),
        "Session created, awaiting CAPTCHA"
    );

    Ok(Json(CaptchaResponse {
        success: true,
        captcha_base64: format!("data:image/png;base64,{encoded}"),
        session_id,
        roll_no: roll_no.to_string(),
    }))
}

/// `POST /api/attendance` — resume the parked session with the solved
/// CAPTCHA, scrape the records, and tear the browser down.
pub(super) async fn attendance(
    State(state): State<AppState>,
    Json(req): Json<AttendanceRequest>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    if req.session_id.is_empty() || req.password.is_empty() || req.captcha.is_empty() {
        return Err(ApiError::bad_request("Missing fields"));
    }

    // An unparseable id is indistinguishable from a swept one to the client
    let session = Uuid::parse_str(&req.session_id)
        .ok()
        .and_then(|id| state.sessions.take(&id))
        .ok_or_else(|| ApiError::bad_request("Session expired"))?;

    info!(
        roll_no = %mask_roll_no(&session.roll_no),
        year = req.year,
        semester = req.semester,
        "Resuming session for attendance scrape"
    );

    let records = detached(async move {
        let result = portal::scrape_attendance(
            &session.driver,
            &req.password,
            &req.captcha,
            req.year,
            req.semester,
        )
        .await;

        tokio::time::sleep(CLEANUP_GRACE).await;
        session.discard().await;
        result
    })
    .await??;

    Ok(Json(AttendanceResponse {
        success: true,
        total_subjects: records.len(),
        data: records,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_detached_work_survives_request_cancellation() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = cleaned.clone();

        let fut = detached(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        // Poll once so the task spawns, then drop the handler-side future,
        // exactly as the timeout layer does when the deadline fires
        tokio::select! {
            biased;
            _ = fut => {}
            _ = std::future::ready(()) => {}
        }

        assert!(!cleaned.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_detached_returns_inner_value() {
        let value = detached(async { 7usize }).await.unwrap();
        assert_eq!(value, 7);
    }
}

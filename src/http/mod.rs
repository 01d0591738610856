//! HTTP interface.
//!
//! JSON endpoints fronting the registration handshake and the auth session.
//! All failure responses share the `{"success": false, "message": ...}`
//! shape; upstream provider rejections pass their status through.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::auth::{AuthError, AuthService};
use crate::kyc::ProfileSummary;
use crate::registration::{
    MedicalProfile, RegisteredUser, RegistrationError, RegistrationService,
};

#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<RegistrationService>,
    pub auth: AuthService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/register-user", post(register_user))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .with_state(state)
}

/// Error shape shared by every endpoint.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "message": self.message }));
        (self.status, body).into_response()
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        let status = match &err {
            RegistrationError::Validation(_)
            | RegistrationError::SessionExpired
            | RegistrationError::MissingVerification
            | RegistrationError::DuplicateUser => StatusCode::BAD_REQUEST,
            RegistrationError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RegistrationError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RegistrationError::Internal(source) => {
                error!("Internal error during registration: {:#}", source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::Validation(_) | AuthError::InvalidRole => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Internal(source) => {
                error!("Internal error during login: {:#}", source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub subject_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub success: bool,
    pub reference_id: String,
    pub subject_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub otp: String,
    #[serde(default)]
    pub reference_id: String,
    #[serde(default)]
    pub subject_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    #[serde(flatten)]
    pub profile: ProfileSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub subject_id: String,
    #[serde(flatten)]
    pub profile: MedicalProfile,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub user: RegisteredUser,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub token: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let dispatch = state
        .registration
        .send_otp(&request.subject_id, &request.password)
        .await?;

    Ok(Json(SendOtpResponse {
        success: true,
        reference_id: dispatch.reference_id,
        subject_id: dispatch.subject_id,
    }))
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .registration
        .verify_otp(
            request.subject_id.as_deref(),
            &request.reference_id,
            &request.otp,
        )
        .await?;

    Ok(Json(VerifyOtpResponse {
        success: true,
        profile,
    }))
}

async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .registration
        .register(&request.subject_id, &request.profile)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            user,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let success = state
        .auth
        .login(&request.id, &request.password, &request.role)
        .await?;

    Ok(Json(LoginResponse {
        success: true,
        token: success.token,
        data: success.data,
    }))
}

// The logout body is optional, so the payload is read leniently.
async fn logout(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    if let Ok(request) = serde_json::from_slice::<LogoutRequest>(&body) {
        if let Some(token) = request.token {
            state.auth.logout(&token);
        }
    }
    Json(json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDirectory;
    use crate::kyc::rate_limit::{RateLimitConfig, RateLimiter};
    use crate::kyc::{KycClient, KycConfig};
    use crate::pending::PendingStore;
    use axum::body::to_bytes;
    use std::time::Duration;

    fn state_for(server: &mockito::ServerGuard) -> AppState {
        let kyc = Arc::new(
            KycClient::new(KycConfig {
                base_url: server.url(),
                api_key: "k".to_string(),
                access_token: "t".to_string(),
                timeout_secs: 5,
            })
            .unwrap(),
        );
        let directory = Arc::new(MemoryDirectory::new());
        let registration = Arc::new(RegistrationService::new(
            kyc,
            PendingStore::new(Duration::from_secs(900)),
            directory.clone(),
            RateLimiter::new(RateLimitConfig {
                max_sends: 10,
                window_secs: 60,
            }),
        ));
        AppState {
            registration,
            auth: AuthService::new(directory, Duration::from_secs(3600)),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_without_verification_yields_400_with_message() {
        let server = mockito::Server::new_async().await;
        let state = state_for(&server);

        let response = register_user(
            State(state),
            Json(RegisterRequest {
                subject_id: "123456789012".to_string(),
                profile: MedicalProfile::default(),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "Missing verification data. Please complete OTP verification first."
        );
    }

    #[tokio::test]
    async fn full_flow_through_handlers() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/kyc/aadhaar/okyc/otp")
            .with_status(200)
            .with_body(r#"{"data":{"reference_id":"R1"}}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/kyc/aadhaar/okyc/otp/verify")
            .with_status(200)
            .with_body(r#"{"data":{"name":"Asha","gender":"F","date_of_birth":"1990-01-01","full_address":"12 MG Road","photo":"p"}}"#)
            .create_async()
            .await;

        let state = state_for(&server);

        let response = send_otp(
            State(state.clone()),
            Json(SendOtpRequest {
                subject_id: "123456789012".to_string(),
                password: "pw1".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["referenceId"], "R1");
        assert_eq!(body["subjectId"], "123456789012");

        let response = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                otp: "111111".to_string(),
                reference_id: "R1".to_string(),
                subject_id: None,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "Asha");

        let response = register_user(
            State(state.clone()),
            Json(RegisterRequest {
                subject_id: "123456789012".to_string(),
                profile: MedicalProfile::default(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["user"]["id"], "0acb574c93");
        assert_eq!(body["user"]["role"], "patient");

        let response = login(
            State(state.clone()),
            Json(LoginRequest {
                id: "0acb574c93".to_string(),
                password: "pw1".to_string(),
                role: "patient".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["name"], "Asha");
        assert!(body["data"].get("password_hash").is_none());
        let token = body["token"].as_str().unwrap().to_string();

        let payload = serde_json::to_vec(&json!({ "token": token })).unwrap();
        let response = logout(State(state.clone()), Bytes::from(payload))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        // An empty body is accepted too.
        let response = logout(State(state), Bytes::new()).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_with_plural_role_is_rejected() {
        let server = mockito::Server::new_async().await;
        let state = state_for(&server);

        let response = login(
            State(state),
            Json(LoginRequest {
                id: "0acb574c93".to_string(),
                password: "pw1".to_string(),
                role: "patients".to_string(),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid role");
    }

    #[tokio::test]
    async fn upstream_status_passes_through() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/kyc/aadhaar/okyc/otp")
            .with_status(503)
            .with_body(r#"{"message":"Provider unavailable"}"#)
            .create_async()
            .await;

        let state = state_for(&server);
        let response = send_otp(
            State(state),
            Json(SendOtpRequest {
                subject_id: "123456789012".to_string(),
                password: "pw1".to_string(),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Provider unavailable");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }
}

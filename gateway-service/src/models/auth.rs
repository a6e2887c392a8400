//! Request/response shapes for the `/api/auth/*` proxy contract.
//!
//! Success bodies pass through from the backend unchanged:
//! `{accessToken, refreshToken, expiresIn, tokenType, user}`. Errors follow a
//! problem-details-like shape.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[validate(required)]
    pub email: Option<String>,
    #[validate(required)]
    pub password: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(required)]
    pub email: Option<String>,
    #[validate(required)]
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(required)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialSignInRequest {
    pub provider: Option<String>,
    /// Preferred field name for the provider-issued credential.
    pub id_token: Option<String>,
    /// Legacy alias kept for older clients.
    pub token: Option<String>,
}

impl SocialSignInRequest {
    pub fn credential(&self) -> Option<&str> {
        self.id_token.as_deref().or(self.token.as_deref())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub object_name: &'static str,
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<Vec<FieldError>>,
}

impl ProblemDetails {
    pub fn new(status: StatusCode, title: &str, detail: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: title.to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            message: message.into(),
            error_code: None,
            field_errors: None,
        }
    }

    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    pub fn with_field_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.field_errors = Some(errors);
        self
    }

    pub fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_details_serializes_contract_fields() {
        let problem = ProblemDetails::new(
            StatusCode::BAD_REQUEST,
            "Bad Request",
            "Email and password are required",
            "Email and password are required",
        );
        let value = serde_json::to_value(&problem).unwrap();
        assert_eq!(value["type"], "about:blank");
        assert_eq!(value["title"], "Bad Request");
        assert_eq!(value["status"], 400);
        assert!(value.get("errorCode").is_none());
    }

    #[test]
    fn social_request_prefers_id_token() {
        let request = SocialSignInRequest {
            provider: Some("google".to_string()),
            id_token: Some("id".to_string()),
            token: Some("legacy".to_string()),
        };
        assert_eq!(request.credential(), Some("id"));
    }

    #[test]
    fn sign_in_without_password_fails_validation() {
        let request = SignInRequest {
            email: Some("a@b.c".to_string()),
            password: None,
            remember_me: false,
        };
        assert!(validator::Validate::validate(&request).is_err());
    }
}

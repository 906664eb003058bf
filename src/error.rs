//! Service error type shared by every layer of the issuer.
//!
//! Each variant is one error kind a caller can act on. Infrastructure faults
//! (database, cipher, transport) are mapped onto these kinds at the boundary
//! where they happen, so nothing above the repository ever sees a diesel or
//! reqwest error.

use std::collections::BTreeMap;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Structured context attached to an error as it travels up the stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorContext {
    pub tags: Vec<String>,
    pub detail: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Why a signing certificate cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateProblem {
    Missing,
    WrongPassword,
    CorruptPayload,
    NotYetValid,
    Expired,
    IntegrityFailure,
}

impl CertificateProblem {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateProblem::Missing => "missing",
            CertificateProblem::WrongPassword => "wrong_password",
            CertificateProblem::CorruptPayload => "corrupt_payload",
            CertificateProblem::NotYetValid => "not_yet_valid",
            CertificateProblem::Expired => "expired",
            CertificateProblem::IntegrityFailure => "integrity_failure",
        }
    }
}

/// What a caller can usefully do after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryHint {
    /// The input is wrong; resubmitting it unchanged fails again.
    FixInput,
    /// The document reached a terminal state; a fresh draft may succeed.
    NewDraft,
    /// Transient condition on our side; the same call may succeed later.
    RetryLater,
    NotRetryable,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{error_message}")]
    ValidationFailed {
        error_message: String,
        context: ErrorContext,
    },

    #[error("{error_message}")]
    NotFound {
        error_message: String,
        context: ErrorContext,
    },

    #[error("{error_message}")]
    StateConflict {
        error_message: String,
        context: ErrorContext,
    },

    #[error("{error_message}")]
    LimitExceeded {
        error_message: String,
        context: ErrorContext,
    },

    #[error("{error_message}")]
    CertificateUnusable {
        problem: CertificateProblem,
        error_message: String,
        context: ErrorContext,
    },

    #[error("{error_message}")]
    GatewayTransport {
        error_message: String,
        context: ErrorContext,
    },

    #[error("[{status_code}] {user_message} - {raw_message}")]
    GatewayRejected {
        status_code: String,
        user_message: String,
        raw_message: String,
        context: ErrorContext,
    },

    #[error("{error_message}")]
    DeadlineExceeded {
        error_message: String,
        context: ErrorContext,
    },

    #[error("{error_message}")]
    InternalServerError {
        error_message: String,
        context: ErrorContext,
    },
}

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::ValidationFailed {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::StateConflict {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        ServiceError::LimitExceeded {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn certificate_unusable(problem: CertificateProblem, message: impl Into<String>) -> Self {
        ServiceError::CertificateUnusable {
            problem,
            error_message: message.into(),
            context: ErrorContext::default().with_metadata("problem", problem.as_str()),
        }
    }

    pub fn gateway_transport(message: impl Into<String>) -> Self {
        ServiceError::GatewayTransport {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn gateway_rejected(
        status_code: impl Into<String>,
        user_message: impl Into<String>,
        raw_message: impl Into<String>,
    ) -> Self {
        ServiceError::GatewayRejected {
            status_code: status_code.into(),
            user_message: user_message.into(),
            raw_message: raw_message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        ServiceError::DeadlineExceeded {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ServiceError::InternalServerError {
            error_message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            ServiceError::ValidationFailed { context, .. }
            | ServiceError::NotFound { context, .. }
            | ServiceError::StateConflict { context, .. }
            | ServiceError::LimitExceeded { context, .. }
            | ServiceError::CertificateUnusable { context, .. }
            | ServiceError::GatewayTransport { context, .. }
            | ServiceError::GatewayRejected { context, .. }
            | ServiceError::DeadlineExceeded { context, .. }
            | ServiceError::InternalServerError { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            ServiceError::ValidationFailed { context, .. }
            | ServiceError::NotFound { context, .. }
            | ServiceError::StateConflict { context, .. }
            | ServiceError::LimitExceeded { context, .. }
            | ServiceError::CertificateUnusable { context, .. }
            | ServiceError::GatewayTransport { context, .. }
            | ServiceError::GatewayRejected { context, .. }
            | ServiceError::DeadlineExceeded { context, .. }
            | ServiceError::InternalServerError { context, .. } => context,
        }
    }

    /// Rebuilds the attached context with `f`.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ErrorContext) -> ErrorContext,
    {
        let current = std::mem::take(self.context_mut());
        *self.context_mut() = f(current);
        self
    }

    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        self.with_context(|ctx| ctx.with_tag(tag))
    }

    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        self.with_context(|ctx| ctx.with_detail(detail))
    }

    pub fn with_metadata(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_context(|ctx| ctx.with_metadata(key, value))
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::ValidationFailed { .. } => "validation_failed",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::StateConflict { .. } => "state_conflict",
            ServiceError::LimitExceeded { .. } => "limit_exceeded",
            ServiceError::CertificateUnusable { .. } => "certificate_unusable",
            ServiceError::GatewayTransport { .. } => "gateway_transport",
            ServiceError::GatewayRejected { .. } => "gateway_rejected",
            ServiceError::DeadlineExceeded { .. } => "deadline_exceeded",
            ServiceError::InternalServerError { .. } => "internal_server_error",
        }
    }

    pub fn retry_hint(&self) -> RetryHint {
        match self {
            ServiceError::ValidationFailed { .. } | ServiceError::NotFound { .. } => {
                RetryHint::FixInput
            }
            ServiceError::CertificateUnusable { .. } => RetryHint::FixInput,
            // The document was recorded as rejected; only a new draft can be submitted.
            ServiceError::GatewayTransport { .. } | ServiceError::GatewayRejected { .. } => {
                RetryHint::NewDraft
            }
            ServiceError::InternalServerError { .. } => RetryHint::RetryLater,
            ServiceError::StateConflict { .. }
            | ServiceError::LimitExceeded { .. }
            | ServiceError::DeadlineExceeded { .. } => RetryHint::NotRetryable,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: String,
    kind: &'static str,
    retry: RetryHint,
    #[serde(skip_serializing_if = "Option::is_none")]
    problem: Option<CertificateProblem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_message: Option<&'a str>,
    context: &'a ErrorContext,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::StateConflict { .. } => StatusCode::CONFLICT,
            ServiceError::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::CertificateUnusable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::GatewayTransport { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::GatewayRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::DeadlineExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, user_message, raw_message) = match self {
            ServiceError::GatewayRejected {
                status_code,
                user_message,
                raw_message,
                ..
            } => (
                Some(status_code.as_str()),
                Some(user_message.as_str()),
                Some(raw_message.as_str()),
            ),
            _ => (None, None, None),
        };
        let problem = match self {
            ServiceError::CertificateUnusable { problem, .. } => Some(*problem),
            _ => None,
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            message: self.to_string(),
            kind: self.kind(),
            retry: self.retry_hint(),
            problem,
            status_code,
            user_message,
            raw_message,
            context: self.context(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_chaining_accumulates_tags_and_metadata() {
        let err = ServiceError::not_found("document missing")
            .with_tag("nfe")
            .with_tag("nfe")
            .with_context(|ctx| ctx.with_detail("id=42").with_metadata("document_id", "42"));

        let ctx = err.context();
        assert_eq!(ctx.tags, vec!["nfe".to_string()]);
        assert_eq!(ctx.detail.as_deref(), Some("id=42"));
        assert_eq!(ctx.metadata.get("document_id").map(String::as_str), Some("42"));
        assert!(err.is_not_found());
    }

    #[test]
    fn rejection_renders_code_translation_and_raw_text() {
        let err = ServiceError::gateway_rejected("539", "Duplicidade de NF-e", "Rejeicao: Duplicidade");
        assert_eq!(err.to_string(), "[539] Duplicidade de NF-e - Rejeicao: Duplicidade");
        assert_eq!(err.retry_hint(), RetryHint::NewDraft);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn retry_hints_separate_input_errors_from_terminal_ones() {
        assert_eq!(ServiceError::bad_request("x").retry_hint(), RetryHint::FixInput);
        assert_eq!(ServiceError::gateway_transport("x").retry_hint(), RetryHint::NewDraft);
        assert_eq!(ServiceError::deadline_exceeded("x").retry_hint(), RetryHint::NotRetryable);
        assert_eq!(
            ServiceError::certificate_unusable(CertificateProblem::Expired, "x").retry_hint(),
            RetryHint::FixInput
        );
    }

    #[test]
    fn certificate_errors_record_the_problem() {
        let err = ServiceError::certificate_unusable(CertificateProblem::WrongPassword, "bad password");
        assert_eq!(
            err.context().metadata.get("problem").map(String::as_str),
            Some("wrong_password")
        );
        assert_eq!(err.kind(), "certificate_unusable");
    }
}

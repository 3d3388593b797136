//! Usage: HTTP client error kinds, stable error codes, and status-keyed user notices.

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorCode {
    Unauthorized,
    Forbidden,
    Client4xx,
    Server5xx,
    Transport,
    Decode,
    NotAuthenticated,
}

impl ApiErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "API_UNAUTHORIZED",
            Self::Forbidden => "API_FORBIDDEN",
            Self::Client4xx => "API_4XX",
            Self::Server5xx => "API_5XX",
            Self::Transport => "API_TRANSPORT",
            Self::Decode => "API_DECODE",
            Self::NotAuthenticated => "API_NOT_AUTHENTICATED",
        }
    }
}

/// User-facing notice for a failed request. Purely informational: it never changes control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorNotice {
    BadRequest,
    NotFound,
    ServerError,
    ServiceUnavailable,
}

impl ErrorNotice {
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(Self::BadRequest),
            404 => Some(Self::NotFound),
            500 => Some(Self::ServerError),
            503 => Some(Self::ServiceUnavailable),
            _ => None,
        }
    }

    /// Translation key shown to the user.
    pub const fn message_key(self) -> &'static str {
        match self {
            Self::BadRequest => "errors.badRequest",
            Self::NotFound => "errors.notFound",
            Self::ServerError => "errors.serverError",
            Self::ServiceUnavailable => "errors.serviceUnavailable",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed with status {status}")]
    Status {
        status: u16,
        notice: Option<ErrorNotice>,
        body: String,
    },
    #[error("request could not be sent: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response body is invalid: {0}")]
    Decode(String),
    #[error("no authenticated session")]
    NotAuthenticated,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub(crate) fn status(status: u16, body: String) -> Self {
        Self::Status {
            status,
            notice: ErrorNotice::from_status(status),
            body,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<ErrorNotice> {
        match self {
            Self::Status { notice, .. } => *notice,
            _ => None,
        }
    }

    /// 401 and 403 trigger the refresh-and-retry path.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status_code(), Some(401 | 403))
    }

    pub fn code(&self) -> ApiErrorCode {
        match self {
            Self::Status { status: 401, .. } => ApiErrorCode::Unauthorized,
            Self::Status { status: 403, .. } => ApiErrorCode::Forbidden,
            Self::Status { status, .. } if *status >= 500 => ApiErrorCode::Server5xx,
            Self::Status { .. } => ApiErrorCode::Client4xx,
            Self::Transport(_) => ApiErrorCode::Transport,
            Self::Decode(_) => ApiErrorCode::Decode,
            Self::NotAuthenticated => ApiErrorCode::NotAuthenticated,
        }
    }
}

impl From<ApiError> for AppError {
    fn from(value: ApiError) -> Self {
        let code = value.code().as_str();
        let message = value.to_string();
        AppError::with_source(code, message, value)
    }
}

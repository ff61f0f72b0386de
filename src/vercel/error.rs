use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Error code and message as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorDetail {
  pub code: String,
  pub message: String,
}

impl ApiErrorDetail {
  pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      code: code.into(),
      message: message.into(),
    }
  }
}

impl fmt::Display for ApiErrorDetail {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.message, self.code)
  }
}

/// Errors surfaced by [`super::ResourceClient`]. Nothing here is retried
/// automatically; callers decide.
#[derive(Debug, Error)]
pub enum ClientError {
  /// Credential missing, invalid or expired (HTTP 401/403)
  #[error("authentication failed: {0}")]
  Auth(ApiErrorDetail),

  /// Resource does not exist under the current scope (HTTP 404)
  #[error("not found: {0}")]
  NotFound(ApiErrorDetail),

  /// Request payload rejected, locally or by the server (HTTP 400/409/422)
  #[error("validation failed: {0}")]
  Validation(ApiErrorDetail),

  /// Any other non-success status
  #[error("server error ({status}): {detail}")]
  Server {
    status: StatusCode,
    detail: ApiErrorDetail,
  },

  /// Network unreachable, timeout or an undecodable response
  #[error("transport error: {0}")]
  Transport(String),
}

impl ClientError {
  /// Map a non-success status and its parsed body to an error.
  pub fn from_status(status: StatusCode, detail: ApiErrorDetail) -> Self {
    match status.as_u16() {
      401 | 403 => ClientError::Auth(detail),
      404 => ClientError::NotFound(detail),
      400 | 409 | 422 => ClientError::Validation(detail),
      _ => ClientError::Server { status, detail },
    }
  }

  pub fn validation(code: &str, message: impl Into<String>) -> Self {
    ClientError::Validation(ApiErrorDetail::new(code, message))
  }

  /// True when the credential should be discarded.
  pub fn is_auth(&self) -> bool {
    matches!(self, ClientError::Auth(_))
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ClientError::NotFound(_))
  }

  /// True when trying again later might succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      ClientError::Transport(_) => true,
      ClientError::Server { status, .. } => {
        status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
      }
      _ => false,
    }
  }

  /// The API-reported detail, when the server produced one.
  pub fn detail(&self) -> Option<&ApiErrorDetail> {
    match self {
      ClientError::Auth(d) | ClientError::NotFound(d) | ClientError::Validation(d) => Some(d),
      ClientError::Server { detail, .. } => Some(detail),
      ClientError::Transport(_) => None,
    }
  }
}

impl From<reqwest::Error> for ClientError {
  fn from(e: reqwest::Error) -> Self {
    ClientError::Transport(e.to_string())
  }
}

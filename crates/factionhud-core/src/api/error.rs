use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API key not configured. Set your Torn API key first.")]
    NotConfigured,

    #[error("API key error ({code}): {message}")]
    InvalidKey { code: i64, message: String },

    /// Torn error code 5. Retried by `NetworkClient`; only escapes when the
    /// retry budget is spent.
    #[error("Too many requests")]
    RateLimited,

    #[error("Still rate limited after {attempts} attempts")]
    RetryBudgetExhausted { attempts: u32 },

    #[error("API unavailable ({code}): {message}")]
    Unavailable { code: i64, message: String },

    #[error("Torn API error ({code}): {message}")]
    Upstream { code: i64, message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Carries no request URL: Torn keys travel in the query string.
    #[error("Network error: {0}")]
    NetworkError(reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::NetworkError(e.without_url())
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Http {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// Classify a Torn error envelope `{"error": {"code": N, "error": "..."}}`.
    pub fn from_envelope(code: i64, message: &str) -> Self {
        let message = message.to_string();
        match code {
            // 2: incorrect key, 10: key owner in federal jail, 13: key disabled
            2 | 10 | 13 => ApiError::InvalidKey { code, message },
            5 => ApiError::RateLimited,
            // 8: IP block, 9: API disabled
            8 | 9 => ApiError::Unavailable { code, message },
            _ => ApiError::Upstream { code, message },
        }
    }

    /// Errors that should send the user back to the key prompt.
    pub fn needs_credential(&self) -> bool {
        matches!(self, ApiError::NotConfigured | ApiError::InvalidKey { .. })
    }

    /// Errors worth showing stale data for instead of an error state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited
                | ApiError::RetryBudgetExhausted { .. }
                | ApiError::Http { .. }
                | ApiError::NetworkError(_)
                | ApiError::InvalidResponse(_)
        )
    }
}

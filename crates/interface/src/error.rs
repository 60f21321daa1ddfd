use thiserror::Error;

/// Market Data Client 호출 실패.
/// 코어는 종류별로 분기하지 않고 `is_retryable()` 정도만 본다.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("other error: {0}")]
    Other(String),
}

impl ExchangeError {
    /// 네트워크/타임아웃, 429, 5xx 는 다음 틱에 다시 시도할 만한 오류
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ExchangeError::Status { status, .. } => *status == 429 || *status >= 500,
            ExchangeError::Timeout(_) => true,
            ExchangeError::Decode(_) | ExchangeError::Other(_) => false,
        }
    }
}

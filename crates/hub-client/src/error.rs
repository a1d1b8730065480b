//! Hub 클라이언트 에러 타입

use dockhound_core::error::DockhoundError;

/// Docker Hub 클라이언트 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum HubClientError {
    /// 인증 실패 (401/403) — 실행 전체를 중단해야 함
    #[error("authentication rejected by registry: {0}")]
    Auth(String),

    /// 비정상 HTTP 상태 (재시도 불가한 4xx)
    #[error("unexpected http status {status} for {url}")]
    Http {
        /// 요청 URL
        url: String,
        /// 응답 상태 코드
        status: u16,
    },

    /// 요청 타임아웃 또는 연결 실패 (재시도 소진 후)
    #[error("request failed after retries: {0}")]
    Exhausted(String),

    /// 응답 본문이 기대한 형태가 아님
    #[error("unexpected payload from {url}: {reason}")]
    UnexpectedPayload {
        /// 요청 URL
        url: String,
        /// 불일치 사유
        reason: String,
    },

    /// 클라이언트 생성 실패
    #[error("failed to build http client: {0}")]
    Build(String),
}

impl From<HubClientError> for DockhoundError {
    fn from(err: HubClientError) -> Self {
        match err {
            HubClientError::Auth(msg) => DockhoundError::Auth(msg),
            other => DockhoundError::Registry(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_is_fatal_upstream() {
        let err: DockhoundError = HubClientError::Auth("expired".to_owned()).into();
        assert!(err.is_fatal());
    }

    #[test]
    fn transient_errors_are_not_fatal_upstream() {
        let err: DockhoundError = HubClientError::Exhausted("timeout".to_owned()).into();
        assert!(!err.is_fatal());

        let err: DockhoundError = HubClientError::Http {
            url: "https://hub.docker.com/v2/repositories/x".to_owned(),
            status: 404,
        }
        .into();
        assert!(!err.is_fatal());
    }
}

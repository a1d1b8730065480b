//! 스캐너 어댑터 에러 타입

use dockhound_core::error::DockhoundError;

/// Clair 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ClairError {
    /// 스캐너 환경 검증 실패 (컨테이너 누락, 태그 불일치) — 실행 중단
    #[error("scanner environment not ready: {0}")]
    Environment(String),

    /// clair-scanner 프로세스 실행 실패
    #[error("failed to spawn scanner for '{image}': {reason}")]
    SpawnFailed {
        /// 이미지 참조
        image: String,
        /// 실패 사유
        reason: String,
    },

    /// 스캔 제한 시간 초과
    #[error("scan of '{image}' timed out after {secs}s")]
    ScanTimeout {
        /// 이미지 참조
        image: String,
        /// 제한 시간 (초)
        secs: u64,
    },

    /// 스캐너가 이미지를 처리하지 못함 (지원하지 않는 형식 등)
    #[error("scanner rejected '{image}': {detail}")]
    UnsupportedImage {
        /// 이미지 참조
        image: String,
        /// stderr에서 추출한 상세 내용
        detail: String,
    },

    /// 리포트 형식이 기대와 다름
    #[error("malformed scanner report: {0}")]
    MalformedOutput(String),

    /// 유효하지 않은 이미지 참조
    #[error("invalid image reference: {0}")]
    InvalidReference(String),
}

impl From<ClairError> for DockhoundError {
    fn from(err: ClairError) -> Self {
        match err {
            ClairError::Environment(msg) => DockhoundError::ScannerEnvironment(msg),
            other => DockhoundError::Scan(other.to_string()),
        }
    }
}

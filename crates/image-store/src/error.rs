//! 이미지 저장소 에러 타입

use dockhound_core::error::DockhoundError;

/// 로컬 이미지 저장소 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ImageStoreError {
    /// Docker 데몬 연결 실패
    #[error("docker daemon unreachable: {0}")]
    Connection(String),

    /// 이미지 pull 실패 (레지스트리 거부, 존재하지 않는 태그 등)
    #[error("pull failed for '{image}': {reason}")]
    PullFailed {
        /// 이미지 참조 (`name:tag`)
        image: String,
        /// 실패 사유
        reason: String,
    },

    /// pull 제한 시간 초과
    #[error("pull of '{image}' timed out after {secs}s")]
    PullTimeout {
        /// 이미지 참조
        image: String,
        /// 제한 시간 (초)
        secs: u64,
    },

    /// 이미지 삭제 실패
    #[error("remove failed for '{image}': {reason}")]
    RemoveFailed {
        /// 이미지 참조
        image: String,
        /// 실패 사유
        reason: String,
    },

    /// 이미지 메타데이터 조회 실패
    #[error("inspect failed for '{image}': {reason}")]
    InspectFailed {
        /// 이미지 참조
        image: String,
        /// 실패 사유
        reason: String,
    },

    /// 유효하지 않은 이미지 참조
    #[error("invalid image reference: {0}")]
    InvalidReference(String),

    /// 기타 Docker API 에러
    #[error("docker api error: {0}")]
    Api(String),
}

impl From<ImageStoreError> for DockhoundError {
    fn from(err: ImageStoreError) -> Self {
        DockhoundError::ImageStore(err.to_string())
    }
}

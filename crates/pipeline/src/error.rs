//! 파이프라인 에러 타입

use std::path::PathBuf;

use dockhound_core::error::DockhoundError;

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 출력 파일 작성 실패
    #[error("failed to write output file {path}: {reason}")]
    OutputWrite {
        /// 대상 파일 경로
        path: PathBuf,
        /// 실패 사유
        reason: String,
    },

    /// 출력 직렬화 실패
    #[error("failed to serialize output: {0}")]
    Serialize(String),

    /// 워커 태스크 비정상 종료 (패닉 전파)
    #[error("worker task aborted: {0}")]
    WorkerAborted(String),
}

impl From<PipelineError> for DockhoundError {
    fn from(err: PipelineError) -> Self {
        DockhoundError::Pipeline(err.to_string())
    }
}

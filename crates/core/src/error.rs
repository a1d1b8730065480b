//! 에러 타입 — 도메인별 에러 정의
//!
//! 각 크레이트는 자기 도메인 에러를 정의하고 `From` 구현으로
//! [`DockhoundError`]에 합류합니다. Controller는 [`DockhoundError::is_fatal`]로
//! 실행 중단(fatal) 대 건너뛰기(per-image)를 판정합니다.

/// Dockhound 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DockhoundError {
    /// 설정 관련 에러 (fatal — 네트워크 활동 전에 거부)
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 레지스트리 인증 실패 (fatal — 유효한 데이터를 만들 수 없음)
    #[error("registry auth error: {0}")]
    Auth(String),

    /// 스캐너 환경 불일치 (fatal — preflight에서만 발생)
    #[error("scanner environment error: {0}")]
    ScannerEnvironment(String),

    /// 잘못된 호출 인자 (fatal — 네트워크 활동 전에 거부)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 레지스트리 통신 에러 (재시도 소진 후)
    #[error("registry error: {0}")]
    Registry(String),

    /// 로컬 이미지 저장소 에러
    #[error("image store error: {0}")]
    ImageStore(String),

    /// 스캔 실행 에러
    #[error("scan error: {0}")]
    Scan(String),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DockhoundError {
    /// 실행 전체를 중단해야 하는 에러인지 여부를 반환합니다.
    ///
    /// fatal 에러는 부분 출력 파일을 남기지 않고 즉시 종료합니다.
    /// 나머지는 이미지 단위로 기록 후 다음 이미지로 진행합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Auth(_) | Self::ScannerEnvironment(_) | Self::InvalidArgument(_)
        )
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(DockhoundError::Auth("expired credentials".to_owned()).is_fatal());
        assert!(DockhoundError::ScannerEnvironment("tag mismatch".to_owned()).is_fatal());
        assert!(DockhoundError::InvalidArgument("x_images missing".to_owned()).is_fatal());
        assert!(
            DockhoundError::Config(ConfigError::ParseFailed {
                reason: "bad toml".to_owned(),
            })
            .is_fatal()
        );

        assert!(!DockhoundError::Registry("timeout".to_owned()).is_fatal());
        assert!(!DockhoundError::ImageStore("pull failed".to_owned()).is_fatal());
        assert!(!DockhoundError::Scan("malformed output".to_owned()).is_fatal());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "page_size".to_owned(),
            reason: "must be 1-100".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("page_size"));
        assert!(msg.contains("must be 1-100"));
    }
}

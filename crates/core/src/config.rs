//! 설정 관리 — dockhound.toml 파싱 및 런타임 설정
//!
//! [`DockhoundConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DOCKHOUND_HUB_USERNAME=alice` 형식)
//! 3. 설정 파일 (`dockhound.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dockhound_core::error::DockhoundError> {
//! use dockhound_core::config::DockhoundConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DockhoundConfig::load("dockhound.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DockhoundConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DockhoundError};

/// Dockhound 통합 설정
///
/// `dockhound.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockhoundConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Docker Hub 클라이언트 설정
    #[serde(default)]
    pub hub: HubConfig,
    /// 로컬 이미지 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
    /// Clair 스캐너 설정
    #[serde(default)]
    pub clair: ClairConfig,
    /// 파이프라인 설정
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl DockhoundConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DockhoundError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DockhoundError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DockhoundError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DockhoundError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DockhoundError> {
        toml::from_str(toml_str).map_err(|e| {
            DockhoundError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DOCKHOUND_{SECTION}_{FIELD}`
    /// 예: `DOCKHOUND_HUB_USERNAME=alice`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DOCKHOUND_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DOCKHOUND_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.output_dir, "DOCKHOUND_GENERAL_OUTPUT_DIR");

        // Hub
        override_string(&mut self.hub.api_v1_base, "DOCKHOUND_HUB_API_V1_BASE");
        override_string(&mut self.hub.api_v2_base, "DOCKHOUND_HUB_API_V2_BASE");
        override_opt_string(&mut self.hub.username, "DOCKHOUND_HUB_USERNAME");
        override_opt_string(&mut self.hub.password, "DOCKHOUND_HUB_PASSWORD");
        override_u32(&mut self.hub.page_size, "DOCKHOUND_HUB_PAGE_SIZE");
        override_u64(
            &mut self.hub.request_timeout_secs,
            "DOCKHOUND_HUB_REQUEST_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.hub.retry_max_attempts,
            "DOCKHOUND_HUB_RETRY_MAX_ATTEMPTS",
        );
        override_u64(
            &mut self.hub.retry_backoff_base_ms,
            "DOCKHOUND_HUB_RETRY_BACKOFF_BASE_MS",
        );
        override_u32(
            &mut self.hub.community_window_multiplier,
            "DOCKHOUND_HUB_COMMUNITY_WINDOW_MULTIPLIER",
        );

        // Store
        override_string(&mut self.store.docker_socket, "DOCKHOUND_STORE_DOCKER_SOCKET");
        override_u64(
            &mut self.store.pull_timeout_secs,
            "DOCKHOUND_STORE_PULL_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.store.max_local_images,
            "DOCKHOUND_STORE_MAX_LOCAL_IMAGES",
        );

        // Clair
        override_string(&mut self.clair.scanner_bin, "DOCKHOUND_CLAIR_SCANNER_BIN");
        override_string(&mut self.clair.scanner_ip, "DOCKHOUND_CLAIR_SCANNER_IP");
        override_string(
            &mut self.clair.scanner_container,
            "DOCKHOUND_CLAIR_SCANNER_CONTAINER",
        );
        override_string(&mut self.clair.db_container, "DOCKHOUND_CLAIR_DB_CONTAINER");
        override_string(&mut self.clair.pinned_tag, "DOCKHOUND_CLAIR_PINNED_TAG");
        override_u64(
            &mut self.clair.scan_timeout_secs,
            "DOCKHOUND_CLAIR_SCAN_TIMEOUT_SECS",
        );
        override_bool(&mut self.clair.resolve_cwe, "DOCKHOUND_CLAIR_RESOLVE_CWE");
        override_string(&mut self.clair.cwe_api_base, "DOCKHOUND_CLAIR_CWE_API_BASE");

        // Pipeline
        override_usize(&mut self.pipeline.workers, "DOCKHOUND_PIPELINE_WORKERS");
        override_string(
            &mut self.pipeline.parent_db_dir,
            "DOCKHOUND_PIPELINE_PARENT_DB_DIR",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DockhoundError> {
        self.general.validate()?;
        self.hub.validate()?;
        self.store.validate()?;
        self.clair.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 ("json" 또는 "pretty")
    pub log_format: String,
    /// 출력 파일 디렉토리
    pub output_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            output_dir: "output".to_owned(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), DockhoundError> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(invalid("general.log_format", "must be 'json' or 'pretty'"));
        }
        Ok(())
    }
}

/// Docker Hub 클라이언트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub API v1 베이스 URL
    pub api_v1_base: String,
    /// Hub API v2 베이스 URL
    pub api_v2_base: String,
    /// Hub 계정 (익명 접근 시 None)
    pub username: Option<String>,
    /// Hub 비밀번호
    pub password: Option<String>,
    /// 페이지당 항목 수
    pub page_size: u32,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 일시적 실패 재시도 최대 횟수
    pub retry_max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// community 표본 추출 윈도우 배수 (윈도우 = limit × 배수)
    pub community_window_multiplier: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            api_v1_base: "https://hub.docker.com/api/content/v1".to_owned(),
            api_v2_base: "https://hub.docker.com/v2".to_owned(),
            username: None,
            password: None,
            page_size: 50,
            request_timeout_secs: 30,
            retry_max_attempts: 3,
            retry_backoff_base_ms: 500,
            community_window_multiplier: 3,
        }
    }
}

/// 설정 상한값 상수
const MAX_PAGE_SIZE: u32 = 100;
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_RETRY_BACKOFF_BASE_MS: u64 = 30_000;
const MAX_WINDOW_MULTIPLIER: u32 = 10;
const MAX_LOCAL_IMAGE_SLOTS: usize = 16;
const MAX_WORKERS: usize = 32;

impl HubConfig {
    fn validate(&self) -> Result<(), DockhoundError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(invalid("hub.page_size", &format!("must be 1-{MAX_PAGE_SIZE}")));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("hub.request_timeout_secs", "must be greater than 0"));
        }
        if self.retry_max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(invalid(
                "hub.retry_max_attempts",
                &format!("must be 0-{MAX_RETRY_ATTEMPTS}"),
            ));
        }
        if self.retry_backoff_base_ms == 0 || self.retry_backoff_base_ms > MAX_RETRY_BACKOFF_BASE_MS
        {
            return Err(invalid(
                "hub.retry_backoff_base_ms",
                &format!("must be 1-{MAX_RETRY_BACKOFF_BASE_MS}"),
            ));
        }
        if self.community_window_multiplier == 0
            || self.community_window_multiplier > MAX_WINDOW_MULTIPLIER
        {
            return Err(invalid(
                "hub.community_window_multiplier",
                &format!("must be 1-{MAX_WINDOW_MULTIPLIER}"),
            ));
        }
        Ok(())
    }
}

/// 로컬 이미지 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// 이미지 pull 타임아웃 (초)
    pub pull_timeout_secs: u64,
    /// 동시에 로컬에 존재할 수 있는 이미지 최대 수 (슬롯 풀 크기)
    pub max_local_images: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
            pull_timeout_secs: 1800,
            max_local_images: 1,
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), DockhoundError> {
        if self.pull_timeout_secs == 0 {
            return Err(invalid("store.pull_timeout_secs", "must be greater than 0"));
        }
        if self.max_local_images == 0 || self.max_local_images > MAX_LOCAL_IMAGE_SLOTS {
            return Err(invalid(
                "store.max_local_images",
                &format!("must be 1-{MAX_LOCAL_IMAGE_SLOTS}"),
            ));
        }
        Ok(())
    }
}

/// Clair 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClairConfig {
    /// clair-scanner 실행 파일 경로
    pub scanner_bin: String,
    /// 스캐너가 접근할 수 있는 호스트 IP (`--ip` 인자)
    pub scanner_ip: String,
    /// Clair 스캐너 컨테이너 이름
    pub scanner_container: String,
    /// Clair 취약점 DB 컨테이너 이름
    pub db_container: String,
    /// 스캐너/DB 컨테이너가 실행해야 하는 고정 버전 태그
    pub pinned_tag: String,
    /// 이미지 한 건당 스캔 타임아웃 (초)
    pub scan_timeout_secs: u64,
    /// CVE → CWE 조회 활성화 여부 (오프라인 실행 시 비활성화)
    pub resolve_cwe: bool,
    /// CWE 조회 API 베이스 URL
    pub cwe_api_base: String,
}

impl Default for ClairConfig {
    fn default() -> Self {
        Self {
            scanner_bin: "clair-scanner".to_owned(),
            scanner_ip: "127.0.0.1".to_owned(),
            scanner_container: "clair".to_owned(),
            db_container: "db".to_owned(),
            pinned_tag: "latest".to_owned(),
            scan_timeout_secs: 600,
            resolve_cwe: false,
            cwe_api_base: "https://cve.circl.lu/api/cve".to_owned(),
        }
    }
}

impl ClairConfig {
    fn validate(&self) -> Result<(), DockhoundError> {
        if self.scan_timeout_secs == 0 {
            return Err(invalid("clair.scan_timeout_secs", "must be greater than 0"));
        }
        if self.pinned_tag.is_empty() {
            return Err(invalid("clair.pinned_tag", "must not be empty"));
        }
        Ok(())
    }
}

/// 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 워커 풀 크기 (이미지 단위 병렬 처리 수)
    pub workers: usize,
    /// 부모 이미지 데이터베이스 디렉토리
    pub parent_db_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            parent_db_dir: "parent-db".to_owned(),
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), DockhoundError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(invalid("pipeline.workers", &format!("must be 1-{MAX_WORKERS}")));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> DockhoundError {
    DockhoundError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    })
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_opt_string(target: &mut Option<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = Some(value);
    }
}

fn override_bool(target: &mut bool, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring unparseable bool override"),
        }
    }
}

fn override_u32(target: &mut u32, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring unparseable u32 override"),
        }
    }
}

fn override_u64(target: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring unparseable u64 override"),
        }
    }
}

fn override_usize(target: &mut usize, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring unparseable usize override"),
        }
    }
}

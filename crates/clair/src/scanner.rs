//! clair-scanner 프로세스 구동
//!
//! [`VulnerabilityScanner`] 트레이트가 스캐너 구현을 추상화합니다.
//! 프로덕션은 [`ClairScanner`]가 clair-scanner CLI를 자식 프로세스로
//! 실행하고, 테스트는 트레이트를 직접 구현한 mock을 사용합니다.

use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use dockhound_core::config::ClairConfig;
use dockhound_core::types::ScanFinding;
use dockhound_image_store::docker::{DockerClient, validate_image_reference};

use crate::cwe::CweResolver;
use crate::error::ClairError;
use crate::preflight::verify_scanner_environment;
use crate::report::parse_report;

/// 취약점 스캐너 추상화
///
/// # Implementations
///
/// - [`ClairScanner`]: clair-scanner CLI 기반 프로덕션 구현
/// - 테스트 mock: 각 테스트 크레이트에서 직접 구현
pub trait VulnerabilityScanner: Send + Sync + 'static {
    /// 스캐너 환경이 준비되었는지 검증합니다. 실행당 한 번 호출됩니다.
    fn verify_environment(&self) -> impl Future<Output = Result<(), ClairError>> + Send;

    /// 로컬 이미지를 스캔하여 발견 목록을 반환합니다.
    fn scan(
        &self,
        image: &str,
    ) -> impl Future<Output = Result<Vec<ScanFinding>, ClairError>> + Send;
}

/// clair-scanner CLI 기반 스캐너
pub struct ClairScanner<C> {
    docker: Arc<C>,
    config: ClairConfig,
    cwe: Option<CweResolver>,
}

impl<C: DockerClient> ClairScanner<C> {
    /// 설정과 Docker 클라이언트로 스캐너를 생성합니다.
    ///
    /// CWE 조회가 활성화된 경우 HTTP 클라이언트를 함께 준비합니다.
    ///
    /// # Errors
    ///
    /// CWE 조회용 HTTP 클라이언트 생성 실패 시 `ClairError::Environment`
    pub fn new(docker: Arc<C>, config: ClairConfig) -> Result<Self, ClairError> {
        let cwe = if config.resolve_cwe {
            Some(CweResolver::new(&config.cwe_api_base)?)
        } else {
            None
        };
        Ok(Self {
            docker,
            config,
            cwe,
        })
    }

    async fn run_scanner(&self, image: &str) -> Result<String, ClairError> {
        let mut command = Command::new(&self.config.scanner_bin);
        command
            .arg("--ip")
            .arg(&self.config.scanner_ip)
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(image, bin = %self.config.scanner_bin, "spawning clair-scanner");

        let deadline = Duration::from_secs(self.config.scan_timeout_secs);
        let output = tokio::time::timeout(deadline, command.output())
            .await
            .map_err(|_| ClairError::ScanTimeout {
                image: image.to_owned(),
                secs: self.config.scan_timeout_secs,
            })?
            .map_err(|e| ClairError::SpawnFailed {
                image: image.to_owned(),
                reason: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Some(detail) = critical_stderr_line(&stderr) {
            return Err(ClairError::UnsupportedImage {
                image: image.to_owned(),
                detail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl<C: DockerClient> VulnerabilityScanner for ClairScanner<C> {
    async fn verify_environment(&self) -> Result<(), ClairError> {
        verify_scanner_environment(self.docker.as_ref(), &self.config).await
    }

    async fn scan(&self, image: &str) -> Result<Vec<ScanFinding>, ClairError> {
        validate_image_reference(image)
            .map_err(|e| ClairError::InvalidReference(e.to_string()))?;

        let stdout = self.run_scanner(image).await?;
        let mut findings = parse_report(&stdout)?;

        if let Some(resolver) = &self.cwe {
            for finding in &mut findings {
                finding.cwe = resolver.lookup(&finding.cve).await;
            }
        }

        debug!(image, findings = findings.len(), "scan complete");
        Ok(findings)
    }
}

/// clair-scanner는 지원하지 않는 이미지(분석 불가 레이어 등)를 만나면
/// stderr에 `CRIT` 레벨 로그를 남기고 테이블을 출력하지 않습니다.
fn critical_stderr_line(stderr: &str) -> Option<String> {
    let line = stderr.lines().find(|line| line.contains("CRIT"))?;
    warn!(detail = line, "scanner reported critical failure");
    Some(line.trim().to_owned())
}

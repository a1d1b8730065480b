//! 스캐너 환경 사전 검증
//!
//! 실행마다 한 번, 어떤 이미지도 pull하기 전에 Clair 스캐너와 취약점 DB
//! 컨테이너가 모두 고정된 버전 태그로 실행 중인지 확인합니다. 검증에
//! 실패하면 실행 전체를 중단합니다. 누락된 컨테이너를 자동으로 띄우거나
//! 이미지를 자동으로 받는 일은 하지 않습니다 — 스캐너와 DB의 버전 조합은
//! 운영자가 통제해야 하는 상태입니다.

use tracing::{debug, info};

use dockhound_core::config::ClairConfig;
use dockhound_image_store::docker::DockerClient;

use crate::error::ClairError;

/// 스캐너/DB 컨테이너가 고정 태그로 실행 중인지 검증합니다.
///
/// # Errors
///
/// 컨테이너가 없거나, 실행 중이 아니거나, 이미지 태그가 `pinned_tag`와
/// 다르면 `ClairError::Environment`를 반환합니다.
pub async fn verify_scanner_environment<C: DockerClient>(
    docker: &C,
    config: &ClairConfig,
) -> Result<(), ClairError> {
    docker
        .ping()
        .await
        .map_err(|e| ClairError::Environment(format!("docker daemon unreachable: {e}")))?;

    for name in [&config.scanner_container, &config.db_container] {
        let container = docker
            .find_container(name)
            .await
            .map_err(|e| ClairError::Environment(format!("container lookup failed: {e}")))?
            .ok_or_else(|| {
                ClairError::Environment(format!("required container '{name}' is not running"))
            })?;

        let expected_suffix = format!(":{}", config.pinned_tag);
        if !container.image.ends_with(&expected_suffix) {
            return Err(ClairError::Environment(format!(
                "container '{name}' runs '{}' instead of pinned tag '{}'",
                container.image, config.pinned_tag
            )));
        }
        debug!(container = %name, image = %container.image, "preflight container ok");
    }

    info!(
        scanner = %config.scanner_container,
        db = %config.db_container,
        tag = %config.pinned_tag,
        "scanner environment verified"
    );
    Ok(())
}

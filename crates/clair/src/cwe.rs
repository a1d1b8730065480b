//! CVE → CWE 조회
//!
//! CIRCL CVE API에서 CVE의 약점 분류(CWE) 번호를 조회합니다. 조회는
//! 부가 정보이므로 API 장애나 레이트 리밋 시 실행을 막지 않고 None으로
//! 강등됩니다. 오프라인 실행은 설정에서 조회 자체를 비활성화합니다.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ClairError;

const LOOKUP_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct CveEntry {
    #[serde(default)]
    cwe: Option<String>,
}

/// CIRCL CVE API 클라이언트
#[derive(Debug, Clone)]
pub struct CweResolver {
    http: reqwest::Client,
    base: String,
}

impl CweResolver {
    /// 베이스 URL로 조회기를 생성합니다.
    ///
    /// # Errors
    ///
    /// HTTP 클라이언트 생성에 실패하면 `ClairError::Environment`를
    /// 반환합니다.
    pub fn new(base: &str) -> Result<Self, ClairError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClairError::Environment(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_owned(),
        })
    }

    /// CVE 번호의 CWE 번호를 조회합니다.
    ///
    /// API가 null을 반환하거나, 모든 재시도가 실패하거나, 응답이
    /// 기대 형태가 아니면 None을 반환합니다.
    pub async fn lookup(&self, cve: &str) -> Option<String> {
        let url = format!("{}/{}", self.base, cve);

        for attempt in 1..=LOOKUP_ATTEMPTS {
            match self.try_lookup(&url).await {
                Ok(cwe) => {
                    debug!(%cve, cwe = cwe.as_deref().unwrap_or("<none>"), "cwe lookup done");
                    return cwe;
                }
                Err(reason) if attempt < LOOKUP_ATTEMPTS => {
                    debug!(%cve, attempt, %reason, "cwe lookup failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(reason) => {
                    warn!(%cve, %reason, "cwe lookup exhausted, continuing without cwe");
                }
            }
        }
        None
    }

    async fn try_lookup(&self, url: &str) -> Result<Option<String>, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        let entry: CveEntry = response.json().await.map_err(|e| e.to_string())?;
        Ok(entry.cwe.filter(|c| !c.is_empty() && c != "Unknown"))
    }
}

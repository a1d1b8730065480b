//! 취약점 카탈로그의 단일 작성자
//!
//! 워커들이 병렬로 스캔하더라도 카탈로그 갱신은 [`Correlator`] 하나를
//! 통해서만 일어납니다. 키는 (CVE, 패키지 이름, 패키지 버전) 조합이고,
//! 같은 키에 대한 갱신은 마지막 작성자가 이깁니다. BTreeMap이므로
//! 스냅샷은 항상 키 순으로 정렬되어 출력이 바이트 단위로 안정적입니다.

use std::collections::BTreeMap;

use tokio::sync::Mutex;
use tracing::debug;

use dockhound_core::types::{ImageRecord, ParentImage, ScanFinding, VulnerabilityRecord};

/// 카탈로그 키: (CVE, 패키지 이름, 패키지 버전)
pub type CatalogKey = (String, String, String);

/// 전역 취약점 카탈로그와 이미지-취약점 상관관계 분석기
#[derive(Debug, Default)]
pub struct Correlator {
    catalog: Mutex<BTreeMap<CatalogKey, VulnerabilityRecord>>,
}

impl Correlator {
    /// 빈 카탈로그로 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스캔 발견을 레코드와 카탈로그에 반영합니다.
    ///
    /// 레코드에는 CVE 식별자 집합과 부모 계보가 붙고, 카탈로그에는
    /// 발견별 상세가 upsert됩니다. 같은 (CVE, 패키지, 버전) 키가 여러
    /// 이미지에서 발견되어도 카탈로그 항목은 하나입니다.
    pub async fn correlate(
        &self,
        mut record: ImageRecord,
        findings: Vec<ScanFinding>,
        parents: Vec<ParentImage>,
    ) -> ImageRecord {
        record.parents = parents;

        let mut catalog = self.catalog.lock().await;
        for finding in findings {
            record.vulnerabilities.insert(finding.cve.clone());
            let entry = VulnerabilityRecord::from(finding);
            catalog.insert(entry.key(), entry);
        }
        debug!(
            image = %record.reference(),
            cves = record.vulnerabilities.len(),
            catalog_size = catalog.len(),
            "record correlated"
        );

        record
    }

    /// 카탈로그의 정렬된 스냅샷을 반환합니다.
    pub async fn snapshot(&self) -> Vec<VulnerabilityRecord> {
        self.catalog.lock().await.values().cloned().collect()
    }

    /// 고유 취약점 수
    pub async fn unique_count(&self) -> usize {
        self.catalog.lock().await.len()
    }
}

//! 실행 결과 파일 작성
//!
//! 실행 하나가 두 파일을 남깁니다: 이미지별 분석 결과(`analysis_*.json`)와
//! 전역 취약점 카탈로그(`vulnerabilities_*.json`). 파일 이름의 타임스탬프가
//! 두 파일을 한 실행으로 묶습니다. 치명적 에러로 중단된 실행은 컨트롤러가
//! 작성 자체를 호출하지 않으므로 부분 파일을 남기지 않습니다.

use std::path::{Path, PathBuf};

use tracing::info;

use dockhound_core::types::{ImageRecord, VulnerabilityRecord};

use crate::error::PipelineError;

/// 파일 이름 타임스탬프 형식 (`2024-03-04_12-00-01`)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// 한 실행이 남긴 출력 파일 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    /// 이미지별 분석 결과 파일
    pub analysis: PathBuf,
    /// 취약점 카탈로그 파일
    pub vulnerabilities: PathBuf,
}

/// 출력 디렉토리에 실행 결과를 쓰는 작성기
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    /// 출력 디렉토리로 작성기를 생성합니다. 디렉토리는 쓰기 시점에
    /// 만들어집니다.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
        }
    }

    /// 분석 결과와 카탈로그를 타임스탬프가 붙은 두 파일로 씁니다.
    ///
    /// # Errors
    ///
    /// 디렉토리 생성, 직렬화, 파일 쓰기 실패 시 `PipelineError`
    pub async fn write_run(
        &self,
        records: &[ImageRecord],
        catalog: &[VulnerabilityRecord],
    ) -> Result<RunArtifacts, PipelineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PipelineError::OutputWrite {
                path: self.dir.clone(),
                reason: e.to_string(),
            })?;

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        let artifacts = RunArtifacts {
            analysis: self.dir.join(format!("analysis_{timestamp}.json")),
            vulnerabilities: self.dir.join(format!("vulnerabilities_{timestamp}.json")),
        };

        write_json(&artifacts.analysis, records).await?;
        write_json(&artifacts.vulnerabilities, catalog).await?;

        info!(
            analysis = %artifacts.analysis.display(),
            vulnerabilities = %artifacts.vulnerabilities.display(),
            records = records.len(),
            catalog = catalog.len(),
            "run output written"
        );
        Ok(artifacts)
    }
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| PipelineError::Serialize(e.to_string()))?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| PipelineError::OutputWrite {
            path: path.to_owned(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhound_core::types::{ImageRecord, ImageType, ScanFinding, Severity};

    fn sample_record() -> ImageRecord {
        let mut record = ImageRecord::new(ImageType::Official, "nginx", "1.25");
        record.vulnerabilities.insert("CVE-2019-0001".to_owned());
        record
    }

    fn sample_catalog() -> Vec<dockhound_core::types::VulnerabilityRecord> {
        vec![
            ScanFinding {
                cve: "CVE-2019-0001".to_owned(),
                cwe: Some("CWE-119".to_owned()),
                severity: Severity::High,
                package_name: "glibc".to_owned(),
                package_version: "2.24".to_owned(),
            }
            .into(),
        ]
    }

    #[tokio::test]
    async fn writes_both_files_with_shared_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());

        let artifacts = writer
            .write_run(&[sample_record()], &sample_catalog())
            .await
            .unwrap();

        assert!(artifacts.analysis.exists());
        assert!(artifacts.vulnerabilities.exists());

        let analysis_stem = artifacts
            .analysis
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .strip_prefix("analysis_")
            .unwrap()
            .to_owned();
        let vulns_stem = artifacts
            .vulnerabilities
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .strip_prefix("vulnerabilities_")
            .unwrap()
            .to_owned();
        assert_eq!(analysis_stem, vulns_stem);
    }

    #[tokio::test]
    async fn output_round_trips_and_cross_references() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        let artifacts = writer
            .write_run(&[sample_record()], &sample_catalog())
            .await
            .unwrap();

        let analysis: Vec<ImageRecord> = serde_json::from_slice(
            &tokio::fs::read(&artifacts.analysis).await.unwrap(),
        )
        .unwrap();
        let catalog: Vec<dockhound_core::types::VulnerabilityRecord> = serde_json::from_slice(
            &tokio::fs::read(&artifacts.vulnerabilities).await.unwrap(),
        )
        .unwrap();

        // 분석 파일이 참조하는 모든 CVE는 카탈로그에 항목이 정확히 하나 있어야 함
        for record in &analysis {
            for cve in &record.vulnerabilities {
                let matches = catalog.iter().filter(|entry| &entry.cve == cve).count();
                assert_eq!(matches, 1, "cve {cve} should have one catalog entry");
            }
        }
    }

    #[tokio::test]
    async fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep/output");
        let writer = OutputWriter::new(&nested);

        writer.write_run(&[], &[]).await.unwrap();
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_error() {
        let writer = OutputWriter::new("/proc/no-such-dir/output");
        let result = writer.write_run(&[], &[]).await;
        assert!(matches!(result, Err(PipelineError::OutputWrite { .. })));
    }
}

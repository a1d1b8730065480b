//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 레지스트리 열거, 이미지 수집, 스캔, 상관관계 분석의 모든 단계가
//! 이 타입들을 통해 데이터를 교환합니다.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Docker Hub 이미지 분류 타입
///
/// 선택 정책(전수 수집 vs 표본 추출)과 신뢰 등급을 결정합니다.
/// 분기 지점은 Selector 하나뿐이며, 나머지 파이프라인은 이 값을 그대로 전달합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    /// Docker 인증 이미지 (store 네임스페이스, certification_status=certified)
    Certified,
    /// 검증된 퍼블리셔 이미지 (store 네임스페이스)
    Verified,
    /// 공식 이미지 (library 네임스페이스)
    Official,
    /// 커뮤니티 이미지 (일반 사용자 네임스페이스)
    Community,
}

impl ImageType {
    /// 검증 등급(verified 이상)에 속하는 타입인지 여부를 반환합니다.
    ///
    /// certified ⊆ verified 불변식의 판정 기준입니다.
    pub fn is_verified_tier(&self) -> bool {
        matches!(self, Self::Certified | Self::Verified)
    }

    /// 문자열에서 이미지 타입을 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "certified" => Some(Self::Certified),
            "verified" => Some(Self::Verified),
            "official" => Some(Self::Official),
            "community" => Some(Self::Community),
            _ => None,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Certified => write!(f, "certified"),
            Self::Verified => write!(f, "verified"),
            Self::Official => write!(f, "official"),
            Self::Community => write!(f, "community"),
        }
    }
}

/// 취약점 심각도 (Clair 스케일)
///
/// `Ord` 구현으로 심각도 비교가 가능합니다
/// (`Negligible < Low < Medium < High < Critical < Defcon1 < Unknown`).
/// Unknown은 스캐너가 심각도를 판정하지 못한 경우로, 정렬상 마지막에 둡니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 무시 가능
    Negligible,
    /// 낮음
    Low,
    /// 중간
    Medium,
    /// 높음
    High,
    /// 치명적
    Critical,
    /// 최고 등급 (Clair Defcon1)
    Defcon1,
    /// 판정 불가
    #[default]
    Unknown,
}

impl Severity {
    /// 스캐너 출력 문자열에서 심각도를 파싱합니다.
    ///
    /// 알 수 없는 문자열은 Unknown으로 강등됩니다 (파싱 실패가 아님).
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "negligible" => Self::Negligible,
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            "defcon1" => Self::Defcon1,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negligible => write!(f, "Negligible"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
            Self::Defcon1 => write!(f, "Defcon1"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// 레지스트리 열거 단계에서 수집된 원시 후보 레코드
///
/// Selector가 정책을 적용하기 전의 상태이며, 아직 로컬 작업은 일어나지 않았습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// 저장소 이름 (예: `library/nginx`, `bitnami/redis`)
    pub name: String,
    /// 최신 버전 태그 (조회 실패 시 None, Selector가 제외)
    pub tag: Option<String>,
    /// Hub v1 API 전용 슬러그 이름 (certified/verified만 보유)
    pub slug: Option<String>,
    /// 누적 pull 수 (인기도)
    pub pull_count: u64,
    /// 마지막 갱신 시각 (Hub가 반환한 RFC 3339 문자열)
    pub last_updated: Option<String>,
}

/// 부모 이미지 참조 (`parents` 시퀀스의 원소)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentImage {
    /// 부모 저장소 이름
    pub name: String,
    /// 부모 태그
    pub tag: String,
}

impl fmt::Display for ParentImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// 분석 대상 이미지 한 건의 메타데이터
///
/// Selector가 생성하고 Correlator가 `vulnerabilities`/`parents`를 채우며,
/// 출력 파일에 기록된 이후에는 불변입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// 안정 식별자 — `name:tag[@digest]`에서 결정론적으로 유도 (UUIDv5)
    pub image_id: String,
    /// 이미지 분류 타입
    #[serde(rename = "type")]
    pub image_type: ImageType,
    /// 인증 여부 (certified 타입만 true; certified ⊆ verified 불변식)
    pub certified: bool,
    /// 저장소 이름
    pub name: String,
    /// 태그
    pub tag: String,
    /// 마지막 갱신 시각 (RFC 3339, Hub 미보고 시 None)
    pub last_updated: Option<String>,
    /// 누적 pull 수
    pub total_pulls: u64,
    /// 참조하는 CVE 식별자 집합 (전역 카탈로그에 대한 참조)
    pub vulnerabilities: BTreeSet<String>,
    /// 부모 이미지 계보 (최외곽 우선, 미해석 시 빈 목록)
    pub parents: Vec<ParentImage>,
}

impl ImageRecord {
    /// 새 이미지 레코드를 생성합니다.
    ///
    /// `certified` 플래그는 타입에서 유도되므로 불변식
    /// (certified이면 verified 등급)이 항상 성립합니다.
    pub fn new(image_type: ImageType, name: impl Into<String>, tag: impl Into<String>) -> Self {
        let name = name.into();
        let tag = tag.into();
        Self {
            image_id: Self::derive_id(&name, &tag, None),
            image_type,
            certified: image_type == ImageType::Certified,
            name,
            tag,
            last_updated: None,
            total_pulls: 0,
            vulnerabilities: BTreeSet::new(),
            parents: Vec::new(),
        }
    }

    /// `(name, tag, digest)`에서 안정 식별자를 유도합니다.
    ///
    /// UUIDv5(URL 네임스페이스)를 사용하므로 동일 입력은 실행 간에도
    /// 동일한 식별자를 냅니다. digest가 알려지면 식별자에 포함됩니다.
    pub fn derive_id(name: &str, tag: &str, digest: Option<&str>) -> String {
        let seed = match digest {
            Some(d) => format!("{name}:{tag}@{d}"),
            None => format!("{name}:{tag}"),
        };
        Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()).to_string()
    }

    /// 로컬 pull로 digest를 알게 된 시점에 식별자를 재유도합니다.
    pub fn attach_digest(&mut self, digest: &str) {
        self.image_id = Self::derive_id(&self.name, &self.tag, Some(digest));
    }

    /// `name:tag` 표기를 반환합니다.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

/// 스캐너가 보고한 단일 취약점 발견
///
/// 카탈로그에 upsert되기 전의 파싱 결과입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFinding {
    /// CVE 식별자 (예: CVE-2019-1234)
    pub cve: String,
    /// CWE 분류 (스캐너/조회가 보고하지 않으면 None)
    pub cwe: Option<String>,
    /// 심각도
    pub severity: Severity,
    /// 취약 패키지 이름
    pub package_name: String,
    /// 취약 패키지 버전
    pub package_version: String,
}

/// 전역 취약점 카탈로그의 한 엔트리
///
/// `(cve, package_name, package_version)` 조합당 정확히 하나만 존재합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// CVE 식별자
    pub cve: String,
    /// CWE 분류 (없으면 None)
    pub cwe: Option<String>,
    /// 취약 패키지 이름
    pub package_name: String,
    /// 취약 패키지 버전
    pub package_version: String,
    /// 심각도
    pub severity: Severity,
}

impl VulnerabilityRecord {
    /// 카탈로그 중복 제거 키를 반환합니다.
    pub fn key(&self) -> (String, String, String) {
        (
            self.cve.clone(),
            self.package_name.clone(),
            self.package_version.clone(),
        )
    }
}

impl From<ScanFinding> for VulnerabilityRecord {
    fn from(finding: ScanFinding) -> Self {
        Self {
            cve: finding.cve,
            cwe: finding.cwe,
            package_name: finding.package_name,
            package_version: finding.package_version,
            severity: finding.severity,
        }
    }
}

/// 이미지 한 건에 대한 파이프라인 결과 (일시적, 저장되지 않음)
///
/// Controller가 소비하여 skip/계속/중단을 결정합니다.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// 수집·스캔·상관관계 분석까지 완료
    Success {
        /// 완성된 이미지 레코드
        record: Box<ImageRecord>,
        /// 발견된 취약점 수
        finding_count: usize,
    },
    /// 로컬 pull 실패 (네트워크, 태그 없음, 디스크 부족 등)
    PullFailed {
        /// 대상 이미지 (`name:tag`)
        image: String,
        /// 실패 사유
        reason: String,
    },
    /// 스캔 실패 (타임아웃, 포맷 불량, 미지원 이미지 등)
    ScanFailed {
        /// 대상 이미지 (`name:tag`)
        image: String,
        /// 실패 사유
        reason: String,
    },
    /// 처리 전 제외 (취소 등)
    Skipped {
        /// 대상 이미지 (`name:tag`)
        image: String,
        /// 제외 사유
        reason: String,
    },
}

impl ScanOutcome {
    /// 성공 여부를 반환합니다.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// 실행 요약 — Controller가 CLI로 반환하는 최종 집계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 성공적으로 분석된 이미지 수
    pub analyzed: usize,
    /// 건너뛴 이미지 수 (pull/scan 실패 + 취소 포함)
    pub skipped: usize,
    /// 카탈로그에 기록된 고유 취약점 수
    pub vulnerabilities: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} analyzed, {} skipped, {} unique vulnerabilities",
            self.analyzed, self.skipped, self.vulnerabilities,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_clair_scale() {
        assert!(Severity::Negligible < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert!(Severity::Critical < Severity::Defcon1);
        assert!(Severity::Defcon1 < Severity::Unknown);
    }

    #[test]
    fn severity_parses_loosely() {
        assert_eq!(Severity::from_str_loose("High"), Severity::High);
        assert_eq!(Severity::from_str_loose("  critical "), Severity::Critical);
        assert_eq!(Severity::from_str_loose("whatever"), Severity::Unknown);
    }

    #[test]
    fn image_type_verified_tier() {
        assert!(ImageType::Certified.is_verified_tier());
        assert!(ImageType::Verified.is_verified_tier());
        assert!(!ImageType::Official.is_verified_tier());
        assert!(!ImageType::Community.is_verified_tier());
    }

    #[test]
    fn image_id_is_deterministic() {
        let a = ImageRecord::derive_id("library/nginx", "1.25", None);
        let b = ImageRecord::derive_id("library/nginx", "1.25", None);
        assert_eq!(a, b);

        let c = ImageRecord::derive_id("library/nginx", "1.24", None);
        assert_ne!(a, c);
    }

    #[test]
    fn image_id_changes_with_digest() {
        let without = ImageRecord::derive_id("library/nginx", "1.25", None);
        let with = ImageRecord::derive_id("library/nginx", "1.25", Some("sha256:abcd"));
        assert_ne!(without, with);

        let mut record = ImageRecord::new(ImageType::Official, "library/nginx", "1.25");
        assert_eq!(record.image_id, without);
        record.attach_digest("sha256:abcd");
        assert_eq!(record.image_id, with);
    }

    #[test]
    fn certified_flag_follows_type() {
        let certified = ImageRecord::new(ImageType::Certified, "store/ibm/db2", "11.5");
        assert!(certified.certified);
        assert!(certified.image_type.is_verified_tier());

        for t in [ImageType::Verified, ImageType::Official, ImageType::Community] {
            let record = ImageRecord::new(t, "someone/image", "latest");
            assert!(!record.certified);
        }
    }

    #[test]
    fn vulnerability_record_key_ignores_severity_and_cwe() {
        let a = VulnerabilityRecord {
            cve: "CVE-2020-1".to_owned(),
            cwe: Some("CWE-79".to_owned()),
            package_name: "openssl".to_owned(),
            package_version: "1.1.1".to_owned(),
            severity: Severity::High,
        };
        let b = VulnerabilityRecord {
            cwe: None,
            severity: Severity::Low,
            ..a.clone()
        };
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn image_record_serializes_type_field() {
        let record = ImageRecord::new(ImageType::Official, "library/redis", "7.2");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "official");
        assert_eq!(json["certified"], false);
        assert!(json["vulnerabilities"].as_array().unwrap().is_empty());
    }
}

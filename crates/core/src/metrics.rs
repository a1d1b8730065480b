//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `dockhound_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이미지 타입 레이블 키 (certified, verified, official, community)
pub const LABEL_IMAGE_TYPE: &str = "image_type";

/// 실패 사유 레이블 키 (pull, scan, cancelled)
pub const LABEL_REASON: &str = "reason";

// ─── 파이프라인 메트릭 ─────────────────────────────────────────────

/// Selector가 선택한 이미지 수 (counter, label: image_type)
pub const IMAGES_SELECTED_TOTAL: &str = "dockhound_images_selected_total";

/// 로컬로 pull된 이미지 수 (counter)
pub const IMAGES_PULLED_TOTAL: &str = "dockhound_images_pulled_total";

/// 분석 완료된 이미지 수 (counter)
pub const IMAGES_ANALYZED_TOTAL: &str = "dockhound_images_analyzed_total";

/// 건너뛴 이미지 수 (counter, label: reason)
pub const IMAGES_SKIPPED_TOTAL: &str = "dockhound_images_skipped_total";

/// 완료된 스캔 수 (counter)
pub const SCANS_COMPLETED_TOTAL: &str = "dockhound_scans_completed_total";

/// 카탈로그에 기록된 고유 취약점 수 (gauge)
pub const CATALOG_UNIQUE_VULNS: &str = "dockhound_catalog_unique_vulns";

/// 현재 점유 중인 로컬 이미지 슬롯 수 (gauge)
pub const LOCAL_IMAGE_SLOTS_IN_USE: &str = "dockhound_local_image_slots_in_use";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        IMAGES_SELECTED_TOTAL,
        "Images selected for analysis, per image type"
    );
    describe_counter!(IMAGES_PULLED_TOTAL, "Images pulled to the local store");
    describe_counter!(IMAGES_ANALYZED_TOTAL, "Images fully analyzed and correlated");
    describe_counter!(IMAGES_SKIPPED_TOTAL, "Images skipped, per failure reason");
    describe_counter!(SCANS_COMPLETED_TOTAL, "Completed clair-scanner invocations");
    describe_gauge!(
        CATALOG_UNIQUE_VULNS,
        "Unique (cve, package, version) entries in the vulnerability catalog"
    );
    describe_gauge!(
        LOCAL_IMAGE_SLOTS_IN_USE,
        "Local image slots currently occupied"
    );
}

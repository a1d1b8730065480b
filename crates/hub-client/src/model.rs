//! Hub 응답 페이로드 — Docker Hub v1/v2 API의 serde 구조체
//!
//! 필요한 필드만 선언하고 나머지는 무시합니다. API 응답 형태가 바뀌면
//! 역직렬화가 실패하고 [`HubClientError::UnexpectedPayload`]로 승격됩니다.
//!
//! [`HubClientError::UnexpectedPayload`]: crate::error::HubClientError::UnexpectedPayload

use serde::Deserialize;

// ─── v2 search / repositories ──────────────────────────────────────

/// v2 `search/repositories` 응답
#[derive(Debug, Clone, Deserialize)]
pub struct V2SearchResponse {
    /// 전체 결과 수
    pub count: u64,
    /// 다음 페이지 URL (없으면 마지막 페이지)
    #[serde(default)]
    pub next: Option<String>,
    /// 이 페이지의 결과
    #[serde(default)]
    pub results: Vec<V2SearchResult>,
}

/// v2 검색 결과 한 건
#[derive(Debug, Clone, Deserialize)]
pub struct V2SearchResult {
    /// 저장소 이름 (예: `bitnami/redis`, 공식 이미지는 `nginx`)
    pub repo_name: String,
    /// 누적 pull 수
    #[serde(default)]
    pub pull_count: u64,
    /// 공식 이미지 여부
    #[serde(default)]
    pub is_official: bool,
}

/// v2 `repositories/{name}` 응답 (저장소 상세)
#[derive(Debug, Clone, Deserialize)]
pub struct V2Repository {
    /// 저장소 이름
    pub name: String,
    /// 네임스페이스 (`library`면 공식)
    pub namespace: String,
    /// 누적 pull 수
    #[serde(default)]
    pub pull_count: u64,
    /// 마지막 갱신 시각 (RFC 3339)
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// v2 태그 목록 페이지
#[derive(Debug, Clone, Deserialize)]
pub struct V2TagPage {
    /// 전체 태그 수
    #[serde(default)]
    pub count: u64,
    /// 다음 페이지 URL (없으면 마지막 페이지)
    #[serde(default)]
    pub next: Option<String>,
    /// 이 페이지의 태그
    #[serde(default)]
    pub results: Vec<V2Tag>,
}

/// v2 태그 객체
#[derive(Debug, Clone, Deserialize)]
pub struct V2Tag {
    /// 태그 이름 (최신 push 순으로 정렬되어 반환됨)
    pub name: String,
    /// 마지막 갱신 시각 (RFC 3339)
    #[serde(default)]
    pub last_updated: Option<String>,
}

// ─── v1 products (certified / verified 전용) ───────────────────────

/// v1 `products/search` 응답
#[derive(Debug, Clone, Deserialize)]
pub struct V1SearchResponse {
    /// 전체 결과 수
    #[serde(default)]
    pub count: u64,
    /// 이 페이지의 요약 목록
    #[serde(default)]
    pub summaries: Vec<V1Summary>,
}

/// v1 검색 요약 한 건
#[derive(Debug, Clone, Deserialize)]
pub struct V1Summary {
    /// 슬러그 이름 (v1 API의 저장소 식별자)
    pub slug: String,
    /// 표시 이름
    #[serde(default)]
    pub name: Option<String>,
}

/// v1 `products/images/{slug}` 응답 (제품 상세)
#[derive(Debug, Clone, Deserialize)]
pub struct V1Product {
    /// 요금제 목록 — 첫 항목이 기본 요금제
    #[serde(default)]
    pub plans: Vec<V1Plan>,
    /// 전체 설명 (Microsoft 계열은 여기서 pull 명령을 파싱)
    #[serde(default)]
    pub full_description: Option<String>,
    /// 인기도 (v1의 누적 pull 지표)
    #[serde(default)]
    pub popularity: u64,
}

/// v1 요금제
#[derive(Debug, Clone, Deserialize)]
pub struct V1Plan {
    /// 인증 상태 (`certified`면 인증 이미지)
    #[serde(default)]
    pub certification_status: Option<String>,
    /// 저장소 목록
    #[serde(default)]
    pub repositories: Vec<V1PlanRepository>,
    /// 버전 목록
    #[serde(default)]
    pub versions: Vec<V1PlanVersion>,
}

/// v1 요금제의 저장소 항목
#[derive(Debug, Clone, Deserialize)]
pub struct V1PlanRepository {
    /// 네임스페이스 (`library` = official, `store` = certified/verified)
    #[serde(default)]
    pub namespace: String,
    /// 저장소 이름
    #[serde(default)]
    pub reponame: String,
}

/// v1 요금제의 버전 항목
#[derive(Debug, Clone, Deserialize)]
pub struct V1PlanVersion {
    /// 태그 목록
    #[serde(default)]
    pub tags: Vec<V1VersionTag>,
}

/// v1 버전의 태그 값
#[derive(Debug, Clone, Deserialize)]
pub struct V1VersionTag {
    /// 태그 문자열
    #[serde(default)]
    pub value: Option<String>,
}

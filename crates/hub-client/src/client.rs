//! Docker Hub API 클라이언트 — v1/v2 엔드포인트 접근과 페이지 열거
//!
//! certified/verified 이미지는 v1 products API로만, official/community
//! 이미지는 v2 search API로만 열거할 수 있습니다. [`HubClient`]는 두 API를
//! 모두 감싸고, [`CandidatePager`]가 타입별로 올바른 엔드포인트를 선택합니다.
//!
//! # 재시도 정책
//!
//! 타임아웃과 5xx는 지수 백오프로 제한된 횟수만큼 재시도합니다.
//! 401/403은 즉시 [`HubClientError::Auth`]로 승격되어 실행 전체를 중단시키고,
//! 그 외 4xx는 재시도 없이 호출자에게 전달됩니다. 단, 목록 엔드포인트가
//! 아닌 후보 개별 상세 조회의 4xx는 해당 후보만 건너뜁니다 — 검색 결과에는
//! 삭제되거나 이름이 바뀐 저장소가 일상적으로 섞여 있기 때문입니다.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use dockhound_core::config::HubConfig;
use dockhound_core::types::{Candidate, ImageType};

use crate::error::HubClientError;
use crate::model::{V1Product, V1SearchResponse, V2Repository, V2SearchResponse, V2TagPage};

/// Hub가 색인하지만 실제 이미지를 담지 않는 official 저장소
const EXCLUDED_OFFICIAL: &[&str] = &["scratch", "rocket.chat"];

/// 반복적으로 pull/분석이 실패하는 것으로 알려진 community 저장소
const EXCLUDED_COMMUNITY: &[&str] = &[
    "bugswarm/artifacts",
    "microsoft/oms",
    "programmerq/scaletest",
    "newrelic/nrsysmond",
    "weaveworks/weave-npc",
];

/// 브라우저 User-Agent — Hub API는 기본 클라이언트 UA에 불안정하게 응답함
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_1) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/39.0.2171.95 Safari/537.36";

/// 선택된 이미지의 보강 정보 (분석 시점에 조회)
#[derive(Debug, Clone, Default)]
pub struct ExtraInfo {
    /// 누적 pull 수
    pub total_pulls: u64,
    /// 마지막 갱신 시각 (RFC 3339)
    pub last_updated: Option<String>,
}

/// Docker Hub API 클라이언트
///
/// 모든 요청은 설정된 타임아웃과 재시도 정책을 공유합니다.
pub struct HubClient {
    http: reqwest::Client,
    v1_base: String,
    v2_base: String,
    page_size: u32,
    retry_max_attempts: u32,
    retry_backoff_base: Duration,
}

impl HubClient {
    /// 설정에서 클라이언트를 생성합니다.
    pub fn new(config: &HubConfig) -> Result<Self, HubClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HubClientError::Build(e.to_string()))?;

        Ok(Self {
            http,
            v1_base: config.api_v1_base.trim_end_matches('/').to_owned(),
            v2_base: config.api_v2_base.trim_end_matches('/').to_owned(),
            page_size: config.page_size,
            retry_max_attempts: config.retry_max_attempts,
            retry_backoff_base: Duration::from_millis(config.retry_backoff_base_ms),
        })
    }

    /// 타입별 후보 열거 페이저를 생성합니다.
    pub fn pager(&self, image_type: ImageType) -> CandidatePager<'_> {
        CandidatePager {
            client: self,
            image_type,
            page: 1,
            total: None,
            done: false,
        }
    }

    /// 저장소의 가장 최근 push된 태그를 조회합니다.
    ///
    /// Hub의 태그 API는 최신 push 순으로 반환하므로 첫 항목을 사용합니다.
    /// 태그가 전혀 없으면 `Ok(None)`입니다.
    pub async fn latest_tag(
        &self,
        repository: &str,
    ) -> Result<Option<(String, Option<String>)>, HubClientError> {
        let url = format!(
            "{}/repositories/{}/tags/?page_size={}&page=1",
            self.v2_base, repository, self.page_size,
        );
        let page: V2TagPage = self.get_json(&url).await?;
        Ok(page
            .results
            .into_iter()
            .next()
            .map(|tag| (tag.name, tag.last_updated)))
    }

    /// 저장소의 모든 태그 이름을 페이지를 따라가며 조회합니다.
    ///
    /// 부모 데이터베이스 구축 시 사용됩니다. 태그가 없으면 빈 벡터입니다.
    pub async fn repository_tags(&self, repository: &str) -> Result<Vec<String>, HubClientError> {
        let mut tags = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/repositories/{}/tags/?page_size={}&page={}",
                self.v2_base, repository, self.page_size, page,
            );
            let body: V2TagPage = self.get_json(&url).await?;
            let last_page = body.next.is_none() || body.results.is_empty();
            tags.extend(body.results.into_iter().map(|tag| tag.name));
            if last_page {
                return Ok(tags);
            }
            page += 1;
        }
    }

    /// 선택된 이미지의 보강 정보(total_pulls, last_updated)를 조회합니다.
    ///
    /// certified/verified는 v1 제품 상세(slug 필요), official/community는
    /// v2 저장소 상세를 사용합니다 — v1은 community를, v2는 certified를
    /// 조회할 수 없습니다.
    pub async fn extra_info(
        &self,
        image_type: ImageType,
        name: &str,
        slug: Option<&str>,
    ) -> Result<ExtraInfo, HubClientError> {
        if image_type.is_verified_tier() {
            let slug = slug.ok_or_else(|| HubClientError::UnexpectedPayload {
                url: self.v1_base.clone(),
                reason: format!("missing v1 slug for {image_type} image {name}"),
            })?;
            let product = self.product_detail(slug).await?;
            Ok(ExtraInfo {
                total_pulls: product.popularity,
                last_updated: None,
            })
        } else {
            let repository = qualify_official(image_type, name);
            let url = format!("{}/repositories/{}/", self.v2_base, repository);
            let detail: V2Repository = self.get_json(&url).await?;
            Ok(ExtraInfo {
                total_pulls: detail.pull_count,
                last_updated: detail.last_updated,
            })
        }
    }

    /// v1 제품 상세를 조회합니다 (certified/verified 전용).
    pub async fn product_detail(&self, slug: &str) -> Result<V1Product, HubClientError> {
        let url = format!("{}/products/images/{}", self.v1_base, slug);
        self.get_json(&url).await
    }

    // ─── 타입별 원시 페이지 조회 ───────────────────────────────────

    async fn list_v2_page(
        &self,
        query: &str,
        page: u32,
    ) -> Result<V2SearchResponse, HubClientError> {
        let url = format!(
            "{}/search/repositories/?query={}&page_size={}&page={}",
            self.v2_base, query, self.page_size, page,
        );
        self.get_json(&url).await
    }

    async fn list_v1_page(
        &self,
        filter: &str,
        page: u32,
    ) -> Result<V1SearchResponse, HubClientError> {
        let url = format!(
            "{}/products/search?q=&type=image&{}&page_size={}&page={}",
            self.v1_base, filter, self.page_size, page,
        );
        self.get_json(&url).await
    }

    /// v1 요약(slug)을 완전한 후보로 해석합니다.
    ///
    /// 제품 상세에서 저장소 이름과 태그를 추출하고, verified 열거 시에는
    /// certified/official 항목을 걸러냅니다. 해석 불가(이미지 없는 제품,
    /// pull 안내 없는 Microsoft 제품, 상세가 사라진 제품)는 `Ok(None)`으로
    /// 건너뜁니다.
    async fn resolve_v1_candidate(
        &self,
        image_type: ImageType,
        slug: &str,
    ) -> Result<Option<Candidate>, HubClientError> {
        let product = match self.product_detail(slug).await {
            Ok(product) => product,
            Err(err) if is_candidate_detail_skippable(&err) => {
                warn!(slug, error = %err, "skipping product with unreadable detail");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let Some(plan) = product.plans.first() else {
            debug!(slug, "skipping product without plans");
            return Ok(None);
        };

        let is_certified = plan.certification_status.as_deref() == Some("certified");
        if image_type == ImageType::Verified && is_certified {
            // image_filter=store 열거는 certified도 포함하므로 여기서 분리
            return Ok(None);
        }

        // Microsoft 제품은 자체 레지스트리를 쓰므로 설명의 pull 명령에서 추출
        let (name, tag) = if slug.contains("microsoft") {
            let Some(description) = product.full_description.as_deref() else {
                debug!(slug, "skipping microsoft product without description");
                return Ok(None);
            };
            match parse_pull_instruction(description) {
                Some((name, tag)) => (name, tag.unwrap_or_else(|| "latest".to_owned())),
                None => {
                    debug!(slug, "skipping product without explicit pull instruction");
                    return Ok(None);
                }
            }
        } else {
            let Some(repository) = plan.repositories.first() else {
                debug!(slug, "skipping product without repositories");
                return Ok(None);
            };
            if !repository.namespace.starts_with("store") && image_type.is_verified_tier() {
                // official이 store 필터에 섞여 들어온 경우
                return Ok(None);
            }
            let name = format!("{}/{}", repository.namespace, repository.reponame);
            let tag = plan
                .versions
                .first()
                .and_then(|v| v.tags.first())
                .and_then(|t| t.value.clone())
                .unwrap_or_else(|| "latest".to_owned());
            (name, tag)
        };

        Ok(Some(Candidate {
            name,
            tag: Some(tag),
            slug: Some(slug.to_owned()),
            pull_count: product.popularity,
            last_updated: None,
        }))
    }

    /// v2 검색 결과를 완전한 후보로 해석합니다 (태그 조회 포함).
    async fn resolve_v2_candidate(
        &self,
        image_type: ImageType,
        name: &str,
        pull_count: u64,
    ) -> Result<Option<Candidate>, HubClientError> {
        let repository = qualify_official(image_type, name);
        let listed = match self.latest_tag(&repository).await {
            Ok(listed) => listed,
            Err(err) if is_candidate_detail_skippable(&err) => {
                warn!(name, error = %err, "skipping repository with unreadable tag listing");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        match listed {
            Some((tag, last_updated)) => Ok(Some(Candidate {
                name: name.to_owned(),
                tag: Some(tag),
                slug: None,
                pull_count,
                last_updated,
            })),
            None => {
                debug!(name, "skipping repository without tags");
                Ok(None)
            }
        }
    }

    // ─── HTTP 공통 처리 ────────────────────────────────────────────

    /// GET 후 JSON 역직렬화. 일시적 실패는 지수 백오프로 재시도합니다.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HubClientError> {
        let mut last_failure = String::new();

        for attempt in 0..=self.retry_max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_backoff_base, attempt);
                debug!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
                tokio::time::sleep(delay).await;
            }

            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            HubClientError::UnexpectedPayload {
                                url: url.to_owned(),
                                reason: e.to_string(),
                            }
                        });
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(HubClientError::Auth(format!(
                            "{url} returned {status} (expired or missing credentials?)"
                        )));
                    }
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        warn!(url, %status, "transient registry failure");
                        last_failure = format!("{url} returned {status}");
                        continue;
                    }
                    // 재시도 의미가 없는 4xx
                    return Err(HubClientError::Http {
                        url: url.to_owned(),
                        status: status.as_u16(),
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(url, error = %e, "request failed, will retry");
                    last_failure = e.to_string();
                }
                Err(e) => {
                    return Err(HubClientError::Exhausted(e.to_string()));
                }
            }
        }

        Err(HubClientError::Exhausted(last_failure))
    }
}

/// 후보 하나의 상세 조회 실패가 그 후보만 건너뛸 사유인지 판단합니다.
///
/// 삭제·개명된 저장소의 상세/태그 조회는 404 등 4xx로 끝나며, 이는 실행
/// 전체의 문제가 아닙니다. 인증 오류와 재시도 소진은 그대로 전파됩니다.
fn is_candidate_detail_skippable(err: &HubClientError) -> bool {
    matches!(err, HubClientError::Http { .. })
}

/// official 이미지의 비정규 이름(`nginx`)을 v2 경로용으로 정규화합니다.
fn qualify_official(image_type: ImageType, name: &str) -> String {
    if image_type == ImageType::Official && !name.contains('/') {
        format!("library/{name}")
    } else {
        name.to_owned()
    }
}

/// n번째 재시도의 백오프 지연을 계산합니다 (base × 2^(n-1)).
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << (attempt - 1).min(10))
}

/// 제품 설명에서 `docker pull <name>[:<tag>]` 명령을 파싱합니다.
///
/// 레지스트리 호스트(`mcr.microsoft.com/...`)가 포함될 수 있으므로
/// 마지막 콜론 뒤에 `/`가 없을 때만 태그로 해석합니다.
fn parse_pull_instruction(description: &str) -> Option<(String, Option<String>)> {
    const MARKER: &str = "docker pull ";
    let start = description.find(MARKER)? + MARKER.len();
    let token: String = description[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '`' | '\'' | '"'))
        .collect();
    if token.is_empty() {
        return None;
    }
    match token.rfind(':') {
        Some(pos) if !token[pos + 1..].contains('/') && pos + 1 < token.len() => {
            Some((token[..pos].to_owned(), Some(token[pos + 1..].to_owned())))
        }
        _ => Some((token, None)),
    }
}

/// 타입별 후보 열거 페이저
///
/// 레지스트리가 정의한 순서(community는 pull 수 내림차순)를 보존하는
/// 게으른 시퀀스입니다. [`CandidatePager::restart`]로 처음부터 다시
/// 열거할 수 있습니다.
pub struct CandidatePager<'a> {
    client: &'a HubClient,
    image_type: ImageType,
    page: u32,
    total: Option<u64>,
    done: bool,
}

impl CandidatePager<'_> {
    /// 다음 페이지의 해석된 후보들을 반환합니다. 소진되면 `Ok(None)`.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Candidate>>, HubClientError> {
        if self.done {
            return Ok(None);
        }

        let candidates = match self.image_type {
            ImageType::Official => self.next_v2_page("library&is_official=true").await?,
            ImageType::Community => {
                self.next_v2_page("%2B&is_official=false&ordering=-pull_count")
                    .await?
            }
            ImageType::Certified => {
                self.next_v1_page("certification_status=certified").await?
            }
            ImageType::Verified => self.next_v1_page("image_filter=store").await?,
        };

        self.page += 1;
        Ok(Some(candidates))
    }

    /// 열거를 처음부터 다시 시작합니다.
    pub fn restart(&mut self) {
        self.page = 1;
        self.total = None;
        self.done = false;
    }

    async fn next_v2_page(&mut self, query: &str) -> Result<Vec<Candidate>, HubClientError> {
        let response = self.client.list_v2_page(query, self.page).await?;
        if response.next.is_none() || response.results.is_empty() {
            self.done = true;
        }

        let mut candidates = Vec::with_capacity(response.results.len());
        for result in response.results {
            if is_excluded(self.image_type, &result.repo_name) {
                debug!(name = %result.repo_name, "skipping excluded repository");
                continue;
            }
            if let Some(candidate) = self
                .client
                .resolve_v2_candidate(self.image_type, &result.repo_name, result.pull_count)
                .await?
            {
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }

    async fn next_v1_page(&mut self, filter: &str) -> Result<Vec<Candidate>, HubClientError> {
        let response = self.client.list_v1_page(filter, self.page).await?;

        let total = *self.total.get_or_insert(response.count);
        if u64::from(self.page * self.client.page_size) >= total || response.summaries.is_empty() {
            self.done = true;
        }

        let mut candidates = Vec::with_capacity(response.summaries.len());
        for summary in response.summaries {
            if let Some(candidate) = self
                .client
                .resolve_v1_candidate(self.image_type, &summary.slug)
                .await?
            {
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }
}

fn is_excluded(image_type: ImageType, name: &str) -> bool {
    match image_type {
        ImageType::Official => EXCLUDED_OFFICIAL.contains(&name),
        ImageType::Community => EXCLUDED_COMMUNITY.contains(&name),
        _ => false,
    }
}

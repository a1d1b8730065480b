//! 선택 정책 — 타입별 전수 수집 vs 표본 추출
//!
//! [`Selector`]는 파이프라인에서 이미지 타입으로 분기하는 유일한 지점입니다.
//! certified/verified/official은 후보 전체를 취하고, community는 인기순
//! 상위 윈도우(limit × 배수)에서 균등 무작위로 limit개를 뽑습니다 —
//! 전체 코퍼스 열거의 비용을 피하면서 인기 이미지를 우선하는, 문서화된
//! 표본 정책입니다.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::index::sample;
use tracing::{debug, info};

use dockhound_core::error::DockhoundError;
use dockhound_core::types::{Candidate, ImageRecord, ImageType};

/// 타입별 선택 정책 적용기
///
/// 순수 로직만 포함하며 네트워크 I/O는 하지 않습니다.
#[derive(Debug, Clone)]
pub struct Selector {
    /// community 표본 윈도우 배수 (윈도우 = limit × 배수)
    window_multiplier: u32,
}

impl Selector {
    /// 설정된 윈도우 배수로 Selector를 생성합니다.
    pub fn new(window_multiplier: u32) -> Self {
        Self { window_multiplier }
    }

    /// 후보 목록에 타입별 정책을 적용하여 분석 대상 레코드를 만듭니다.
    ///
    /// # Errors
    ///
    /// - community에 `limit`이 없거나 0이면 `InvalidArgument`
    /// - community가 아닌 타입에 `limit`이 주어지면 `InvalidArgument`
    pub fn select(
        &self,
        image_type: ImageType,
        candidates: Vec<Candidate>,
        limit: Option<usize>,
    ) -> Result<Vec<ImageRecord>, DockhoundError> {
        self.select_with_rng(image_type, candidates, limit, &mut rand::thread_rng())
    }

    /// `select`와 동일하되 호출자가 난수원을 제공합니다 (테스트용).
    pub fn select_with_rng<R: Rng + ?Sized>(
        &self,
        image_type: ImageType,
        candidates: Vec<Candidate>,
        limit: Option<usize>,
        rng: &mut R,
    ) -> Result<Vec<ImageRecord>, DockhoundError> {
        let unique = dedup_candidates(image_type, candidates);

        let selected = match image_type {
            ImageType::Community => {
                let limit = match limit {
                    Some(n) if n > 0 => n,
                    Some(_) => {
                        return Err(DockhoundError::InvalidArgument(
                            "x_images must be a positive integer for community images".to_owned(),
                        ));
                    }
                    None => {
                        return Err(DockhoundError::InvalidArgument(
                            "x_images is required for community images".to_owned(),
                        ));
                    }
                };
                self.sample_window(unique, limit, rng)
            }
            _ => {
                if limit.is_some() {
                    return Err(DockhoundError::InvalidArgument(format!(
                        "x_images is only valid for community images, not {image_type}"
                    )));
                }
                unique
            }
        };

        info!(
            image_type = %image_type,
            selected = selected.len(),
            "selection policy applied"
        );

        Ok(selected
            .into_iter()
            .map(|candidate| to_record(image_type, candidate))
            .collect())
    }

    /// 인기순 상위 윈도우에서 균등 무작위로 `limit`개를 뽑습니다.
    ///
    /// 후보는 레지스트리가 pull 수 내림차순으로 반환한 순서를 유지하므로
    /// 윈도우는 가장 인기 있는 접두 구간입니다. 후보가 `limit`보다 적으면
    /// 있는 만큼만 반환합니다.
    fn sample_window<R: Rng + ?Sized>(
        &self,
        candidates: Vec<Candidate>,
        limit: usize,
        rng: &mut R,
    ) -> Vec<Candidate> {
        let window = candidates
            .len()
            .min(limit.saturating_mul(self.window_multiplier as usize));
        let take = limit.min(window);

        debug!(window, take, pool = candidates.len(), "sampling community window");

        let mut picked: Vec<usize> = sample(rng, window, take).into_vec();
        picked.sort_unstable();

        let mut selected = Vec::with_capacity(take);
        let mut candidates = candidates;
        // 인덱스 내림차순으로 꺼내면 swap_remove 없이 순서가 유지됨
        for index in picked.into_iter().rev() {
            selected.push(candidates.remove(index));
        }
        selected.reverse();
        selected
    }
}

/// 태그 없는 후보를 제외하고 이미지 식별자로 중복을 제거합니다.
///
/// 레지스트리 순서(인기순)를 보존합니다.
fn dedup_candidates(image_type: ImageType, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| {
            let Some(tag) = candidate.tag.as_deref() else {
                debug!(name = %candidate.name, "dropping candidate without tag");
                return false;
            };
            let id = ImageRecord::derive_id(&candidate.name, tag, None);
            if !seen.insert(id) {
                debug!(name = %candidate.name, %image_type, "dropping duplicate candidate");
                return false;
            }
            true
        })
        .collect()
}

fn to_record(image_type: ImageType, candidate: Candidate) -> ImageRecord {
    // dedup_candidates가 태그 없는 후보를 걸러냈으므로 여기서는 항상 존재
    let tag = candidate.tag.unwrap_or_else(|| "latest".to_owned());
    let mut record = ImageRecord::new(image_type, candidate.name, tag);
    record.total_pulls = candidate.pull_count;
    record.last_updated = candidate.last_updated;
    record
}

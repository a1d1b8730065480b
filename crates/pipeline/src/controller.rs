//! 실행 제어 — 조립, 순서 제어, 수명주기 관리
//!
//! [`PipelineController`]는 한 번의 실행을 끝까지 이끄는 중앙 조정자입니다.
//! 순서는 고정되어 있습니다:
//!
//! 1. 스캐너 환경 사전 검증 (실패 시 어떤 이미지도 pull하지 않고 중단)
//! 2. 레지스트리 열거와 타입별 선택
//! 3. 이미지별 {슬롯 획득 → pull → 스캔 → 상관관계 분석 → 삭제}
//! 4. 출력 파일 작성과 실행 요약
//!
//! 이미지 단위 실패(pull/스캔)는 격리되어 해당 이미지만 건너뛰고,
//! 인증·환경·인자 오류는 실행 전체를 중단하며 출력을 남기지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dockhound_clair::VulnerabilityScanner;
use dockhound_core::config::DockhoundConfig;
use dockhound_core::error::DockhoundError;
use dockhound_core::metrics as metric_names;
use dockhound_core::types::{Candidate, ImageRecord, ImageType, RunSummary, ScanOutcome};
use dockhound_hub_client::{HubClient, Selector};
use dockhound_image_store::acquirer::ImageAcquirer;
use dockhound_image_store::docker::{DockerClient, RegistryAuth};

use crate::correlator::Correlator;
use crate::error::PipelineError;
use crate::output::OutputWriter;
use crate::parents::ParentIndex;

/// 파이프라인 실행 조정자
pub struct PipelineController<C, S> {
    config: DockhoundConfig,
    hub: HubClient,
    selector: Selector,
    acquirer: Arc<ImageAcquirer<C>>,
    scanner: Arc<S>,
    correlator: Arc<Correlator>,
    parents: Arc<ParentIndex>,
    output: OutputWriter,
    cancel: CancellationToken,
}

impl<C: DockerClient, S: VulnerabilityScanner> PipelineController<C, S> {
    /// 검증된 설정과 의존 구성요소로 컨트롤러를 조립합니다.
    ///
    /// # Errors
    ///
    /// Hub HTTP 클라이언트 생성에 실패하면 에러를 반환합니다.
    pub fn new(
        config: DockhoundConfig,
        docker: Arc<C>,
        scanner: Arc<S>,
        cancel: CancellationToken,
    ) -> Result<Self, DockhoundError> {
        let hub = HubClient::new(&config.hub)?;
        let auth = match (&config.hub.username, &config.hub.password) {
            (Some(username), Some(password)) => Some(RegistryAuth {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        let acquirer = Arc::new(ImageAcquirer::new(Arc::clone(&docker), &config.store, auth));
        let selector = Selector::new(config.hub.community_window_multiplier);
        let parents = Arc::new(ParentIndex::load_latest(&config.pipeline.parent_db_dir));
        let output = OutputWriter::new(&config.general.output_dir);

        Ok(Self {
            config,
            hub,
            selector,
            acquirer,
            scanner,
            correlator: Arc::new(Correlator::new()),
            parents,
            output,
            cancel,
        })
    }

    /// 한 번의 실행을 처음부터 끝까지 수행합니다.
    ///
    /// `limit`은 community에서만 유효하며(필수, 양수), 다른 타입에
    /// 주어지면 `InvalidArgument`로 중단합니다.
    ///
    /// # Errors
    ///
    /// 인증·스캐너 환경·인자 오류와 열거 실패는 실행 전체를 중단시키고
    /// 출력 파일을 남기지 않습니다.
    pub async fn run(
        &self,
        image_type: ImageType,
        limit: Option<usize>,
    ) -> Result<RunSummary, DockhoundError> {
        let window = enumeration_window(image_type, limit, &self.config)?;

        self.preflight().await?;

        let candidates = self.enumerate(image_type, window).await?;
        let slugs: HashMap<String, String> = candidates
            .iter()
            .filter_map(|c| Some((c.name.clone(), c.slug.clone()?)))
            .collect();

        let mut records = self.selector.select(image_type, candidates, limit)?;
        metrics::counter!(
            metric_names::IMAGES_SELECTED_TOTAL,
            metric_names::LABEL_IMAGE_TYPE => image_type.to_string(),
        )
        .increment(records.len() as u64);
        info!(%image_type, selected = records.len(), "images selected for analysis");

        self.enrich(image_type, &mut records, &slugs).await;
        self.finish(records).await
    }

    /// 스캐너 환경만 검증합니다 (설정 점검용).
    ///
    /// # Errors
    ///
    /// 환경이 준비되지 않았으면 `ScannerEnvironment`
    pub async fn preflight(&self) -> Result<(), DockhoundError> {
        self.scanner
            .verify_environment()
            .await
            .map_err(DockhoundError::from)
    }

    /// 이미 선택된 레코드 집합으로 실행합니다 (열거 생략).
    ///
    /// 사전 검증은 동일하게 수행되며, 검증 실패 시 출력을 남기지
    /// 않습니다.
    pub async fn execute(&self, records: Vec<ImageRecord>) -> Result<RunSummary, DockhoundError> {
        self.preflight().await?;
        self.finish(records).await
    }

    /// 처리, 집계, 출력 작성.
    async fn finish(&self, records: Vec<ImageRecord>) -> Result<RunSummary, DockhoundError> {
        let outcomes = self.process_images(records).await?;

        let mut analyzed = Vec::new();
        let mut skipped = 0usize;
        for outcome in outcomes {
            match outcome {
                ScanOutcome::Success {
                    record,
                    finding_count,
                } => {
                    metrics::counter!(metric_names::IMAGES_ANALYZED_TOTAL).increment(1);
                    info!(
                        image = %record.reference(),
                        findings = finding_count,
                        "image analyzed"
                    );
                    analyzed.push(*record);
                }
                ScanOutcome::PullFailed { image, reason } => {
                    skipped += 1;
                    metrics::counter!(
                        metric_names::IMAGES_SKIPPED_TOTAL,
                        metric_names::LABEL_REASON => "pull_failed",
                    )
                    .increment(1);
                    warn!(%image, %reason, "skipping image: pull failed");
                }
                ScanOutcome::ScanFailed { image, reason } => {
                    skipped += 1;
                    metrics::counter!(
                        metric_names::IMAGES_SKIPPED_TOTAL,
                        metric_names::LABEL_REASON => "scan_failed",
                    )
                    .increment(1);
                    warn!(%image, %reason, "skipping image: scan failed");
                }
                ScanOutcome::Skipped { image, reason } => {
                    skipped += 1;
                    metrics::counter!(
                        metric_names::IMAGES_SKIPPED_TOTAL,
                        metric_names::LABEL_REASON => "cancelled",
                    )
                    .increment(1);
                    info!(%image, %reason, "image skipped");
                }
            }
        }

        let catalog = self.correlator.snapshot().await;
        metrics::gauge!(metric_names::CATALOG_UNIQUE_VULNS).set(catalog.len() as f64);

        self.output
            .write_run(&analyzed, &catalog)
            .await
            .map_err(DockhoundError::from)?;

        let summary = RunSummary {
            analyzed: analyzed.len(),
            skipped,
            vulnerabilities: catalog.len(),
        };
        info!(%summary, "run complete");
        Ok(summary)
    }

    /// 워커 풀로 이미지들을 처리합니다.
    ///
    /// 동시 처리 정도는 `pipeline.workers`로 제한되고, 로컬 디스크 사용량은
    /// 워커 수와 무관하게 이미지 슬롯 풀이 제한합니다. 취소되면 새 이미지
    /// 디스패치를 멈추고 진행 중인 스캔만 마저 끝냅니다.
    pub async fn process_images(
        &self,
        records: Vec<ImageRecord>,
    ) -> Result<Vec<ScanOutcome>, DockhoundError> {
        let workers = Arc::new(Semaphore::new(self.config.pipeline.workers.max(1)));
        let mut tasks: JoinSet<ScanOutcome> = JoinSet::new();
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            if self.cancel.is_cancelled() {
                outcomes.push(ScanOutcome::Skipped {
                    image: record.reference(),
                    reason: "run cancelled before dispatch".to_owned(),
                });
                continue;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&workers).acquire_owned() => {
                    permit.map_err(|e| DockhoundError::Pipeline(format!("worker pool closed: {e}")))?
                }
                () = self.cancel.cancelled() => {
                    outcomes.push(ScanOutcome::Skipped {
                        image: record.reference(),
                        reason: "run cancelled before dispatch".to_owned(),
                    });
                    continue;
                }
            };

            let acquirer = Arc::clone(&self.acquirer);
            let scanner = Arc::clone(&self.scanner);
            let correlator = Arc::clone(&self.correlator);
            let parents = Arc::clone(&self.parents);
            tasks.spawn(async move {
                let outcome = process_one(acquirer, scanner, correlator, parents, record).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| {
                DockhoundError::from(PipelineError::WorkerAborted(e.to_string()))
            })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// 타입별 엔드포인트를 끝까지(또는 윈도우까지) 열거합니다.
    async fn enumerate(
        &self,
        image_type: ImageType,
        window: Option<usize>,
    ) -> Result<Vec<Candidate>, DockhoundError> {
        let mut pager = self.hub.pager(image_type);
        let mut candidates = Vec::new();

        while let Some(page) = pager.next_page().await? {
            candidates.extend(page);
            if self.cancel.is_cancelled() {
                break;
            }
            if let Some(window) = window
                && candidates.len() >= window
            {
                candidates.truncate(window);
                break;
            }
        }

        info!(%image_type, candidates = candidates.len(), "enumeration finished");
        Ok(candidates)
    }

    /// 누락된 메타데이터(total_pulls, last_updated)를 보강합니다.
    ///
    /// 보강은 부가 정보이므로 조회 실패는 경고 후 계속합니다.
    async fn enrich(
        &self,
        image_type: ImageType,
        records: &mut [ImageRecord],
        slugs: &HashMap<String, String>,
    ) {
        for record in records {
            if record.total_pulls > 0 && record.last_updated.is_some() {
                continue;
            }
            let slug = slugs.get(&record.name).map(String::as_str);
            match self.hub.extra_info(image_type, &record.name, slug).await {
                Ok(extra) => {
                    if record.total_pulls == 0 {
                        record.total_pulls = extra.total_pulls;
                    }
                    if record.last_updated.is_none() {
                        record.last_updated = extra.last_updated;
                    }
                }
                Err(err) => {
                    warn!(image = %record.name, error = %err, "metadata enrichment failed");
                }
            }
        }
    }
}

/// community 열거 윈도우를 계산하고 타입별 인자 규칙을 검증합니다.
fn enumeration_window(
    image_type: ImageType,
    limit: Option<usize>,
    config: &DockhoundConfig,
) -> Result<Option<usize>, DockhoundError> {
    match image_type {
        ImageType::Community => {
            let limit = limit.filter(|n| *n > 0).ok_or_else(|| {
                DockhoundError::InvalidArgument(
                    "x_images is required (positive) for community images".to_owned(),
                )
            })?;
            Ok(Some(limit.saturating_mul(
                config.hub.community_window_multiplier as usize,
            )))
        }
        _ => {
            if limit.is_some() {
                return Err(DockhoundError::InvalidArgument(format!(
                    "x_images is only valid for community images, not {image_type}"
                )));
            }
            Ok(None)
        }
    }
}

/// 이미지 하나의 전체 수명주기: 획득 → 스캔 → 계보 → 삭제 → 상관관계.
///
/// 어떤 실패 경로에서도 로컬 이미지와 슬롯은 회수됩니다.
async fn process_one<C: DockerClient, S: VulnerabilityScanner>(
    acquirer: Arc<ImageAcquirer<C>>,
    scanner: Arc<S>,
    correlator: Arc<Correlator>,
    parents: Arc<ParentIndex>,
    mut record: ImageRecord,
) -> ScanOutcome {
    let image = record.reference();

    let local = match acquirer.acquire(&image).await {
        Ok(local) => local,
        Err(err) => {
            return ScanOutcome::PullFailed {
                image,
                reason: err.to_string(),
            };
        }
    };

    if let Some(digest) = local.digest() {
        record.attach_digest(digest);
    }

    let findings = match scanner.scan(local.reference()).await {
        Ok(findings) => findings,
        Err(err) => {
            let reason = err.to_string();
            if let Err(remove_err) = local.remove().await {
                warn!(%image, error = %remove_err, "cleanup after failed scan also failed");
            }
            return ScanOutcome::ScanFailed { image, reason };
        }
    };
    metrics::counter!(metric_names::SCANS_COMPLETED_TOTAL).increment(1);

    let lineage = parents.resolve(&record.name, local.layers());
    if let Err(err) = local.remove().await {
        warn!(%image, error = %err, "failed to remove analyzed image");
    }

    let finding_count = findings.len();
    let record = correlator.correlate(record, findings, lineage).await;

    ScanOutcome::Success {
        record: Box::new(record),
        finding_count,
    }
}

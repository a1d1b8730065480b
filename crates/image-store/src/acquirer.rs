//! 슬롯 풀 기반 이미지 획득기
//!
//! [`ImageAcquirer`]는 세마포어 슬롯 풀로 로컬에 동시에 존재하는 분석 대상
//! 이미지 수를 제한합니다. pull은 슬롯을 잡은 뒤에만 시작되고, 슬롯은
//! [`LocalImage`]가 삭제되거나 드롭될 때 반환됩니다. 이미지 여러 개를
//! 동시에 받아 디스크를 가득 채우는 일이 구조적으로 불가능합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use dockhound_core::config::StoreConfig;
use dockhound_core::metrics as metric_names;

use crate::docker::{DockerClient, PulledImage, RegistryAuth};
use crate::error::ImageStoreError;

/// 로컬 이미지 수명주기 관리자
///
/// 슬롯 수만큼의 이미지만 동시에 로컬 디스크에 존재할 수 있습니다.
pub struct ImageAcquirer<C> {
    client: Arc<C>,
    slots: Arc<Semaphore>,
    pull_timeout: Duration,
    auth: Option<RegistryAuth>,
}

impl<C: DockerClient> ImageAcquirer<C> {
    /// 설정과 Docker 클라이언트로 획득기를 생성합니다.
    ///
    /// `auth`는 Docker Hub 계정이 설정된 경우 pull 요청에 전달됩니다
    /// (rate limit 완화 및 비공개 저장소 접근).
    pub fn new(client: Arc<C>, config: &StoreConfig, auth: Option<RegistryAuth>) -> Self {
        Self {
            client,
            slots: Arc::new(Semaphore::new(config.max_local_images)),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
            auth,
        }
    }

    /// 슬롯을 확보한 뒤 이미지를 pull하여 로컬 핸들을 반환합니다.
    ///
    /// 슬롯이 모두 사용 중이면 하나가 반환될 때까지 대기합니다.
    /// pull이 제한 시간을 넘기면 슬롯을 즉시 반환하고 실패합니다.
    ///
    /// # Errors
    ///
    /// - `ImageStoreError::PullTimeout`: 제한 시간 초과
    /// - `ImageStoreError::PullFailed`: 레지스트리가 pull을 거부
    pub async fn acquire(&self, reference: &str) -> Result<LocalImage<C>, ImageStoreError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| ImageStoreError::Api(format!("slot pool closed: {e}")))?;
        metrics::gauge!(metric_names::LOCAL_IMAGE_SLOTS_IN_USE).increment(1.0);

        debug!(image = reference, "slot acquired, pulling");

        let pull = self.client.pull_image(reference, self.auth.as_ref());
        let pulled = match tokio::time::timeout(self.pull_timeout, pull).await {
            Ok(Ok(pulled)) => pulled,
            Ok(Err(err)) => {
                metrics::gauge!(metric_names::LOCAL_IMAGE_SLOTS_IN_USE).decrement(1.0);
                drop(permit);
                return Err(err);
            }
            Err(_) => {
                metrics::gauge!(metric_names::LOCAL_IMAGE_SLOTS_IN_USE).decrement(1.0);
                drop(permit);
                return Err(ImageStoreError::PullTimeout {
                    image: reference.to_owned(),
                    secs: self.pull_timeout.as_secs(),
                });
            }
        };

        debug!(
            image = reference,
            layers = pulled.layers.len(),
            digest = pulled.digest.as_deref().unwrap_or("<none>"),
            "image pulled"
        );
        metrics::counter!(metric_names::IMAGES_PULLED_TOTAL).increment(1);

        Ok(LocalImage {
            reference: reference.to_owned(),
            pulled,
            client: Arc::clone(&self.client),
            permit: Some(permit),
        })
    }

    /// 현재 사용 가능한 슬롯 수 (테스트 및 상태 보고용)
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

/// 디스크에 존재하는 pull된 이미지 핸들
///
/// 드롭 시 슬롯은 반환되지만 이미지는 디스크에 남습니다. 분석이 끝나면
/// 반드시 [`remove`](Self::remove)를 호출해 이미지를 삭제해야 합니다.
pub struct LocalImage<C> {
    reference: String,
    pulled: PulledImage,
    client: Arc<C>,
    permit: Option<OwnedSemaphorePermit>,
}

impl<C: DockerClient> LocalImage<C> {
    /// 이미지 참조 (`name:tag`)
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// 레지스트리가 보고한 콘텐츠 다이제스트
    pub fn digest(&self) -> Option<&str> {
        self.pulled.digest.as_deref()
    }

    /// 파일시스템 레이어 식별자 (최하위 레이어부터)
    pub fn layers(&self) -> &[String] {
        &self.pulled.layers
    }

    /// 로컬 이미지를 삭제하고 슬롯을 반환합니다.
    ///
    /// 삭제 실패는 경고로 기록하고 에러로 반환하되, 슬롯은 어떤 경우에도
    /// 반환됩니다 (핸들 드롭 시 반환).
    pub async fn remove(self) -> Result<(), ImageStoreError> {
        let result = self.client.remove_image(&self.reference).await;
        if let Err(err) = &result {
            warn!(image = %self.reference, error = %err, "failed to remove local image");
        } else {
            debug!(image = %self.reference, "local image removed");
        }
        result
    }
}

impl<C> Drop for LocalImage<C> {
    fn drop(&mut self) {
        if self.permit.take().is_some() {
            metrics::gauge!(metric_names::LOCAL_IMAGE_SLOTS_IN_USE).decrement(1.0);
        }
    }
}

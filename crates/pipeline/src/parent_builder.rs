//! 부모 데이터베이스 구축
//!
//! 계보 해석([`crate::parents`])이 읽는 부모 데이터베이스를 Hub에서 직접
//! 구축합니다. 타입의 저장소를 열거하고, 태그마다 이미지를 pull하여
//! 레이어 id 조합을 수집한 뒤, 저장소 이름을 키로 하는 JSON 파일로
//! 내보냅니다. 같은 레이어 조합으로 push된 중복 태그는 한 항목만 남깁니다.
//!
//! official은 태그 전체를 열거할 수 있지만, verified는 v1 API가 태그
//! 목록을 제공하지 않으므로 열거 시 해석된 대표 태그 하나만 수집합니다.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dockhound_core::config::DockhoundConfig;
use dockhound_core::error::DockhoundError;
use dockhound_core::types::ImageType;
use dockhound_hub_client::HubClient;
use dockhound_image_store::docker::{DockerClient, RegistryAuth};

use crate::error::PipelineError;
use crate::parents::{IndexedImage, normalize_layer_id};

/// 파일 이름 타임스탬프 형식 (출력 파일과 동일)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// 부모 데이터베이스 구축기
pub struct ParentDbBuilder<C> {
    hub: HubClient,
    docker: Arc<C>,
    auth: Option<RegistryAuth>,
    db_dir: PathBuf,
    cancel: CancellationToken,
}

impl<C: DockerClient> ParentDbBuilder<C> {
    /// 검증된 설정으로 구축기를 조립합니다.
    ///
    /// # Errors
    ///
    /// Hub HTTP 클라이언트 생성에 실패하면 에러를 반환합니다.
    pub fn new(
        config: &DockhoundConfig,
        docker: Arc<C>,
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
        Ok(Self {
            hub,
            docker,
            auth,
            db_dir: PathBuf::from(&config.pipeline.parent_db_dir),
            cancel,
        })
    }

    /// 타입의 저장소를 전부 순회하며 데이터베이스를 구축하고 파일 경로를
    /// 반환합니다. 취소되면 지금까지의 결과를 부분 데이터베이스로 씁니다.
    ///
    /// # Errors
    ///
    /// official/verified 외의 타입은 `InvalidArgument`, 열거의 인증 실패와
    /// 파일 쓰기 실패는 그대로 전파됩니다. 저장소·태그 단위 실패는 해당
    /// 항목만 건너뜁니다.
    pub async fn build(&self, image_type: ImageType) -> Result<PathBuf, DockhoundError> {
        if !matches!(image_type, ImageType::Official | ImageType::Verified) {
            return Err(DockhoundError::InvalidArgument(format!(
                "parent database supports official or verified images, not {image_type}"
            )));
        }

        let mut database: BTreeMap<String, Vec<IndexedImage>> = BTreeMap::new();
        let mut pager = self.hub.pager(image_type);

        'enumeration: while let Some(page) = pager.next_page().await? {
            for candidate in page {
                if self.cancel.is_cancelled() {
                    info!("parent database build cancelled, writing partial result");
                    break 'enumeration;
                }

                let tags = match image_type {
                    ImageType::Official => {
                        let qualified = format!("library/{}", candidate.name);
                        match self.hub.repository_tags(&qualified).await {
                            Ok(tags) => tags,
                            Err(err) => {
                                warn!(
                                    repository = %candidate.name,
                                    error = %err,
                                    "skipping repository with unreadable tag listing"
                                );
                                continue;
                            }
                        }
                    }
                    _ => vec![candidate.tag.clone().unwrap_or_else(|| "latest".to_owned())],
                };

                let images = collect_repository(
                    self.docker.as_ref(),
                    self.auth.as_ref(),
                    &candidate.name,
                    &tags,
                    &self.cancel,
                )
                .await;
                if !images.is_empty() {
                    database.insert(candidate.name.clone(), images);
                }
            }
        }

        self.write(image_type, &database)
            .await
            .map_err(DockhoundError::from)
    }

    async fn write(
        &self,
        image_type: ImageType,
        database: &BTreeMap<String, Vec<IndexedImage>>,
    ) -> Result<PathBuf, PipelineError> {
        tokio::fs::create_dir_all(&self.db_dir)
            .await
            .map_err(|e| PipelineError::OutputWrite {
                path: self.db_dir.clone(),
                reason: e.to_string(),
            })?;

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        let path = self.db_dir.join(format!("{image_type}_{timestamp}.json"));
        let body = serde_json::to_vec_pretty(database)
            .map_err(|e| PipelineError::Serialize(e.to_string()))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| PipelineError::OutputWrite {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        info!(
            file = %path.display(),
            repositories = database.len(),
            "parent database written"
        );
        Ok(path)
    }
}

/// 한 저장소의 태그들을 pull하여 레이어 조합을 수집합니다.
///
/// pull 실패는 해당 태그만 건너뛰고, 수집이 끝난 로컬 이미지는 즉시
/// 삭제합니다. 같은 레이어 조합은 처음 만난 태그만 남습니다.
async fn collect_repository<C: DockerClient>(
    docker: &C,
    auth: Option<&RegistryAuth>,
    repository: &str,
    tags: &[String],
    cancel: &CancellationToken,
) -> Vec<IndexedImage> {
    let mut images: Vec<IndexedImage> = Vec::new();

    for tag in tags {
        if cancel.is_cancelled() {
            break;
        }

        let reference = format!("{repository}:{tag}");
        let pulled = match docker.pull_image(&reference, auth).await {
            Ok(pulled) => pulled,
            Err(err) => {
                warn!(image = %reference, error = %err, "skipping unretrievable tag");
                continue;
            }
        };
        if let Err(err) = docker.remove_image(&reference).await {
            warn!(image = %reference, error = %err, "failed to remove pulled image");
        }

        let fs_layers: String = pulled
            .layers
            .iter()
            .map(|layer| normalize_layer_id(layer))
            .collect();
        if fs_layers.is_empty() {
            continue;
        }
        if images.iter().any(|image| image.fs_layers == fs_layers) {
            // 같은 이미지가 여러 태그로 push된 경우
            continue;
        }

        images.push(IndexedImage {
            image_tag: tag.clone(),
            fs_layers,
        });
    }

    images
}

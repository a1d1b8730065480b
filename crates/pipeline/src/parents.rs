//! 부모 이미지 계보 해석
//!
//! 부모 데이터베이스는 저장소 이름을 키로, 각 저장소의 태그별 레이어
//! 조합을 값으로 갖는 JSON 파일입니다:
//!
//! ```json
//! {
//!   "debian": [{"image_tag": "stretch-slim", "fs_layers": "6ae821421a7d"}],
//!   "nginx":  [{"image_tag": "1.15", "fs_layers": "6ae821421a7df2998c26..."}]
//! }
//! ```
//!
//! `fs_layers`는 12자리 레이어 id를 이어 붙인 문자열입니다. 분석 대상
//! 이미지의 레이어 체인 접두가 다른 저장소의 레이어 조합과 정확히
//! 일치하면 그 저장소가 부모입니다.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use dockhound_core::types::ParentImage;

/// 한 레이어 id의 정규화된 길이 (예: `6ae821421a7d`)
const LAYER_ID_LENGTH: usize = 12;

/// 부모 데이터베이스의 이미지 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndexedImage {
    /// 이미지 태그
    #[serde(default)]
    pub(crate) image_tag: String,
    /// 이어 붙인 레이어 id 조합
    #[serde(default)]
    pub(crate) fs_layers: String,
}

/// 메모리에 로드된 부모 데이터베이스
///
/// 로딩 실패는 경고 후 빈 인덱스로 강등됩니다 — 계보는 부가 정보이며
/// 실행을 중단할 이유가 되지 않습니다.
#[derive(Debug, Default)]
pub struct ParentIndex {
    repositories: BTreeMap<String, Vec<IndexedImage>>,
}

impl ParentIndex {
    /// 디렉토리에서 가장 최근에 수정된 JSON 파일을 로드합니다.
    ///
    /// 디렉토리가 없거나, JSON 파일이 없거나, 파싱에 실패하면 빈
    /// 인덱스를 반환합니다.
    pub fn load_latest(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let Some(path) = newest_json_file(dir) else {
            debug!(dir = %dir.display(), "no parent database found, lineage disabled");
            return Self::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, Vec<IndexedImage>>>(
                &content,
            ) {
                Ok(repositories) => {
                    debug!(
                        file = %path.display(),
                        repositories = repositories.len(),
                        "parent database loaded"
                    );
                    Self { repositories }
                }
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "unreadable parent database");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(file = %path.display(), error = %err, "failed to read parent database");
                Self::default()
            }
        }
    }

    /// JSON 문자열에서 직접 인덱스를 만듭니다 (테스트용).
    pub fn from_json(content: &str) -> Self {
        match serde_json::from_str(content) {
            Ok(repositories) => Self { repositories },
            Err(err) => {
                warn!(error = %err, "unreadable parent database");
                Self::default()
            }
        }
    }

    /// 이미지의 레이어 체인으로 부모 저장소 목록을 해석합니다.
    ///
    /// 레이어 접두를 한 레이어씩 늘려가며 다른 저장소의 레이어 조합과
    /// 비교합니다. 반환 순서는 가장 먼 조상(짧은 접두)부터 가장 가까운
    /// 부모(긴 접두) 순입니다. 자기 자신의 저장소는 제외합니다.
    pub fn resolve(&self, repository: &str, layers: &[String]) -> Vec<ParentImage> {
        let mut parents = Vec::new();
        let mut prefix = String::new();

        for layer in layers {
            prefix.push_str(&normalize_layer_id(layer));

            for (repo, images) in &self.repositories {
                if repo == repository {
                    continue;
                }
                for image in images {
                    if image.fs_layers == prefix {
                        parents.push(ParentImage {
                            name: repo.clone(),
                            tag: image.image_tag.clone(),
                        });
                    }
                }
            }
        }

        parents
    }

    /// 인덱스에 저장소가 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

/// 레이어 id를 데이터베이스 표기(12자리, 다이제스트 접두 제거)로 맞춥니다.
pub(crate) fn normalize_layer_id(layer: &str) -> String {
    let stripped = layer.strip_prefix("sha256:").unwrap_or(layer);
    stripped.chars().take(LAYER_ID_LENGTH).collect()
}

fn newest_json_file(dir: &Path) -> Option<std::path::PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .max_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|meta| meta.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
}

//! Docker API abstraction for testability.
//!
//! The [`DockerClient`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardDockerClient`] while tests use `MockDockerClient`.
//!
//! # Image Reference Validation
//!
//! All methods that accept image references perform validation before the
//! reference reaches the daemon or a child process:
//! - Must be 1-255 characters
//! - Must contain only `[a-zA-Z0-9._:/@-]` (registry reference grammar subset)
//! - Empty references and references with shell metacharacters are rejected

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::TryStreamExt;

use crate::error::ImageStoreError;

/// Validates an image reference to prevent injection into the daemon API
/// or the scanner command line.
pub fn validate_image_reference(reference: &str) -> Result<(), ImageStoreError> {
    if reference.is_empty() || reference.len() > 255 {
        return Err(ImageStoreError::InvalidReference(format!(
            "length {} (must be 1-255)",
            reference.len()
        )));
    }
    let valid = reference
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '/' | '@' | '-'));
    if !valid {
        return Err(ImageStoreError::InvalidReference(
            "contains characters outside the registry reference grammar".to_owned(),
        ));
    }
    Ok(())
}

/// Registry credentials forwarded to the daemon during pull.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    /// Registry username
    pub username: String,
    /// Registry password or access token
    pub password: String,
}

/// Metadata captured right after a successful pull.
#[derive(Debug, Clone)]
pub struct PulledImage {
    /// Content digest (`sha256:...`) reported by the registry, when available
    pub digest: Option<String>,
    /// Filesystem layer identifiers, outermost last
    pub layers: Vec<String>,
}

/// Minimal view of a running container, used by scanner preflight.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Container name without the leading slash
    pub name: String,
    /// Image reference the container was created from
    pub image: String,
    /// Container state (`running`, `exited`, ...)
    pub state: String,
}

/// Trait abstracting the Docker API operations the pipeline needs.
///
/// # Implementations
///
/// - [`BollardDockerClient`]: Production implementation using the `bollard` library
/// - `MockDockerClient`: Test implementation with configurable responses (tests only)
pub trait DockerClient: Send + Sync + 'static {
    /// Pulls an image and returns its digest and layer identifiers.
    ///
    /// # Errors
    ///
    /// - `ImageStoreError::PullFailed`: Registry rejected the pull
    /// - `ImageStoreError::InvalidReference`: Reference failed validation
    fn pull_image(
        &self,
        reference: &str,
        auth: Option<&RegistryAuth>,
    ) -> impl Future<Output = Result<PulledImage, ImageStoreError>> + Send;

    /// Removes a local image, forcing removal even when tagged in
    /// multiple repositories.
    fn remove_image(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<(), ImageStoreError>> + Send;

    /// Looks up a running container by exact name.
    ///
    /// Returns `Ok(None)` when no running container has that name.
    fn find_container(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ContainerSummary>, ImageStoreError>> + Send;

    /// Checks Docker daemon connectivity.
    fn ping(&self) -> impl Future<Output = Result<(), ImageStoreError>> + Send;
}

/// Production Docker client implementation using `bollard`.
///
/// Communicates with the Docker daemon via a Unix socket. Internally uses
/// `Arc<bollard::Docker>` for safe sharing across async tasks.
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `ImageStoreError::Connection` if the connection fails
    /// (socket not found, permission denied, daemon not running).
    pub fn connect_local() -> Result<Self, ImageStoreError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            ImageStoreError::Connection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Errors
    ///
    /// Returns `ImageStoreError::Connection` if the connection fails.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, ImageStoreError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    ImageStoreError::Connection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    async fn inspect_pulled(&self, reference: &str) -> Result<PulledImage, ImageStoreError> {
        let details = self.docker.inspect_image(reference).await.map_err(|e| {
            ImageStoreError::InspectFailed {
                image: reference.to_owned(),
                reason: e.to_string(),
            }
        })?;

        let digest = details
            .repo_digests
            .unwrap_or_default()
            .first()
            .and_then(|d| d.split('@').nth(1))
            .map(str::to_owned);
        let layers = details
            .root_fs
            .and_then(|fs| fs.layers)
            .unwrap_or_default();

        Ok(PulledImage { digest, layers })
    }
}

impl DockerClient for BollardDockerClient {
    async fn pull_image(
        &self,
        reference: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<PulledImage, ImageStoreError> {
        validate_image_reference(reference)?;

        use bollard::auth::DockerCredentials;
        use bollard::image::CreateImageOptions;

        let (from_image, tag) = match reference.rsplit_once(':') {
            // `:`가 경로 구분자 뒤에 오는 경우만 태그로 취급 (포트 번호 제외)
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => (reference, "latest"),
        };

        let options = CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        };
        let credentials = auth.map(|a| DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            ..Default::default()
        });

        self.docker
            .create_image(Some(options), None, credentials)
            .try_for_each(|progress| async move {
                if let Some(status) = progress.status {
                    tracing::trace!(image = reference, %status, "pull progress");
                }
                Ok(())
            })
            .await
            .map_err(|e| ImageStoreError::PullFailed {
                image: reference.to_owned(),
                reason: e.to_string(),
            })?;

        self.inspect_pulled(reference).await
    }

    async fn remove_image(&self, reference: &str) -> Result<(), ImageStoreError> {
        validate_image_reference(reference)?;

        use bollard::image::RemoveImageOptions;

        self.docker
            .remove_image(
                reference,
                Some(RemoveImageOptions {
                    force: true,
                    ..Default::default()
                }),
                None,
            )
            .await
            .map_err(|e| ImageStoreError::RemoveFailed {
                image: reference.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn find_container(
        &self,
        name: &str,
    ) -> Result<Option<ContainerSummary>, ImageStoreError> {
        use bollard::container::ListContainersOptions;

        let mut filters = HashMap::new();
        filters.insert("name".to_owned(), vec![format!("^/{name}$")]);

        let options = ListContainersOptions::<String> {
            all: false,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| ImageStoreError::Api(format!("list containers failed: {e}")))?;

        Ok(containers.into_iter().next().map(|c| ContainerSummary {
            name: c
                .names
                .unwrap_or_default()
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default(),
            image: c.image.unwrap_or_default(),
            state: c.state.unwrap_or_default(),
        }))
    }

    async fn ping(&self) -> Result<(), ImageStoreError> {
        self.docker
            .ping()
            .await
            .map_err(|e| ImageStoreError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// 테스트용 Mock Docker 클라이언트
///
/// 설정 가능한 응답을 반환하여 Docker 데몬 없이도 테스트할 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    /// 이미지 참조 → pull 결과
    pub images: HashMap<String, PulledImage>,
    /// find_container가 반환할 컨테이너 목록
    pub containers: Vec<ContainerSummary>,
    /// pull 호출 시 실패를 시뮬레이션할지 여부
    pub fail_pulls: bool,
}

#[cfg(test)]
impl MockDockerClient {
    /// 빈 저장소 상태의 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// pull 가능한 이미지를 추가합니다.
    pub fn with_image(mut self, reference: &str, layers: Vec<&str>) -> Self {
        self.images.insert(
            reference.to_owned(),
            PulledImage {
                digest: Some(format!("sha256:{:064x}", self.images.len() + 1)),
                layers: layers.into_iter().map(str::to_owned).collect(),
            },
        );
        self
    }

    /// 실행 중인 컨테이너를 추가합니다.
    pub fn with_container(mut self, name: &str, image: &str) -> Self {
        self.containers.push(ContainerSummary {
            name: name.to_owned(),
            image: image.to_owned(),
            state: "running".to_owned(),
        });
        self
    }

    /// pull 호출 시 실패하도록 설정합니다.
    pub fn with_failing_pulls(mut self) -> Self {
        self.fail_pulls = true;
        self
    }
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn pull_image(
        &self,
        reference: &str,
        _auth: Option<&RegistryAuth>,
    ) -> Result<PulledImage, ImageStoreError> {
        validate_image_reference(reference)?;
        if self.fail_pulls {
            return Err(ImageStoreError::PullFailed {
                image: reference.to_owned(),
                reason: "mock failure".to_owned(),
            });
        }
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| ImageStoreError::PullFailed {
                image: reference.to_owned(),
                reason: "manifest unknown".to_owned(),
            })
    }

    async fn remove_image(&self, reference: &str) -> Result<(), ImageStoreError> {
        validate_image_reference(reference)?;
        Ok(())
    }

    async fn find_container(
        &self,
        name: &str,
    ) -> Result<Option<ContainerSummary>, ImageStoreError> {
        Ok(self.containers.iter().find(|c| c.name == name).cloned())
    }

    async fn ping(&self) -> Result<(), ImageStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_standard_references() {
        for reference in [
            "nginx:latest",
            "library/nginx:1.25",
            "store/ibmcorp/db2:11.5",
            "mcr.microsoft.com/dotnet/runtime:8.0",
            "user/app@sha256:abcdef0123",
        ] {
            assert!(validate_image_reference(reference).is_ok(), "{reference}");
        }
    }

    #[test]
    fn rejects_injection_attempts() {
        for reference in ["", "nginx; rm -rf /", "nginx latest", "a\nb", "$(whoami)"] {
            assert!(validate_image_reference(reference).is_err(), "{reference:?}");
        }
    }

    #[test]
    fn rejects_oversized_reference() {
        let long = "a".repeat(256);
        assert!(validate_image_reference(&long).is_err());
    }

    #[tokio::test]
    async fn mock_pull_returns_layers() {
        let client = MockDockerClient::new().with_image("nginx:latest", vec!["l1", "l2"]);
        let pulled = client.pull_image("nginx:latest", None).await.unwrap();
        assert_eq!(pulled.layers, ["l1", "l2"]);
        assert!(pulled.digest.is_some());
    }

    #[tokio::test]
    async fn mock_pull_unknown_image_fails() {
        let client = MockDockerClient::new();
        let result = client.pull_image("missing:latest", None).await;
        assert!(matches!(result, Err(ImageStoreError::PullFailed { .. })));
    }

    #[tokio::test]
    async fn mock_find_container_by_name() {
        let client = MockDockerClient::new().with_container("clair", "quay.io/coreos/clair:latest");
        let found = client.find_container("clair").await.unwrap();
        assert_eq!(found.unwrap().image, "quay.io/coreos/clair:latest");
        assert!(client.find_container("db").await.unwrap().is_none());
    }

    #[test]
    fn docker_client_trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<MockDockerClient>();
    }
}

//! 열거 페이저 통합 테스트
//!
//! 고정 응답을 돌려주는 로컬 HTTP 스텁으로 Hub 열거의 후보 건너뛰기와
//! 중단 정책을 검증합니다. 실제 네트워크는 사용하지 않습니다.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use dockhound_core::config::HubConfig;
use dockhound_core::types::ImageType;
use dockhound_hub_client::{HubClient, HubClientError};

/// 경로 접두 → (상태 코드, JSON 본문) 라우트 테이블
type Routes = Vec<(&'static str, u16, &'static str)>;

const SEARCH_PAGE: &str = r#"{
    "count": 2,
    "next": null,
    "results": [
        {"repo_name": "nginx", "pull_count": 100, "is_official": true},
        {"repo_name": "deadrepo", "pull_count": 5, "is_official": true}
    ]
}"#;

const NGINX_TAGS: &str = r#"{
    "count": 1,
    "results": [{"name": "1.25", "last_updated": "2024-01-01T00:00:00.000000Z"}]
}"#;

async fn spawn_stub(routes: Routes) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                    if request.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }

                let head = String::from_utf8_lossy(&request);
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_owned();
                let (status, body) = routes
                    .iter()
                    .find(|(prefix, _, _)| path.starts_with(prefix))
                    .map(|(_, status, body)| (*status, *body))
                    .unwrap_or((404, "{}"));

                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\n\
                     content-type: application/json\r\n\
                     content-length: {length}\r\n\
                     connection: close\r\n\r\n{body}",
                    reason = reason_phrase(status),
                    length = body.len(),
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    base
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    }
}

fn stub_config(base: &str) -> HubConfig {
    HubConfig {
        api_v1_base: format!("{base}/api/content/v1"),
        api_v2_base: format!("{base}/v2"),
        // 스텁은 일시적 실패를 내지 않으므로 재시도 없이 한 번만 요청
        retry_max_attempts: 0,
        ..HubConfig::default()
    }
}

#[tokio::test]
async fn dead_repository_is_skipped_during_enumeration() {
    let base = spawn_stub(vec![
        ("/v2/search/repositories/", 200, SEARCH_PAGE),
        ("/v2/repositories/library/nginx/tags/", 200, NGINX_TAGS),
        (
            "/v2/repositories/library/deadrepo/tags/",
            404,
            r#"{"detail": "object not found"}"#,
        ),
    ])
    .await;
    let client = HubClient::new(&stub_config(&base)).unwrap();
    let mut pager = client.pager(ImageType::Official);

    // 태그 조회가 404인 저장소는 그 후보만 빠지고 페이지는 정상 반환된다
    let page = pager.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "nginx");
    assert_eq!(page[0].tag.as_deref(), Some("1.25"));

    assert!(pager.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn auth_rejection_during_detail_lookup_still_aborts() {
    let base = spawn_stub(vec![
        ("/v2/search/repositories/", 200, SEARCH_PAGE),
        ("/v2/repositories/library/", 401, r#"{"detail": "unauthorized"}"#),
    ])
    .await;
    let client = HubClient::new(&stub_config(&base)).unwrap();
    let mut pager = client.pager(ImageType::Official);

    let err = pager.next_page().await.unwrap_err();
    assert!(matches!(err, HubClientError::Auth(_)));
}

#[tokio::test]
async fn repository_tags_follow_pagination() {
    let page_one = r#"{
        "count": 3,
        "next": "next-page",
        "results": [{"name": "latest"}, {"name": "stable"}]
    }"#;
    let page_two = r#"{
        "count": 3,
        "results": [{"name": "stretch-slim"}]
    }"#;
    let base = spawn_stub(vec![
        (
            "/v2/repositories/library/debian/tags/?page_size=50&page=1",
            200,
            page_one,
        ),
        (
            "/v2/repositories/library/debian/tags/?page_size=50&page=2",
            200,
            page_two,
        ),
    ])
    .await;
    let client = HubClient::new(&stub_config(&base)).unwrap();

    let tags = client.repository_tags("library/debian").await.unwrap();
    assert_eq!(tags, vec!["latest", "stable", "stretch-slim"]);
}

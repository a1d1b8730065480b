//! dockhound.toml 통합 설정 테스트
//!
//! - dockhound.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use dockhound_core::config::DockhoundConfig;
use dockhound_core::error::{ConfigError, DockhoundError};

// =============================================================================
// dockhound.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../dockhound.toml.example");
    let config = DockhoundConfig::parse(content).expect("example config should parse");

    // general 기본값 확인
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.general.output_dir, "output");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../dockhound.toml.example");
    let config = DockhoundConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_has_correct_hub_defaults() {
    let content = include_str!("../../../dockhound.toml.example");
    let config = DockhoundConfig::parse(content).expect("should parse");

    assert_eq!(config.hub.api_v1_base, "https://hub.docker.com/api/content/v1");
    assert_eq!(config.hub.api_v2_base, "https://hub.docker.com/v2");
    assert!(config.hub.username.is_none());
    assert!(config.hub.password.is_none());
    assert_eq!(config.hub.page_size, 50);
    assert_eq!(config.hub.request_timeout_secs, 30);
    assert_eq!(config.hub.retry_max_attempts, 3);
    assert_eq!(config.hub.retry_backoff_base_ms, 500);
    assert_eq!(config.hub.community_window_multiplier, 3);
}

#[test]
fn example_config_has_correct_store_defaults() {
    let content = include_str!("../../../dockhound.toml.example");
    let config = DockhoundConfig::parse(content).expect("should parse");

    assert_eq!(config.store.docker_socket, "/var/run/docker.sock");
    assert_eq!(config.store.pull_timeout_secs, 1800);
    assert_eq!(config.store.max_local_images, 1);
}

#[test]
fn example_config_has_correct_clair_defaults() {
    let content = include_str!("../../../dockhound.toml.example");
    let config = DockhoundConfig::parse(content).expect("should parse");

    assert_eq!(config.clair.scanner_bin, "clair-scanner");
    assert_eq!(config.clair.scanner_ip, "127.0.0.1");
    assert_eq!(config.clair.scanner_container, "clair");
    assert_eq!(config.clair.db_container, "db");
    assert_eq!(config.clair.pinned_tag, "latest");
    assert_eq!(config.clair.scan_timeout_secs, 600);
    assert!(!config.clair.resolve_cwe);
    assert_eq!(config.clair.cwe_api_base, "https://cve.circl.lu/api/cve");
}

#[test]
fn example_config_has_correct_pipeline_defaults() {
    let content = include_str!("../../../dockhound.toml.example");
    let config = DockhoundConfig::parse(content).expect("should parse");

    assert_eq!(config.pipeline.workers, 1);
    assert_eq!(config.pipeline.parent_db_dir, "parent-db");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../dockhound.toml.example");
    let from_file = DockhoundConfig::parse(content).expect("should parse");
    let from_code = DockhoundConfig::default();

    // 모든 기본값이 코드 Default 구현과 일치하는지 확인
    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);
    assert_eq!(from_file.general.output_dir, from_code.general.output_dir);

    assert_eq!(from_file.hub.api_v1_base, from_code.hub.api_v1_base);
    assert_eq!(from_file.hub.api_v2_base, from_code.hub.api_v2_base);
    assert_eq!(from_file.hub.page_size, from_code.hub.page_size);
    assert_eq!(
        from_file.hub.request_timeout_secs,
        from_code.hub.request_timeout_secs
    );
    assert_eq!(
        from_file.hub.retry_max_attempts,
        from_code.hub.retry_max_attempts
    );
    assert_eq!(
        from_file.hub.retry_backoff_base_ms,
        from_code.hub.retry_backoff_base_ms
    );
    assert_eq!(
        from_file.hub.community_window_multiplier,
        from_code.hub.community_window_multiplier
    );

    assert_eq!(from_file.store.docker_socket, from_code.store.docker_socket);
    assert_eq!(
        from_file.store.pull_timeout_secs,
        from_code.store.pull_timeout_secs
    );
    assert_eq!(
        from_file.store.max_local_images,
        from_code.store.max_local_images
    );

    assert_eq!(from_file.clair.scanner_bin, from_code.clair.scanner_bin);
    assert_eq!(from_file.clair.pinned_tag, from_code.clair.pinned_tag);
    assert_eq!(
        from_file.clair.scan_timeout_secs,
        from_code.clair.scan_timeout_secs
    );
    assert_eq!(from_file.clair.resolve_cwe, from_code.clair.resolve_cwe);
    assert_eq!(from_file.clair.cwe_api_base, from_code.clair.cwe_api_base);

    assert_eq!(from_file.pipeline.workers, from_code.pipeline.workers);
    assert_eq!(
        from_file.pipeline.parent_db_dir,
        from_code.pipeline.parent_db_dir
    );
}

// =============================================================================
// 부분 설정 로딩 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "json"
"#;
    let config = DockhoundConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "json");
    // 나머지 섹션은 기본값
    assert_eq!(config.hub.page_size, 50);
    assert_eq!(config.store.max_local_images, 1);
    assert_eq!(config.pipeline.workers, 1);
}

#[test]
fn partial_config_hub_only() {
    let toml = r#"
[hub]
username = "alice"
password = "secret"
page_size = 25
"#;
    let config = DockhoundConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.hub.username.as_deref(), Some("alice"));
    assert_eq!(config.hub.password.as_deref(), Some("secret"));
    assert_eq!(config.hub.page_size, 25);
    // general은 기본값
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn partial_config_clair_only() {
    let toml = r#"
[clair]
scanner_ip = "10.0.0.5"
pinned_tag = "v2.1.8"
resolve_cwe = true
"#;
    let config = DockhoundConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.clair.scanner_ip, "10.0.0.5");
    assert_eq!(config.clair.pinned_tag, "v2.1.8");
    assert!(config.clair.resolve_cwe);
    // 생략된 필드는 기본값
    assert_eq!(config.clair.scanner_container, "clair");
    assert_eq!(config.clair.db_container, "db");
}

#[test]
fn partial_config_two_sections() {
    let toml = r#"
[general]
log_level = "warn"

[pipeline]
workers = 4
parent_db_dir = "/var/lib/dockhound/parents"
"#;
    let config = DockhoundConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "warn");
    assert_eq!(config.pipeline.workers, 4);
    assert_eq!(config.pipeline.parent_db_dir, "/var/lib/dockhound/parents");
    // 생략된 섹션은 기본값
    assert_eq!(config.store.pull_timeout_secs, 1800);
    assert_eq!(config.clair.pinned_tag, "latest");
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;

    let original = std::env::var("DOCKHOUND_GENERAL_LOG_LEVEL").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("DOCKHOUND_GENERAL_LOG_LEVEL", "error");
    }

    let mut config = DockhoundConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.general.log_level.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("DOCKHOUND_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("DOCKHOUND_GENERAL_LOG_LEVEL"),
        }
    }

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_defaults() {
    let original = std::env::var("DOCKHOUND_HUB_USERNAME").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("DOCKHOUND_HUB_USERNAME", "bob");
    }

    let mut config = DockhoundConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.hub.username.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("DOCKHOUND_HUB_USERNAME", val),
            None => std::env::remove_var("DOCKHOUND_HUB_USERNAME"),
        }
    }

    assert_eq!(result.as_deref(), Some("bob"));
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let original = std::env::var("DOCKHOUND_CLAIR_RESOLVE_CWE").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("DOCKHOUND_CLAIR_RESOLVE_CWE", "true");
    }

    let mut config = DockhoundConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.clair.resolve_cwe;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("DOCKHOUND_CLAIR_RESOLVE_CWE", val),
            None => std::env::remove_var("DOCKHOUND_CLAIR_RESOLVE_CWE"),
        }
    }

    assert!(result);
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let original = std::env::var("DOCKHOUND_PIPELINE_WORKERS").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("DOCKHOUND_PIPELINE_WORKERS", "8");
    }

    let mut config = DockhoundConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.pipeline.workers;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("DOCKHOUND_PIPELINE_WORKERS", val),
            None => std::env::remove_var("DOCKHOUND_PIPELINE_WORKERS"),
        }
    }

    assert_eq!(result, 8);
}

#[test]
#[serial_test::serial]
fn env_override_unparseable_numeric_keeps_value() {
    let original = std::env::var("DOCKHOUND_HUB_PAGE_SIZE").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("DOCKHOUND_HUB_PAGE_SIZE", "fifty");
    }

    let mut config = DockhoundConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.hub.page_size;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("DOCKHOUND_HUB_PAGE_SIZE", val),
            None => std::env::remove_var("DOCKHOUND_HUB_PAGE_SIZE"),
        }
    }

    assert_eq!(result, 50);
}

#[test]
#[serial_test::serial]
fn env_override_missing_var_keeps_toml_value() {
    let toml = r#"
[general]
log_level = "warn"
"#;

    // SAFETY: 존재하지 않는 변수를 명시적으로 제거
    unsafe {
        std::env::remove_var("DOCKHOUND_GENERAL_LOG_LEVEL");
    }

    let mut config = DockhoundConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();

    assert_eq!(config.general.log_level, "warn");
}

// =============================================================================
// 빈 파일 / 잘못된 형식 에러 테스트
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = DockhoundConfig::parse("").expect("empty string should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.hub.page_size, 50);
    assert_eq!(config.store.max_local_images, 1);
    assert_eq!(config.pipeline.workers, 1);
}

#[test]
fn whitespace_only_parses_with_defaults() {
    let config = DockhoundConfig::parse("   \n\n  \t  ").expect("whitespace should parse");
    config.validate().expect("should validate");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn comments_only_parses_with_defaults() {
    let toml = r#"
# 이것은 주석입니다
# 모든 줄이 주석입니다
"#;
    let config = DockhoundConfig::parse(toml).expect("comments-only should parse");
    config.validate().expect("should validate");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = DockhoundConfig::parse("[invalid toml");
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        DockhoundError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn invalid_type_returns_parse_error() {
    let toml = r#"
[clair]
resolve_cwe = "not_a_bool"
"#;
    let result = DockhoundConfig::parse(toml);
    assert!(result.is_err());
    assert!(matches!(
        result.unwrap_err(),
        DockhoundError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[hub]
page_size = "fifty"
"#;
    let result = DockhoundConfig::parse(toml);
    assert!(result.is_err());
    assert!(matches!(
        result.unwrap_err(),
        DockhoundError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = DockhoundConfig::from_file("/tmp/dockhound_test_nonexistent_12345.toml").await;
    assert!(result.is_err());
    assert!(matches!(
        result.unwrap_err(),
        DockhoundError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn load_example_config_from_disk() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let example_path = format!("{}/../../dockhound.toml.example", manifest_dir);

    let result = DockhoundConfig::from_file(&example_path).await;
    match result {
        Ok(config) => {
            config.validate().expect("loaded example should validate");
            assert_eq!(config.general.log_level, "info");
        }
        Err(DockhoundError::Config(ConfigError::FileNotFound { .. })) => {
            // CI 환경에서 파일이 없을 수 있음
            eprintln!("skipped: dockhound.toml.example not found at {}", example_path);
        }
        Err(e) => panic!("unexpected error: {}", e),
    }
}

#[tokio::test]
async fn load_applies_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dockhound.toml");
    tokio::fs::write(&path, "[hub]\npage_size = 0\n")
        .await
        .expect("write config");

    let result = DockhoundConfig::load(&path).await;
    assert!(matches!(
        result.unwrap_err(),
        DockhoundError::Config(ConfigError::InvalidValue { .. })
    ));
}

// =============================================================================
// 직렬화 라운드트립 테스트
// =============================================================================

#[test]
fn serialize_and_reparse_roundtrip() {
    let original = DockhoundConfig::default();
    let toml_str = toml::to_string_pretty(&original).expect("should serialize");
    let parsed = DockhoundConfig::parse(&toml_str).expect("should reparse");
    parsed.validate().expect("reparsed should validate");

    assert_eq!(original.general.log_level, parsed.general.log_level);
    assert_eq!(original.hub.page_size, parsed.hub.page_size);
    assert_eq!(original.store.docker_socket, parsed.store.docker_socket);
    assert_eq!(original.clair.pinned_tag, parsed.clair.pinned_tag);
    assert_eq!(original.pipeline.workers, parsed.pipeline.workers);
}

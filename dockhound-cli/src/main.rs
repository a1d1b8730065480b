//! dockhound 실행 진입점
//!
//! 설정 로드 → 로깅 초기화 → 컨트롤러 조립 → 실행 → 요약 출력의
//! 순서로 진행합니다. Ctrl-C는 취소 토큰으로 전달되어 새 이미지
//! 디스패치를 멈추고 진행 중인 스캔만 마저 끝냅니다.

mod cli;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use dockhound_clair::ClairScanner;
use dockhound_core::config::DockhoundConfig;
use dockhound_core::metrics::describe_all;
use dockhound_core::types::ImageType;
use dockhound_image_store::BollardDockerClient;
use dockhound_pipeline::{ParentDbBuilder, PipelineController};

use cli::DockhoundCli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DockhoundCli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // 로깅이 초기화되기 전에 실패할 수 있으므로 stderr에도 남긴다
            eprintln!("dockhound: {err:#}");
            tracing::error!(error = %err, "run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: DockhoundCli) -> Result<()> {
    let mut config = load_config(&cli).await?;
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.general.output_dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;

    logging::init_tracing(&config.general)?;
    describe_all();

    let image_type = ImageType::from_str_loose(&cli.image_type).with_context(|| {
        format!(
            "unknown image type '{}', expected certified, verified, official or community",
            cli.image_type
        )
    })?;

    tracing::info!(%image_type, x_images = ?cli.x_images, "dockhound starting");

    let docker = Arc::new(
        BollardDockerClient::connect_with_socket(&config.store.docker_socket)
            .context("failed to connect to docker daemon")?,
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    // 데이터베이스 구축은 스캐너 없이 동작하는 별도 모드
    if cli.build_parent_db {
        let builder = ParentDbBuilder::new(&config, docker, cancel)
            .context("failed to assemble parent database builder")?;
        let path = builder.build(image_type).await?;
        println!("parent database written to {}", path.display());
        return Ok(());
    }

    let scanner = Arc::new(
        ClairScanner::new(Arc::clone(&docker), config.clair.clone())
            .context("failed to build clair scanner")?,
    );

    let controller = PipelineController::new(config, docker, scanner, cancel)
        .context("failed to assemble pipeline")?;

    if cli.check {
        controller.preflight().await?;
        println!("configuration and scanner environment ok");
        return Ok(());
    }

    let summary = controller.run(image_type, cli.x_images).await?;
    println!("{summary}");
    Ok(())
}

/// 설정 파일이 있으면 로드하고, 없으면 기본값에 환경 변수만 적용합니다.
async fn load_config(cli: &DockhoundCli) -> Result<DockhoundConfig> {
    if cli.config.exists() {
        DockhoundConfig::load(&cli.config)
            .await
            .with_context(|| format!("failed to load {}", cli.config.display()))
    } else {
        let mut config = DockhoundConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Ctrl-C를 취소 토큰으로 변환합니다. 두 번째 Ctrl-C는 즉시 종료합니다.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received, finishing in-flight scans");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("second shutdown signal, exiting immediately");
            std::process::exit(130);
        }
    });
}

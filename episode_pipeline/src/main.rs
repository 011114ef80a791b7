// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Episode Ingestion Worker — Composition Root
//!
//! Loads configuration, wires the six adapters to the domain ports, starts
//! the poller, the platform-protection controller, and the HTTP surface, and
//! coordinates graceful shutdown across all three.

use std::sync::Arc;
use std::time::Duration;

use episode_pipeline::application::platform_protection::CapacityMode;
use episode_pipeline::application::{JobTracker, PipelineOrchestrator, PlatformProtectionController, Poller};
use episode_pipeline::infrastructure::adapters::{FfmpegTranscoderTool, LlmEnricher, PostgresCatalog, ProcessDownloaderTool, S3ObjectStore, SqsMessageQueue};
use episode_pipeline::infrastructure::http::{build_router, StartupProbes};
use episode_pipeline::infrastructure::metrics::MetricsService;
use episode_pipeline::runtime::concurrency_kernel::{detect_effective_cores, init_concurrency_kernel, DisplacedLimits, KernelConfig};
use episode_pipeline_bootstrap::config::WorkerConfig;
use episode_pipeline_bootstrap::shutdown::ShutdownCoordinator;
use episode_pipeline_bootstrap::signals::{SystemSignals, UnixSignalHandler};
use episode_pipeline_bootstrap::{bootstrap_cli, ExitCode, ValidatedCommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cloud_platform;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(err) => {
            error!(error = %err, "failed to parse command line");
            return ExitCode::ValidatorSelfCheckFailure.into();
        }
    };

    let config = match WorkerConfig::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::ValidatorSelfCheckFailure.into();
        }
    };

    match cli.command {
        ValidatedCommand::Serve => run_serve(config).await,
        ValidatedCommand::Submit {
            url,
            channel_name,
            episode_title,
            episode_id,
            force_reprocess,
        } => run_submit(config, url, channel_name, episode_title, episode_id, force_reprocess).await,
        ValidatedCommand::Validate { episode_id } => run_validate(config, episode_id).await,
    }
}

async fn run_serve(config: WorkerConfig) -> std::process::ExitCode {
    let metrics = match MetricsService::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics");
            return ExitCode::ValidatorSelfCheckFailure.into();
        }
    };

    let cores = detect_effective_cores(config.worker_cpu_override);
    let kernel_config = KernelConfig::from_cores(
        cores,
        DisplacedLimits {
            disk: Some(config.disk_concurrency),
            io: Some(config.io_concurrency),
            http: Some(config.http_concurrency),
            db: Some(config.db_concurrency),
        },
    );
    if let Err(err) = init_concurrency_kernel(kernel_config, metrics.clone()) {
        error!(error = %err, "failed to initialize concurrency kernel");
        return ExitCode::ValidatorSelfCheckFailure.into();
    }

    let probes = StartupProbes::new();

    let catalog: Arc<dyn episode_pipeline_domain::services::Catalog> = match PostgresCatalog::connect(&config.database_url).await {
        Ok(catalog) => Arc::new(catalog),
        Err(err) => {
            error!(error = %err, "failed to connect to catalog database");
            return ExitCode::ValidatorSelfCheckFailure.into();
        }
    };
    probes.mark_catalog_ready();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let object_store: Arc<dyn episode_pipeline_domain::services::ObjectStore> = Arc::new(S3ObjectStore::new(
        aws_sdk_s3::Client::new(&aws_config),
        config.object_store_bucket.clone(),
        format!("https://{}.s3.{}.amazonaws.com", config.object_store_bucket, config.object_store_region),
    ));
    probes.mark_object_store_ready();

    let queue: Arc<dyn episode_pipeline_domain::services::MessageQueue> =
        Arc::new(SqsMessageQueue::new(aws_sdk_sqs::Client::new(&aws_config), config.sqs_queue_url.clone()));

    let downloader: Arc<dyn episode_pipeline_domain::services::DownloaderTool> =
        Arc::new(ProcessDownloaderTool::new("yt-dlp", "ffmpeg", config.preferred_audio_format.clone(), config.ytdlp_connections, None));
    let transcoder: Arc<dyn episode_pipeline_domain::services::TranscoderTool> = Arc::new(FfmpegTranscoderTool::new("ffmpeg"));

    let enricher: Arc<dyn episode_pipeline_domain::services::Enricher> = Arc::new(LlmEnricher::new(
        reqwest::Client::new(),
        config.llm_api_base_url.clone().unwrap_or_default(),
        config.llm_api_key.clone().unwrap_or_default(),
        "gpt-4o-mini",
    ));

    let orchestrator = PipelineOrchestrator::new(downloader, transcoder, object_store, catalog, enricher, &config);
    let tracker = JobTracker::new(config.max_concurrent_jobs);
    let shutdown = ShutdownCoordinator::new(config.shutdown_grace);

    let signal_handler = UnixSignalHandler::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        signal_handler
            .wait_for_signal(Box::new(move || shutdown_for_signal.initiate_shutdown()))
            .await;
    });

    let capacity_mode = CapacityMode::from_env();
    let protection = PlatformProtectionController::new(cloud_platform::NoopCapacityPlatform, tracker.clone(), capacity_mode, config.protection_poll);
    let shutdown_for_protection = shutdown.clone();
    let protection_handle = tokio::spawn(async move { protection.run(&shutdown_for_protection).await });

    let poller = Poller::new(queue.clone(), orchestrator.clone(), metrics.clone(), tracker.clone(), config.poll_wait, config.poll_batch_size);
    let poller_shutdown = shutdown.token();
    let poller_grace = config.shutdown_grace;
    let poller_handle = tokio::spawn(async move { poller.run(poller_shutdown, poller_grace).await });

    let router = build_router(orchestrator, metrics, tracker, probes);
    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr = %config.bind_addr, "failed to bind HTTP listener");
            return ExitCode::ValidatorSelfCheckFailure.into();
        }
    };
    info!(addr = %config.bind_addr, "listening");

    let http_shutdown = shutdown.token();
    let http_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await
    });

    let _ = poller_handle.await;
    let _ = protection_handle.await;
    let _ = http_handle.await;
    shutdown.complete_shutdown();

    ExitCode::Normal.into()
}

/// Runs a single job to completion in-process, mirroring what the HTTP
/// `/submit` handler and the poller each do, but synchronously and without a
/// queue or server (§6 `submit` CLI command).
async fn run_submit(
    config: WorkerConfig,
    url: String,
    channel_name: Option<String>,
    episode_title: Option<String>,
    episode_id: Option<uuid::Uuid>,
    force_reprocess: bool,
) -> std::process::ExitCode {
    use episode_pipeline_domain::entities::job::{EpisodeSeed, Job};

    let metrics = match MetricsService::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics");
            return ExitCode::ValidatorSelfCheckFailure.into();
        }
    };

    let cores = detect_effective_cores(config.worker_cpu_override);
    let kernel_config = KernelConfig::from_cores(
        cores,
        DisplacedLimits {
            disk: Some(config.disk_concurrency),
            io: Some(config.io_concurrency),
            http: Some(config.http_concurrency),
            db: Some(config.db_concurrency),
        },
    );
    if let Err(err) = init_concurrency_kernel(kernel_config, metrics.clone()) {
        error!(error = %err, "failed to initialize concurrency kernel");
        return ExitCode::ValidatorSelfCheckFailure.into();
    }

    let catalog: Arc<dyn episode_pipeline_domain::services::Catalog> = match PostgresCatalog::connect(&config.database_url).await {
        Ok(catalog) => Arc::new(catalog),
        Err(err) => {
            error!(error = %err, "failed to connect to catalog database");
            return ExitCode::ValidatorSelfCheckFailure.into();
        }
    };

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let object_store: Arc<dyn episode_pipeline_domain::services::ObjectStore> = Arc::new(S3ObjectStore::new(
        aws_sdk_s3::Client::new(&aws_config),
        config.object_store_bucket.clone(),
        format!("https://{}.s3.{}.amazonaws.com", config.object_store_bucket, config.object_store_region),
    ));

    let downloader: Arc<dyn episode_pipeline_domain::services::DownloaderTool> =
        Arc::new(ProcessDownloaderTool::new("yt-dlp", "ffmpeg", config.preferred_audio_format.clone(), config.ytdlp_connections, None));
    let transcoder: Arc<dyn episode_pipeline_domain::services::TranscoderTool> = Arc::new(FfmpegTranscoderTool::new("ffmpeg"));

    let enricher: Arc<dyn episode_pipeline_domain::services::Enricher> = Arc::new(LlmEnricher::new(
        reqwest::Client::new(),
        config.llm_api_base_url.clone().unwrap_or_default(),
        config.llm_api_key.clone().unwrap_or_default(),
        "gpt-4o-mini",
    ));

    let orchestrator = PipelineOrchestrator::new(downloader, transcoder, object_store, catalog, enricher, &config);

    let seed = match episode_id {
        Some(episode_id) => EpisodeSeed::ByEpisodeId(episode_id),
        None => {
            // Validated by the CLI layer: episode_id.is_none() implies both are Some.
            EpisodeSeed::ByChannelAndTitle {
                channel_name: channel_name.expect("validated by CLI layer"),
                episode_title: episode_title.expect("validated by CLI layer"),
            }
        }
    };
    let mut job = Job::new(uuid::Uuid::new_v4().to_string(), url, seed, force_reprocess);

    match orchestrator.run(&mut job).await {
        Ok(()) => {
            info!(job_id = %job.job_id, "submit completed");
            ExitCode::Normal.into()
        }
        Err(err) if err.is_fatal_downloader() => {
            error!(job_id = %job.job_id, error = %err, "fatal downloader error");
            ExitCode::FatalDownloaderDrain.into()
        }
        Err(err) => {
            error!(job_id = %job.job_id, error = %err, "submit failed");
            ExitCode::ValidatorSelfCheckFailure.into()
        }
    }
}

async fn run_validate(config: WorkerConfig, episode_id: Option<uuid::Uuid>) -> std::process::ExitCode {
    use episode_pipeline::application::EpisodeValidator;

    let Some(episode_id) = episode_id else {
        error!("validate requires --episode-id");
        return ExitCode::ValidatorSelfCheckFailure.into();
    };

    let catalog = match PostgresCatalog::connect(&config.database_url).await {
        Ok(catalog) => catalog,
        Err(err) => {
            error!(error = %err, "failed to connect to catalog database");
            return ExitCode::ValidatorSelfCheckFailure.into();
        }
    };

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let object_store = S3ObjectStore::new(
        aws_sdk_s3::Client::new(&aws_config),
        config.object_store_bucket.clone(),
        format!("https://{}.s3.{}.amazonaws.com", config.object_store_bucket, config.object_store_region),
    );

    let validator = EpisodeValidator::new(Arc::new(catalog), Arc::new(object_store));
    match validator.validate(episode_id).await {
        Ok(report) if report.passed => {
            info!(episode_id = %episode_id, "validation passed");
            ExitCode::Normal.into()
        }
        Ok(report) => {
            error!(episode_id = %episode_id, problems = ?report.problems, "validation found integrity errors");
            ExitCode::IntegrityScanErrors.into()
        }
        Err(err) => {
            error!(episode_id = %episode_id, error = %err, "validator itself failed");
            ExitCode::ValidatorSelfCheckFailure.into()
        }
    }
}

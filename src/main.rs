use actix_web::{App, HttpServer, web};
use clap::Parser;
use sqlx::{Pool, Postgres};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod api;
mod artifact;
mod cli;
mod config;
mod db;
mod deploy;
mod logging;
mod shutdown;
mod synth;
mod worker;

use crate::api::{
    ApiSettings,
    clarify::clarify_config,
    health::health_config,
    job::{JobService, handlers::job_config},
    validation,
};
use crate::artifact::ZipPackager;
use crate::cli::{Cli, Command};
use crate::config::{Config, PipelineConfig};
use crate::db::{JobRepository, JobStore};
use crate::deploy::auth::{MetadataServerToken, StaticToken, TokenProvider};
use crate::deploy::gcf::CloudFunctionsClient;
use crate::deploy::{DeploySettings, Orchestrator, TokioSleeper};
use crate::shutdown::ShutdownCoordinator;
use crate::synth::{LlmSynthesizer, OpenAiClient, TextGenerator};
use crate::worker::{JobDispatcher, ProcessOutcome, StaleJobReaper, dispatch_channel};

/// Clients shared by the dispatcher and the HTTP handlers
struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    dispatcher: Arc<JobDispatcher>,
}

fn build_pipeline(
    store: Arc<dyn JobStore>,
    config: &PipelineConfig,
    http_timeout: Duration,
) -> io::Result<Pipeline> {
    let generator: Arc<dyn TextGenerator> = Arc::new(
        OpenAiClient::new(
            &config.openai_base_url,
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            http_timeout,
        )
        .map_err(|e| io::Error::other(e.to_string()))?,
    );

    let tokens: Arc<dyn TokenProvider> = match &config.gcp_access_token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(
            MetadataServerToken::new(http_timeout)
                .map_err(|e| io::Error::other(e.to_string()))?,
        ),
    };
    let platform = CloudFunctionsClient::new(&config.gcp_functions_api, tokens, http_timeout)
        .map_err(|e| io::Error::other(e.to_string()))?;

    let orchestrator = Orchestrator::new(
        Arc::new(platform),
        Arc::new(TokioSleeper),
        DeploySettings::new(
            config.gcp_project_id.clone(),
            config.gcp_location.clone(),
            config.function_runtime.clone(),
        ),
    );

    let dispatcher = JobDispatcher::new(
        store,
        Arc::new(LlmSynthesizer::new(generator.clone())),
        Arc::new(ZipPackager),
        Arc::new(orchestrator),
    );

    Ok(Pipeline {
        generator,
        dispatcher: Arc::new(dispatcher),
    })
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().expect("Failed to load configuration");

    logging::init(&config.log_dir).expect("Failed to initialize logging");

    let pool = db::connection::get_connection(&config.database_url, config.max_db_connections)
        .await
        .expect("Failed to connect to database");
    info!("Database connection pool established");

    let store: Arc<dyn JobStore> = Arc::new(JobRepository::new(pool.clone()));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pool, store).await,
        Command::Migrate => {
            db::migrations::run_migrations(&pool)
                .await
                .map_err(|e| io::Error::other(e.to_string()))?;
            pool.close().await;
            Ok(())
        }
        Command::ProcessNext => {
            let pipeline_config = PipelineConfig::from_env().expect("Failed to load pipeline configuration");
            let pipeline = build_pipeline(store, &pipeline_config, config.http_timeout)?;

            let result = pipeline.dispatcher.process_next_job().await;
            pool.close().await;
            match result {
                Ok(ProcessOutcome::Idle) => Ok(()),
                Ok(ProcessOutcome::Completed { job_id, deployed_url }) => {
                    info!(job_id = %job_id, deployed_url = %deployed_url, "Processed job");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "Error processing job");
                    Err(io::Error::other(e.to_string()))
                }
            }
        }
        Command::ReapStale { older_than_minutes } => {
            let older_than = match older_than_minutes {
                Some(minutes) => config
                    .check_stale_threshold(Duration::from_secs(minutes * 60))
                    .map_err(|e| io::Error::other(e.to_string()))?,
                None => config.stale_job_after,
            };

            let result = StaleJobReaper::new(store, older_than).sweep().await;
            pool.close().await;
            let reaped = result.map_err(|e| io::Error::other(e.to_string()))?;
            info!("Failed {} stale processing jobs", reaped.len());
            Ok(())
        }
    }
}

async fn serve(config: Config, pool: Pool<Postgres>, store: Arc<dyn JobStore>) -> io::Result<()> {
    info!("Starting deploy-processor server");
    info!("Configuration loaded successfully:");
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Max database connections: {}", config.max_db_connections);
    info!("  - Trigger on submit: {}", config.trigger_on_submit);
    info!(
        "  - Stale job threshold: {} minutes (longest job run: {} seconds)",
        config.stale_job_after.as_secs() / 60,
        config.longest_job_run().as_secs()
    );

    // Auto-migrate when starting the server
    db::migrations::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let pipeline_config = PipelineConfig::from_env().expect("Failed to load pipeline configuration");
    let Pipeline { generator, dispatcher } =
        build_pipeline(store.clone(), &pipeline_config, config.http_timeout)?;

    // watch channel so every background task sees the same shutdown flag
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let reaper = StaleJobReaper::new(store.clone(), config.stale_job_after);
    let sweep_interval = config.stale_sweep_interval;
    let reaper_rx = shutdown_rx.clone();
    let reaper_handle = tokio::spawn(async move {
        reaper.run(sweep_interval, reaper_rx).await;
    });

    // Dispatcher runs live on this runtime so stopping the HTTP workers doesn't cancel them
    let (dispatch, runner) = dispatch_channel(dispatcher);
    let runner_handle = tokio::spawn(runner.run(shutdown_rx));

    let store_data: web::Data<dyn JobStore> = web::Data::from(store.clone());
    let generator_data: web::Data<dyn TextGenerator> = web::Data::from(generator);
    let dispatch_data = web::Data::new(dispatch);
    let service_data = web::Data::new(JobService::new(store));
    let settings_data = web::Data::new(ApiSettings {
        trigger_on_submit: config.trigger_on_submit,
    });
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(store_data.clone())
            .app_data(generator_data.clone())
            .app_data(dispatch_data.clone())
            .app_data(service_data.clone())
            .app_data(settings_data.clone())
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            .app_data(validation::json_config().limit(max_payload_size))
            .configure(health_config)
            .configure(clarify_config)
            .configure(job_config)
    });

    info!("Server starting on http://{}:{}", config.bind_address, config.port);

    let server = server
        .bind((config.bind_address.as_str(), config.port))?
        .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        vec![reaper_handle, runner_handle],
        shutdown_tx,
        pool,
    );

    coordinator.wait_for_shutdown().await
}

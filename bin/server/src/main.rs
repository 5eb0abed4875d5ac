use brigade_ai::{LlmBackend, OpenAiBackend, UnavailableBackend};
use brigade_assistants::{AssistantHub, DomainServices, InMemoryThreadStores};
use brigade_server::config::{LlmConfig, ServerConfig};
use brigade_server::db::PgThreadStores;
use brigade_server::error::StartupError;
use brigade_server::routes;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(report) = run().await {
        tracing::error!("{report}");
        std::process::exit(1);
    }
}

async fn run() -> brigade_core::Result<(), StartupError> {
    let ServerConfig {
        bind_addr,
        database_url,
        llm,
        assistant,
    } = ServerConfig::from_env().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    let backend = model_backend(&llm)?;
    let services = DomainServices::in_memory();

    let hub = match database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await
                .map_err(|e| StartupError::Database {
                    details: e.to_string(),
                })?;

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StartupError::Migration {
                    details: e.to_string(),
                })?;

            AssistantHub::new(backend, services, &PgThreadStores::new(pool), assistant)
        }
        None => {
            tracing::warn!("No database configured, conversation threads are kept in memory");
            AssistantHub::new(backend, services, &InMemoryThreadStores, assistant)
        }
    }
    .map_err(|e| StartupError::Assistants {
        details: e.to_string(),
    })?;
    tracing::info!("Assistants ready");

    let app = routes::router(Arc::new(hub));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| StartupError::Bind {
            addr: bind_addr.clone(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    tracing::info!("server stopped");
    Ok(())
}

fn model_backend(llm: &LlmConfig) -> brigade_core::Result<Arc<dyn LlmBackend>, StartupError> {
    let Some(config) = llm.backend() else {
        tracing::warn!("No model API key configured, every assistant turn will fail");
        return Ok(Arc::new(UnavailableBackend::new(
            "no model API key configured",
        )));
    };

    let model = config.model.clone();
    let backend = OpenAiBackend::new(config).map_err(|e| StartupError::Backend {
        details: e.to_string(),
    })?;
    tracing::info!(model = %model, "Model backend ready");
    Ok(Arc::new(backend))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

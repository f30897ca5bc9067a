use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context as _;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

use yatube::repo::Repo;
use yatube::storage::build_image_store;
use yatube::{config, AppState, FragmentCache, SecurityHeaders, SessionKeys, Settings};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; deployments set the environment themselves.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    info!("Bootstrapping yatube");

    let repo = build_repo(&settings).await?;
    let image_store = build_image_store(&settings.media_root).await?;
    let fragments = FragmentCache::new(settings.feed_cache_ttl);
    info!(ttl_secs = settings.feed_cache_ttl.as_secs(), "feed fragment cache ready");

    let state = AppState {
        repo,
        image_store,
        fragments,
        sessions: SessionKeys::new(settings.jwt_secret.as_bytes(), settings.session_ttl),
    };
    let security = SecurityHeaders::from_settings(&settings);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(security.clone())
            .app_data(web::Data::new(state.clone()))
            .configure(config)
    })
    .bind(settings.bind_addr)
    .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    info!("Listening on http://{}", settings.bind_addr);
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    use sqlx::postgres::PgPoolOptions;
    use yatube::repo::pg::PgRepo;

    let db_url = settings
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("failed to connect to Postgres")?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.context("failed to run migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    use yatube::repo::inmem::InMemRepo;

    let repo = match &settings.data_dir {
        Some(dir) => {
            info!("Using in-memory repository backend with snapshot dir '{}'", dir.display());
            InMemRepo::with_snapshot(dir)
        }
        None => {
            info!("Using in-memory repository backend");
            InMemRepo::new()
        }
    };
    Ok(Arc::new(repo))
}

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable one of the `inmem-store` or `postgres-store` features");

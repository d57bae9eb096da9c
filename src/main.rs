use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use prestasi::auth::jwt::JwtService;
use prestasi::auth::revocation::InMemoryRevocation;
use prestasi::authz::AuthorizationResolver;
use prestasi::config::AppConfig;
use prestasi::db::{self, PgPool};
use prestasi::lifecycle::LifecycleCoordinator;
use prestasi::routes;
use prestasi::state::AppState;
use prestasi::stores::mongo::{self, MongoContentStore};
use prestasi::stores::pg::{PgDirectory, PgPermissionCatalog, PgReferenceStore, PgUserStore};
use prestasi::stores::{ContentStore, Directory, PermissionCatalog, ReferenceStore, UserStore};
use prestasi::uploads::{build_client, S3UploadSink, UploadSink};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.redacted_database_url(),
        mongo_url = %config.redacted_mongo_url(),
        mongo_database = %config.mongo_database,
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        s3_bucket = %config.s3_bucket,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    run_migrations(&pool).await?;

    let mongo_db = mongo::connect(&config.mongo_url, &config.mongo_database).await?;
    let s3_client = build_client(&config).await?;

    let references: Arc<dyn ReferenceStore> = Arc::new(PgReferenceStore::new(pool.clone()));
    let content: Arc<dyn ContentStore> = Arc::new(MongoContentStore::new(&mongo_db));
    let directory: Arc<dyn Directory> = Arc::new(PgDirectory::new(pool.clone()));
    let permissions: Arc<dyn PermissionCatalog> = Arc::new(PgPermissionCatalog::new(pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let uploads: Arc<dyn UploadSink> = Arc::new(S3UploadSink::new(
        s3_client,
        config.s3_bucket.clone(),
        config.s3_public_base_url.clone(),
    ));

    let resolver = AuthorizationResolver::new(directory.clone(), permissions);
    let coordinator = Arc::new(LifecycleCoordinator::new(
        references.clone(),
        content.clone(),
        directory.clone(),
        uploads,
        resolver,
    ));

    let jwt = JwtService::from_config(&config)?;
    let revoked = Arc::new(InMemoryRevocation::new());

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;

    let state = AppState::new(
        config,
        jwt,
        revoked,
        users,
        references,
        content,
        directory,
        coordinator,
    );
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

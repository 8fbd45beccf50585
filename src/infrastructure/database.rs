use crate::entities::{collectible_files, collectibles, files, users};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm::{ConnectionTrait, Schema};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Order matters for foreign keys: Users -> Files/Collectibles -> CollectibleFiles
    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "files",
            schema
                .create_table_from_entity(files::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "collectibles",
            schema
                .create_table_from_entity(collectibles::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "collectible_files",
            schema
                .create_table_from_entity(collectible_files::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
        info!("   - Table '{}' checked/created", name);
    }

    // Indexes backing the list and visibility queries
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_files_user_id ON files(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_files_created_at ON files(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_collectibles_user_id ON collectibles(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_collectibles_public ON collectibles(public)",
        "CREATE INDEX IF NOT EXISTS idx_collectibles_created_at ON collectibles(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_collectible_files_file_id ON collectible_files(file_id)",
    ];

    for query in indexes {
        match db
            .execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await
        {
            Ok(_) => tracing::debug!("   - Index checked: {}", query),
            Err(e) => tracing::warn!("   - Index creation warning: {} -> {}", query, e),
        }
    }

    Ok(())
}

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use std::time::Duration;

const MIGRATIONS: [(&str, &str); 4] = [
    (
        "001_create_entries",
        include_str!("../../migrations/001_create_entries.sql"),
    ),
    (
        "002_create_conversations",
        include_str!("../../migrations/002_create_conversations.sql"),
    ),
    (
        "003_create_messages",
        include_str!("../../migrations/003_create_messages.sql"),
    ),
    (
        "004_create_summaries",
        include_str!("../../migrations/004_create_summaries.sql"),
    ),
];

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    init_db_with_pool(database_url, 10).await
}

pub async fn init_db_with_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    tracing::info!("Connecting to database: {}", database_url);

    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    // Handle special SQLite URL formats
    if database_url == "sqlite::memory:" {
        // Every pooled connection would otherwise get its own empty database.
        options.max_connections(1).min_connections(1);
    } else if let Some(path_str) = database_url.strip_prefix("sqlite://") {
        let path_str = path_str.split('?').next().unwrap_or(path_str);
        let path = std::path::Path::new(path_str);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbErr::Custom(format!("Failed to create DB directory: {}", e)))?;
                tracing::info!("Created database directory: {}", parent.display());
            }
        }

        if !path.exists() {
            std::fs::File::create(path)
                .map_err(|e| DbErr::Custom(format!("Failed to create DB file: {}", e)))?;
            tracing::info!("Created database file: {}", path.display());
        }

        options.max_connections(max_connections);
    } else {
        return Err(DbErr::Custom("Invalid SQLite URL format".to_string()));
    }

    let db = Database::connect(options)
        .await
        .map_err(|e| DbErr::Custom(format!("Connection failed: {}", e)))?;

    apply_migrations(&db).await?;

    Ok(db)
}

/// Schema files are idempotent, so they are replayed on every start and only
/// recorded once.
async fn apply_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    tracing::info!("Applying migrations...");

    db.execute_unprepared(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    for (version, sql) in MIGRATIONS {
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            db.execute_unprepared(statement).await?;
        }

        let recorded = db
            .execute_unprepared(&format!(
                "INSERT OR IGNORE INTO schema_migrations (version) VALUES ('{}')",
                version
            ))
            .await?;

        if recorded.rows_affected() > 0 {
            tracing::info!("Applied migration {}", version);
        }
    }

    Ok(())
}

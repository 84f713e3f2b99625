//! SQLite connection factory and the migration runner that applies the SQL
//! contributed by modules.

use std::str::FromStr;
use std::time::Duration;

use shelf_kernel::{settings::DatabaseSettings, Migration};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub mod errors;

pub use errors::{DbError, Result};

pub type Pool = sqlx::SqlitePool;

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _shelf_migrations (
        module     TEXT    NOT NULL,
        id         TEXT    NOT NULL,
        applied_at INTEGER NOT NULL,
        PRIMARY KEY (module, id)
    )
"#;

/// Open a pool for the configured database url.
///
/// In-memory databases live as long as their connection, so they get a single
/// connection that is never recycled.
pub async fn connect(settings: &DatabaseSettings) -> Result<Pool> {
    let options = SqliteConnectOptions::from_str(&settings.url)?;

    let pool_options = if is_in_memory(&settings.url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
    };

    let pool = pool_options.connect_with(options).await?;

    tracing::info!(target: "shelf-db", url = %settings.url, "database pool ready");
    Ok(pool)
}

/// Fresh private in-memory database, mainly for tests and dry runs.
pub async fn connect_in_memory() -> Result<Pool> {
    connect(&DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Apply every migration not yet recorded in `_shelf_migrations`.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row. Returns the number of migrations applied by this call.
pub async fn migrate(pool: &Pool, migrations: &[(String, Migration)]) -> Result<usize> {
    sqlx::query(MIGRATIONS_TABLE).execute(pool).await?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM _shelf_migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await?;
        if already.is_some() {
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.up).execute(&mut *tx).await?;
        sqlx::query(
            "INSERT INTO _shelf_migrations (module, id, applied_at) \
             VALUES (?, ?, CAST(strftime('%s', 'now') AS INTEGER))",
        )
        .bind(module)
        .bind(migration.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(target: "shelf-db", module = %module, migration = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

/// `(module, id)` pairs already applied, in application order.
pub async fn applied_migrations(pool: &Pool) -> Result<Vec<(String, String)>> {
    sqlx::query(MIGRATIONS_TABLE).execute(pool).await?;

    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT module, id FROM _shelf_migrations ORDER BY applied_at, rowid")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<(String, Migration)> {
        vec![
            (
                "notes".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE note (id INTEGER PRIMARY KEY, body TEXT NOT NULL UNIQUE);",
                },
            ),
            (
                "notes".to_string(),
                Migration {
                    id: "002_index",
                    up: "CREATE INDEX note_body_idx ON note (body);",
                },
            ),
        ]
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let pool = connect_in_memory().await.unwrap();

        assert_eq!(migrate(&pool, &sample()).await.unwrap(), 2);
        assert_eq!(migrate(&pool, &sample()).await.unwrap(), 0);

        let applied = applied_migrations(&pool).await.unwrap();
        assert_eq!(
            applied,
            vec![
                ("notes".to_string(), "001_init".to_string()),
                ("notes".to_string(), "002_index".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let pool = connect_in_memory().await.unwrap();
        let broken = vec![(
            "broken".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE oops (",
            },
        )];

        assert!(migrate(&pool, &broken).await.is_err());
        assert!(applied_migrations(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unique_violations_are_classified() {
        let pool = connect_in_memory().await.unwrap();
        migrate(&pool, &sample()).await.unwrap();

        sqlx::query("INSERT INTO note (body) VALUES ('same')")
            .execute(&pool)
            .await
            .unwrap();
        let err: DbError = sqlx::query("INSERT INTO note (body) VALUES ('same')")
            .execute(&pool)
            .await
            .unwrap_err()
            .into();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}

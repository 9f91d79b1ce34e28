//! Database migrations module
//!
//! Code-based migrations for the Corten CMS core. All migrations are
//! embedded directly in Rust code as SQL strings for single-binary
//! deployment.
//!
//! Each migration is a `Migration` struct containing:
//! - `version`: Unique version number for ordering
//! - `name`: Human-readable migration name
//! - `up`: SQL statements to apply

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::DbPool;

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements to apply
    pub up: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations for the Corten CMS core.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_layouts",
        up: r#"
            CREATE TABLE IF NOT EXISTS layouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                layout_path VARCHAR(850) NOT NULL
            );
            CREATE TABLE IF NOT EXISTS layout_options (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                layout_id INTEGER NOT NULL,
                key VARCHAR(255) NOT NULL,
                default_value TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (layout_id) REFERENCES layouts(id) ON DELETE CASCADE,
                UNIQUE (layout_id, key)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_categories_and_media",
        up: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS media_images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                file_path VARCHAR(850) NOT NULL
            );
        "#,
    },
    Migration {
        version: 3,
        name: "create_pages",
        up: r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_url VARCHAR(850) NOT NULL UNIQUE,
                page_url_hash VARCHAR(32) NOT NULL,
                title VARCHAR(255) NOT NULL,
                layout_id INTEGER,
                master_page_id INTEGER,
                category_id INTEGER,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                published_on TIMESTAMP,
                version INTEGER NOT NULL DEFAULT 1,
                meta_title VARCHAR(255) NOT NULL DEFAULT '',
                meta_keywords TEXT NOT NULL DEFAULT '',
                meta_description TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                canonical_url VARCHAR(850) NOT NULL DEFAULT '',
                use_canonical_url BOOLEAN NOT NULL DEFAULT 0,
                use_no_follow BOOLEAN NOT NULL DEFAULT 0,
                use_no_index BOOLEAN NOT NULL DEFAULT 0,
                custom_css TEXT NOT NULL DEFAULT '',
                custom_js TEXT NOT NULL DEFAULT '',
                image_id INTEGER,
                secondary_image_id INTEGER,
                featured_image_id INTEGER,
                is_archived BOOLEAN NOT NULL DEFAULT 0,
                node_count_in_sitemap INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (layout_id) REFERENCES layouts(id),
                FOREIGN KEY (master_page_id) REFERENCES pages(id),
                FOREIGN KEY (category_id) REFERENCES categories(id),
                FOREIGN KEY (image_id) REFERENCES media_images(id),
                FOREIGN KEY (secondary_image_id) REFERENCES media_images(id),
                FOREIGN KEY (featured_image_id) REFERENCES media_images(id)
            );
            CREATE INDEX IF NOT EXISTS idx_pages_url_hash ON pages(page_url_hash);
            CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
        "#,
    },
    Migration {
        version: 4,
        name: "create_master_pages",
        up: r#"
            CREATE TABLE IF NOT EXISTS master_pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                master_id INTEGER NOT NULL,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
                FOREIGN KEY (master_id) REFERENCES pages(id) ON DELETE CASCADE,
                UNIQUE (page_id, master_id)
            );
            CREATE INDEX IF NOT EXISTS idx_master_pages_page_id ON master_pages(page_id);
            CREATE INDEX IF NOT EXISTS idx_master_pages_master_id ON master_pages(master_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_redirects",
        up: r#"
            CREATE TABLE IF NOT EXISTS redirects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_url VARCHAR(850) NOT NULL UNIQUE,
                redirect_url VARCHAR(850) NOT NULL
            );
        "#,
    },
    Migration {
        version: 6,
        name: "create_sitemaps",
        up: r#"
            CREATE TABLE IF NOT EXISTS sitemaps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sitemap_nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sitemap_id INTEGER NOT NULL,
                parent_id INTEGER,
                title VARCHAR(255) NOT NULL,
                url VARCHAR(850) NOT NULL,
                display_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (sitemap_id) REFERENCES sitemaps(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES sitemap_nodes(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sitemap_nodes_sitemap_id ON sitemap_nodes(sitemap_id);
            CREATE INDEX IF NOT EXISTS idx_sitemap_nodes_url ON sitemap_nodes(url);
        "#,
    },
    Migration {
        version: 7,
        name: "create_tags",
        up: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS page_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE,
                UNIQUE (page_id, tag_id)
            );
            CREATE INDEX IF NOT EXISTS idx_page_tags_page_id ON page_tags(page_id);
        "#,
    },
    Migration {
        version: 8,
        name: "create_page_options",
        up: r#"
            CREATE TABLE IF NOT EXISTS page_options (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                key VARCHAR(255) NOT NULL,
                value TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
                UNIQUE (page_id, key)
            );
        "#,
    },
    Migration {
        version: 9,
        name: "create_access_rules",
        up: r#"
            CREATE TABLE IF NOT EXISTS access_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                identity VARCHAR(255) NOT NULL,
                is_for_role BOOLEAN NOT NULL DEFAULT 0,
                access_level VARCHAR(20) NOT NULL DEFAULT 'deny',
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_access_rules_page_id ON access_rules(page_id);
        "#,
    },
    Migration {
        version: 10,
        name: "create_page_contents",
        up: r#"
            CREATE TABLE IF NOT EXISTS page_contents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                region VARCHAR(255) NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                published_on TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_page_contents_page_id ON page_contents(page_id);
        "#,
    },
];

/// Run all pending migrations.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DbPool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create migrations table")?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }
    Ok(records)
}

/// Apply a single migration and record it
async fn apply_migration(pool: &DbPool, migration: &Migration) -> Result<()> {
    // SQLite executes each statement in the batch in order
    sqlx::raw_sql(migration.up)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to execute migration SQL: {}", migration.name))?;

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await
        .context("Failed to record migration")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations_from_scratch() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        let count = run_migrations(&pool).await.expect("Migrations failed");
        assert_eq!(count, MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_run_migrations_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        run_migrations(&pool).await.expect("First run failed");
        let count = run_migrations(&pool).await.expect("Second run failed");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_migrations_create_core_tables() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        run_migrations(&pool).await.expect("Migrations failed");

        for table in [
            "pages",
            "layouts",
            "master_pages",
            "redirects",
            "sitemaps",
            "sitemap_nodes",
            "tags",
            "page_tags",
            "page_options",
            "access_rules",
            "page_contents",
        ] {
            let row =
                sqlx::query("SELECT COUNT(*) as count FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .expect("Failed to query sqlite_master");
            let count: i64 = row.get("count");
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[tokio::test]
    async fn test_versions_are_unique_and_ordered() {
        let mut versions: Vec<i32> = MIGRATIONS.iter().map(|m| m.version).collect();
        let original = versions.clone();
        versions.sort_unstable();
        versions.dedup();
        assert_eq!(versions.len(), MIGRATIONS.len());
        assert_eq!(original, versions);
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use std::collections::BTreeMap;

use crate::model::{AppVersion, EndpointRecord, VersionId, ViewCode, WebVersion};
use crate::store::traits::{AppVersionStore, EndpointStore, Store, VersionStore};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS web_versions (
        version_id INTEGER PRIMARY KEY CHECK (version_id > 0 AND version_id <= 65535),
        version_name TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        added_feature TEXT NOT NULL DEFAULT '',
        details TEXT NOT NULL DEFAULT '',
        deprecated_at TIMESTAMPTZ,
        weblog_url TEXT,
        panel_url TEXT,
        login_url TEXT,
        register_url TEXT,
        api_prefix TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS web_version_edges (
        version_id INTEGER NOT NULL REFERENCES web_versions (version_id) ON DELETE CASCADE,
        previous_id INTEGER NOT NULL REFERENCES web_versions (version_id) ON DELETE RESTRICT,
        incompatible BOOLEAN NOT NULL,
        PRIMARY KEY (version_id, previous_id, incompatible)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS endpoints (
        view_code_name TEXT PRIMARY KEY,
        view_name TEXT,
        web_version INTEGER REFERENCES web_versions (version_id) ON DELETE RESTRICT,
        view_url TEXT,
        absolute_view_url TEXT,
        is_api BOOLEAN NOT NULL DEFAULT FALSE,
        new_compatible_view TEXT REFERENCES endpoints (view_code_name) ON DELETE SET NULL,
        deprecated_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_versions (
        version_id INTEGER PRIMARY KEY CHECK (version_id > 0 AND version_id <= 65535),
        version_name TEXT NOT NULL,
        name TEXT NOT NULL,
        added_feature TEXT NOT NULL DEFAULT '',
        details TEXT NOT NULL DEFAULT '',
        deprecated_at TIMESTAMPTZ,
        attachment TEXT,
        base_dependency_web_version INTEGER REFERENCES web_versions (version_id) ON DELETE RESTRICT,
        base INTEGER REFERENCES app_versions (version_id) ON DELETE SET NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS app_version_endpoints (
        app_version INTEGER NOT NULL REFERENCES app_versions (version_id) ON DELETE CASCADE,
        view_code_name TEXT NOT NULL REFERENCES endpoints (view_code_name) ON DELETE CASCADE,
        PRIMARY KEY (app_version, view_code_name)
    )
    "#,
];

const VERSION_COLUMNS: &str = "version_id, version_name, name, added_feature, details, deprecated_at, \
     weblog_url, panel_url, login_url, register_url, api_prefix";

const ENDPOINT_COLUMNS: &str =
    "view_code_name, view_name, web_version, view_url, absolute_view_url, is_api, new_compatible_view, deprecated_at";

const APP_COLUMNS: &str = "version_id, version_name, name, added_feature, details, deprecated_at, \
     attachment, base_dependency_web_version, base";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the tables when they are missing.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to run schema migration")?;
        }
        log::info!("database schema ready");
        Ok(())
    }

    async fn load_edges(&self, ids: Option<&[i32]>) -> Result<BTreeMap<VersionId, Vec<(VersionId, bool)>>> {
        let rows = match ids {
            Some(ids) => {
                sqlx::query("SELECT version_id, previous_id, incompatible FROM web_version_edges WHERE version_id = ANY($1)")
                    .bind(ids)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT version_id, previous_id, incompatible FROM web_version_edges")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to load version edges")?;

        let mut edges: BTreeMap<VersionId, Vec<(VersionId, bool)>> = BTreeMap::new();
        for row in rows {
            let version_id = to_id(row.get("version_id"))?;
            let previous_id = to_id(row.get("previous_id"))?;
            edges
                .entry(version_id)
                .or_default()
                .push((previous_id, row.get("incompatible")));
        }
        Ok(edges)
    }
}

fn to_id(raw: i32) -> Result<VersionId> {
    VersionId::try_from(raw).with_context(|| format!("version id {} out of range", raw))
}

fn to_ids(ids: &[VersionId]) -> Vec<i32> {
    ids.iter().map(|id| i32::from(*id)).collect()
}

fn optional_id(raw: Option<i32>) -> Result<Option<VersionId>> {
    raw.map(to_id).transpose()
}

fn version_from_row(row: &PgRow, edges: Option<&Vec<(VersionId, bool)>>) -> Result<WebVersion> {
    let mut version = WebVersion::new(to_id(row.get("version_id"))?, row.get::<String, _>("version_name"), row.get::<String, _>("name"));
    version.added_feature = row.get("added_feature");
    version.details = row.get("details");
    version.deprecated_at = row.get("deprecated_at");
    version.weblog_url = row.get("weblog_url");
    version.panel_url = row.get("panel_url");
    version.login_url = row.get("login_url");
    version.register_url = row.get("register_url");
    version.api_prefix = row.get("api_prefix");
    for (previous, incompatible) in edges.into_iter().flatten() {
        if *incompatible {
            version.incompatible_previous_versions.insert(*previous);
        } else {
            version.previous_versions.insert(*previous);
        }
    }
    Ok(version)
}

fn endpoint_from_row(row: &PgRow) -> Result<EndpointRecord> {
    Ok(EndpointRecord {
        view_code_name: row.get("view_code_name"),
        view_name: row.get("view_name"),
        web_version: optional_id(row.get("web_version"))?,
        view_url: row.get("view_url"),
        absolute_view_url: row.get("absolute_view_url"),
        is_api: row.get("is_api"),
        new_compatible_view: row.get("new_compatible_view"),
        deprecated_at: row.get("deprecated_at"),
    })
}

fn app_from_row(row: &PgRow) -> Result<AppVersion> {
    let mut app = AppVersion::new(to_id(row.get("version_id"))?, row.get::<String, _>("version_name"), row.get::<String, _>("name"));
    app.added_feature = row.get("added_feature");
    app.details = row.get("details");
    app.deprecated_at = row.get("deprecated_at");
    app.attachment = row.get("attachment");
    app.base_dependency_web_version = optional_id(row.get("base_dependency_web_version"))?;
    app.base = optional_id(row.get("base"))?;
    Ok(app)
}

#[async_trait::async_trait]
impl VersionStore for PostgresStore {
    async fn get_version(&self, id: VersionId) -> Result<Option<WebVersion>> {
        let row = sqlx::query(&format!("SELECT {} FROM web_versions WHERE version_id = $1", VERSION_COLUMNS))
            .bind(i32::from(id))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch version")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let edges = self.load_edges(Some(&[i32::from(id)][..])).await?;
        Ok(Some(version_from_row(&row, edges.get(&id))?))
    }

    async fn list_versions(&self) -> Result<Vec<WebVersion>> {
        let rows = sqlx::query(&format!("SELECT {} FROM web_versions ORDER BY version_id", VERSION_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list versions")?;
        let edges = self.load_edges(None).await?;

        rows.iter()
            .map(|row| {
                let id = to_id(row.get("version_id"))?;
                version_from_row(row, edges.get(&id))
            })
            .collect()
    }

    async fn upsert_version(&self, version: WebVersion) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;
        let id = i32::from(version.version_id);

        sqlx::query(
            r#"
            INSERT INTO web_versions (version_id, version_name, name, added_feature, details, deprecated_at,
                                      weblog_url, panel_url, login_url, register_url, api_prefix)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (version_id) DO UPDATE SET
                version_name = EXCLUDED.version_name,
                name = EXCLUDED.name,
                added_feature = EXCLUDED.added_feature,
                details = EXCLUDED.details,
                deprecated_at = EXCLUDED.deprecated_at,
                weblog_url = EXCLUDED.weblog_url,
                panel_url = EXCLUDED.panel_url,
                login_url = EXCLUDED.login_url,
                register_url = EXCLUDED.register_url,
                api_prefix = EXCLUDED.api_prefix
            "#,
        )
        .bind(id)
        .bind(&version.version_name)
        .bind(&version.name)
        .bind(&version.added_feature)
        .bind(&version.details)
        .bind(version.deprecated_at)
        .bind(&version.weblog_url)
        .bind(&version.panel_url)
        .bind(&version.login_url)
        .bind(&version.register_url)
        .bind(&version.api_prefix)
        .execute(&mut *tx)
        .await
        .context("Failed to upsert version")?;

        sqlx::query("DELETE FROM web_version_edges WHERE version_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear version edges")?;

        let edges = version
            .previous_versions
            .iter()
            .map(|previous| (*previous, false))
            .chain(version.incompatible_previous_versions.iter().map(|previous| (*previous, true)));
        for (previous, incompatible) in edges {
            sqlx::query("INSERT INTO web_version_edges (version_id, previous_id, incompatible) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(i32::from(previous))
                .bind(incompatible)
                .execute(&mut *tx)
                .await
                .context("Failed to insert version edge")?;
        }

        tx.commit().await.context("Failed to commit version")?;
        Ok(())
    }

    async fn delete_version(&self, id: VersionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM web_versions WHERE version_id = $1")
            .bind(i32::from(id))
            .execute(&self.pool)
            .await
            .context("Failed to delete version")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_versions_deprecated_at(&self, ids: &[VersionId], at: Option<DateTime<Utc>>) -> Result<usize> {
        let result = sqlx::query("UPDATE web_versions SET deprecated_at = $1 WHERE version_id = ANY($2)")
            .bind(at)
            .bind(to_ids(ids))
            .execute(&self.pool)
            .await
            .context("Failed to update version deprecation")?;

        Ok(result.rows_affected() as usize)
    }
}

#[async_trait::async_trait]
impl EndpointStore for PostgresStore {
    async fn get_endpoint(&self, code: &str) -> Result<Option<EndpointRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM endpoints WHERE view_code_name = $1", ENDPOINT_COLUMNS))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch endpoint")?;

        row.as_ref().map(endpoint_from_row).transpose()
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointRecord>> {
        let rows = sqlx::query(&format!("SELECT {} FROM endpoints ORDER BY view_code_name", ENDPOINT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list endpoints")?;

        rows.iter().map(endpoint_from_row).collect()
    }

    async fn upsert_endpoint(&self, record: EndpointRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO endpoints (view_code_name, view_name, web_version, view_url, absolute_view_url,
                                   is_api, new_compatible_view, deprecated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (view_code_name) DO UPDATE SET
                view_name = EXCLUDED.view_name,
                web_version = EXCLUDED.web_version,
                view_url = EXCLUDED.view_url,
                absolute_view_url = EXCLUDED.absolute_view_url,
                is_api = EXCLUDED.is_api,
                new_compatible_view = EXCLUDED.new_compatible_view,
                deprecated_at = EXCLUDED.deprecated_at
            "#,
        )
        .bind(&record.view_code_name)
        .bind(&record.view_name)
        .bind(record.web_version.map(i32::from))
        .bind(&record.view_url)
        .bind(&record.absolute_view_url)
        .bind(record.is_api)
        .bind(&record.new_compatible_view)
        .bind(record.deprecated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert endpoint")?;

        Ok(())
    }

    async fn insert_endpoint_if_absent(&self, record: EndpointRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO endpoints (view_code_name, view_name, web_version, view_url, absolute_view_url,
                                   is_api, new_compatible_view, deprecated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (view_code_name) DO NOTHING
            "#,
        )
        .bind(&record.view_code_name)
        .bind(&record.view_name)
        .bind(record.web_version.map(i32::from))
        .bind(&record.view_url)
        .bind(&record.absolute_view_url)
        .bind(record.is_api)
        .bind(&record.new_compatible_view)
        .bind(record.deprecated_at)
        .execute(&self.pool)
        .await
        .context("Failed to register endpoint")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_endpoint_is_api(&self, code: &str, is_api: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE endpoints SET is_api = $1 WHERE view_code_name = $2")
            .bind(is_api)
            .bind(code)
            .execute(&self.pool)
            .await
            .context("Failed to update endpoint api flag")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_endpoint(&self, code: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM endpoints WHERE view_code_name = $1")
            .bind(code)
            .execute(&self.pool)
            .await
            .context("Failed to delete endpoint")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_endpoints_deprecated_at(&self, codes: &[ViewCode], at: Option<DateTime<Utc>>) -> Result<usize> {
        let result = sqlx::query("UPDATE endpoints SET deprecated_at = $1 WHERE view_code_name = ANY($2)")
            .bind(at)
            .bind(codes)
            .execute(&self.pool)
            .await
            .context("Failed to update endpoint deprecation")?;

        Ok(result.rows_affected() as usize)
    }
}

#[async_trait::async_trait]
impl AppVersionStore for PostgresStore {
    async fn get_app_version(&self, id: VersionId) -> Result<Option<AppVersion>> {
        let row = sqlx::query(&format!("SELECT {} FROM app_versions WHERE version_id = $1", APP_COLUMNS))
            .bind(i32::from(id))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch app version")?;

        row.as_ref().map(app_from_row).transpose()
    }

    async fn list_app_versions(&self) -> Result<Vec<AppVersion>> {
        let rows = sqlx::query(&format!("SELECT {} FROM app_versions ORDER BY version_id", APP_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list app versions")?;

        rows.iter().map(app_from_row).collect()
    }

    async fn upsert_app_version(&self, app: AppVersion) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_versions (version_id, version_name, name, added_feature, details, deprecated_at,
                                      attachment, base_dependency_web_version, base)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (version_id) DO UPDATE SET
                version_name = EXCLUDED.version_name,
                name = EXCLUDED.name,
                added_feature = EXCLUDED.added_feature,
                details = EXCLUDED.details,
                deprecated_at = EXCLUDED.deprecated_at,
                attachment = EXCLUDED.attachment,
                base_dependency_web_version = EXCLUDED.base_dependency_web_version,
                base = EXCLUDED.base
            "#,
        )
        .bind(i32::from(app.version_id))
        .bind(&app.version_name)
        .bind(&app.name)
        .bind(&app.added_feature)
        .bind(&app.details)
        .bind(app.deprecated_at)
        .bind(&app.attachment)
        .bind(app.base_dependency_web_version.map(i32::from))
        .bind(app.base.map(i32::from))
        .execute(&self.pool)
        .await
        .context("Failed to upsert app version")?;

        Ok(())
    }

    async fn delete_app_version(&self, id: VersionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM app_versions WHERE version_id = $1")
            .bind(i32::from(id))
            .execute(&self.pool)
            .await
            .context("Failed to delete app version")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_app_versions_deprecated_at(&self, ids: &[VersionId], at: Option<DateTime<Utc>>) -> Result<usize> {
        let result = sqlx::query("UPDATE app_versions SET deprecated_at = $1 WHERE version_id = ANY($2)")
            .bind(at)
            .bind(to_ids(ids))
            .execute(&self.pool)
            .await
            .context("Failed to update app version deprecation")?;

        Ok(result.rows_affected() as usize)
    }

    async fn list_required_endpoints(&self, app_version: VersionId) -> Result<Vec<EndpointRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT e.view_code_name, e.view_name, e.web_version, e.view_url, e.absolute_view_url,
                   e.is_api, e.new_compatible_view, e.deprecated_at
            FROM app_version_endpoints r
            JOIN endpoints e ON e.view_code_name = r.view_code_name
            WHERE r.app_version = $1
            ORDER BY e.view_code_name
            "#,
        )
        .bind(i32::from(app_version))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list required endpoints")?;

        rows.iter().map(endpoint_from_row).collect()
    }

    async fn set_required_endpoints(&self, app_version: VersionId, codes: &[ViewCode]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;
        let id = i32::from(app_version);

        sqlx::query("DELETE FROM app_version_endpoints WHERE app_version = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear required endpoints")?;

        for code in codes {
            sqlx::query("INSERT INTO app_version_endpoints (app_version, view_code_name) VALUES ($1, $2)")
                .bind(id)
                .bind(code)
                .execute(&mut *tx)
                .await
                .context("Failed to insert required endpoint")?;
        }

        tx.commit().await.context("Failed to commit required endpoints")?;
        Ok(())
    }

    async fn list_apps_requiring(&self, code: &str) -> Result<Vec<VersionId>> {
        let rows = sqlx::query("SELECT app_version FROM app_version_endpoints WHERE view_code_name = $1 ORDER BY app_version")
            .bind(code)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list requiring app versions")?;

        rows.iter().map(|row| to_id(row.get("app_version"))).collect()
    }
}

impl Store for PostgresStore {}

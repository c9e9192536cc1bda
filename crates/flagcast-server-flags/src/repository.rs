// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authoritative flag records backed by SQLite.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::instrument;

use flagcast_flags_core::timestamp;

use crate::error::{FlagsServerError, Result};

/// A persisted feature flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRecord {
	pub id: i64,
	pub name: String,
	pub description: Option<String>,
	pub enabled: bool,
	#[serde(with = "timestamp::millis")]
	pub created_at: NaiveDateTime,
	#[serde(with = "timestamp::millis")]
	pub updated_at: NaiveDateTime,
	pub created_by: String,
	pub updated_by: String,
}

/// Values for a flag that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewFlag {
	pub name: String,
	pub description: Option<String>,
	pub enabled: bool,
	pub actor: String,
	pub at: NaiveDateTime,
}

#[async_trait]
pub trait FlagsRepository: Send + Sync {
	async fn list(&self, offset: u64, limit: u64) -> Result<Vec<FlagRecord>>;
	async fn count(&self) -> Result<u64>;
	async fn get_by_name(&self, name: &str) -> Result<Option<FlagRecord>>;
	async fn exists_by_name(&self, name: &str) -> Result<bool>;
	/// Fails with `AlreadyExists` if the name is taken.
	async fn insert(&self, flag: NewFlag) -> Result<FlagRecord>;
	/// Writes description, enabled, updated_at and updated_by. Returns false if no row matched.
	async fn update(&self, flag: &FlagRecord) -> Result<bool>;
	async fn delete_by_id(&self, id: i64) -> Result<bool>;
	/// Unknown names are skipped.
	async fn find_by_names(&self, names: &[String]) -> Result<Vec<FlagRecord>>;
}

/// Opens a pool for `url`. In-memory databases are pinned to one connection
/// so every query sees the same database.
pub async fn connect(url: &str) -> Result<SqlitePool> {
	let max_connections = if url.contains(":memory:") { 1 } else { 5 };
	let pool = SqlitePoolOptions::new()
		.max_connections(max_connections)
		.connect(url)
		.await?;
	Ok(pool)
}

#[derive(Clone)]
pub struct SqliteFlagsRepository {
	pool: SqlitePool,
}

impl SqliteFlagsRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Creates the flag table if it does not exist.
	pub async fn migrate(&self) -> Result<()> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS feature_flags (
				id INTEGER PRIMARY KEY AUTOINCREMENT,
				name TEXT NOT NULL UNIQUE,
				description TEXT,
				enabled INTEGER NOT NULL DEFAULT 0,
				created_at TEXT NOT NULL,
				updated_at TEXT NOT NULL,
				created_by TEXT NOT NULL,
				updated_by TEXT NOT NULL
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}

const SELECT_COLUMNS: &str =
	"SELECT id, name, description, enabled, created_at, updated_at, created_by, updated_by FROM feature_flags";

#[async_trait]
impl FlagsRepository for SqliteFlagsRepository {
	#[instrument(skip(self))]
	async fn list(&self, offset: u64, limit: u64) -> Result<Vec<FlagRecord>> {
		let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC LIMIT ? OFFSET ?");
		let rows = sqlx::query_as::<_, FlagRow>(&sql)
			.bind(limit as i64)
			.bind(offset as i64)
			.fetch_all(&self.pool)
			.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self))]
	async fn count(&self) -> Result<u64> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feature_flags")
			.fetch_one(&self.pool)
			.await?;
		Ok(count.max(0) as u64)
	}

	#[instrument(skip(self), fields(flag_name = %name))]
	async fn get_by_name(&self, name: &str) -> Result<Option<FlagRecord>> {
		let sql = format!("{SELECT_COLUMNS} WHERE name = ?");
		let row = sqlx::query_as::<_, FlagRow>(&sql)
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(flag_name = %name))]
	async fn exists_by_name(&self, name: &str) -> Result<bool> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feature_flags WHERE name = ?")
			.bind(name)
			.fetch_one(&self.pool)
			.await?;
		Ok(count > 0)
	}

	#[instrument(skip(self, flag), fields(flag_name = %flag.name))]
	async fn insert(&self, flag: NewFlag) -> Result<FlagRecord> {
		let at = timestamp::format(&flag.at);
		let result = sqlx::query(
			r#"
			INSERT INTO feature_flags (name, description, enabled, created_at, updated_at, created_by, updated_by)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&flag.name)
		.bind(&flag.description)
		.bind(flag.enabled)
		.bind(&at)
		.bind(&at)
		.bind(&flag.actor)
		.bind(&flag.actor)
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db) if db.is_unique_violation() => {
				FlagsServerError::AlreadyExists(flag.name.clone())
			}
			other => FlagsServerError::Database(other),
		})?;

		Ok(FlagRecord {
			id: result.last_insert_rowid(),
			name: flag.name,
			description: flag.description,
			enabled: flag.enabled,
			created_at: flag.at,
			updated_at: flag.at,
			created_by: flag.actor.clone(),
			updated_by: flag.actor,
		})
	}

	#[instrument(skip(self, flag), fields(flag_id = flag.id, flag_name = %flag.name))]
	async fn update(&self, flag: &FlagRecord) -> Result<bool> {
		let result = sqlx::query(
			r#"
			UPDATE feature_flags
			SET description = ?, enabled = ?, updated_at = ?, updated_by = ?
			WHERE id = ?
			"#,
		)
		.bind(&flag.description)
		.bind(flag.enabled)
		.bind(timestamp::format(&flag.updated_at))
		.bind(&flag.updated_by)
		.bind(flag.id)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self), fields(flag_id = id))]
	async fn delete_by_id(&self, id: i64) -> Result<bool> {
		let result = sqlx::query("DELETE FROM feature_flags WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self, names), fields(requested = names.len()))]
	async fn find_by_names(&self, names: &[String]) -> Result<Vec<FlagRecord>> {
		if names.is_empty() {
			return Ok(Vec::new());
		}

		let placeholders = vec!["?"; names.len()].join(", ");
		let sql = format!("{SELECT_COLUMNS} WHERE name IN ({placeholders}) ORDER BY id ASC");
		let mut query = sqlx::query_as::<_, FlagRow>(&sql);
		for name in names {
			query = query.bind(name);
		}
		let rows = query.fetch_all(&self.pool).await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}
}

#[derive(sqlx::FromRow)]
struct FlagRow {
	id: i64,
	name: String,
	description: Option<String>,
	enabled: bool,
	created_at: String,
	updated_at: String,
	created_by: String,
	updated_by: String,
}

impl TryFrom<FlagRow> for FlagRecord {
	type Error = FlagsServerError;

	fn try_from(row: FlagRow) -> Result<Self> {
		let parse = |value: &str, column: &str| {
			timestamp::parse(value)
				.map_err(|_| FlagsServerError::Internal(format!("invalid {column} '{value}'")))
		};

		Ok(FlagRecord {
			id: row.id,
			created_at: parse(&row.created_at, "created_at")?,
			updated_at: parse(&row.updated_at, "updated_at")?,
			name: row.name,
			description: row.description,
			enabled: row.enabled,
			created_by: row.created_by,
			updated_by: row.updated_by,
		})
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use flagcast_flags_core::timestamp::now_millis;

	pub(crate) async fn test_repository() -> SqliteFlagsRepository {
		let pool = connect("sqlite::memory:").await.unwrap();
		let repo = SqliteFlagsRepository::new(pool);
		repo.migrate().await.unwrap();
		repo
	}

	fn new_flag(name: &str, enabled: bool) -> NewFlag {
		NewFlag {
			name: name.to_string(),
			description: Some(format!("{name} description")),
			enabled,
			actor: "system".to_string(),
			at: now_millis(),
		}
	}

	#[tokio::test]
	async fn insert_and_get_by_name() {
		let repo = test_repository().await;
		let inserted = repo.insert(new_flag("dark_mode", true)).await.unwrap();

		let fetched = repo.get_by_name("dark_mode").await.unwrap().unwrap();
		assert_eq!(fetched, inserted);
		assert!(repo.exists_by_name("dark_mode").await.unwrap());
		assert!(!repo.exists_by_name("light_mode").await.unwrap());
	}

	#[tokio::test]
	async fn duplicate_insert_is_already_exists() {
		let repo = test_repository().await;
		repo.insert(new_flag("dark_mode", true)).await.unwrap();

		let err = repo.insert(new_flag("dark_mode", false)).await.unwrap_err();
		assert!(matches!(err, FlagsServerError::AlreadyExists(name) if name == "dark_mode"));
	}

	#[tokio::test]
	async fn update_and_delete() {
		let repo = test_repository().await;
		let mut flag = repo.insert(new_flag("beta", false)).await.unwrap();

		flag.enabled = true;
		flag.description = None;
		assert!(repo.update(&flag).await.unwrap());

		let fetched = repo.get_by_name("beta").await.unwrap().unwrap();
		assert!(fetched.enabled);
		assert_eq!(fetched.description, None);

		assert!(repo.delete_by_id(flag.id).await.unwrap());
		assert!(!repo.delete_by_id(flag.id).await.unwrap());
		assert!(repo.get_by_name("beta").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn list_pages_in_insert_order() {
		let repo = test_repository().await;
		for name in ["a", "b", "c", "d", "e"] {
			repo.insert(new_flag(name, true)).await.unwrap();
		}

		assert_eq!(repo.count().await.unwrap(), 5);
		let page: Vec<String> = repo
			.list(2, 2)
			.await
			.unwrap()
			.into_iter()
			.map(|f| f.name)
			.collect();
		assert_eq!(page, vec!["c", "d"]);
	}

	#[tokio::test]
	async fn find_by_names_skips_unknown() {
		let repo = test_repository().await;
		repo.insert(new_flag("maintenance_mode", true)).await.unwrap();
		repo.insert(new_flag("beta", false)).await.unwrap();

		let found = repo
			.find_by_names(&["maintenance_mode".to_string(), "missing".to_string()])
			.await
			.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].name, "maintenance_mode");

		assert!(repo.find_by_names(&[]).await.unwrap().is_empty());
	}
}

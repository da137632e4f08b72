use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::embeddings::{EmbeddingIndex, Requirement, RequirementIndex};
use super::schema::init_schema;
use super::snapshot::IndexSnapshot;
use super::{FileInfo, ReadmeEntry, SymbolRecord};
use crate::graph::builder::LinkHeuristics;

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Index statistics
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub total_files: usize,
    pub total_embeddings: usize,
    pub total_requirements: usize,
    pub total_readmes: usize,
    pub last_full_index: i64,
}

/// Database connection manager
#[derive(Clone)]
pub struct IndexDatabase {
    pool: ConnectionPool,
    db_path: PathBuf,
}

impl IndexDatabase {
    /// Create or open a database
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        info!("Opening database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .context("Failed to create connection pool")?;

        {
            let conn = pool.get().context("Failed to get connection")?;
            init_schema(&conn).context("Failed to initialize schema")?;
        }

        Ok(Self { pool, db_path })
    }

    /// Open an existing database, or `None` when nothing has been persisted yet
    pub fn open_existing(db_path: impl AsRef<Path>) -> Result<Option<Self>> {
        if !db_path.as_ref().exists() {
            debug!("No index database at {}", db_path.as_ref().display());
            return Ok(None);
        }
        Self::new(db_path).map(Some)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().context("Failed to get connection from pool")
    }

    /// Replace every persisted row with the contents of `snapshot` in one transaction.
    pub fn save_snapshot(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for table in ["files", "symbol_records", "embeddings", "readmes"] {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }

        {
            let mut insert_file = tx.prepare(
                "INSERT INTO files (path, repo, component, language, size, content_hash, content, last_indexed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for info in snapshot.files.values() {
                let content = snapshot
                    .sources
                    .get(&info.repo)
                    .and_then(|files| files.get(&info.path))
                    .map(String::as_str)
                    .unwrap_or("");
                insert_file.execute(params![
                    info.path,
                    info.repo,
                    info.component,
                    info.language,
                    info.size as i64,
                    info.content_hash,
                    content,
                    snapshot.built_at,
                ])?;
            }

            let mut insert_record =
                tx.prepare("INSERT INTO symbol_records (path, record) VALUES (?1, ?2)")?;
            for (path, record) in &snapshot.records {
                insert_record.execute(params![path, serde_json::to_string(record)?])?;
            }

            let mut insert_embedding = tx.prepare(
                "INSERT INTO embeddings (key, path, position, vector) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, entry) in snapshot.embeddings.iter().enumerate() {
                insert_embedding.execute(params![
                    entry.key,
                    entry.path,
                    position as i64,
                    encode_vector(&entry.vector),
                ])?;
            }

            let mut insert_readme = tx.prepare(
                "INSERT INTO readmes (position, repo, path, content) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, readme) in snapshot.readmes.iter().enumerate() {
                insert_readme.execute(params![position as i64, readme.id, readme.path, readme.content])?;
            }
        }

        write_requirements(&tx, &snapshot.requirements)?;

        tx.execute(
            "INSERT OR REPLACE INTO index_stats (key, value, updated_at)
             VALUES ('last_full_index', ?1, CURRENT_TIMESTAMP)",
            [snapshot.built_at.to_string()],
        )?;

        tx.commit()?;
        info!(
            "Saved index: {} files, {} embeddings, {} requirements",
            snapshot.files.len(),
            snapshot.embeddings.len(),
            snapshot.requirements.len()
        );
        Ok(())
    }

    /// Replace only the requirement rows
    pub fn save_requirements(&self, requirements: &RequirementIndex) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        write_requirements(&tx, requirements)?;
        tx.commit()?;
        Ok(())
    }

    /// Load everything into a fresh snapshot; graphs are re-derived from the records.
    pub fn load_snapshot(&self, heuristics: &LinkHeuristics) -> Result<IndexSnapshot> {
        let conn = self.get_conn()?;

        let mut files = BTreeMap::new();
        let mut sources: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT path, repo, component, language, size, content_hash, content FROM files ORDER BY path",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    FileInfo {
                        path: row.get(0)?,
                        repo: row.get(1)?,
                        component: row.get(2)?,
                        language: row.get(3)?,
                        size: row.get::<_, i64>(4)? as u64,
                        content_hash: row.get(5)?,
                    },
                    row.get::<_, String>(6)?,
                ))
            })?;
            for row in rows {
                let (info, content) = row?;
                sources
                    .entry(info.repo.clone())
                    .or_default()
                    .insert(info.path.clone(), content);
                files.insert(info.path.clone(), info);
            }
        }

        let mut records = BTreeMap::new();
        {
            let mut stmt = conn.prepare("SELECT path, record FROM symbol_records ORDER BY path")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
            for row in rows {
                let (path, json) = row?;
                let record: SymbolRecord = serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt symbol record for {}", path))?;
                records.insert(path, record);
            }
        }

        let embeddings = {
            let mut stmt = conn.prepare("SELECT key, vector FROM embeddings ORDER BY position")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;
            let mut index = EmbeddingIndex::new();
            for row in rows {
                let (key, blob) = row?;
                index.insert(key, decode_vector(&blob));
            }
            index
        };

        let readmes = {
            let mut stmt = conn.prepare("SELECT repo, path, content FROM readmes ORDER BY position")?;
            let rows = stmt.query_map([], |row| {
                Ok(ReadmeEntry {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    content: row.get(2)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let requirements = self.load_requirements_with(&conn)?;
        let built_at: i64 = self
            .get_stat_with(&conn, "last_full_index")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let mut snapshot = IndexSnapshot::build(
            records,
            files,
            sources,
            readmes,
            embeddings,
            requirements,
            heuristics,
        );
        snapshot.built_at = built_at;
        Ok(snapshot)
    }

    pub fn load_requirements(&self) -> Result<RequirementIndex> {
        let conn = self.get_conn()?;
        self.load_requirements_with(&conn)
    }

    fn load_requirements_with(&self, conn: &rusqlite::Connection) -> Result<RequirementIndex> {
        let mut stmt =
            conn.prepare("SELECT id, description, row, vector FROM requirements ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, description, row_json, blob) = row?;
            entries.push(Requirement {
                id,
                description,
                row: serde_json::from_str(&row_json).unwrap_or_default(),
                vector: decode_vector(&blob),
            });
        }
        Ok(RequirementIndex::new(entries))
    }

    fn get_stat_with(&self, conn: &rusqlite::Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row("SELECT value FROM index_stats WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Get index statistics
    pub fn get_stats(&self) -> Result<IndexStats> {
        let conn = self.get_conn()?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(IndexStats {
            total_files: count("files")?,
            total_embeddings: count("embeddings")?,
            total_requirements: count("requirements")?,
            total_readmes: count("readmes")?,
            last_full_index: self
                .get_stat_with(&conn, "last_full_index")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        })
    }

    /// File counts per language
    pub fn languages_breakdown(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT language, COUNT(*) AS count FROM files GROUP BY language ORDER BY count DESC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// File counts per repository
    pub fn repos_breakdown(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT repo, COUNT(*) AS count FROM files GROUP BY repo ORDER BY count DESC")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn write_requirements(tx: &rusqlite::Transaction<'_>, requirements: &RequirementIndex) -> Result<()> {
    tx.execute("DELETE FROM requirements", [])?;
    let mut stmt = tx.prepare(
        "INSERT INTO requirements (position, id, description, row, vector) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, requirement) in requirements.iter().enumerate() {
        stmt.execute(params![
            position as i64,
            requirement.id,
            requirement.description,
            serde_json::to_string(&requirement.row)?,
            encode_vector(&requirement.vector),
        ])?;
    }
    Ok(())
}

/// Load the snapshot at `db_path`; a missing database is an empty index.
pub fn load_or_empty(db_path: &Path, heuristics: &LinkHeuristics) -> Result<IndexSnapshot> {
    match IndexDatabase::open_existing(db_path)? {
        Some(db) => db.load_snapshot(heuristics),
        None => {
            info!("No persisted index at {}, starting empty", db_path.display());
            Ok(IndexSnapshot::default())
        }
    }
}

pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

use rusqlite::{Connection, Result};
use tracing::{debug, info};

/// SQLite schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    debug!("Current schema version: {}", current_version);

    if current_version < SCHEMA_VERSION {
        info!("Upgrading schema from v{} to v{}", current_version, SCHEMA_VERSION);
        apply_migrations(conn, current_version)?;
    }

    Ok(())
}

fn apply_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    for version in (from_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration v{}", version);
        match version {
            1 => create_v1_schema(conn)?,
            _ => unreachable!("Unknown schema version: {}", version),
        }

        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    }

    Ok(())
}

fn create_v1_schema(conn: &Connection) -> Result<()> {
    // Crawled files; content kept so the repo -> source map survives a reload
    conn.execute(
        "CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            repo TEXT NOT NULL,
            component TEXT NOT NULL,
            language TEXT NOT NULL,
            size INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            content TEXT NOT NULL,
            last_indexed INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_files_repo ON files(repo)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS symbol_records (
            path TEXT PRIMARY KEY,
            record TEXT NOT NULL
        )",
        [],
    )?;

    // Vectors are little-endian f32 blobs; position preserves insertion order
    conn.execute(
        "CREATE TABLE IF NOT EXISTS embeddings (
            key TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            position INTEGER NOT NULL,
            vector BLOB NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_embeddings_path ON embeddings(path)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS requirements (
            position INTEGER PRIMARY KEY,
            id TEXT NOT NULL,
            description TEXT NOT NULL,
            row TEXT NOT NULL,
            vector BLOB NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS readmes (
            position INTEGER PRIMARY KEY,
            repo TEXT NOT NULL,
            path TEXT NOT NULL,
            content TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS index_stats (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO index_stats (key, value) VALUES ('last_full_index', '0')",
        [],
    )?;

    info!("v1 schema created successfully");

    Ok(())
}

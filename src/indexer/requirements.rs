// Requirements CSV loading and embedding

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::index::embeddings::{Requirement, RequirementIndex};
use crate::provider::EmbeddingProvider;

pub const ID_COLUMN: &str = "Project ID";
pub const DESCRIPTION_COLUMN: &str = "Description";

/// A requirement row before embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementRow {
    pub id: String,
    pub description: String,
    pub row: BTreeMap<String, String>,
}

/// Parse a requirements CSV. The header must carry `Project ID` and `Description`.
pub fn read_requirements<R: std::io::Read>(reader: R) -> Result<Vec<RequirementRow>> {
    let mut csv = csv::Reader::from_reader(reader);
    let headers = csv.headers().context("Failed to read CSV header")?.clone();
    for column in [ID_COLUMN, DESCRIPTION_COLUMN] {
        if !headers.iter().any(|h| h == column) {
            anyhow::bail!("Requirements CSV is missing the '{}' column", column);
        }
    }

    let mut rows = Vec::new();
    for (line, record) in csv.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed requirement row {}: {}", line + 2, e);
                continue;
            }
        };
        let row: BTreeMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();

        let id = row.get(ID_COLUMN).cloned().unwrap_or_default();
        let description = row.get(DESCRIPTION_COLUMN).cloned().unwrap_or_default();
        rows.push(RequirementRow {
            id,
            description,
            row,
        });
    }

    Ok(rows)
}

pub fn read_requirements_file(path: &Path) -> Result<Vec<RequirementRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Requirements file not found: {}", path.display()))?;
    read_requirements(file).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Embed each description with `model`; rows whose embedding fails are dropped.
pub async fn embed_requirements(
    provider: &dyn EmbeddingProvider,
    model: &str,
    rows: Vec<RequirementRow>,
) -> RequirementIndex {
    let total = rows.len();
    let mut entries = Vec::with_capacity(total);

    for row in rows {
        match provider.embed(&row.description, model).await {
            Ok(vector) => entries.push(Requirement {
                id: row.id,
                description: row.description,
                row: row.row,
                vector,
            }),
            Err(e) => warn!("Skipping requirement {}: {}", row.id, e),
        }
    }

    info!("Embedded {} of {} requirements", entries.len(), total);
    RequirementIndex::new(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockEmbedder;

    const CSV: &str = "Project ID,Description,Owner\n\
REQ-1,Users can check out a cart,payments\n\
REQ-2,\"Search returns results, sorted\",search\n";

    #[test]
    fn test_read_rows_keeps_all_columns() {
        let rows = read_requirements(CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "REQ-1");
        assert_eq!(rows[1].description, "Search returns results, sorted");
        assert_eq!(rows[0].row.get("Owner").map(String::as_str), Some("payments"));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let err = read_requirements("ID,Text\n1,x\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Project ID"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_requirements_file(&dir.path().join("nope.csv")).is_err());
    }

    #[tokio::test]
    async fn test_failed_embeddings_are_skipped() {
        let provider = MockEmbedder::constant(vec![0.1, 0.2]).failing_on("Search");
        let rows = read_requirements(CSV.as_bytes()).unwrap();

        let index = embed_requirements(&provider, "req-model", rows).await;

        assert_eq!(index.len(), 1);
        let first = index.iter().next().unwrap();
        assert_eq!(first.id, "REQ-1");
        assert_eq!(first.vector, vec![0.1, 0.2]);
    }
}

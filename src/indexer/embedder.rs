// Embedding index builder: symbol records -> keyed vectors

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::config::EmbeddingConfig;
use crate::index::embeddings::{chunk_words, ElementKind, EmbeddingIndex, EmbeddingKey};
use crate::index::SymbolRecord;
use crate::provider::EmbeddingProvider;

/// One piece of text to embed and the key it is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingUnit {
    pub key: String,
    pub text: String,
}

impl EmbeddingUnit {
    fn new(key: EmbeddingKey, payload: &str) -> Self {
        let key = key.to_string();
        let text = format!("{}: {}", key, payload);
        Self { key, text }
    }
}

/// Every embeddable unit of a record, in record order.
///
/// Classes, imports, exports and properties come first, then each function
/// followed by its body chunks of at most `words_per_chunk` words.
pub fn plan_units(record: &SymbolRecord, words_per_chunk: usize) -> Vec<EmbeddingUnit> {
    let path = record.file_path.as_str();
    let mut units = Vec::with_capacity(record.element_count());

    let simple = [
        (ElementKind::Class, &record.class_names),
        (ElementKind::Import, &record.imports),
        (ElementKind::Export, &record.exports),
        (ElementKind::Property, &record.property_declarations),
    ];
    for (kind, items) in simple {
        for item in items {
            units.push(EmbeddingUnit::new(EmbeddingKey::element(kind, item, path), item));
        }
    }

    for function in &record.functions {
        units.push(EmbeddingUnit::new(
            EmbeddingKey::function(&function.name, &function.class_name, path),
            &function.name,
        ));
        for (i, chunk) in chunk_words(&function.body, words_per_chunk)
            .iter()
            .enumerate()
        {
            units.push(EmbeddingUnit::new(
                EmbeddingKey::body_chunk(&function.name, &function.class_name, i, path),
                chunk,
            ));
        }
    }

    units
}

/// Result of embedding a batch of records
#[derive(Debug, Default)]
pub struct EmbedReport {
    pub index: EmbeddingIndex,
    pub requested: usize,
    pub failed: usize,
}

/// Bounded-concurrency embedding of record units
pub struct Embedder<'a> {
    provider: &'a dyn EmbeddingProvider,
    model: String,
    chunk_words: usize,
    concurrency: usize,
}

impl<'a> Embedder<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            chunk_words: config.chunk_words,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Embed every unit of every record.
    ///
    /// A failed unit is logged and left out of the index; sibling requests
    /// keep going. Keys land in record order regardless of completion order.
    pub async fn embed_records(
        &self,
        records: &BTreeMap<String, SymbolRecord>,
        progress: Option<&ProgressBar>,
    ) -> EmbedReport {
        let units: Vec<EmbeddingUnit> = records
            .values()
            .flat_map(|record| plan_units(record, self.chunk_words))
            .collect();
        info!(
            "Embedding {} units from {} files (concurrency {})",
            units.len(),
            records.len(),
            self.concurrency
        );
        if let Some(pb) = progress {
            pb.set_length(units.len() as u64);
            pb.set_position(0);
        }

        let requested = units.len();
        let results: Vec<(String, Option<Vec<f32>>)> = stream::iter(units)
            .map(|unit| async move {
                let vector = match self.provider.embed(&unit.text, &self.model).await {
                    Ok(vector) => Some(vector),
                    Err(e) => {
                        warn!("Embedding failed for {}: {}", unit.key, e);
                        None
                    }
                };
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                (unit.key, vector)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = EmbedReport {
            requested,
            ..Default::default()
        };
        for (key, vector) in results {
            match vector {
                Some(vector) => report.index.insert(key, vector),
                None => report.failed += 1,
            }
        }

        if report.failed > 0 {
            warn!("{} of {} embedding requests failed", report.failed, requested);
        }
        report
    }

    /// Embed free text, e.g. a user query.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, crate::provider::ProviderError> {
        self.provider.embed(text, &self.model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FunctionRecord;
    use crate::provider::mock::MockEmbedder;

    fn record() -> SymbolRecord {
        let mut record = SymbolRecord::new("/r/app/Cart.kt");
        record.class_names.push("Cart".to_string());
        record.imports.push("import a.b.Item".to_string());
        record.property_declarations.push("val items: List<Item>".to_string());
        record.functions.push(FunctionRecord {
            name: "total".to_string(),
            parameters: vec![],
            return_type: "Int".to_string(),
            body: "one two three four five".to_string(),
            is_abstract: false,
            class_name: "Cart".to_string(),
            annotations: vec![],
        });
        record
    }

    fn config(chunk_words: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            chunk_words,
            concurrency: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_units_order_and_text() {
        let units = plan_units(&record(), 2);
        let keys: Vec<_> = units.iter().map(|u| u.key.as_str()).collect();

        assert_eq!(
            keys,
            vec![
                "class:Cart|path:/r/app/Cart.kt",
                "import:import a.b.Item|path:/r/app/Cart.kt",
                "property:val items: List<Item>|path:/r/app/Cart.kt",
                "function:total|class:Cart|path:/r/app/Cart.kt",
                "function_total_body_chunk_0|class:Cart|path:/r/app/Cart.kt",
                "function_total_body_chunk_1|class:Cart|path:/r/app/Cart.kt",
                "function_total_body_chunk_2|class:Cart|path:/r/app/Cart.kt",
            ]
        );
        assert_eq!(units[0].text, "class:Cart|path:/r/app/Cart.kt: Cart");
        assert_eq!(
            units[5].text,
            "function_total_body_chunk_1|class:Cart|path:/r/app/Cart.kt: three four"
        );
    }

    #[test]
    fn test_empty_body_has_no_chunks() {
        let mut record = record();
        record.functions[0].body.clear();
        let units = plan_units(&record, 500);
        assert!(units.iter().all(|u| !u.key.contains("_body_chunk_")));
    }

    #[tokio::test]
    async fn test_failed_units_are_absent() {
        let provider = MockEmbedder::constant(vec![1.0, 0.0]).failing_on("property:");
        let mut records = BTreeMap::new();
        records.insert("/r/app/Cart.kt".to_string(), record());

        let embedder = Embedder::new(&provider, &config(500));
        let report = embedder.embed_records(&records, None).await;

        assert_eq!(report.requested, 5);
        assert_eq!(report.failed, 1);
        assert_eq!(report.index.len(), 4);
        assert!(!report.index.contains("property:val items: List<Item>|path:/r/app/Cart.kt"));
        assert!(report.index.contains("function:total|class:Cart|path:/r/app/Cart.kt"));
    }

    #[tokio::test]
    async fn test_index_follows_record_order() {
        let provider = MockEmbedder::constant(vec![0.5]);
        let mut records = BTreeMap::new();
        records.insert("/r/app/Cart.kt".to_string(), record());

        let report = Embedder::new(&provider, &config(2))
            .embed_records(&records, None)
            .await;

        let planned: Vec<_> = plan_units(&record(), 2).into_iter().map(|u| u.key).collect();
        let stored: Vec<_> = report.index.iter().map(|e| e.key.clone()).collect();
        assert_eq!(stored, planned);
        assert_eq!(provider.calls.lock().len(), planned.len());
    }
}

// Retrieval-augmented answering: expand, summarize, condense, respond

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use super::engine::{ScoredKey, SNIPPET_UNAVAILABLE};
use super::expansion::{expand, seed_files};
use crate::index::snapshot::IndexSnapshot;
use crate::provider::GenerationProvider;

/// Final answer plus the material it was built from
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub response: String,
    pub initial: Vec<ScoredKey>,
    pub files: Vec<String>,
    pub summaries: Vec<String>,
    pub condensed: String,
}

/// Function names and bodies of one file, cut to `limit` characters.
pub fn file_context(snapshot: &IndexSnapshot, path: &str, limit: usize) -> String {
    let Some(record) = snapshot.record(path) else {
        return SNIPPET_UNAVAILABLE.to_string();
    };
    let mut content = String::new();
    for function in &record.functions {
        content.push_str(&format!("Function: {}\n{}\n\n", function.name, function.body));
    }
    content.chars().take(limit).collect()
}

fn summary_prompt(context: &str) -> String {
    format!("Summarize the following code:\n{}", context)
}

fn condense_prompt(summaries: &str) -> String {
    format!("Provide a concise summary of the following summaries:\n{}", summaries)
}

fn answer_prompt(query: &str, summary: &str) -> String {
    format!(
        "Based on the following summary of relevant code, answer the user's question:\n\n\
Summary:\n{}\n\nUser Question: {}\n\nResponse:\n",
        summary, query
    )
}

/// Sequential, stateless generation over expanded context
pub struct RagPipeline<'a> {
    generator: &'a dyn GenerationProvider,
    model: String,
    context_chars: usize,
}

impl<'a> RagPipeline<'a> {
    pub fn new(generator: &'a dyn GenerationProvider, model: &str, context_chars: usize) -> Self {
        Self {
            generator,
            model: model.to_string(),
            context_chars,
        }
    }

    /// Answer `query` from the files reachable within `max_depth` hops of `initial`.
    ///
    /// A failed per-file summary is skipped and a failed condense step falls
    /// back to the joined summaries; only the final call is fatal.
    pub async fn answer(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        initial: Vec<ScoredKey>,
        max_depth: usize,
    ) -> Result<RagAnswer> {
        let seeds = seed_files(initial.iter().map(|s| s.key.as_str()));
        let files = expand(&snapshot.file_graph, &seeds, max_depth);
        info!(
            "Expanded {} seed files to {} files (max depth {})",
            seeds.len(),
            files.len(),
            max_depth
        );

        let mut summaries = Vec::with_capacity(files.len());
        for (i, path) in files.iter().enumerate() {
            info!("Summarizing file {}/{}: {}", i + 1, files.len(), path);
            let context = file_context(snapshot, path, self.context_chars);
            match self.generator.generate(&summary_prompt(&context), &self.model).await {
                Ok(summary) => summaries.push(format!("Summary for {}:\n{}", path, summary)),
                Err(e) => warn!("Summary failed for {}: {}", path, e),
            }
        }

        let joined = summaries.join("\n");
        let condensed = match self.generator.generate(&condense_prompt(&joined), &self.model).await
        {
            Ok(condensed) => condensed,
            Err(e) => {
                warn!("Condensing summaries failed, using them verbatim: {}", e);
                joined
            }
        };

        let response = self
            .generator
            .generate(&answer_prompt(query, &condensed), &self.model)
            .await
            .context("Failed to generate the final response")?;

        Ok(RagAnswer {
            response,
            initial,
            files,
            summaries,
            condensed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::LinkHeuristics;
    use crate::index::embeddings::{EmbeddingIndex, RequirementIndex};
    use crate::index::{FileInfo, FunctionRecord, SymbolRecord};
    use crate::provider::mock::MockGenerator;
    use std::collections::BTreeMap;

    fn snapshot() -> IndexSnapshot {
        let mut a = SymbolRecord::new("/root/core/a.py");
        a.functions.push(FunctionRecord {
            name: "foo".to_string(),
            parameters: vec![],
            return_type: "None".to_string(),
            body: "return 1".to_string(),
            is_abstract: false,
            class_name: String::new(),
            annotations: vec![],
        });
        let mut b = SymbolRecord::new("/root/app/b.py");
        b.imports.push("from a import foo".to_string());
        let mut bar = a.functions[0].clone();
        bar.name = "bar".to_string();
        bar.body = "return foo()".to_string();
        b.functions.push(bar);

        let files = [("/root/core/a.py", "core"), ("/root/app/b.py", "app")]
            .into_iter()
            .map(|(path, repo)| {
                (
                    path.to_string(),
                    FileInfo {
                        path: path.to_string(),
                        repo: repo.to_string(),
                        component: repo.to_string(),
                        language: "python".to_string(),
                        size: 8,
                        content_hash: String::new(),
                    },
                )
            })
            .collect();
        let records = [a, b].into_iter().map(|r| (r.file_path.clone(), r)).collect();

        IndexSnapshot::build(
            records,
            files,
            BTreeMap::new(),
            Vec::new(),
            EmbeddingIndex::new(),
            RequirementIndex::default(),
            &LinkHeuristics::default(),
        )
    }

    fn hit(key: &str) -> ScoredKey {
        ScoredKey {
            key: key.to_string(),
            path: String::new(),
            repo: String::new(),
            similarity: 0.9,
        }
    }

    #[test]
    fn test_file_context() {
        let snapshot = snapshot();
        assert_eq!(
            file_context(&snapshot, "/root/core/a.py", 1000),
            "Function: foo\nreturn 1\n\n"
        );
        assert_eq!(file_context(&snapshot, "/root/core/a.py", 5), "Funct");
        assert_eq!(file_context(&snapshot, "/missing.py", 1000), SNIPPET_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_answer_expands_and_passes_full_context() {
        let snapshot = snapshot();
        let generator = MockGenerator::default();
        let pipeline = RagPipeline::new(&generator, "m", 1000);

        let answer = pipeline
            .answer(&snapshot, "What does bar do?", vec![hit("function:bar|class:|path:/root/app/b.py")], 2)
            .await
            .unwrap();

        assert_eq!(answer.files, vec!["/root/app/b.py", "/root/core/a.py"]);
        assert_eq!(answer.summaries.len(), 2);
        assert_eq!(answer.condensed, "summary#3");
        assert_eq!(answer.response, "summary#4");

        let prompts = generator.prompts.lock();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].starts_with("Summarize the following code:\nFunction: bar"));
        assert!(prompts[2].contains("Summary for /root/app/b.py:\nsummary#1"));
        assert!(prompts[3].contains("Summary:\nsummary#3"));
        assert!(prompts[3].contains("User Question: What does bar do?"));
    }

    #[tokio::test]
    async fn test_failed_summary_is_skipped() {
        let snapshot = snapshot();
        let generator = MockGenerator::failing_on("Function: foo");
        let pipeline = RagPipeline::new(&generator, "m", 1000);

        let answer = pipeline
            .answer(&snapshot, "q", vec![hit("function:bar|class:|path:/root/app/b.py")], 2)
            .await
            .unwrap();

        assert_eq!(answer.files.len(), 2);
        assert_eq!(answer.summaries.len(), 1);
    }

    #[tokio::test]
    async fn test_final_failure_is_an_error() {
        let snapshot = snapshot();
        let generator = MockGenerator::failing_on("User Question");
        let pipeline = RagPipeline::new(&generator, "m", 1000);

        let result = pipeline
            .answer(&snapshot, "q", vec![hit("class:X|path:/root/core/a.py")], 1)
            .await;
        assert!(result.is_err());
    }
}

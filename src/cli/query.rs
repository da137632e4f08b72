use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::warn;

use crate::config::Config;
use crate::index::snapshot::IndexSnapshot;
use crate::mcp::state::ServiceState;
use crate::query::engine::truncate_chars;
use crate::query::rag::{file_context, RagAnswer, RagPipeline};

type Input = Lines<BufReader<Stdin>>;

async fn prompt(input: &mut Input, message: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

/// Interactive question loop over the persisted index.
///
/// `exit` quits; after an answer, a number shows that file's full context
/// and `c` moves on to the next question.
pub async fn interactive(config: Config, top_k: Option<usize>, max_depth: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let max_depth = max_depth.unwrap_or(config.retrieval.max_depth);

    let state = ServiceState::open(config)?;
    let snapshot = state.snapshot.current();
    if snapshot.is_empty() {
        bail!(
            "No index at {}. Run 'coderag process --root-dir <DIR>' first.",
            state.config.db_path().display()
        );
    }
    println!(
        "Loaded {} files from {} repositories",
        snapshot.records.len(),
        snapshot.stats().repos
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(query) = prompt(&mut input, "\nEnter your query (or 'exit' to quit): ").await? else {
            break;
        };
        if query.is_empty() {
            continue;
        }
        if query == "exit" {
            break;
        }

        let answer = match answer(&state, &snapshot, &query, top_k, max_depth).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Query failed: {:#}", e);
                println!("Could not answer: {:#}", e);
                continue;
            }
        };
        print_answer(&state, &snapshot, &answer);

        if !browse_files(&mut input, &snapshot, &answer.files).await? {
            break;
        }
    }

    Ok(())
}

async fn answer(
    state: &ServiceState,
    snapshot: &IndexSnapshot,
    query: &str,
    top_k: usize,
    max_depth: usize,
) -> Result<RagAnswer> {
    let vector = state.embed_query(query).await?;
    let engine = state.engine();
    let initial = state
        .pool
        .run(move || {
            let mut ranked = engine.rank_code(&vector);
            ranked.truncate(top_k);
            ranked
        })
        .await?;

    RagPipeline::new(
        state.generator.as_ref(),
        &state.config.generation.model,
        state.config.retrieval.context_chars,
    )
    .answer(snapshot, query, initial, max_depth)
    .await
}

fn print_answer(state: &ServiceState, snapshot: &IndexSnapshot, answer: &RagAnswer) {
    println!("\nResponse:\n{}", answer.response.trim());

    println!("\nRelevant files ({}):", answer.files.len());
    for (i, path) in answer.files.iter().enumerate() {
        let context = file_context(snapshot, path, state.config.retrieval.context_chars);
        let preview = truncate_chars(&context.replace('\n', " "), 100);
        println!("  {}. [{}] {}", i + 1, snapshot.repo_of_path(path), path);
        println!("     {}", preview.trim());
    }
}

/// Returns false when the user asked to exit.
async fn browse_files(input: &mut Input, snapshot: &IndexSnapshot, files: &[String]) -> Result<bool> {
    loop {
        let Some(choice) = prompt(
            input,
            "\nEnter a file number for details, 'c' to continue, or 'exit' to quit: ",
        )
        .await?
        else {
            return Ok(false);
        };

        match choice.as_str() {
            "c" => return Ok(true),
            "exit" => return Ok(false),
            other => match other.parse::<usize>() {
                Ok(n) if (1..=files.len()).contains(&n) => {
                    let path = &files[n - 1];
                    println!("\nFile: {}", path);
                    println!("Repository: {}", snapshot.repo_of_path(path));
                    println!("{}", file_context(snapshot, path, usize::MAX));
                }
                _ => println!("Invalid choice: {}", other),
            },
        }
    }
}

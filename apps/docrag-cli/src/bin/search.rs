use clap::Parser;
use tracing::info;

use docrag_cli::{init_tracing, load_settings};
use docrag_core::retry::Deadline;
use docrag_core::types::{FusionWeights, Query};
use docrag_pipeline::connect;

/// Hybrid search over the index without generating an answer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    query: String,

    #[arg(short, long, default_value_t = 5)]
    k: usize,

    /// Semantic weight; the lexical weight is `1 - semantic`.
    #[arg(long)]
    semantic: Option<f32>,

    /// Characters of chunk text to print per hit.
    #[arg(long, default_value_t = 160)]
    preview: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;
    let pipeline = connect(&settings)?;

    let mut query = Query::new(args.query.clone(), args.k);
    if let Some(semantic) = args.semantic {
        query = query.with_weights(FusionWeights::new(semantic, 1.0 - semantic));
    }
    let result = pipeline.retrieve(&query, Deadline::none()).await?;
    info!(hits = result.len(), indexed = pipeline.store().len(), "search finished");

    if result.is_empty() {
        println!("No results for '{}'", args.query);
        return Ok(());
    }
    for (rank, hit) in result.iter().enumerate() {
        let record = &hit.record;
        let preview: String = record.chunk.text.chars().take(args.preview).collect();
        println!(
            "{}. {} [chunk {}/{}] score={:.3} (semantic {:.3}, lexical {:.3})",
            rank + 1,
            record.title,
            record.chunk.chunk_index + 1,
            record.chunk.total_chunks,
            hit.score,
            hit.semantic,
            hit.lexical
        );
        println!("   {}", preview.replace('\n', " "));
    }
    Ok(())
}

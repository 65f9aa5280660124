use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use docrag_cli::{init_tracing, load_settings, parse_extensions, sources};
use docrag_core::loader::DocumentLoader;
use docrag_core::retry::Deadline;
use docrag_pipeline::{connect, IngestRequest};

/// Load, chunk, embed and index documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to index recursively.
    #[arg(short, long)]
    directory: Option<String>,

    /// Individual files to index.
    #[arg(short, long, num_args = 1..)]
    files: Vec<String>,

    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,

    /// File extensions to pick up from the directory, e.g. "txt,md,rst".
    #[arg(long)]
    extensions: Option<String>,

    /// Drop the existing index before writing.
    #[arg(long)]
    recreate_index: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;

    let sources = sources(args.directory.as_deref(), &args.files);
    if sources.is_empty() && !args.recreate_index {
        anyhow::bail!("nothing to index: pass --directory and/or --files");
    }

    let mut pipeline = connect(&settings)?;
    if let Some(raw) = args.extensions.as_deref() {
        pipeline = pipeline.with_loader(DocumentLoader::new(parse_extensions(raw)));
    }

    println!("docrag indexer\n==============");
    match settings.index.location() {
        Some(dir) => println!("Index directory: {}", dir.display()),
        None => println!("Index directory: (in memory, nothing is kept after exit)"),
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("indexing {} source(s)", sources.len()));

    let mut request = IngestRequest::new(sources).with_chunking(args.chunk_size, args.chunk_overlap);
    request.recreate_index = args.recreate_index;
    let report = match pipeline.ingest(request, Deadline::none()).await {
        Ok(report) => report,
        Err(e) => {
            spinner.abandon_with_message("indexing failed");
            return Err(e.into());
        }
    };
    spinner.finish_with_message("indexing complete");

    println!("📊 Documents indexed: {}", report.documents);
    println!("📊 Chunks written:    {}", report.chunks);
    println!("📊 Index now holds {} chunk(s) from {} document(s)", report.total_records, report.total_documents);
    println!("\n💡 Ask questions with: cargo run --bin docrag-ask -- --question '<question>'");
    Ok(())
}

use std::io::{self, Write};

use clap::Parser;

use docrag_cli::{format_sources, init_tracing, load_settings};
use docrag_core::retry::Deadline;
use docrag_core::settings::RagSettings;
use docrag_pipeline::{connect, QueryRequest, RagPipeline};

/// Ask questions about the indexed documentation.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Answer one question and exit; interactive otherwise.
    #[arg(short, long)]
    question: Option<String>,

    /// Override the configured system prompt.
    #[arg(long)]
    system_prompt: Option<String>,

    #[arg(short, long)]
    k: Option<usize>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Print the response as JSON.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn request(&self, message: &str) -> QueryRequest {
        QueryRequest {
            message: message.to_string(),
            system_prompt: self.system_prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            k: self.k,
            ..QueryRequest::default()
        }
    }
}

async fn answer(pipeline: &RagPipeline, args: &Args, message: &str) -> anyhow::Result<()> {
    let response = pipeline.query(&args.request(message), Deadline::none()).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    println!("\n{}\n", response.answer);
    if !response.sources.is_empty() {
        println!("Sources:\n{}", format_sources(&response.sources));
    }
    Ok(())
}

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

fn show_help() {
    println!("Commands:");
    println!("  help      - Show this help message");
    println!("  config    - Show the active configuration");
    println!("  clear     - Clear the screen");
    println!("  quit      - Exit");
    println!("  <text>    - Ask a question");
}

fn show_config(settings: &RagSettings, pipeline: &RagPipeline) {
    println!("Endpoint:        {}", if settings.service.endpoint.is_empty() { "(none)" } else { settings.service.endpoint.as_str() });
    println!("Chat deployment: {}", settings.service.chat_deployment);
    println!("Embeddings:      {:?} ({} dims)", settings.embedding.provider, settings.embedding.dimension);
    println!("Retrieval k:     {}", settings.retrieval.k);
    println!("Max tokens:      {}", settings.generation.max_tokens);
    println!("Temperature:     {}", settings.generation.temperature);
    println!("Indexed chunks:  {}", pipeline.store().len());
    println!("State:           {:?}", pipeline.state());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;
    let pipeline = connect(&settings)?;

    if let Some(question) = args.question.as_deref() {
        return answer(&pipeline, &args, question).await;
    }

    println!("💬 docrag ask");
    println!("=============");
    println!("📊 Indexed chunks: {}", pipeline.store().len());
    show_help();
    println!();

    loop {
        print!("ask> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        match input.trim() {
            "" => continue,
            "help" | "/help" => show_help(),
            "config" | "/config" => show_config(&settings, &pipeline),
            "clear" | "/clear" => {
                print!("{CLEAR_SCREEN}");
                io::stdout().flush()?;
                continue;
            }
            "quit" | "exit" | "/quit" => {
                println!("👋 Goodbye!");
                break;
            }
            question => {
                if let Err(e) = answer(&pipeline, &args, question).await {
                    println!("❌ {e}");
                }
            }
        }
        println!();
    }
    Ok(())
}

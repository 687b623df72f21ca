//! counsel-cli — command-line client for the Counsel HTTP API
//!
//! # Subcommands
//! - `advice <problem>`                               counseling plan (HTML)
//! - `categorize <question>`                          topic label + greeting
//! - `chat --category C <message> [--history FILE]`   counselor guidance
//! - `examples [--history FILE]`                      nearest example conversations
//! - `summarize (--text T | --file F | --audio A)`    session summary and notes
//! - `status`                                         server health

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser, Subcommand};
use reqwest::blocking::{multipart, Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000/api";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "counsel-cli",
    version,
    about = "Command-line client for the Counsel counseling assistant API"
)]
struct Cli {
    /// API base URL including the route prefix (overrides COUNSEL_HTTP_URL)
    #[arg(long, env = "COUNSEL_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask for a step-by-step counseling plan
    Advice {
        /// Problem description
        problem: String,
    },

    /// Classify a patient question into a topic
    Categorize {
        question: String,
    },

    /// Ask for guidance on the next reply in a conversation
    Chat {
        message: String,

        /// Topic label, as returned by `categorize`
        #[arg(short, long, default_value = "")]
        category: String,

        /// JSON file holding an array of `{sender, content}` entries
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Find the closest high and low quality example conversations
    Examples {
        /// JSON file holding an array of `{role, content}` entries
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Summarize a counseling session
    #[command(group(ArgGroup::new("source").required(true).args(["text", "file", "audio"])))]
    Summarize {
        #[arg(long)]
        text: Option<String>,

        /// Transcript file (.txt, .md, .rtf)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Recording (.mp3, .wav, .m4a, .ogg)
        #[arg(long)]
        audio: Option<PathBuf>,
    },

    /// Show server health
    Status,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    transcript: String,
    summary: String,
    notes: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn endpoint(server: &str, path: &str) -> String {
    format!("{}/{}", server.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Read a history file; a missing path means an empty history.
fn load_history(path: Option<&Path>) -> anyhow::Result<Vec<Value>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read history file {}", path.display()))?;
    let history: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} must contain a JSON array", path.display()))?;
    Ok(history)
}

fn format_summary(resp: &SummaryResponse) -> String {
    let mut preview: String = resp.transcript.chars().take(200).collect();
    if resp.transcript.chars().count() > 200 {
        preview.push_str("...");
    }
    format!(
        "Transcript:\n{}\n\nSummary:\n{}\n\n{}",
        preview, resp.summary, resp.notes
    )
}

fn send(request: RequestBuilder, url: &str) -> anyhow::Result<reqwest::blocking::Response> {
    let resp = request
        .send()
        .with_context(|| format!("connection failed to {}", url))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        bail!("server returned {}: {}", status, body);
    }
    Ok(resp)
}

fn post_json(client: &Client, url: &str, body: &Value) -> anyhow::Result<Value> {
    let resp = send(client.post(url).json(body), url)?;
    resp.json().context("failed to parse response")
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn do_advice(client: &Client, server: &str, problem: &str) -> anyhow::Result<()> {
    let url = endpoint(server, "advice");
    let resp = send(client.post(&url).form(&[("problem", problem)]), &url)?;
    println!("{}", resp.text()?.trim());
    Ok(())
}

fn do_categorize(client: &Client, server: &str, question: &str, json: bool) -> anyhow::Result<()> {
    let url = endpoint(server, "categorize");
    let body = post_json(client, &url, &serde_json::json!({ "question": question }))?;
    if json {
        return print_json(&body);
    }
    println!("Category: {}", body["category"].as_str().unwrap_or("?"));
    println!("{}", body["response"].as_str().unwrap_or_default());
    Ok(())
}

fn do_chat(
    client: &Client,
    server: &str,
    message: &str,
    category: &str,
    history: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let url = endpoint(server, "chat");
    let request = serde_json::json!({
        "message": message,
        "category": category,
        "history": load_history(history)?,
    });
    let body = post_json(client, &url, &request)?;
    if json {
        return print_json(&body);
    }
    println!("{}", body["response"].as_str().unwrap_or_default());
    Ok(())
}

fn do_examples(
    client: &Client,
    server: &str,
    history: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let url = endpoint(server, "examples");
    let request = serde_json::json!({ "history": load_history(history)? });
    let body = post_json(client, &url, &request)?;
    if json {
        return print_json(&body);
    }
    for (title, key) in [("High quality", "highQuality"), ("Low quality", "lowQuality")] {
        println!("== {} ==", title);
        for text in body[key].as_array().into_iter().flatten() {
            println!("{}\n", text.as_str().unwrap_or_default());
        }
    }
    Ok(())
}

fn do_summarize(
    client: &Client,
    server: &str,
    text: Option<String>,
    file: Option<PathBuf>,
    audio: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let resp = if let Some(text) = text {
        let url = endpoint(server, "summarization/text");
        send(
            client.post(&url).json(&serde_json::json!({ "text": text })),
            &url,
        )?
    } else {
        let (route, field, path) = match (file, audio) {
            (Some(path), _) => ("summarization/file", "file", path),
            (None, Some(path)) => ("summarization/audio", "audio", path),
            (None, None) => bail!("one of --text, --file or --audio is required"),
        };
        let url = endpoint(server, route);
        let form = multipart::Form::new()
            .file(field, &path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        send(client.post(&url).multipart(form), &url)?
    };

    let body: Value = resp.json().context("failed to parse response")?;
    if json {
        return print_json(&body);
    }
    let summary: SummaryResponse = serde_json::from_value(body)?;
    println!("{}", format_summary(&summary));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(client: &Client, server: &str) -> anyhow::Result<()> {
    let url = endpoint(server, "health");
    let resp = send(client.get(&url), &url)?;
    let body: Value = resp.json().unwrap_or_default();
    println!("Counsel server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("URL:            {}", server);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn run(cli: Cli) -> anyhow::Result<()> {
    let client = Client::builder().timeout(Duration::from_secs(180)).build()?;
    let server = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Advice { problem } => do_advice(&client, &server, &problem),
        Commands::Categorize { question } => do_categorize(&client, &server, &question, cli.json),
        Commands::Chat {
            message,
            category,
            history,
        } => do_chat(
            &client,
            &server,
            &message,
            &category,
            history.as_deref(),
            cli.json,
        ),
        Commands::Examples { history } => do_examples(&client, &server, history.as_deref(), cli.json),
        Commands::Summarize { text, file, audio } => {
            do_summarize(&client, &server, text, file, audio, cli.json)
        }
        Commands::Status => do_status(&client, &server),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("counsel-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

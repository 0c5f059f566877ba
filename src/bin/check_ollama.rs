//! Connectivity check for the Ollama backend.
//!
//! Verifies that the server answers, that the configured model is pulled
//! and that a non-streaming generation round-trip works. Exits non-zero
//! with a remediation hint on the first failure.

use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;

#[derive(Parser)]
struct Args {
    /// Base URL of the Ollama backend.
    #[arg(long = "ollama-url", default_value = "http://localhost:11434")]
    ollama_url: String,
    /// Model expected to be available.
    #[arg(long, default_value = "llama3.1:8b")]
    model: String,
}

#[derive(Deserialize)]
struct Version {
    #[serde(default)]
    version: String,
}

#[derive(Deserialize)]
struct Tags {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Deserialize)]
struct Generated {
    #[serde(default)]
    response: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let base = args.ollama_url.trim_end_matches('/');
    let client = reqwest::Client::new();

    println!("checking Ollama at {base}...");

    let resp = client
        .get(format!("{base}/api/version"))
        .send()
        .await
        .context("Ollama not reachable; start it with: ollama serve")?;
    if !resp.status().is_success() {
        bail!("Ollama server not responding ({})", resp.status());
    }
    let version: Version = resp.json().await.context("invalid version response")?;
    println!("  server ok, version {}", version.version);

    let tags: Tags = client
        .get(format!("{base}/api/tags"))
        .send()
        .await
        .context("failed to fetch models")?
        .json()
        .await
        .context("invalid tags response")?;
    if !tags.models.iter().any(|m| m.name == args.model) {
        eprintln!("  model {} not found; run: ollama pull {}", args.model, args.model);
        if tags.models.is_empty() {
            eprintln!("  no models installed");
        } else {
            eprintln!("  available models:");
            for m in &tags.models {
                eprintln!("    - {}", m.name);
            }
        }
        std::process::exit(1);
    }
    println!("  model {} is installed", args.model);

    println!("  testing generation (this may take a moment)...");
    let resp = client
        .post(format!("{base}/api/generate"))
        .json(&json!({
            "model": args.model,
            "prompt": "Say \"Hello, World!\" and nothing else.",
            "stream": false,
        }))
        .send()
        .await
        .context("generation test failed")?;
    if !resp.status().is_success() {
        bail!("generation test failed ({})", resp.status());
    }
    let generated: Generated = resp.json().await.context("invalid generate response")?;
    let preview: String = generated.response.chars().take(100).collect();
    println!("  generation ok: {preview}");

    println!("all checks passed, Ollama is ready");
    Ok(())
}

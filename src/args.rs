use clap::Parser;

/// Command line arguments for the chatd binary.
#[derive(Parser, Clone, Debug)]
pub struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Listening port; also read from the PORT environment variable.
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,
    /// Base URL of the Ollama backend.
    #[arg(long = "ollama-url", default_value = "http://localhost:11434")]
    pub ollama_url: String,
    /// Model passed to the backend's generate endpoint.
    #[arg(long, default_value = "llama3.1:8b")]
    pub model: String,
}

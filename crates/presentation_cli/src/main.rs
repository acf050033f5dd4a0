//! ModelGate CLI
//!
//! Command-line front end for the inference dispatcher: list catalog
//! models, run completions, embed text and generate images against the
//! configured backend.

#![allow(clippy::print_stdout)]

use std::{path::PathBuf, time::Duration};

use ai_core::{
    CallOptions, CompletionOptions, ConfigOverrides, EmbeddingOptions, ImageOptions,
};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use domain::{CompletionRequest, Embedding, EmbeddingInput, ImageRequest, ModelCategory};
use infrastructure::{AppConfig, EnvSecretResolver, LoggingConfig, build_dispatcher, init_logging};
use serde_json::Value;
use tracing::debug;

/// ModelGate CLI
#[derive(Parser)]
#[command(name = "modelgate-cli")]
#[command(author, version, about = "Multi-backend LLM inference dispatcher", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: ./modelgate.toml when present)
    #[arg(short, long, env = "MODELGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Use a named alternate configuration
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Deadline in milliseconds (default: dispatcher.default_timeout_ms)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog models
    Models {
        /// Only models of this category (chat, reasoning, embedding, image, audio, completion)
        #[arg(long)]
        category: Option<ModelCategory>,
    },

    /// Run a completion
    Complete {
        /// User prompt
        prompt: String,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Model override
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum output tokens
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Log request and response bodies
        #[arg(long)]
        debug: bool,
    },

    /// Embed one or more texts
    Embed {
        /// Texts to embed; more than one yields a batch
        #[arg(required = true)]
        texts: Vec<String>,

        /// Model override
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Generate images
    ///
    /// Example: modelgate-cli image "a red fox" --param size=1024x1024 --param n=1
    Image {
        /// Image prompt
        prompt: String,

        /// Model override
        #[arg(short, long)]
        model: Option<String>,

        /// Model parameter as key=value; values are parsed as JSON when possible
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Parse `key=value`, reading the value as JSON and falling back to a string
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn overrides(model: Option<String>, profile: Option<String>) -> ConfigOverrides {
    ConfigOverrides {
        model,
        profile,
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    EnvSecretResolver::new().resolve(&mut config.dispatch);

    // Set up logging; -v flags override the configured filter
    let logging = match log_filter_from_verbosity(cli.verbose) {
        Some(filter) => LoggingConfig {
            filter: filter.to_string(),
            ..config.logging.clone()
        },
        None => config.logging.clone(),
    };
    init_logging(&logging).context("initializing logging")?;

    let dispatcher = build_dispatcher(&config).context("building dispatcher")?;
    debug!(
        backend = %config.dispatch.backend.kind(),
        profile = ?cli.profile,
        "CLI ready"
    );

    // Local operator: may spawn local subprocess backends
    let mut call = CallOptions::privileged();
    if let Some(ms) = cli.timeout_ms {
        call = call.with_timeout(Duration::from_millis(ms));
    }

    match cli.command {
        Commands::Models { category } => {
            let registry = dispatcher.registry();
            let models = match category {
                Some(category) => registry.list_by_category(category)?,
                None => registry
                    .list_models()?
                    .iter()
                    .filter_map(|id| registry.get_meta(id).transpose())
                    .collect::<Result<Vec<_>, _>>()?,
            };
            if models.is_empty() {
                println!("No models found");
            }
            for meta in models {
                println!(
                    "{:<28} {:<10} {}",
                    meta.id,
                    meta.category.as_str(),
                    meta.description
                );
            }
        },

        Commands::Complete {
            prompt,
            system,
            model,
            max_tokens,
            debug,
        } => {
            let mut request = match system {
                Some(system) => CompletionRequest::with_system(system, prompt),
                None => CompletionRequest::simple(prompt),
            };
            request.max_output_tokens = max_tokens;
            request.debug = debug;

            let options = CompletionOptions::new(request)
                .with_overrides(overrides(model, cli.profile))
                .with_call(call);
            let response = dispatcher
                .complete(&config.dispatch, options)
                .await
                .context("completion failed")?;

            let text = response.as_text();
            if !text.is_empty() {
                println!("{text}");
            }
            for call in response.tool_calls() {
                println!("tool call {} {}({})", call.id, call.name, call.arguments_json());
            }
        },

        Commands::Embed { texts, model } => {
            let input = match <[String; 1]>::try_from(texts) {
                Ok([text]) => EmbeddingInput::Single(text),
                Err(texts) => EmbeddingInput::Batch(texts),
            };
            let options = EmbeddingOptions::new(input)
                .with_overrides(overrides(model, cli.profile))
                .with_call(call);
            let embedding = dispatcher
                .embed(&config.dispatch, options)
                .await
                .context("embedding failed")?;

            match embedding {
                Embedding::Single(vector) => println!("{}", serde_json::to_string(&vector)?),
                Embedding::Batch(vectors) => {
                    for vector in vectors {
                        println!("{}", serde_json::to_string(&vector)?);
                    }
                },
            }
        },

        Commands::Image {
            prompt,
            model,
            params,
        } => {
            if prompt.trim().is_empty() {
                bail!("image prompt must not be empty");
            }
            let request = params
                .into_iter()
                .fold(ImageRequest::new(prompt), |request, (key, value)| {
                    request.with_param(key, value)
                });
            let options = ImageOptions::new(request)
                .with_overrides(overrides(model, cli.profile))
                .with_call(call);
            let value = dispatcher
                .generate_image(&config.dispatch, options)
                .await
                .context("image generation failed")?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        },
    }

    Ok(())
}

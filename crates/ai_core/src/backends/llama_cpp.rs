//! Local subprocess backend (llama.cpp CLI)
//!
//! Runs `llama-cli` once per request and returns its trimmed stdout.
//!
//! # Prerequisites
//!
//! - llama.cpp built with the `llama-cli` binary
//! - A GGUF model file
//!
//! ```bash
//! git clone https://github.com/ggerganov/llama.cpp
//! cd llama.cpp && cmake -B build && cmake --build build -j4
//! sudo cp build/bin/llama-cli /usr/local/bin/
//! ```
//!
//! Spawning processes is restricted to privileged callers.

use std::process::Stdio;

use async_trait::async_trait;
use domain::{
    BackendKind, CompletionRequest, Embedding, EmbeddingInput, ExecutionContext, MessageContent,
    MessageRole, NormalizedResponse,
};
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use crate::{config::SubprocessConfig, error::InferenceError, ports::InferenceBackend};

const BACKEND: BackendKind = BackendKind::LocalSubprocess;

/// Adapter running llama.cpp as a child process
#[derive(Debug, Clone)]
pub struct LlamaCppBackend {
    config: SubprocessConfig,
    context: ExecutionContext,
}

impl LlamaCppBackend {
    /// Create an adapter acting on behalf of `context`
    pub fn new(config: SubprocessConfig, context: ExecutionContext) -> Self {
        info!(
            executable = %config.executable_path().display(),
            model = %config.model_path.display(),
            "Initialized local subprocess backend"
        );
        Self { config, context }
    }

    fn authorize(&self) -> Result<(), InferenceError> {
        if self.context.is_privileged() {
            Ok(())
        } else {
            warn!(context = %self.context.describe(), "Refusing to spawn llama.cpp");
            Err(InferenceError::AuthorizationDenied(format!(
                "local subprocess inference requires a privileged context, got {}",
                self.context.describe()
            )))
        }
    }

    fn command(&self, request: &CompletionRequest) -> Command {
        let tokens = request
            .max_output_tokens
            .unwrap_or(self.config.default_max_tokens)
            .max(1);

        let mut cmd = Command::new(self.config.executable_path());
        cmd.arg("-m")
            .arg(&self.config.model_path)
            .arg("-p")
            .arg(compose_prompt(request))
            .arg("-n")
            .arg(tokens.to_string());
        if let Some(temperature) = request.temperature {
            cmd.arg("--temp").arg(temperature.to_string());
        }
        if let Some(top_p) = request.top_p {
            cmd.arg("--top-p").arg(top_p.to_string());
        }
        if let Some(threads) = self.config.threads {
            cmd.arg("-t").arg(threads.to_string());
        }
        if let Some(context_size) = self.config.context_size {
            cmd.arg("-c").arg(context_size.to_string());
        }
        cmd.arg("--no-display-prompt")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Flatten system prompt, history and prompt into a single text prompt
fn compose_prompt(request: &CompletionRequest) -> String {
    let mut prompt = String::new();
    if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str(system.trim());
        prompt.push_str("\n\n");
    }
    for message in &request.chat_history {
        let line = match &message.content {
            MessageContent::Text(text) => {
                let speaker = match message.role {
                    MessageRole::User => "User",
                    MessageRole::Assistant => "Assistant",
                    MessageRole::System => "System",
                };
                format!("{speaker}: {text}")
            },
            MessageContent::ToolCalls(calls) => {
                let calls: Vec<String> = calls
                    .iter()
                    .map(|c| format!("{}({})", c.name, c.arguments_json()))
                    .collect();
                format!("Assistant: [tool calls: {}]", calls.join(", "))
            },
            MessageContent::ToolResult { name, content, .. } => format!("Tool {name}: {content}"),
        };
        prompt.push_str(&line);
        prompt.push('\n');
    }
    if request.chat_history.is_empty() {
        prompt.push_str(&request.prompt);
    } else {
        prompt.push_str(&format!("User: {}\nAssistant:", request.prompt));
    }
    prompt
}

#[async_trait]
impl InferenceBackend for LlamaCppBackend {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    #[instrument(skip(self, request), fields(model = %self.config.model_path.display()))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, InferenceError> {
        self.authorize()?;

        let mut cmd = self.command(request);
        if request.debug {
            debug!("Running llama.cpp: {:?}", cmd);
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InferenceError::Configuration(format!(
                    "llama.cpp not found at '{}'",
                    self.config.executable_path().display()
                ))
            } else {
                InferenceError::provider(BACKEND, None, format!("failed to run llama.cpp: {e}"))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("llama.cpp failed: {}", stderr.trim());
            let code = output.status.code().and_then(|c| u16::try_from(c).ok());
            let message = if stderr.trim().is_empty() {
                format!("llama.cpp exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(InferenceError::provider(BACKEND, code, message));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            warn!("llama.cpp returned empty output");
        }
        Ok(NormalizedResponse::text(text))
    }

    async fn embed(&self, _input: &EmbeddingInput) -> Result<Embedding, InferenceError> {
        Err(InferenceError::unsupported(BACKEND, "embeddings"))
    }
}

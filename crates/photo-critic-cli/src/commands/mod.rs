//! Subcommand implementations and shared setup.

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use photo_critic::{Access, DirStore, PermissionMode, ScoringGateway};

pub mod evaluate;
pub mod manage;
pub mod scan;

/// Global flags shared by every subcommand.
pub struct Options {
    pub yes: bool,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Store for a folder. Without `--yes`, access is confirmed on the terminal.
pub fn open_store(dir: &Path, options: &Options) -> DirStore {
    let mode = if options.yes {
        PermissionMode::Allow
    } else {
        PermissionMode::Ask(Box::new(confirm_access))
    };
    DirStore::new(dir, mode)
}

fn confirm_access(dir: &Path, access: Access) -> bool {
    let what = match access {
        Access::Read => "read",
        Access::ReadWrite => "read and write",
    };
    eprint!("Allow photo-critic to {what} files in {}? [y/N] ", dir.display());
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// The Gemini gateway configured from the global flags.
#[cfg(feature = "gemini")]
pub fn gateway(options: &Options) -> Result<Arc<dyn ScoringGateway>> {
    use anyhow::Context;
    use photo_critic::{GeminiConfig, GeminiGateway};

    let mut config = GeminiConfig::builder();
    if let Some(key) = &options.api_key {
        config = config.api_key(key);
    }
    if let Some(model) = &options.model {
        config = config.model(model);
    }

    let gateway = GeminiGateway::new(config.build())
        .context("Set GEMINI_API_KEY or pass --api-key")?;
    tracing::debug!(model = gateway.model(), "using Gemini gateway");
    Ok(Arc::new(gateway))
}

#[cfg(not(feature = "gemini"))]
pub fn gateway(_options: &Options) -> Result<Arc<dyn ScoringGateway>> {
    anyhow::bail!("built without a scoring gateway; enable the `gemini` feature")
}

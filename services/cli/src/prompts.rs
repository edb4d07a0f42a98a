//! Prompt template loading.

use anyhow::Context;
use deckgen_core::content::default_prompts;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Returns the built-in templates, overridden by any `<key>.md` file found in
/// `prompts_path`.
pub fn load_prompts(prompts_path: Option<&Path>) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = default_prompts();
    let Some(dir) = prompts_path else {
        return Ok(prompts);
    };

    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read prompts directory {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            info!(prompt = %prompt_key, "Loaded prompt override");
            prompts.insert(prompt_key, content.trim_end().to_string());
        }
    }
    Ok(prompts)
}

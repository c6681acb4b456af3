//! Loads prompt template overrides from YAML files.

use crate::builder::validate_template;
use crate::types::PromptTemplate;
use incidex_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt template from a YAML file with `id` and `template` keys.
///
/// # Example
/// ```no_run
/// use incidex_prompt::load_template;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let template = load_template(Path::new("prompts/answer.yml"))?;
/// println!("Loaded prompt: {}", template.id);
/// # Ok(())
/// # }
/// ```
pub fn load_template(path: &Path) -> AppResult<PromptTemplate> {
    tracing::debug!("Loading prompt from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Config(format!(
            "Prompt file not found: {:?}",
            path
        )));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read prompt file {:?}: {}", path, e))
    })?;

    let template: PromptTemplate = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Config(format!("Failed to parse prompt YAML {:?}: {}", path, e))
    })?;

    validate_template(&template)?;

    tracing::info!("Loaded prompt: {}", template.id);

    Ok(template)
}

/// Load the override at `path` if given, otherwise the built-in template.
pub fn resolve_template(path: Option<&Path>) -> AppResult<PromptTemplate> {
    match path {
        Some(path) => load_template(path),
        None => Ok(PromptTemplate::incident_answer()),
    }
}

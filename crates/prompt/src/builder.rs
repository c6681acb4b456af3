//! Renders prompt templates with Handlebars.

use crate::types::{PromptTemplate, CONTEXT_VAR, QUESTION_VAR};
use incidex_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Check that a template parses and references every variable the answer
/// synthesizer supplies.
pub fn validate_template(template: &PromptTemplate) -> AppResult<()> {
    if template.id.trim().is_empty() {
        return Err(AppError::Config("Prompt ID cannot be empty".to_string()));
    }

    for var in [CONTEXT_VAR, QUESTION_VAR] {
        if !template.template.contains(&format!("{{{{{}}}}}", var)) {
            return Err(AppError::Config(format!(
                "Prompt template '{}' must reference {{{{{}}}}}",
                template.id, var
            )));
        }
    }

    registry(&template.template).map(|_| ())
}

/// Render the answer prompt for a question and its assembled context block.
///
/// # Example
/// ```
/// use incidex_prompt::{build_answer_prompt, PromptTemplate};
///
/// let prompt = build_answer_prompt(
///     &PromptTemplate::incident_answer(),
///     "Incident ID: 7\nType: Flood",
///     "Where was the flood?",
/// ).unwrap();
/// assert!(prompt.contains("USER QUESTION: Where was the flood?"));
/// ```
pub fn build_answer_prompt(
    template: &PromptTemplate,
    context: &str,
    question: &str,
) -> AppResult<String> {
    tracing::debug!("Building prompt: {}", template.id);

    let mut variables = HashMap::new();
    variables.insert(CONTEXT_VAR.to_string(), context.to_string());
    variables.insert(QUESTION_VAR.to_string(), question.to_string());

    render_template(&template.template, &variables)
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let handlebars = registry(template)?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Generation(format!("Failed to render template: {}", e)))
}

fn registry(template: &str) -> AppResult<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();

    // Plain text, no HTML escaping; missing variables are errors.
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Config(format!("Failed to register template: {}", e)))?;

    Ok(handlebars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_places_context_and_question() {
        let template = PromptTemplate::incident_answer();
        let context = "Incident ID: 1\nType: Flood\n\nIncident ID: 2\nType: Landslide";
        let prompt = build_answer_prompt(&template, context, "Any floods?").unwrap();

        assert!(prompt.contains("INCIDENT DATA:\nIncident ID: 1\nType: Flood\n\nIncident ID: 2"));
        assert!(prompt.contains("USER QUESTION: Any floods?"));
        assert!(prompt.ends_with("ANSWER:\n"));
    }

    #[test]
    fn test_no_html_escaping() {
        let template = PromptTemplate::new("t", "{{context}} | {{question}}");
        let prompt =
            build_answer_prompt(&template, "Remarks: <pole> & \"wire\"", "What's up?").unwrap();
        assert_eq!(prompt, "Remarks: <pole> & \"wire\" | What's up?");
    }

    #[test]
    fn test_validate_requires_both_variables() {
        let missing_question = PromptTemplate::new("t", "Data: {{context}}");
        let err = validate_template(&missing_question).unwrap_err();
        assert!(err.to_string().contains("{{question}}"));

        assert!(validate_template(&PromptTemplate::incident_answer()).is_ok());
    }

    #[test]
    fn test_validate_rejects_unparseable_template() {
        let broken = PromptTemplate::new("t", "{{context}} {{question}} {{#if}}");
        assert!(matches!(validate_template(&broken), Err(AppError::Config(_))));
    }

    #[test]
    fn test_strict_mode_rejects_unknown_variable() {
        let template = PromptTemplate::new("t", "{{context}} {{question}} {{officer}}");
        let result = build_answer_prompt(&template, "c", "q");
        assert!(result.is_err());
    }
}

//! Prompt template types.

use serde::{Deserialize, Serialize};

/// Variable holding the assembled incident evidence.
pub const CONTEXT_VAR: &str = "context";

/// Variable holding the user's question.
pub const QUESTION_VAR: &str = "question";

/// Phrase the model is told to use when the evidence does not answer the question.
pub const INSUFFICIENT_INFORMATION: &str =
    "I don't have enough information to answer this question.";

const INCIDENT_ANSWER_TEMPLATE: &str = "You are an AI assistant for the Mangalore Smart City Incident Management System.

Use the following incident data to answer the user's question. The data includes information about various incidents in Mangalore, including landslides, floods, tree falls, and other emergencies.

INCIDENT DATA:
{{context}}

USER QUESTION: {{question}}

Provide a clear, concise, and accurate answer based only on the information provided above. Include relevant statistics or data points if available.

If the question asks about time-related information (like resolution times, response times, etc.), be sure to include that in your answer.

If the question asks about specific locations or taluks, provide that geographic information in your answer.

If the question asks for a comparison between different incident types, locations, or time periods, structure your answer to clearly show the comparison.

If you don't know the answer or the information is not in the provided data, say \"I don't have enough information to answer this question.\"

ANSWER:
";

/// A Handlebars prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Unique template identifier
    pub id: String,

    /// Template string with Handlebars syntax
    pub template: String,
}

impl PromptTemplate {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
        }
    }

    /// The built-in grounded-answer template for incident questions.
    pub fn incident_answer() -> Self {
        Self::new("incident.answer.default", INCIDENT_ANSWER_TEMPLATE)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::incident_answer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_references_variables() {
        let template = PromptTemplate::default();
        assert!(template.template.contains("{{context}}"));
        assert!(template.template.contains("{{question}}"));
        assert!(template.template.contains(INSUFFICIENT_INFORMATION));
    }
}

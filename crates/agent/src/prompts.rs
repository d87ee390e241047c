use tera::{Context, Tera};
use thiserror::Error;

const CLASSIFICATION_TEMPLATE: &str = "classification.txt";
const ANALYSIS_TEMPLATE: &str = "analysis.txt";
const GENERAL_TEMPLATE: &str = "general.txt";

const CLASSIFICATION_SOURCE: &str = r#"You classify chat messages sent to a document database assistant.

Decide:
1. Is this a database-related question? (true/false)
2. If yes, which collection does it refer to? Collection names are plural nouns (users, products, orders) or entity + action (userLogins, productViews). If the name does not end with "s", add "s".
3. Which query is needed? One of list_collections, query_documents, get_document, text_search.

User message: "{{ message }}"

Respond with ONLY a JSON object in this exact shape:
{"is_database_question": true, "collection": "collection_name_or_null", "query_type": "query_documents"}

Use double quotes for every property name. Do not add comments or explanations."#;

const ANALYSIS_SOURCE: &str = r#"You answer questions about data retrieved from a document database.
Answer the user's question directly using only the data below. Do not ask follow-up questions and do not suggest further queries.

Analysis focus: {{ instruction }}
{% if sampling_note %}
Note: {{ sampling_note }}
{% endif %}
User question: {{ question }}

Database data:
{{ data }}

Answer:"#;

const GENERAL_SOURCE: &str = r#"You are a helpful assistant answering general questions.
Give accurate, concise answers. Say so when you do not know something. Answer directly without asking follow-up questions.

Conversation history:
{{ history }}
Human: {{ message }}
AI:"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template error: {0}")]
    Template(String),
}

impl From<tera::Error> for PromptError {
    fn from(error: tera::Error) -> Self {
        Self::Template(error.to_string())
    }
}

/// Inputs for the data-analysis prompt.
pub struct AnalysisPrompt<'a> {
    pub question: &'a str,
    pub instruction: &'a str,
    pub sampling_note: Option<&'a str>,
    pub data_json: &'a str,
}

pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_template(CLASSIFICATION_TEMPLATE, CLASSIFICATION_SOURCE)?;
        tera.add_raw_template(ANALYSIS_TEMPLATE, ANALYSIS_SOURCE)?;
        tera.add_raw_template(GENERAL_TEMPLATE, GENERAL_SOURCE)?;
        // Prompts are plain text; user input must reach the model unescaped.
        tera.autoescape_on(Vec::new());
        Ok(Self { tera })
    }

    pub fn classification(&self, message: &str) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("message", message);
        Ok(self.tera.render(CLASSIFICATION_TEMPLATE, &context)?)
    }

    pub fn analysis(&self, prompt: &AnalysisPrompt<'_>) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("question", prompt.question);
        context.insert("instruction", prompt.instruction);
        context.insert("sampling_note", &prompt.sampling_note);
        context.insert("data", prompt.data_json);
        Ok(self.tera.render(ANALYSIS_TEMPLATE, &context)?)
    }

    pub fn general(&self, history: &str, message: &str) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("history", history);
        context.insert("message", message);
        Ok(self.tera.render(GENERAL_TEMPLATE, &context)?)
    }
}

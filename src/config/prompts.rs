//! Prompt templates for Handbook.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub assistant: AssistantPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        let mut variables = HashMap::new();
        variables.insert("organization".to_string(), "the company".to_string());
        Self {
            assistant: AssistantPrompts::default(),
            variables,
        }
    }
}

/// Prompts for answering policy questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantPrompts {
    pub system: String,
    pub user: String,
}

impl Default for AssistantPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are {{organization}}'s HR assistant. Your role is to help employees understand HR policies and procedures by providing accurate, helpful, and professional responses based on the official HR documentation.

Guidelines for responses:
1. Always base your answers on the provided context from official HR documents
2. Be professional, clear, and concise
3. If the context doesn't contain enough information to fully answer the question, acknowledge this limitation
4. For sensitive topics (disciplinary actions, legal issues), advise consulting with HR directly
5. Include relevant policy references when applicable
6. Use a friendly but professional tone appropriate for workplace communication

If you cannot find relevant information in the provided context, politely explain that you need more specific information from HR documentation to provide an accurate answer."#.to_string(),

            user: r#"Based on the following HR policy context, please answer the employee's question:

Context from HR Documents:
{{context}}

Employee Question: {{question}}

Please provide a helpful and accurate response based on the context above. If the context doesn't fully address the question, acknowledge this and suggest appropriate next steps."#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let assistant_path = custom_path.join("assistant.toml");
            if assistant_path.exists() {
                let content = std::fs::read_to_string(&assistant_path)?;
                prompts.assistant = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// The template is scanned once, so `{{...}}` text inside substituted values
    /// is left as is. Unknown placeholders are kept verbatim.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let name = &after[..end];
                    match vars.get(name) {
                        Some(value) => result.push_str(value),
                        None => {
                            result.push_str("{{");
                            result.push_str(name);
                            result.push_str("}}");
                        }
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The rendered system prompt.
    pub fn system_prompt(&self) -> String {
        self.render_with_custom(&self.assistant.system, &HashMap::new())
    }

    /// The rendered user prompt for a question and its assembled context.
    pub fn user_prompt(&self, question: &str, context: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        self.render_with_custom(&self.assistant.user, &vars)
    }
}

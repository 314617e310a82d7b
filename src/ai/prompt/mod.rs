//! Prompt Types and Builder
//!
//! A [`Prompt`] is what a provider adapter sends: an optional system message,
//! the user text, optional inline images and sampling parameters.
//! [`PromptBuilder`] gives every task the same section layout.

/// Sampling parameters forwarded to the provider when set
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl SamplingParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Base64-encoded image attached to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub base64_data: String,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64_data: base64_data.into(),
        }
    }

    /// `data:` URL form used by OpenAI-compatible vision APIs
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data)
    }
}

/// Provider-agnostic prompt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    pub images: Vec<InlineImage>,
    pub sampling: SamplingParams,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            user: text.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user.trim().is_empty() && self.images.is_empty()
    }
}

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition
    Role(String),
    /// Ordered key-value inputs
    Context(Vec<(String, String)>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Bullet list of hard rules
    Rules(Vec<String>),
    /// Expected JSON output shape
    Schema(String),
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: &str) -> Self {
        self.sections.push(PromptSection::Role(role.to_string()));
        self
    }

    /// Add a context item, appending to the existing context section if present
    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        let entry = (key.to_string(), value.to_string());
        match self
            .sections
            .iter_mut()
            .find_map(|s| match s {
                PromptSection::Context(items) => Some(items),
                _ => None,
            }) {
            Some(items) => items.push(entry),
            None => self.sections.push(PromptSection::Context(vec![entry])),
        }
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn rules(mut self, rules: Vec<&str>) -> Self {
        self.sections
            .push(PromptSection::Rules(rules.into_iter().map(String::from).collect()));
        self
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.sections.push(PromptSection::Schema(schema.to_string()));
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role(role) => {
                    prompt.push_str(&role);
                    prompt.push_str("\n\n");
                }
                PromptSection::Context(items) => {
                    for (key, value) in items {
                        prompt.push_str(&format!("{}: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("{}:\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Rules(rules) => {
                    prompt.push_str("Rules:\n");
                    for rule in rules {
                        prompt.push_str(&format!("- {}\n", rule));
                    }
                    prompt.push('\n');
                }
                PromptSection::Schema(schema) => {
                    prompt.push_str("Return ONLY valid JSON in this exact shape, no markdown and no explanation:\n");
                    prompt.push_str(&schema);
                    prompt.push_str("\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }

    /// Build into a user prompt
    pub fn into_prompt(self) -> Prompt {
        Prompt::user(self.build())
    }
}

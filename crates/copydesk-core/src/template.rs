//! Prompt template registry.
//!
//! A small set of built-in templates ships with the binary; an optional
//! YAML file can add to or override them. Templates interpolate
//! `{{placeholder}}` markers; unknown markers are left verbatim so a
//! template typo shows up in the rendered prompt instead of vanishing.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub body: String,
}

impl PromptTemplate {
    /// Renders the template body, substituting each `{{key}}` marker.
    #[must_use]
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.body.clone();
        for (key, value) in vars {
            out = out.replace(&format!("{{{{{key}}}}}"), value);
        }
        out
    }
}

/// On-disk template file shape: `templates: [{id, name, body}, ...]`.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    templates: Vec<PromptTemplate>,
}

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, PromptTemplate>,
}

impl TemplateRegistry {
    /// The compiled-in registry.
    #[must_use]
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        for template in builtin_templates() {
            templates.insert(template.id.clone(), template);
        }
        Self { templates }
    }

    /// Built-ins plus the entries from `path`; file entries win on id clash.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Io`] when the file cannot be read and
    /// [`TemplateError::Yaml`] when it does not parse.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let raw = std::fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let file: TemplateFile =
            serde_yaml::from_str(&raw).map_err(|e| TemplateError::Yaml {
                path: path.display().to_string(),
                source: e,
            })?;

        let mut registry = Self::builtin();
        for template in file.templates {
            registry.templates.insert(template.id.clone(), template);
        }
        Ok(registry)
    }

    /// Looks up a template by id.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownTemplate`] when no template has
    /// that id.
    pub fn get(&self, id: &str) -> Result<&PromptTemplate, TemplateError> {
        self.templates
            .get(id)
            .ok_or_else(|| TemplateError::UnknownTemplate(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// All registered templates, sorted by id for stable listings.
    #[must_use]
    pub fn list(&self) -> Vec<&PromptTemplate> {
        let mut all: Vec<&PromptTemplate> = self.templates.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

pub const DEFAULT_TEMPLATE_ID: &str = "article";

fn builtin_templates() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            id: "article".to_string(),
            name: "Standard article".to_string(),
            body: "Write a long-form article about {{topic}}.\n\n\
                   Ground the article in these research findings:\n{{research}}\n\n\
                   Respond with a single JSON object containing the fields \
                   title, body, meta_description, tags, quality_score, and excerpt."
                .to_string(),
        },
        PromptTemplate {
            id: "listicle".to_string(),
            name: "List-style article".to_string(),
            body: "Write a list-style article about {{topic}}, one numbered \
                   section per major theme.\n\n\
                   Research findings:\n{{research}}\n\n\
                   Respond with a single JSON object containing the fields \
                   title, body, meta_description, tags, quality_score, and excerpt."
                .to_string(),
        },
        PromptTemplate {
            id: "summary".to_string(),
            name: "Executive summary".to_string(),
            body: "Write a concise executive summary about {{topic}}.\n\n\
                   Research findings:\n{{research}}\n\n\
                   Respond with a single JSON object containing the fields \
                   title, body, meta_description, tags, quality_score, and excerpt."
                .to_string(),
        },
    ]
}

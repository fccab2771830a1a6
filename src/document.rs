//! Document Model
//!
//! The parsed rule document as handed over by the parser, and the compiled
//! form handed to providers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::diagnostics::Diagnostic;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid frontmatter in {path}: {source}")]
    Frontmatter {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Frontmatter in {0} is not a mapping")]
    FrontmatterShape(String),

    #[error("Unterminated frontmatter block in {0}")]
    Unterminated(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Markdown,
    Xml,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSource {
    pub id: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub contents: String,
    #[serde(default)]
    pub format: SourceFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default = "empty_object")]
    pub frontmatter: Value,
    #[serde(default)]
    pub version: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub level: u8,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marker {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ast {
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetDocument {
    pub source: DocumentSource,
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub ast: Ast,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl RulesetDocument {
    pub fn new(id: impl Into<String>, contents: impl Into<String>, frontmatter: Value) -> Self {
        Self {
            source: DocumentSource {
                id: id.into(),
                path: None,
                contents: contents.into(),
                format: SourceFormat::Markdown,
            },
            metadata: DocumentMetadata {
                frontmatter,
                version: None,
            },
            ast: Ast::default(),
            diagnostics: vec![],
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.path = Some(path.into());
        self
    }

    /// Splits a leading `---` YAML block from a markdown file.
    ///
    /// Only enough parsing to feed the compiler: frontmatter plus heading
    /// sections. Imports, variables and markers are left to the real parser.
    pub fn from_markdown(path: &Path, text: &str) -> Result<Self, DocumentError> {
        let display = path.display().to_string();
        let (frontmatter, body, body_offset) = split_frontmatter(text, &display)?;

        let frontmatter = match frontmatter {
            Some(raw) if !raw.trim().is_empty() => {
                let yaml: serde_yaml::Value =
                    serde_yaml::from_str(raw).map_err(|source| DocumentError::Frontmatter {
                        path: display.clone(),
                        source,
                    })?;
                let json = serde_json::to_value(yaml)
                    .map_err(|_| DocumentError::FrontmatterShape(display.clone()))?;
                if !json.is_object() {
                    return Err(DocumentError::FrontmatterShape(display));
                }
                json
            }
            _ => empty_object(),
        };

        let version = frontmatter
            .get("version")
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());

        Ok(Self {
            source: DocumentSource {
                id,
                path: Some(path.to_path_buf()),
                contents: body.to_string(),
                format: SourceFormat::Markdown,
            },
            metadata: DocumentMetadata {
                frontmatter,
                version,
            },
            ast: Ast {
                sections: collect_sections(body, body_offset),
                ..Ast::default()
            },
            diagnostics: vec![],
        })
    }

    pub fn frontmatter(&self) -> &Value {
        &self.metadata.frontmatter
    }

    pub fn source_path_display(&self) -> String {
        match &self.source.path {
            Some(path) => path.display().to_string(),
            None => format!("<{}>", self.source.id),
        }
    }
}

fn split_frontmatter<'a>(
    text: &'a str,
    display: &str,
) -> Result<(Option<&'a str>, &'a str, usize), DocumentError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return Ok((None, text, 0));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let frontmatter = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let body_offset = frontmatter.lines().count() + 2;
            return Ok((Some(frontmatter), body, body_offset));
        }
        offset += line.len();
    }

    Err(DocumentError::Unterminated(display.to_string()))
}

fn collect_sections(body: &str, line_offset: usize) -> Vec<Section> {
    let mut sections = vec![];
    let mut in_fence = false;

    for (index, line) in body.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&level) && trimmed[level..].starts_with(' ') {
            sections.push(Section {
                title: trimmed[level..].trim().to_string(),
                level: level as u8,
                line: index + line_offset + 1,
            });
        }
    }

    sections
}

/// The rendered body plus whatever the document carried in.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledDocument {
    pub source: DocumentSource,
    pub metadata: DocumentMetadata,
    pub ast: Ast,
    pub output: CompiledOutput,
    pub context: CompilationContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledOutput {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationContext {
    pub destination_id: String,
    pub merged_config: Value,
}

impl CompiledDocument {
    pub fn frontmatter(&self) -> &Value {
        &self.metadata.frontmatter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_markdown_splits_frontmatter() {
        let text = "---\ndescription: Style guide\nversion: 2\ncursor:\n  enabled: true\n---\n# Style\n\nUse tabs.\n";
        let doc = RulesetDocument::from_markdown(Path::new("rules/style.rule.md"), text).unwrap();

        assert_eq!(doc.source.id, "style.rule");
        assert_eq!(doc.frontmatter()["description"], json!("Style guide"));
        assert_eq!(doc.frontmatter()["cursor"]["enabled"], json!(true));
        assert_eq!(doc.metadata.version.as_deref(), Some("2"));
        assert_eq!(doc.source.contents, "# Style\n\nUse tabs.\n");
        assert_eq!(doc.ast.sections.len(), 1);
        assert_eq!(doc.ast.sections[0].title, "Style");
        assert_eq!(doc.ast.sections[0].line, 7);
    }

    #[test]
    fn test_from_markdown_without_frontmatter() {
        let doc = RulesetDocument::from_markdown(Path::new("plain.md"), "Just text\n").unwrap();
        assert_eq!(doc.frontmatter(), &json!({}));
        assert_eq!(doc.source.contents, "Just text\n");
    }

    #[test]
    fn test_unterminated_frontmatter_rejected() {
        let result = RulesetDocument::from_markdown(Path::new("bad.md"), "---\na: 1\n");
        assert!(matches!(result, Err(DocumentError::Unterminated(_))));
    }

    #[test]
    fn test_headings_inside_fences_ignored() {
        let body = "```sh\n# not a heading\n```\n## Real\n";
        let sections = collect_sections(body, 0);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].level, 2);
    }
}

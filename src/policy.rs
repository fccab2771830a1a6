//! Templating Authority
//!
//! Determines whether a destination's body goes through the templating
//! engine, and which source made that call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProjectConfig;

const LEGACY_TEMPLATE_COMPILER: &str = "handlebars";

/// Where the templating decision came from, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateAuthority {
    /// A provider's preparation hook forced the decision.
    Provider,
    /// `rule.template` in the document frontmatter.
    Frontmatter,
    /// `rule.template` in the project config.
    Project,
    /// `compiler: handlebars` from older configurations.
    LegacyCompiler,
    /// Nothing said anything; templating stays off.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDecision {
    pub enabled: bool,
    pub authority: TemplateAuthority,
}

impl TemplateDecision {
    fn new(authority: TemplateAuthority, enabled: bool) -> Self {
        Self { enabled, authority }
    }
}

/// First applicable signal wins.
pub fn decide_templating(
    force: Option<bool>,
    frontmatter: &Value,
    project: &ProjectConfig,
) -> TemplateDecision {
    if let Some(forced) = force {
        return TemplateDecision::new(TemplateAuthority::Provider, forced);
    }

    let frontmatter_flag = frontmatter
        .get("rule")
        .and_then(|rule| rule.get("template"))
        .and_then(Value::as_bool);
    if let Some(flag) = frontmatter_flag {
        return TemplateDecision::new(TemplateAuthority::Frontmatter, flag);
    }

    if let Some(flag) = project.rule_template() {
        return TemplateDecision::new(TemplateAuthority::Project, flag);
    }

    let frontmatter_compiler = frontmatter
        .get("compiler")
        .or_else(|| frontmatter.get("rulesets").and_then(|r| r.get("compiler")))
        .and_then(Value::as_str);
    let legacy = frontmatter_compiler
        .into_iter()
        .chain(project.legacy_compiler())
        .any(|compiler| compiler == LEGACY_TEMPLATE_COMPILER);
    if legacy {
        return TemplateDecision::new(TemplateAuthority::LegacyCompiler, true);
    }

    TemplateDecision::new(TemplateAuthority::Default, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(value: Value) -> ProjectConfig {
        ProjectConfig::from_value(value)
    }

    #[test]
    fn test_default_is_off() {
        let decision = decide_templating(None, &json!({}), &ProjectConfig::new());
        assert!(!decision.enabled);
        assert_eq!(decision.authority, TemplateAuthority::Default);
    }

    #[test]
    fn test_force_beats_everything() {
        let decision = decide_templating(
            Some(false),
            &json!({"rule": {"template": true}}),
            &project(json!({"rule": {"template": true}})),
        );
        assert!(!decision.enabled);
        assert_eq!(decision.authority, TemplateAuthority::Provider);
    }

    #[test]
    fn test_frontmatter_beats_project() {
        let decision = decide_templating(
            None,
            &json!({"rule": {"template": false}}),
            &project(json!({"rule": {"template": true}})),
        );
        assert_eq!(decision, TemplateDecision { enabled: false, authority: TemplateAuthority::Frontmatter });
    }

    #[test]
    fn test_project_beats_legacy_compiler() {
        let decision = decide_templating(
            None,
            &json!({"compiler": "handlebars"}),
            &project(json!({"rule": {"template": false}})),
        );
        assert_eq!(decision.authority, TemplateAuthority::Project);
        assert!(!decision.enabled);
    }

    #[test]
    fn test_legacy_compiler_from_either_side() {
        let from_doc = decide_templating(None, &json!({"rulesets": {"compiler": "handlebars"}}), &ProjectConfig::new());
        assert!(from_doc.enabled);

        let from_project = decide_templating(None, &json!({}), &project(json!({"rulesets": {"compiler": "handlebars"}})));
        assert_eq!(from_project.authority, TemplateAuthority::LegacyCompiler);

        let other = decide_templating(None, &json!({"compiler": "mustache"}), &ProjectConfig::new());
        assert!(!other.enabled);
    }
}

//! Rule grammar: the XML document driving the rule engine
//!
//! The document has a root element holding `<Macro>` and `<Check>`
//! children. A check targets one entity class and holds `<Reject>` and
//! `<Accept>` rules; each rule holds `<Condition>`s. Attributes are kept
//! as opaque string maps so unknown attributes are ignored, and macro
//! references (`$NAME$`) are expanded when an attribute is read at
//! evaluation time.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

const TOKEN_MACRO: &str = "Macro";
const TOKEN_NAME: &str = "Name";
const TOKEN_VALUE: &str = "Value";
const TOKEN_CHECK: &str = "Check";
const TOKEN_CLASS: &str = "Class";
const TOKEN_ACCEPT: &str = "Accept";
const TOKEN_REJECT: &str = "Reject";
const TOKEN_CONDITION: &str = "Condition";

/// A parsed rule document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDocument {
    pub macros: FxHashMap<String, String>,
    pub checks: Vec<Check>,
}

/// `<Check Class="…">`: the rules applying to one entity class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Check {
    pub class: String,
    pub rejects: Vec<Rule>,
    pub accepts: Vec<Rule>,
}

/// One `<Accept>` or `<Reject>` rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    pub attributes: FxHashMap<String, String>,
    pub conditions: Vec<Condition>,
}

/// One `<Condition>` of a rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Condition {
    pub attributes: FxHashMap<String, String>,
}

fn attribute_map(node: roxmltree::Node<'_, '_>) -> FxHashMap<String, String> {
    node.attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect()
}

fn parse_rule(node: roxmltree::Node<'_, '_>) -> Rule {
    Rule {
        attributes: attribute_map(node),
        conditions: node
            .children()
            .filter(|c| c.has_tag_name(TOKEN_CONDITION))
            .map(|c| Condition {
                attributes: attribute_map(c),
            })
            .collect(),
    }
}

impl RuleDocument {
    /// Parse a rule document from XML text
    pub fn parse(xml: &str) -> miette::Result<Self> {
        let document = roxmltree::Document::parse(xml)
            .map_err(|e| miette::miette!("invalid rule document: {}", e))?;

        let mut rules = RuleDocument::default();

        for node in document.root_element().children().filter(|n| n.is_element()) {
            if node.has_tag_name(TOKEN_MACRO) {
                let name = node.attribute(TOKEN_NAME).unwrap_or_default();
                let value = node.attribute(TOKEN_VALUE).unwrap_or_default();
                rules.macros.insert(name.to_string(), value.to_string());
            } else if node.has_tag_name(TOKEN_CHECK) {
                let mut check = Check {
                    class: node.attribute(TOKEN_CLASS).unwrap_or_default().to_string(),
                    ..Default::default()
                };
                for rule in node.children().filter(|n| n.is_element()) {
                    if rule.has_tag_name(TOKEN_REJECT) {
                        check.rejects.push(parse_rule(rule));
                    } else if rule.has_tag_name(TOKEN_ACCEPT) {
                        check.accepts.push(parse_rule(rule));
                    }
                }
                rules.checks.push(check);
            }
        }

        Ok(rules)
    }

    /// Load a rule document from a file
    pub fn from_file(path: &Path) -> miette::Result<Self> {
        let xml = std::fs::read_to_string(path)
            .map_err(|e| miette::miette!("cannot read rule document {}: {}", path.display(), e))?;
        Self::parse(&xml)
    }

    /// Replace every `$NAME$` occurrence with the macro's value. One pass,
    /// non-recursive; empty-valued macros are left untouched.
    pub fn expand_macros(&self, text: &str) -> String {
        let mut result = text.to_string();

        for (name, value) in &self.macros {
            if value.is_empty() {
                continue;
            }
            let reference = format!("${}$", name);
            if result.contains(&reference) {
                result = result.replace(&reference, value);
            }
        }

        result
    }

    /// A rule or condition attribute, macro-expanded; empty if absent
    pub fn attribute(&self, attributes: &FxHashMap<String, String>, name: &str) -> String {
        match attributes.get(name) {
            Some(value) => self.expand_macros(value),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLOR_RULES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Root>
  <Macro Name="CamelCasingRegExp" Value="([a-z])([a-zA-Z0-9]*)"/>
  <Check Class="QMLPropertyAssignment">
    <Reject Member="content" Class="QMLEntity" Text="No hardcoded colors allowed">
      <Condition Member="name" Value="color"/>
      <Condition Member="content" Value="transparent" Negate="true"/>
    </Reject>
  </Check>
  <Check Class="QMLPropertyDeclaration">
    <Accept Member="name" RegExp="$CamelCasingRegExp$" Text="Only camel casing allowed"/>
  </Check>
</Root>"#;

    #[test]
    fn test_parse_rule_document() {
        let rules = RuleDocument::parse(COLOR_RULES).unwrap();
        assert_eq!(rules.macros.len(), 1);
        assert_eq!(rules.checks.len(), 2);

        let check = &rules.checks[0];
        assert_eq!(check.class, "QMLPropertyAssignment");
        assert_eq!(check.rejects.len(), 1);
        assert!(check.accepts.is_empty());
        assert_eq!(check.rejects[0].conditions.len(), 2);
        assert_eq!(
            check.rejects[0].attributes.get("Text").unwrap(),
            "No hardcoded colors allowed"
        );
    }

    #[test]
    fn test_unknown_attributes_are_kept_but_harmless() {
        let rules = RuleDocument::parse(
            r#"<Root><Check Class="QMLItem"><Reject Member="name" Frobnicate="yes" Text="t"/></Check></Root>"#,
        )
        .unwrap();
        assert_eq!(
            rules.checks[0].rejects[0].attributes.get("Frobnicate").unwrap(),
            "yes"
        );
    }

    #[test]
    fn test_macro_expansion() {
        let rules = RuleDocument::parse(COLOR_RULES).unwrap();
        assert_eq!(
            rules.expand_macros("$CamelCasingRegExp$"),
            "([a-z])([a-zA-Z0-9]*)"
        );
        assert_eq!(rules.expand_macros("no macros here"), "no macros here");
    }

    #[test]
    fn test_empty_macro_is_not_substituted() {
        let rules =
            RuleDocument::parse(r#"<Root><Macro Name="Empty" Value=""/></Root>"#).unwrap();
        assert_eq!(rules.expand_macros("keep $Empty$"), "keep $Empty$");
    }

    #[test]
    fn test_expansion_is_single_pass() {
        let rules = RuleDocument::parse(
            r#"<Root><Macro Name="A" Value="$B$"/><Macro Name="B" Value="done"/></Root>"#,
        )
        .unwrap();
        // A expands to `$B$`; whether `$B$` then expands depends on map
        // order, so only direct references are guaranteed
        assert_eq!(rules.expand_macros("$B$"), "done");
    }

    #[test]
    fn test_invalid_xml_is_an_error() {
        assert!(RuleDocument::parse("<Root><Check></Root>").is_err());
    }
}

//! Rule engine: evaluates a rule document against one file's tree
//!
//! Traversal is depth-first, pre-order. At every node the engine first
//! emits the resolver's implicit unreferenced-symbol diagnostics, then
//! evaluates every `<Check>` whose class matches the node, all rejects
//! before all accepts. When any rule fired on a node its subtree is not
//! descended into, which keeps one report per offending subtree.
//!
//! The engine never mutates the tree and never fails: malformed rule
//! attributes are logged and the rule is skipped.

use crate::ast::{EntityId, EntityKind, File};
use crate::common::AnalyzerError;
use crate::grammar::{Rule, RuleDocument};
use regex::Regex;

const TOKEN_EXISTS: &str = "Exists";
const TOKEN_CONTAINS: &str = "Contains";
const TOKEN_FILE_NAME: &str = "filename";
const TOKEN_TRUE: &str = "true";

/// Walk `file` and report every diagnostic the rule document produces
pub fn run_rules(
    file: &File,
    rules: &RuleDocument,
    on_diagnostic: &mut dyn FnMut(AnalyzerError),
) {
    let engine = RuleEngine {
        file,
        rules,
        file_name: file.path.display().to_string(),
    };

    for &id in &file.contents {
        engine.visit(id, on_diagnostic);
    }
}

struct RuleEngine<'a> {
    file: &'a File,
    rules: &'a RuleDocument,
    file_name: String,
}

impl RuleEngine<'_> {
    fn emit(&self, id: EntityId, text: &str, sink: &mut dyn FnMut(AnalyzerError)) {
        sink(AnalyzerError::new(
            self.file_name.clone(),
            self.file.arena[id].position,
            text,
        ));
    }

    fn visit(&self, id: EntityId, sink: &mut dyn FnMut(AnalyzerError)) {
        let arena = &self.file.arena;

        // Implicit diagnostics from the resolver
        match arena[id].kind {
            EntityKind::Item { .. } => {
                for unused in self.file.symbols.unused_properties(id) {
                    self.emit(unused.entity, "Unreferenced property", sink);
                }
            }
            EntityKind::Function { .. } => {
                for unused in self.file.symbols.unused_variables(id) {
                    self.emit(unused.entity, "Unreferenced variable", sink);
                }
                for unused in self.file.symbols.unused_parameters(id) {
                    self.emit(unused.entity, "Unreferenced parameter", sink);
                }
            }
            _ => {}
        }

        let class = arena.class_name(id);
        let mut fired = false;

        for check in self.rules.checks.iter().filter(|c| c.class == class) {
            for rule in &check.rejects {
                if self.evaluate(id, rule, false, sink) {
                    fired = true;
                }
            }
            for rule in &check.accepts {
                if self.evaluate(id, rule, true, sink) {
                    fired = true;
                }
            }
        }

        // A fired rule prunes recursion beneath the reported subtree
        if fired {
            return;
        }

        for (_, member) in arena.members(id) {
            if let Some(member) = member {
                self.visit(member, sink);
            }
        }
        for &child in arena.children(id) {
            self.visit(child, sink);
        }
    }

    /// Evaluate one rule. `invert` is true for `<Accept>` rules, whose
    /// predicate polarity is reversed. Returns true when a diagnostic was
    /// emitted.
    fn evaluate(
        &self,
        id: EntityId,
        rule: &Rule,
        invert: bool,
        sink: &mut dyn FnMut(AnalyzerError),
    ) -> bool {
        if !self.satisfies_conditions(id, rule) {
            return false;
        }

        let arena = &self.file.arena;
        let attr = |name: &str| self.rules.attribute(&rule.attributes, name);

        let member_name = attr("Member").to_lowercase();
        let value = attr("Value");
        let type_name = attr("Type");
        let text = attr("Text");
        let nested_count = attr("NestedCount");
        let count = attr("Count");
        let regexp = attr("RegExp");
        let path = attr("Path");
        let list = attr("List");
        let class = attr("Class");

        // Nested-count rules look at the whole subtree, not a member
        if !nested_count.is_empty() {
            let allowed: i64 = match nested_count.parse() {
                Ok(n) => n,
                Err(_) => {
                    tracing::warn!(
                        "rule for {}: NestedCount '{}' is not an integer, rule skipped",
                        arena.class_name(id),
                        nested_count
                    );
                    return false;
                }
            };

            if (allowed > 0) ^ invert {
                let depth = self.count_nested(arena.class_name(id), id);
                if depth > allowed {
                    self.emit(id, &text, sink);
                    return true;
                }
            }
            return false;
        }

        let Some(member) = arena.member(id, &member_name) else {
            return false;
        };

        let member_string = arena.to_source(member).replace('"', "");
        let member_class = arena.class_name(member);

        let predicate = if !list.is_empty() {
            list.split(',').any(|name| name == member_string)
        } else if !class.is_empty() {
            member_class == class
        } else if !path.is_empty() {
            if path != TOKEN_EXISTS {
                return false;
            }
            let directory = self
                .file
                .path
                .parent()
                .unwrap_or_else(|| std::path::Path::new(""));
            directory.join(&member_string).exists()
        } else if !regexp.is_empty() {
            if member_string.is_empty() {
                return false;
            }
            // Full-match semantics
            let anchored = format!("^(?:{})$", regexp);
            match Regex::new(&anchored) {
                Ok(pattern) => pattern.is_match(&member_string),
                Err(error) => {
                    tracing::warn!(
                        "rule for {}: invalid RegExp '{}' ({}), rule skipped",
                        arena.class_name(id),
                        regexp,
                        error
                    );
                    return false;
                }
            }
        } else if !count.is_empty() {
            let limit: i64 = match count.parse() {
                Ok(n) => n,
                Err(_) => {
                    tracing::warn!(
                        "rule for {}: Count '{}' is not an integer, rule skipped",
                        arena.class_name(id),
                        count
                    );
                    return false;
                }
            };
            let countable = matches!(
                arena[member].kind,
                EntityKind::Complex { .. } | EntityKind::Item { .. }
            );
            if !countable {
                return false;
            }
            arena.children(member).len() as i64 > limit
        } else if !type_name.is_empty() {
            arena.value(member).type_name() == type_name
        } else {
            member_string == value
        };

        if predicate ^ invert {
            self.emit(id, &text, sink);
            return true;
        }
        false
    }

    /// A rule runs only when every one of its conditions passes
    fn satisfies_conditions(&self, id: EntityId, rule: &Rule) -> bool {
        let arena = &self.file.arena;

        for condition in &rule.conditions {
            let attr = |name: &str| self.rules.attribute(&condition.attributes, name);

            let operation = attr("Operation");
            let value = attr("Value");
            let member_name = attr("Member").to_lowercase();
            let empty = attr("Empty").to_lowercase();
            let negate = attr("Negate").to_lowercase() == TOKEN_TRUE;

            match arena.member(id, &member_name) {
                Some(member) => {
                    let member_string = arena.to_source(member).replace('"', "");

                    if !value.is_empty() {
                        if (member_string == value) == negate {
                            return false;
                        }
                    } else if !empty.is_empty()
                        && !(member_string.is_empty() && empty == TOKEN_TRUE)
                    {
                        return false;
                    }
                }
                None => {
                    if member_name == TOKEN_FILE_NAME {
                        let matched = if operation == TOKEN_CONTAINS {
                            self.file_name.contains(&value)
                        } else {
                            self.file_name == value
                        };
                        if matched == negate {
                            return false;
                        }
                    } else if !empty.is_empty() && empty != TOKEN_TRUE {
                        // An absent member only passes an emptiness test
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Maximum self-nesting depth of `class` in the subtree rooted at `id`
    fn count_nested(&self, class: &str, id: EntityId) -> i64 {
        let arena = &self.file.arena;
        let mut count = 0;

        for (_, member) in arena.members(id) {
            if let Some(member) = member {
                count = count.max(self.count_nested(class, member));
            }
        }
        for &child in arena.children(id) {
            count = count.max(self.count_nested(class, child));
        }

        if arena.class_name(id) == class {
            count += 1;
        }
        count
    }
}

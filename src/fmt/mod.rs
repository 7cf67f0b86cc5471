//! Formatter: deterministic AST-to-source emission
//!
//! Every entity re-serializes node by node with two-space indent units and
//! spaced operators. Parentheses are emitted only where the parser recorded
//! them, so formatting is idempotent: emitting a reparsed emission yields
//! the same text.

use crate::ast::{Arena, ComplexShape, EntityId, EntityKind, File};
use crate::common::Value;

const INDENT: &str = "  ";

/// Emit a whole file back to source
pub fn emit_file(file: &File) -> String {
    let mut out = String::new();

    for &id in &file.contents {
        emit_entity(&file.arena, id, &mut out, 0);
        out.push('\n');
    }

    out
}

/// Render a single entity to a string (no trailing newline)
pub fn entity_to_string(arena: &Arena, id: EntityId) -> String {
    let mut out = String::new();
    emit_entity(arena, id, &mut out, 0);
    out
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

/// Append the source text of `id`. The caller is responsible for the
/// indentation of the first line; `level` governs nested lines.
pub fn emit_entity(arena: &Arena, id: EntityId, out: &mut String, level: usize) {
    let entity = &arena[id];

    if entity.parenthesized {
        out.push('(');
    }

    match &entity.kind {
        EntityKind::Literal(value) => emit_value(value, out),
        EntityKind::Identifier(name) => out.push_str(name),
        EntityKind::Type(ty) => out.push_str(&ty.as_str()),

        EntityKind::Pragma { name } => {
            out.push_str("pragma ");
            emit_entity(arena, *name, out, level);
        }

        EntityKind::Import {
            name,
            version,
            alias,
        } => {
            out.push_str("import ");
            emit_entity(arena, *name, out, level);
            if let Some(version) = version {
                out.push(' ');
                emit_entity(arena, *version, out, level);
            }
            if let Some(alias) = alias {
                out.push_str(" as ");
                emit_entity(arena, *alias, out, level);
            }
        }

        EntityKind::Complex {
            children, shape, ..
        } => match shape {
            ComplexShape::Block => {
                out.push_str("{\n");
                for &child in children {
                    indent(out, level + 1);
                    emit_entity(arena, child, out, level + 1);
                    out.push('\n');
                }
                indent(out, level);
                out.push('}');
            }
            ComplexShape::Array => {
                out.push('[');
                emit_list(arena, children, out, level);
                out.push(']');
            }
            ComplexShape::Object => {
                if children.is_empty() {
                    out.push_str("{}");
                } else {
                    out.push_str("{ ");
                    emit_list(arena, children, out, level);
                    out.push_str(" }");
                }
            }
            ComplexShape::Parameters => emit_list(arena, children, out, level),
            ComplexShape::Cases => {
                for &child in children {
                    indent(out, level);
                    emit_entity(arena, child, out, level);
                    out.push('\n');
                }
            }
        },

        EntityKind::Item { name, children } => {
            emit_entity(arena, *name, out, level);
            out.push_str(" {\n");
            for &child in children {
                indent(out, level + 1);
                emit_entity(arena, child, out, level + 1);
                out.push('\n');
            }
            indent(out, level);
            out.push('}');
        }

        EntityKind::PropertyDeclaration {
            ty,
            name,
            content,
            is_default,
            is_readonly,
        } => {
            if *is_default {
                out.push_str("default ");
            }
            if *is_readonly {
                out.push_str("readonly ");
            }
            out.push_str("property ");
            emit_entity(arena, *ty, out, level);
            out.push(' ');
            emit_entity(arena, *name, out, level);
            if let Some(content) = content {
                out.push_str(": ");
                emit_entity(arena, *content, out, level);
            }
        }

        EntityKind::PropertyAssignment { name, content } => {
            emit_entity(arena, *name, out, level);
            out.push_str(": ");
            emit_entity(arena, *content, out, level);
        }

        EntityKind::PropertyAlias { name, content } => {
            out.push_str("property alias ");
            emit_entity(arena, *name, out, level);
            out.push_str(": ");
            emit_entity(arena, *content, out, level);
        }

        EntityKind::VariableDeclaration { name, content } => {
            out.push_str("var ");
            emit_entity(arena, *name, out, level);
            if let Some(content) = content {
                out.push_str(" = ");
                emit_entity(arena, *content, out, level);
            }
        }

        EntityKind::Signal { name, parameters } => {
            out.push_str("signal ");
            emit_entity(arena, *name, out, level);
            if !arena.children(*parameters).is_empty() {
                out.push('(');
                emit_entity(arena, *parameters, out, level);
                out.push(')');
            }
        }

        EntityKind::Function {
            name,
            parameters,
            content,
        } => {
            out.push_str("function");
            if let Some(name) = name {
                out.push(' ');
                emit_entity(arena, *name, out, level);
            }
            out.push('(');
            emit_entity(arena, *parameters, out, level);
            out.push_str(") ");
            emit_entity(arena, *content, out, level);
        }

        EntityKind::FunctionCall { name, parameters } => {
            emit_entity(arena, *name, out, level);
            out.push('(');
            emit_entity(arena, *parameters, out, level);
            out.push(')');
        }

        EntityKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push_str("if (");
            emit_entity(arena, *condition, out, level);
            out.push(')');
            if let Some(then_branch) = then_branch {
                out.push(' ');
                emit_entity(arena, *then_branch, out, level);
            }
            if let Some(else_branch) = else_branch {
                out.push_str(" else ");
                emit_entity(arena, *else_branch, out, level);
            }
        }

        EntityKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            emit_entity(arena, *condition, out, level);
            out.push_str(" ? ");
            emit_entity(arena, *then_branch, out, level);
            out.push_str(" : ");
            emit_entity(arena, *else_branch, out, level);
        }

        EntityKind::For {
            initialization,
            condition,
            incrementation,
            content,
        } => {
            out.push_str("for (");
            if let Some(init) = initialization {
                emit_entity(arena, *init, out, level);
            }
            out.push_str("; ");
            if let Some(condition) = condition {
                emit_entity(arena, *condition, out, level);
            }
            out.push_str("; ");
            if let Some(inc) = incrementation {
                emit_entity(arena, *inc, out, level);
            }
            out.push(')');
            if let Some(content) = content {
                out.push(' ');
                emit_entity(arena, *content, out, level);
            }
        }

        EntityKind::ForIn {
            variable,
            expression,
            content,
        } => {
            out.push_str("for (");
            emit_entity(arena, *variable, out, level);
            out.push_str(" in ");
            emit_entity(arena, *expression, out, level);
            out.push(')');
            if let Some(content) = content {
                out.push(' ');
                emit_entity(arena, *content, out, level);
            }
        }

        EntityKind::While { condition, content } => {
            out.push_str("while (");
            emit_entity(arena, *condition, out, level);
            out.push(')');
            if let Some(content) = content {
                out.push(' ');
                emit_entity(arena, *content, out, level);
            }
        }

        EntityKind::Switch { expression, cases } => {
            out.push_str("switch (");
            emit_entity(arena, *expression, out, level);
            out.push_str(") {\n");
            emit_entity(arena, *cases, out, level + 1);
            indent(out, level);
            out.push('}');
        }

        EntityKind::SwitchCase { value, content } => {
            match value {
                Some(value) => {
                    out.push_str("case ");
                    emit_entity(arena, *value, out, level);
                    out.push(':');
                }
                None => out.push_str("default:"),
            }
            for &child in arena.children(*content) {
                out.push('\n');
                indent(out, level + 1);
                emit_entity(arena, child, out, level + 1);
            }
        }

        EntityKind::Break => out.push_str("break"),
        EntityKind::Continue => out.push_str("continue"),

        EntityKind::Return { expression } => {
            out.push_str("return");
            if let Some(expression) = expression {
                out.push(' ');
                emit_entity(arena, *expression, out, level);
            }
        }

        EntityKind::With {
            expression,
            content,
        } => {
            out.push_str("with (");
            emit_entity(arena, *expression, out, level);
            out.push_str(") ");
            emit_entity(arena, *content, out, level);
        }

        EntityKind::BinaryOperation { op, left, right } => {
            emit_entity(arena, *left, out, level);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            emit_entity(arena, *right, out, level);
        }

        EntityKind::UnaryOperation {
            op,
            operand,
            prefix,
        } => {
            if *prefix {
                out.push_str(op.as_str());
                emit_entity(arena, *operand, out, level);
            } else {
                emit_entity(arena, *operand, out, level);
                out.push_str(op.as_str());
            }
        }

        EntityKind::ArrayAccess {
            content,
            expression,
        } => {
            emit_entity(arena, *content, out, level);
            out.push('[');
            emit_entity(arena, *expression, out, level);
            out.push(']');
        }

        EntityKind::NewOperation { content } => {
            out.push_str("new ");
            emit_entity(arena, *content, out, level);
        }

        EntityKind::MemberAccess { object, member } => {
            emit_entity(arena, *object, out, level);
            out.push('.');
            emit_entity(arena, *member, out, level);
        }
    }

    if entity.parenthesized {
        out.push(')');
    }
}

fn emit_list(arena: &Arena, children: &[EntityId], out: &mut String, level: usize) {
    for (i, &child) in children.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        emit_entity(arena, child, out, level);
    }
}

fn emit_value(value: &Value, out: &mut String) {
    out.push_str(&value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn reformat(source: &str, path: &str) -> String {
        let file = parser::parse_source(source, std::path::Path::new(path)).unwrap();
        emit_file(&file)
    }

    #[test]
    fn test_emit_simple_item() {
        let out = reformat(
            "import QtQuick 2.5\nRectangle { width: 100\ncolor: \"#FF0000\" }",
            "a.qml",
        );
        assert_eq!(
            out,
            "import QtQuick 2.5\nRectangle {\n  width: 100\n  color: \"#FF0000\"\n}\n"
        );
    }

    #[test]
    fn test_emit_keeps_recorded_parentheses() {
        let out = reformat("var x = (1 + 2) * 3", "a.js");
        assert_eq!(out, "var x = (1 + 2) * 3\n");
    }

    #[test]
    fn test_emit_is_idempotent() {
        let source = r#"import QtQuick 2.5

Item {
    id: root
    property int count: 5
    function update(a, b) {
        if (a > b) { return a } else { return b }
        for (var i = 0; i < 10; i++) { count = count + i }
    }
    Rectangle { color: "blue" }
}"#;
        let once = reformat(source, "a.qml");
        let twice = reformat(&once, "a.qml");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_emit_strings_requote() {
        let out = reformat("Text { text: 'hi' }", "a.qml");
        assert!(out.contains("text: \"hi\""));
    }
}

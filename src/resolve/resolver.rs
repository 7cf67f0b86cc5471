//! Name resolution passes
//!
//! Runs after parse and before rule evaluation. Three passes over the
//! file's tree:
//!
//! 1. collect declarations into per-scope tables (`id:` registrations are
//!    file-wide, properties belong to their item, parameters and `var`s to
//!    their function),
//! 2. link every referencing identifier to the nearest declaration visible
//!    on its lexical parent chain (only the leftmost name of a dotted
//!    access is resolved),
//! 3. usage marking happens as links are made; what remains at zero uses is
//!    unreferenced.
//!
//! Unresolved identifiers are recorded, not reported as errors.

use super::symbols::{Declaration, DeclarationKind, SymbolTable};
use crate::ast::{Arena, EntityId, EntityKind, File};
use rustc_hash::FxHashSet;

/// Resolve all names in a parsed file, filling in its symbol table
pub fn resolve(file: &mut File) {
    let mut resolver = Resolver::default();

    for &id in &file.contents {
        resolver.collect(&file.arena, id, None, None);
    }
    for &id in &file.contents {
        resolver.link(&file.arena, id);
    }

    file.symbols = resolver.table;
}

/// Remove unused property and local variable declarations from the tree.
/// Parameters are reported but never removed.
pub fn prune_unreferenced(file: &mut File) {
    let mut doomed: Vec<EntityId> = Vec::new();

    for id in file.arena.ids() {
        match &file.arena[id].kind {
            EntityKind::Item { .. } => {
                doomed.extend(file.symbols.unused_properties(id).iter().map(|d| d.entity));
            }
            EntityKind::Function { .. } => {
                doomed.extend(file.symbols.unused_variables(id).iter().map(|d| d.entity));
            }
            _ => {}
        }
    }

    for entity in doomed {
        if let Some(parent) = file.arena[entity].parent {
            file.arena.remove_child(parent, entity);
        }
    }
}

#[derive(Default)]
struct Resolver {
    table: SymbolTable,
    /// Identifier entities that are declaration sites or member names, and
    /// therefore never referencing uses
    skip: FxHashSet<EntityId>,
}

impl Resolver {
    /// First pass: walk the tree recording declarations and the set of
    /// identifiers that must not be linked.
    fn collect(
        &mut self,
        arena: &Arena,
        id: EntityId,
        item: Option<EntityId>,
        function: Option<EntityId>,
    ) {
        match &arena[id].kind {
            EntityKind::Item { name, children } => {
                self.skip.insert(*name);
                for &child in children {
                    self.collect(arena, child, Some(id), function);
                }
            }

            EntityKind::PropertyDeclaration {
                ty, name, content, ..
            } => {
                self.skip.insert(*ty);
                self.skip.insert(*name);
                if let Some(text) = arena.identifier_text(*name) {
                    self.table.declare(
                        item,
                        Declaration {
                            name: text.to_string(),
                            entity: id,
                            kind: DeclarationKind::Property,
                        },
                    );
                }
                if let Some(content) = content {
                    self.collect(arena, *content, item, function);
                }
            }

            EntityKind::PropertyAlias { name, content } => {
                self.skip.insert(*name);
                if let Some(text) = arena.identifier_text(*name) {
                    self.table.declare(
                        item,
                        Declaration {
                            name: text.to_string(),
                            entity: id,
                            kind: DeclarationKind::Alias,
                        },
                    );
                }
                self.collect(arena, *content, item, function);
            }

            EntityKind::PropertyAssignment { name, content } => {
                self.skip.insert(*name);

                // `id: root` registers the item under `root` for the file
                let is_id = arena.identifier_text(*name) == Some("id");
                let id_name = if is_id {
                    arena.identifier_text(*content)
                } else {
                    None
                };

                if let Some(text) = id_name {
                    self.skip.insert(*content);
                    self.table.declare(
                        None,
                        Declaration {
                            name: text.to_string(),
                            entity: *content,
                            kind: DeclarationKind::Id,
                        },
                    );
                } else {
                    self.collect(arena, *content, item, function);
                }
            }

            EntityKind::Signal { name, parameters } => {
                self.skip.insert(*name);
                if let Some(text) = arena.identifier_text(*name) {
                    self.table.declare(
                        item,
                        Declaration {
                            name: text.to_string(),
                            entity: id,
                            kind: DeclarationKind::Signal,
                        },
                    );
                }
                // Signal parameters declare nothing resolvable
                for &parameter in arena.children(*parameters) {
                    self.skip.insert(parameter);
                }
            }

            EntityKind::Function {
                name,
                parameters,
                content,
            } => {
                if let Some(name) = name {
                    self.skip.insert(*name);
                }
                for &parameter in arena.children(*parameters) {
                    self.skip.insert(parameter);
                    if let Some(text) = arena.identifier_text(parameter) {
                        self.table.declare(
                            Some(id),
                            Declaration {
                                name: text.to_string(),
                                entity: parameter,
                                kind: DeclarationKind::Parameter,
                            },
                        );
                    }
                }
                self.collect(arena, *content, item, Some(id));
            }

            EntityKind::VariableDeclaration { name, content } => {
                self.skip.insert(*name);
                if let Some(text) = arena.identifier_text(*name) {
                    self.table.declare(
                        function,
                        Declaration {
                            name: text.to_string(),
                            entity: id,
                            kind: DeclarationKind::Variable,
                        },
                    );
                }
                if let Some(content) = content {
                    self.collect(arena, *content, item, function);
                }
            }

            EntityKind::Import {
                name,
                version,
                alias,
            } => {
                self.skip.insert(*name);
                if let Some(version) = version {
                    self.skip.insert(*version);
                }
                if let Some(alias) = alias {
                    self.skip.insert(*alias);
                }
            }

            EntityKind::Pragma { name } => {
                self.skip.insert(*name);
            }

            // Dotted access only resolves its leftmost name
            EntityKind::MemberAccess { object, member } => {
                self.skip.insert(*member);
                self.collect(arena, *object, item, function);
            }

            _ => {
                for (_, member) in arena.members(id) {
                    if let Some(member) = member {
                        self.collect(arena, member, item, function);
                    }
                }
                for &child in arena.children(id) {
                    self.collect(arena, child, item, function);
                }
            }
        }
    }

    /// Second pass: attach every referencing identifier to the nearest
    /// visible declaration, walking outward from its lexical parent.
    fn link(&mut self, arena: &Arena, id: EntityId) {
        if let EntityKind::Identifier(name) = &arena[id].kind {
            if !self.skip.contains(&id) {
                match self.find_declaration(arena, id, name) {
                    Some(declaration) => self.table.link(id, declaration),
                    None => self.table.mark_unresolved(id),
                }
            }
            return;
        }

        for (_, member) in arena.members(id) {
            if let Some(member) = member {
                self.link(arena, member);
            }
        }
        for &child in arena.children(id) {
            self.link(arena, child);
        }
    }

    fn find_declaration(&self, arena: &Arena, from: EntityId, name: &str) -> Option<EntityId> {
        let mut cursor = arena[from].parent;

        while let Some(ancestor) = cursor {
            let is_scope = matches!(
                arena[ancestor].kind,
                EntityKind::Item { .. } | EntityKind::Function { .. }
            );
            if is_scope {
                if let Some(declaration) = self.table.lookup(Some(ancestor), name) {
                    return Some(declaration.entity);
                }
            }
            cursor = arena[ancestor].parent;
        }

        self.table
            .lookup(None, name)
            .map(|declaration| declaration.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn resolved(source: &str) -> File {
        let mut file = parse_source(source, Path::new("test.qml")).unwrap();
        resolve(&mut file);
        file
    }

    fn root_item(file: &File) -> EntityId {
        *file
            .contents
            .iter()
            .find(|&&id| matches!(file.arena[id].kind, EntityKind::Item { .. }))
            .unwrap()
    }

    #[test]
    fn test_unreferenced_property_is_reported() {
        let file = resolved("Item { property int count: 5 }");
        let item = root_item(&file);
        let unused = file.symbols.unused_properties(item);
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].name, "count");
    }

    #[test]
    fn test_referenced_property_is_silent() {
        let file = resolved("Item { property int count: 5\nwidth: count }");
        let item = root_item(&file);
        assert!(file.symbols.unused_properties(item).is_empty());
    }

    #[test]
    fn test_id_links_across_the_file() {
        let file = resolved("Item { id: myButton\nRectangle { width: myButton.width } }");
        let item = root_item(&file);
        assert!(file.symbols.unused_properties(item).is_empty());
        assert!(file.symbols.unresolved().is_empty());
    }

    #[test]
    fn test_unused_parameter_is_reported() {
        let file = resolved("Item { function f(a, b) { return a } }");
        let item = root_item(&file);
        let function = file.arena.children(item)[0];
        let unused = file.symbols.unused_parameters(function);
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].name, "b");
    }

    #[test]
    fn test_unused_variable_is_reported() {
        let file = resolved("Item { function f() { var x = 1\nvar y = 2\nreturn y } }");
        let item = root_item(&file);
        let function = file.arena.children(item)[0];
        let unused = file.symbols.unused_variables(function);
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].name, "x");
    }

    #[test]
    fn test_dotted_access_resolves_leftmost_only() {
        let file = resolved("Item { id: root\nwidth: root.height.thing }");
        // `height` and `thing` are member names, not unresolved references
        assert!(file.symbols.unresolved().is_empty());
    }

    #[test]
    fn test_unresolved_identifier_is_not_fatal() {
        let file = resolved("Item { width: somethingUnknown }");
        assert_eq!(file.symbols.unresolved().len(), 1);
    }

    #[test]
    fn test_parameter_shadows_property() {
        let file = resolved(
            "Item { property int value: 1\nfunction f(value) { return value } }",
        );
        let item = root_item(&file);
        let function = file.arena.children(item)[1];
        // The parameter is used, the property is not
        assert!(file.symbols.unused_parameters(function).is_empty());
        assert_eq!(file.symbols.unused_properties(item).len(), 1);
    }

    #[test]
    fn test_prune_removes_unused_declarations() {
        let mut file = resolved(
            "Item { property int unused: 1\nproperty int used: 2\nwidth: used }",
        );
        let item = root_item(&file);
        assert_eq!(file.arena.children(item).len(), 3);

        prune_unreferenced(&mut file);
        let item = root_item(&file);
        assert_eq!(file.arena.children(item).len(), 2);

        let emitted = crate::fmt::emit_file(&file);
        assert!(!emitted.contains("unused"));
        assert!(emitted.contains("property int used: 2"));
    }
}

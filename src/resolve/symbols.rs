//! Symbol tables for one parsed file
//!
//! A scope is owned by the entity that introduces it: items own their
//! property declarations, functions own their parameters and local
//! variables. `id:` registrations live in a file-wide scope of their own.

use crate::ast::EntityId;
use rustc_hash::FxHashMap;

/// What kind of declaration a name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// An `id:` registration, visible to the whole file
    Id,
    Property,
    Alias,
    Signal,
    Parameter,
    Variable,
}

/// One declared name
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub entity: EntityId,
    pub kind: DeclarationKind,
}

/// Declarations visible in one scope
#[derive(Debug, Clone, Default)]
pub struct Scope {
    declarations: FxHashMap<String, Declaration>,
}

impl Scope {
    pub fn declare(&mut self, declaration: Declaration) {
        self.declarations
            .insert(declaration.name.clone(), declaration);
    }

    pub fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }
}

/// The resolver's output for one file
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Scope owned by an item or function entity
    scopes: FxHashMap<EntityId, Scope>,
    /// `id:` registrations
    file_scope: Scope,
    /// Identifier entity -> the declaration it resolved to
    links: FxHashMap<EntityId, EntityId>,
    /// Declaration entity -> number of resolved references
    usages: FxHashMap<EntityId, u32>,
    /// Identifiers with no visible declaration (not an error)
    unresolved: Vec<EntityId>,
}

impl SymbolTable {
    pub fn declare(&mut self, owner: Option<EntityId>, declaration: Declaration) {
        match owner {
            Some(owner) => self.scopes.entry(owner).or_default().declare(declaration),
            None => self.file_scope.declare(declaration),
        }
    }

    pub fn scope(&self, owner: EntityId) -> Option<&Scope> {
        self.scopes.get(&owner)
    }

    pub fn lookup(&self, owner: Option<EntityId>, name: &str) -> Option<&Declaration> {
        match owner {
            Some(owner) => self.scopes.get(&owner)?.lookup(name),
            None => self.file_scope.lookup(name),
        }
    }

    /// Link a reference to its declaration and mark the declaration used
    pub fn link(&mut self, identifier: EntityId, declaration: EntityId) {
        self.links.insert(identifier, declaration);
        *self.usages.entry(declaration).or_insert(0) += 1;
    }

    pub fn mark_unresolved(&mut self, identifier: EntityId) {
        self.unresolved.push(identifier);
    }

    pub fn declaration_of(&self, identifier: EntityId) -> Option<EntityId> {
        self.links.get(&identifier).copied()
    }

    pub fn usage_count(&self, declaration: EntityId) -> u32 {
        self.usages.get(&declaration).copied().unwrap_or(0)
    }

    pub fn unresolved(&self) -> &[EntityId] {
        &self.unresolved
    }

    /// Declarations of the given kinds in `owner`'s scope with zero
    /// resolved references, sorted by name for stable reporting
    pub fn unused_in(&self, owner: EntityId, kinds: &[DeclarationKind]) -> Vec<Declaration> {
        let Some(scope) = self.scopes.get(&owner) else {
            return Vec::new();
        };

        let mut unused: Vec<Declaration> = scope
            .declarations()
            .filter(|d| kinds.contains(&d.kind) && self.usage_count(d.entity) == 0)
            .cloned()
            .collect();
        unused.sort_by(|a, b| a.name.cmp(&b.name));
        unused
    }

    /// Unused property (and alias) declarations of an item
    pub fn unused_properties(&self, item: EntityId) -> Vec<Declaration> {
        self.unused_in(item, &[DeclarationKind::Property, DeclarationKind::Alias])
    }

    /// Unused local variables of a function
    pub fn unused_variables(&self, function: EntityId) -> Vec<Declaration> {
        self.unused_in(function, &[DeclarationKind::Variable])
    }

    /// Unused parameters of a function
    pub fn unused_parameters(&self, function: EntityId) -> Vec<Declaration> {
        self.unused_in(function, &[DeclarationKind::Parameter])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_lookup() {
        let mut table = SymbolTable::default();
        let owner = EntityId(1);
        table.declare(
            Some(owner),
            Declaration {
                name: "count".into(),
                entity: EntityId(2),
                kind: DeclarationKind::Property,
            },
        );

        assert!(table.lookup(Some(owner), "count").is_some());
        assert!(table.lookup(Some(owner), "missing").is_none());
        assert!(table.lookup(None, "count").is_none());
    }

    #[test]
    fn test_link_marks_usage() {
        let mut table = SymbolTable::default();
        table.link(EntityId(5), EntityId(2));
        table.link(EntityId(6), EntityId(2));

        assert_eq!(table.usage_count(EntityId(2)), 2);
        assert_eq!(table.declaration_of(EntityId(5)), Some(EntityId(2)));
    }

    #[test]
    fn test_unused_queries_are_sorted() {
        let mut table = SymbolTable::default();
        let owner = EntityId(1);
        for (i, name) in ["zeta", "alpha", "mid"].iter().enumerate() {
            table.declare(
                Some(owner),
                Declaration {
                    name: name.to_string(),
                    entity: EntityId(10 + i as u32),
                    kind: DeclarationKind::Variable,
                },
            );
        }

        let unused = table.unused_variables(owner);
        let names: Vec<_> = unused.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}

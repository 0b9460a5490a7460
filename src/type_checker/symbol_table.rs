use std::collections::HashMap;

use tracing::trace;

use crate::{
    ast::types::Type,
    errors::errors::{Error, ErrorImpl},
    Position,
};

/// Handle to a scope in a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// Handle to a symbol in a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// `int` and `vector`, registered in the global scope
    BuiltInType(Type),
    Variable(Type),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub scope: ScopeId,
    pub position: Position,
}

impl Symbol {
    /// Declared type of a variable, or the type a built-in type name denotes.
    pub fn get_type(&self) -> Type {
        match self.kind {
            SymbolKind::BuiltInType(ty) | SymbolKind::Variable(ty) => ty,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable(_))
    }
}

#[derive(Debug)]
pub struct Scope {
    pub enclosing: Option<ScopeId>,
    pub symbols: HashMap<String, SymbolId>,
    /// Set once resolution has left the scope; no further definitions allowed.
    pub closed: bool,
}

/// Scope tree and symbol storage for one compilation unit.
///
/// Scopes are never removed. Popping a scope only closes it, so nodes that
/// recorded a [`ScopeId`] keep a valid handle for later passes.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Creates a table holding only the global scope, with `int` and
    /// `vector` registered in it.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            scopes: vec![Scope {
                enclosing: None,
                symbols: HashMap::new(),
                closed: false,
            }],
            symbols: vec![],
        };

        for ty in [Type::Int, Type::Vector] {
            let id = SymbolId(table.symbols.len());
            table.symbols.push(Symbol {
                name: ty.name().to_string(),
                kind: SymbolKind::BuiltInType(ty),
                scope: ScopeId(0),
                position: Position::null(),
            });
            table.scopes[0].symbols.insert(ty.name().to_string(), id);
        }

        table
    }

    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Creates a child scope of `enclosing`.
    pub fn push_scope(&mut self, enclosing: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            enclosing: Some(enclosing),
            symbols: HashMap::new(),
            closed: false,
        });
        trace!(scope = id.0, enclosing = enclosing.0, "push scope");
        id
    }

    /// Closes `scope` and returns its enclosing scope.
    pub fn pop_scope(&mut self, scope: ScopeId) -> Option<ScopeId> {
        let scope_ref = &mut self.scopes[scope.0];
        scope_ref.closed = true;
        trace!(scope = scope.0, "pop scope");
        scope_ref.enclosing
    }

    /// Defines a new variable in `scope`.
    ///
    /// Fails when `scope` already holds `name` (shadowing an enclosing scope
    /// is allowed) or when the scope has been closed.
    pub fn define(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: Type,
        position: Position,
    ) -> Result<SymbolId, Error> {
        let scope_ref = &self.scopes[scope.0];

        if scope_ref.closed {
            return Err(Error::new(
                ErrorImpl::ScopeClosed {
                    variable: name.to_string(),
                },
                position,
            ));
        }

        if scope_ref.symbols.contains_key(name) {
            return Err(Error::new(
                ErrorImpl::VariableAlreadyDeclared {
                    variable: name.to_string(),
                },
                position,
            ));
        }

        let id = SymbolId(self.symbols.len());
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Variable(ty),
            scope,
            position,
        });
        self.scopes[scope.0].symbols.insert(name.to_string(), id);

        trace!(name, scope = scope.0, %ty, "define");
        Ok(id)
    }

    /// Looks `name` up in `scope`, then in each enclosing scope.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);

        while let Some(id) = current {
            let scope_ref = &self.scopes[id.0];
            if let Some(symbol) = scope_ref.symbols.get(name) {
                return Some(*symbol);
            }
            current = scope_ref.enclosing;
        }

        None
    }

    /// Looks `name` up in `scope` only.
    pub fn resolve_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes[scope.0].symbols.get(name).copied()
    }

    /// Resolves a type name. Only built-in types are valid type names.
    pub fn resolve_type(&self, scope: ScopeId, name: &str) -> Option<Type> {
        let symbol = self.resolve(scope, name)?;
        match self.symbols[symbol.0].kind {
            SymbolKind::BuiltInType(ty) => Some(ty),
            SymbolKind::Variable(_) => None,
        }
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

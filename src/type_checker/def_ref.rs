//! Name resolution.
//!
//! Builds the scope tree in a [`SymbolTable`] and attaches scopes and symbols
//! to AST nodes. Identifiers are only treated as value references while the
//! walk is below an `Expression` node; declaration targets and type names
//! are handled by their parent's rule.

use tracing::debug;

use crate::{
    ast::{
        ast::{Ast, NodeId, NodeKind},
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
    Position,
};

use super::symbol_table::{ScopeId, SymbolId, SymbolTable};

struct Resolver<'a> {
    ast: &'a mut Ast,
    symbols: &'a mut SymbolTable,
    current_scope: ScopeId,
    num_expr_ancestors: usize,
    /// Symbol whose initializer is being visited
    declaring: Option<SymbolId>,
    errors: Vec<Error>,
}

/// Resolves every name in `ast`, returning all errors found.
///
/// The walk does not stop at the first error. A redeclared name keeps
/// its first declaration.
pub fn resolve_names(ast: &mut Ast, symbols: &mut SymbolTable) -> Vec<Error> {
    let root = ast.root();
    let global = symbols.global_scope();

    let mut resolver = Resolver {
        ast,
        symbols,
        current_scope: global,
        num_expr_ancestors: 0,
        declaring: None,
        errors: vec![],
    };
    resolver.visit(root);

    debug!(
        scopes = resolver.symbols.scope_count(),
        symbols = resolver.symbols.symbol_count(),
        errors = resolver.errors.len(),
        "name resolution finished"
    );
    resolver.errors
}

impl<'a> Resolver<'a> {
    fn visit(&mut self, id: NodeId) {
        match self.ast.kind(id) {
            NodeKind::Program => {
                // Top-level statements live in the global scope with the built-ins.
                self.ast.node_mut(id).scope = Some(self.current_scope);
                self.visit_children(id);
            }
            NodeKind::Block => {
                self.ast.node_mut(id).scope = Some(self.current_scope);
                self.with_scope(|resolver| resolver.visit_children(id));
            }
            NodeKind::VarDeclaration => self.visit_declaration(id),
            NodeKind::Assignment => self.visit_assignment(id),
            NodeKind::Generator | NodeKind::Filter => self.visit_comprehension(id),
            NodeKind::Expression => {
                self.num_expr_ancestors += 1;
                self.visit_children(id);
                self.num_expr_ancestors -= 1;
            }
            NodeKind::Identifier => {
                if self.num_expr_ancestors > 0 {
                    self.resolve_reference(id);
                }
            }
            NodeKind::Conditional
            | NodeKind::Loop
            | NodeKind::Print
            | NodeKind::Range
            | NodeKind::Index
            | NodeKind::BinaryOp(_)
            | NodeKind::Parenthesis
            | NodeKind::IntegerLiteral
            | NodeKind::TypeName => self.visit_children(id),
        }
    }

    fn visit_children(&mut self, id: NodeId) {
        let children = self.ast.children(id).to_vec();
        for child in children {
            self.visit(child);
        }
    }

    /// Runs `f` inside a fresh child of the current scope, then closes it.
    fn with_scope<F: FnOnce(&mut Self)>(&mut self, f: F) -> ScopeId {
        let enclosing = self.current_scope;
        let scope = self.symbols.push_scope(enclosing);
        self.current_scope = scope;

        f(self);

        self.current_scope = self.symbols.pop_scope(scope).unwrap_or(enclosing);
        scope
    }

    fn position_of(&self, id: NodeId) -> Position {
        let node = self.ast.node(id);
        match &node.token {
            Some(token) => token.span.start.clone(),
            None => node.span.start.clone(),
        }
    }

    fn visit_declaration(&mut self, id: NodeId) {
        self.ast.node_mut(id).scope = Some(self.current_scope);

        let (Some(type_name), Some(name)) = (self.ast.child(id, 0), self.ast.child(id, 1)) else {
            return;
        };
        let initializer = self.ast.child(id, 2);

        let type_text = self.ast.node(type_name).text().to_string();
        let ty = self.symbols.resolve_type(self.current_scope, &type_text);
        {
            let type_node = self.ast.node_mut(type_name);
            type_node.scope = Some(self.current_scope);
        }
        if let Some(builtin) = self.symbols.resolve(self.current_scope, &type_text) {
            self.ast.node_mut(type_name).symbol = Some(builtin);
        }

        let (symbol, fresh) = match ty {
            Some(ty) => self.declare(name, ty),
            None => {
                let position = self.position_of(type_name);
                self.errors.push(Error::new(
                    ErrorImpl::UnknownType { type_: type_text },
                    position,
                ));
                (None, false)
            }
        };

        self.ast.node_mut(id).symbol = symbol;

        if let Some(initializer) = initializer {
            let previous = self.declaring;
            // A redeclared name still refers to the earlier variable, which
            // is already initialised.
            self.declaring = if fresh { symbol } else { None };
            self.visit(initializer);
            self.declaring = previous;
        }
    }

    /// Defines the identifier node `name` in the current scope and reports
    /// whether a new symbol was created. On a redeclaration the error is
    /// recorded and the earlier symbol returned.
    fn declare(&mut self, name: NodeId, ty: Type) -> (Option<SymbolId>, bool) {
        let text = self.ast.node(name).text().to_string();
        let position = self.position_of(name);

        let (symbol, fresh) = match self
            .symbols
            .define(self.current_scope, &text, ty, position)
        {
            Ok(symbol) => (Some(symbol), true),
            Err(error) => {
                self.errors.push(error);
                (self.symbols.resolve_local(self.current_scope, &text), false)
            }
        };

        let node = self.ast.node_mut(name);
        node.scope = Some(self.current_scope);
        node.symbol = symbol;
        (symbol, fresh)
    }

    fn visit_assignment(&mut self, id: NodeId) {
        self.ast.node_mut(id).scope = Some(self.current_scope);

        let children = self.ast.children(id).to_vec();
        for child in children.iter().skip(1) {
            self.visit(*child);
        }

        if let Some(target) = children.first() {
            let symbol = self.lookup(*target);
            self.ast.node_mut(id).symbol = symbol;
        }
    }

    fn visit_comprehension(&mut self, id: NodeId) {
        self.ast.node_mut(id).scope = Some(self.current_scope);

        let children = self.ast.children(id).to_vec();
        // Built-in type names always come from the global scope.
        let global = self.symbols.global_scope();
        let bound_type = self
            .symbols
            .resolve_type(global, Type::Int.name())
            .unwrap_or(Type::Int);

        self.with_scope(|resolver| {
            if let Some(bound) = children.first() {
                resolver.declare(*bound, bound_type);
            }
            for child in children.iter().skip(1) {
                resolver.visit(*child);
            }
        });
    }

    fn resolve_reference(&mut self, id: NodeId) {
        let symbol = self.lookup(id);

        if symbol.is_some() && symbol == self.declaring {
            let position = self.position_of(id);
            self.errors.push(Error::new(
                ErrorImpl::VariableUsedInOwnInitializer {
                    variable: self.ast.node(id).text().to_string(),
                },
                position,
            ));
        }
    }

    /// Resolves the identifier node `id` and records scope and symbol on it.
    fn lookup(&mut self, id: NodeId) -> Option<SymbolId> {
        let name = self.ast.node(id).text().to_string();
        let symbol = self
            .symbols
            .resolve(self.current_scope, &name)
            .filter(|symbol| self.symbols.symbol(*symbol).is_variable());

        if symbol.is_none() {
            let position = self.position_of(id);
            self.errors.push(Error::new(
                ErrorImpl::VariableNotDeclared { variable: name },
                position,
            ));
        }

        let node = self.ast.node_mut(id);
        node.scope = Some(self.current_scope);
        node.symbol = symbol;
        symbol
    }
}

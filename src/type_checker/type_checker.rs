use tracing::{debug, trace};

use crate::{
    ast::{
        ast::{Ast, NodeId, NodeKind},
        types::{promote, Type},
    },
    errors::errors::{Error, ErrorImpl},
};

use super::symbol_table::SymbolTable;

pub struct TypeChecker<'a> {
    ast: &'a mut Ast,
    symbols: &'a SymbolTable,
    errors: Vec<Error>,
}

/// Computes `eval_type` for every expression node and `promote_to_type` for
/// every binary operand that needs broadcasting.
///
/// Expects a resolved AST. Running it again on the same AST produces the
/// same annotations. Nodes whose operands have no type are left untyped
/// rather than reported twice.
pub fn compute_types(ast: &mut Ast, symbols: &SymbolTable) -> Vec<Error> {
    let root = ast.root();
    let mut checker = TypeChecker {
        ast,
        symbols,
        errors: vec![],
    };
    checker.visit(root);

    debug!(errors = checker.errors.len(), "type computation finished");
    checker.errors
}

impl<'a> TypeChecker<'a> {
    fn visit(&mut self, id: NodeId) -> Option<Type> {
        let children = self.ast.children(id).to_vec();

        let eval_type = match self.ast.kind(id) {
            NodeKind::IntegerLiteral => Some(Type::Int),
            NodeKind::Identifier => self.ast.node(id).symbol.and_then(|symbol| {
                let symbol = self.symbols.symbol(symbol);
                symbol.is_variable().then(|| symbol.get_type())
            }),
            NodeKind::Expression | NodeKind::Parenthesis => {
                let mut ty = None;
                for child in children {
                    ty = self.visit(child);
                }
                ty
            }
            NodeKind::Range => {
                self.visit_all(&children);
                Some(Type::Vector)
            }
            NodeKind::Index => {
                let types = self.visit_all(&children);
                if let Some(base) = children.first() {
                    self.expect(*base, types.first().copied().flatten(), Type::Vector);
                }
                if let Some(index) = children.get(1) {
                    self.expect(*index, types.get(1).copied().flatten(), Type::Int);
                }
                Some(Type::Int)
            }
            NodeKind::BinaryOp(operator) => {
                let types = self.visit_all(&children);
                match (children.as_slice(), types.as_slice()) {
                    ([left, right], [Some(left_type), Some(right_type)]) => {
                        let promotion = promote(*left_type, *right_type);
                        self.ast.node_mut(*left).promote_to_type = promotion.promote_left;
                        self.ast.node_mut(*right).promote_to_type = promotion.promote_right;

                        if promotion.promote_left.is_some() || promotion.promote_right.is_some() {
                            trace!(
                                operator = operator.symbol(),
                                left = %left_type,
                                right = %right_type,
                                "broadcast scalar operand"
                            );
                        }
                        Some(promotion.result)
                    }
                    _ => None,
                }
            }
            NodeKind::Generator | NodeKind::Filter => {
                // The bound identifier is a declaration, not a value.
                let domain = children.get(1).copied();
                let body = children.get(2).copied();

                if let Some(domain) = domain {
                    let ty = self.visit(domain);
                    self.expect(domain, ty, Type::Vector);
                }
                if let Some(body) = body {
                    let ty = self.visit(body);
                    self.expect(body, ty, Type::Int);
                }
                Some(Type::Vector)
            }
            NodeKind::VarDeclaration => {
                let declared = children
                    .first()
                    .and_then(|type_name| Type::from_name(self.ast.node(*type_name).text()));

                if let Some(initializer) = children.get(2) {
                    let ty = self.visit(*initializer);
                    if let Some(declared) = declared {
                        self.expect(*initializer, ty, declared);
                    }
                }
                None
            }
            NodeKind::Assignment => {
                let declared = self
                    .ast
                    .node(id)
                    .symbol
                    .map(|symbol| self.symbols.symbol(symbol).get_type());

                if let Some(value) = children.get(1) {
                    let ty = self.visit(*value);
                    if let Some(declared) = declared {
                        self.expect(*value, ty, declared);
                    }
                }
                None
            }
            NodeKind::Conditional | NodeKind::Loop => {
                if let Some(condition) = children.first() {
                    let ty = self.visit(*condition);
                    self.expect(*condition, ty, Type::Int);
                }
                for child in children.iter().skip(1) {
                    self.visit(*child);
                }
                None
            }
            NodeKind::Program | NodeKind::Block | NodeKind::Print | NodeKind::TypeName => {
                self.visit_all(&children);
                None
            }
        };

        self.ast.node_mut(id).eval_type = eval_type;
        eval_type
    }

    fn visit_all(&mut self, children: &[NodeId]) -> Vec<Option<Type>> {
        children.iter().map(|child| self.visit(*child)).collect()
    }

    /// Reports a mismatch when `actual` is known and differs from `expected`.
    fn expect(&mut self, id: NodeId, actual: Option<Type>, expected: Type) {
        match actual {
            Some(actual) if actual != expected => {
                self.errors.push(Error::new(
                    ErrorImpl::TypeMatchError {
                        expected: expected.to_string(),
                        received: actual.to_string(),
                    },
                    self.ast.node(id).span.start.clone(),
                ));
            }
            _ => {}
        }
    }
}

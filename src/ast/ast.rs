use std::fmt::{Debug, Display};

use crate::{
    lexer::tokens::Token,
    type_checker::symbol_table::{ScopeId, SymbolId},
    Span,
};

use super::types::Type;

/// Handle to a node stored in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Binary operator kinds. Arithmetic and comparison share promotion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    GreaterThan,
    LessThan,
    Equal,
    NotEqual,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan | Operator::LessThan | Operator::Equal | Operator::NotEqual
        )
    }
}

/// Node kinds
///
/// Child layout per kind:
/// - `Program`, `Block`: statements in order
/// - `VarDeclaration`: type name, identifier, optional initializer expression
/// - `Assignment`: identifier, expression
/// - `Conditional`, `Loop`: condition expression, block
/// - `Print`: expression
/// - `Expression`, `Parenthesis`: the wrapped expression
/// - `Range`, `Index`, `BinaryOp`: left, right
/// - `Generator`, `Filter`: bound identifier, domain expression, body expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    Block,
    VarDeclaration,
    Assignment,
    Conditional,
    Loop,
    Print,
    Expression,
    Range,
    Index,
    Generator,
    Filter,
    BinaryOp(Operator),
    Parenthesis,
    Identifier,
    IntegerLiteral,
    TypeName,
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::BinaryOp(operator) => write!(f, "{}", operator.symbol()),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// A single AST node.
///
/// The shape fields (`kind`, `children`, `token`, `span`) are fixed by the
/// parser. The remaining fields are annotations, each written by one pass.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub token: Option<Token>,
    pub span: Span,
    /// Set by resolution
    pub scope: Option<ScopeId>,
    /// Set by resolution
    pub symbol: Option<SymbolId>,
    /// Set by type computation
    pub eval_type: Option<Type>,
    /// Set by type computation
    pub promote_to_type: Option<Type>,
}

impl Node {
    /// Source text of the node's token, empty for token-less nodes.
    pub fn text(&self) -> &str {
        self.token
            .as_ref()
            .map(|token| token.value.as_str())
            .unwrap_or("")
    }
}

/// Arena holding every node of a compilation unit.
///
/// Node identity is the index into the arena, so it stays stable across
/// passes that only annotate nodes.
#[derive(Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    pub fn new() -> Self {
        Ast {
            nodes: vec![],
            root: NodeId(0),
        }
    }

    pub fn add_node(
        &mut self,
        kind: NodeKind,
        children: Vec<NodeId>,
        token: Option<Token>,
        span: Span,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            children,
            token,
            span,
            scope: None,
            symbol: None,
            eval_type: None,
            promote_to_type: None,
        });
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.0].children.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of every node in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Parenthesised tree dump, e.g. `(Program (Print (Expression 5)))`.
    /// Leaves print their source text.
    pub fn to_string_tree(&self) -> String {
        let mut out = String::new();
        self.write_tree(self.root, &mut out);
        out
    }

    fn write_tree(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);

        if node.children.is_empty() && node.token.is_some() {
            out.push_str(node.text());
            return;
        }

        out.push('(');
        out.push_str(&node.kind.to_string());
        for child in &node.children {
            out.push(' ');
            self.write_tree(*child, out);
        }
        out.push(')');
    }
}

impl Default for Ast {
    fn default() -> Self {
        Ast::new()
    }
}

impl Debug for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_tree())
    }
}

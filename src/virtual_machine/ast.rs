//! Syntax tree consumed by the emitter.
//!
//! The parser is external; these types are the contract it has to produce.
//! Every node kind is a closed variant, so the emitter dispatches with a
//! plain `match`.

use std::fmt;

/// Value-producing expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Literal(i32),
    Identifier(String),
    Operator(Box<OperatorNode>),
}

impl Expr {
    pub fn literal(value: i32) -> Self {
        Expr::Literal(value)
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn operator(kind: OperatorKind, left: Expr, right: Expr) -> Self {
        Expr::Operator(Box::new(OperatorNode::new(kind, left, right)))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Expr::Literal(_) => NodeKind::Literal,
            Expr::Identifier(_) => NodeKind::Identifier,
            Expr::Operator(_) => NodeKind::Operator,
        }
    }
}

/// Binary operators. Comparisons produce `0` or `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    Greater,
}

impl OperatorKind {
    pub const fn symbol(self) -> &'static str {
        match self {
            OperatorKind::Add => "+",
            OperatorKind::Sub => "-",
            OperatorKind::Mul => "*",
            OperatorKind::Div => "/",
            OperatorKind::Equal => "==",
            OperatorKind::NotEqual => "!=",
            OperatorKind::Less => "<",
            OperatorKind::Greater => ">",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorNode {
    pub kind: OperatorKind,
    pub left: Expr,
    pub right: Expr,
}

impl OperatorNode {
    pub fn new(kind: OperatorKind, left: Expr, right: Expr) -> Self {
        Self { kind, left, right }
    }

    pub fn left(&self) -> &Expr {
        &self.left
    }

    pub fn right(&self) -> &Expr {
        &self.right
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefinitionNode {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallNode {
    pub name: String,
    pub args: Vec<Expr>,
}

/// Statement-level node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// `target = value`
    Assign { target: String, value: Expr },
    Print(Expr),
    /// Runs `body` when `condition` is non-zero, `otherwise` when it is zero.
    If {
        condition: Expr,
        body: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },
    Definition(DefinitionNode),
    /// Operator evaluated for its effect only; the result is discarded.
    Operator(OperatorNode),
    Call(CallNode),
}

impl Node {
    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Node::Assign {
            target: target.into(),
            value,
        }
    }

    pub fn definition(name: impl Into<String>, params: &[&str], body: Vec<Node>) -> Self {
        Node::Definition(DefinitionNode {
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Node::Call(CallNode {
            name: name.into(),
            args,
        })
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Assign { .. } => NodeKind::Assign,
            Node::Print(_) => NodeKind::Print,
            Node::If { .. } => NodeKind::If,
            Node::Definition(_) => NodeKind::Definition,
            Node::Operator(_) => NodeKind::Operator,
            Node::Call(_) => NodeKind::Call,
        }
    }
}

/// Discriminant of [`Node`] and [`Expr`] for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Assign,
    Print,
    If,
    Definition,
    Operator,
    Call,
    Literal,
    Identifier,
}

impl NodeKind {
    pub const fn name(self) -> &'static str {
        match self {
            NodeKind::Assign => "assignment",
            NodeKind::Print => "print",
            NodeKind::If => "conditional",
            NodeKind::Definition => "definition",
            NodeKind::Operator => "operator",
            NodeKind::Call => "call",
            NodeKind::Literal => "literal",
            NodeKind::Identifier => "identifier",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_children() {
        let node = OperatorNode::new(OperatorKind::Sub, Expr::literal(1), Expr::ident("x"));
        assert_eq!(node.left(), &Expr::Literal(1));
        assert_eq!(node.right(), &Expr::Identifier("x".into()));
    }

    #[test]
    fn node_kinds() {
        assert_eq!(Node::Print(Expr::literal(1)).kind(), NodeKind::Print);
        assert_eq!(Node::call("f", vec![]).kind().name(), "call");
        assert_eq!(Node::definition("f", &["a"], vec![]).kind(), NodeKind::Definition);
        assert_eq!(Expr::ident("a").kind(), NodeKind::Identifier);
    }

    #[test]
    fn operator_symbols() {
        assert_eq!(OperatorKind::NotEqual.to_string(), "!=");
        assert_eq!(OperatorKind::Div.symbol(), "/");
    }
}

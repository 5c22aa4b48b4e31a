// src/ast.rs

//! Script AST handed to the engine by the parser.
//!
//! The tree is immutable once built: the engine only ever borrows it, and
//! variable expansion produces owned copies of individual commands.

use std::fmt;

/// A complete script: an ordered list of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptNode {
    pub nodes: Vec<Node>,
}

impl ScriptNode {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl From<Vec<Node>> for ScriptNode {
    fn from(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

/// Closed set of node kinds the engine knows how to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Command(CommandNode),
    Pipe(PipeNode),
    Redirect(RedirectNode),
    If(IfNode),
    For(ForNode),
    While(WhileNode),
    Assignment(AssignmentNode),
}

impl Node {
    /// Short, stable name of the node kind (used in errors and logs).
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Command(_) => "command",
            Node::Pipe(_) => "pipe",
            Node::Redirect(_) => "redirect",
            Node::If(_) => "if",
            Node::For(_) => "for",
            Node::While(_) => "while",
            Node::Assignment(_) => "assignment",
        }
    }

    /// Fold a list of commands into a left-associative pipe chain.
    ///
    /// `[a, b, c]` becomes `Pipe(Pipe(a, b), c)`. A single command is
    /// returned as-is; an empty list yields `None`.
    pub fn pipeline(commands: Vec<CommandNode>) -> Option<Node> {
        let mut iter = commands.into_iter();
        let first = Node::Command(iter.next()?);
        Some(iter.fold(first, |left, right| {
            Node::Pipe(PipeNode::new(left, Node::Command(right)))
        }))
    }
}

impl From<CommandNode> for Node {
    fn from(cmd: CommandNode) -> Self {
        Node::Command(cmd)
    }
}

/// A single command invocation, optionally with one redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNode {
    pub name: String,
    pub args: Vec<String>,
    pub redirect: Option<RedirectNode>,
}

impl CommandNode {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            redirect: None,
        }
    }

    pub fn with_redirect(mut self, redirect: RedirectNode) -> Self {
        self.redirect = Some(redirect);
        self
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        if let Some(redirect) = &self.redirect {
            write!(f, " {redirect}")?;
        }
        Ok(())
    }
}

/// Binary pipe between two nodes; chains nest on the left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeNode {
    pub left: Box<Node>,
    pub right: Box<Node>,
}

impl PipeNode {
    pub fn new(left: Node, right: Node) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// I/O redirection attached to a command.
///
/// `op` is kept as the raw operator text; unsupported operators are only
/// rejected when the command runs, as a failed command result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectNode {
    pub op: String,
    pub target: String,
    pub fd: u32,
}

impl RedirectNode {
    pub fn new(op: impl Into<String>, target: impl Into<String>, fd: u32) -> Self {
        Self {
            op: op.into(),
            target: target.into(),
            fd,
        }
    }

    /// `> target` on stdout.
    pub fn truncate(target: impl Into<String>) -> Self {
        Self::new(">", target, 1)
    }

    /// `>> target` on stdout.
    pub fn append(target: impl Into<String>) -> Self {
        Self::new(">>", target, 1)
    }

    /// `< target`.
    pub fn input(target: impl Into<String>) -> Self {
        Self::new("<", target, 0)
    }
}

impl fmt::Display for RedirectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op.as_str() {
            "2>&1" => write!(f, "2>&1"),
            ">" | ">>" if self.fd == 2 => write!(f, "2{} {}", self.op, self.target),
            op => write!(f, "{op} {}", self.target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfNode {
    pub condition: Box<Node>,
    pub then_body: ScriptNode,
    pub else_body: Option<ScriptNode>,
}

impl IfNode {
    pub fn new(condition: Node, then_body: ScriptNode, else_body: Option<ScriptNode>) -> Self {
        Self {
            condition: Box::new(condition),
            then_body,
            else_body,
        }
    }
}

/// `for variable in items; do body; done` over a pre-materialized item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForNode {
    pub variable: String,
    pub items: Vec<String>,
    pub body: ScriptNode,
}

impl ForNode {
    pub fn new<I, S>(variable: impl Into<String>, items: I, body: ScriptNode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variable: variable.into(),
            items: items.into_iter().map(Into::into).collect(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileNode {
    pub condition: Box<Node>,
    pub body: ScriptNode,
}

impl WhileNode {
    pub fn new(condition: Node, body: ScriptNode) -> Self {
        Self {
            condition: Box::new(condition),
            body,
        }
    }
}

/// `NAME=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentNode {
    pub name: String,
    pub value: String,
}

impl AssignmentNode {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_folds_left_associatively() {
        let node = Node::pipeline(vec![
            CommandNode::new("a", Vec::<String>::new()),
            CommandNode::new("b", Vec::<String>::new()),
            CommandNode::new("c", Vec::<String>::new()),
        ])
        .expect("non-empty pipeline");

        let Node::Pipe(outer) = node else {
            panic!("expected pipe, got {node:?}");
        };
        assert!(matches!(*outer.right, Node::Command(ref c) if c.name == "c"));
        let Node::Pipe(inner) = *outer.left else {
            panic!("expected nested pipe on the left");
        };
        assert!(matches!(*inner.left, Node::Command(ref c) if c.name == "a"));
        assert!(matches!(*inner.right, Node::Command(ref c) if c.name == "b"));
    }

    #[test]
    fn empty_pipeline_is_none() {
        assert!(Node::pipeline(Vec::new()).is_none());
    }

    #[test]
    fn command_display_quotes_whitespace_args() {
        let cmd = CommandNode::new("echo", ["hello world", "x"])
            .with_redirect(RedirectNode::append("out.txt"));
        assert_eq!(cmd.to_string(), "echo \"hello world\" x >> out.txt");
    }
}

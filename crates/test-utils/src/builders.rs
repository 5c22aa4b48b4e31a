#![allow(dead_code)]

//! Shorthand constructors for AST nodes in tests.

use shode::ast::{
    AssignmentNode, CommandNode, ForNode, IfNode, Node, RedirectNode, ScriptNode, WhileNode,
};

/// A command node from a name and args.
pub fn cmd(name: &str, args: &[&str]) -> CommandNode {
    CommandNode::new(name, args.iter().copied())
}

/// A command with a redirect attached.
pub fn redirected(name: &str, args: &[&str], redirect: RedirectNode) -> CommandNode {
    cmd(name, args).with_redirect(redirect)
}

pub fn script<I>(nodes: I) -> ScriptNode
where
    I: IntoIterator<Item = Node>,
{
    ScriptNode::new(nodes.into_iter().collect())
}

/// Fold commands into a left-associative pipe.
pub fn pipe(stages: Vec<CommandNode>) -> Node {
    Node::pipeline(stages).expect("pipe() needs at least one stage")
}

pub fn if_(condition: CommandNode, then_body: ScriptNode, else_body: Option<ScriptNode>) -> Node {
    Node::If(IfNode::new(condition.into(), then_body, else_body))
}

pub fn for_(variable: &str, items: &[&str], body: ScriptNode) -> Node {
    Node::For(ForNode::new(variable, items.iter().copied(), body))
}

pub fn while_(condition: CommandNode, body: ScriptNode) -> Node {
    Node::While(WhileNode::new(condition.into(), body))
}

pub fn assign(name: &str, value: &str) -> Node {
    Node::Assignment(AssignmentNode::new(name, value))
}

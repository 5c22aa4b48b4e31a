// src/parser.rs

//! Line-oriented script parser.
//!
//! Supported syntax, one or more commands per line:
//!
//! - words separated by whitespace, with `'...'` and `"..."` quoting;
//! - `;` between commands and `|` between pipeline stages;
//! - one redirection per command: `>`, `>>`, `<`, `&>`, `2>`, `2>>`, `1>`,
//!   `1>>`, `2>&1`;
//! - `NAME=value` assignments;
//! - blank lines and `#` comments.
//!
//! Text inside single quotes is never expanded: every `$` in it is emitted
//! as `\$`, which variable expansion turns back into a literal `$`.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::ast::{AssignmentNode, CommandNode, Node, RedirectNode, ScriptNode};
use crate::env::expand::is_valid_name;
use crate::errors::{Result, ShodeError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Semi,
    Pipe,
    Redirect { op: &'static str, fd: u32 },
}

pub fn parse_file(path: impl AsRef<Path>) -> Result<ScriptNode> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).with_context(|| format!("reading script {:?}", path))?;
    parse_script(&source)
}

pub fn parse_script(source: &str) -> Result<ScriptNode> {
    let mut nodes = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        parse_line(line, idx + 1, &mut nodes)?;
    }
    Ok(ScriptNode::new(nodes))
}

fn parse_line(line: &str, line_no: usize, nodes: &mut Vec<Node>) -> Result<()> {
    let tokens = tokenize(line, line_no)?;

    for segment in tokens.split(|t| *t == Token::Semi) {
        if segment.is_empty() {
            continue;
        }

        let mut commands = Vec::new();
        for stage in segment.split(|t| *t == Token::Pipe) {
            if stage.is_empty() {
                return Err(ShodeError::parse(line_no, "empty command in pipeline"));
            }
            commands.push(parse_command(stage, line_no)?);
        }

        if let [single] = commands.as_slice() {
            if let Some(assignment) = as_assignment(single) {
                nodes.push(Node::Assignment(assignment));
                continue;
            }
        }

        nodes.extend(Node::pipeline(commands));
    }
    Ok(())
}

fn parse_command(tokens: &[Token], line_no: usize) -> Result<CommandNode> {
    let mut words = Vec::new();
    let mut redirect: Option<RedirectNode> = None;
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        match token {
            Token::Word(word) => words.push(word.clone()),
            Token::Redirect { op, fd } => {
                if redirect.is_some() {
                    return Err(ShodeError::parse(
                        line_no,
                        "only one redirection per command is supported",
                    ));
                }
                let target = if *op == "2>&1" {
                    String::new()
                } else {
                    match iter.next() {
                        Some(Token::Word(target)) => target.clone(),
                        _ => {
                            return Err(ShodeError::parse(
                                line_no,
                                format!("missing target after '{op}'"),
                            ));
                        }
                    }
                };
                redirect = Some(RedirectNode::new(*op, target, *fd));
            }
            // `;` and `|` are split out before we get here.
            Token::Semi | Token::Pipe => {}
        }
    }

    let Some((name, args)) = words.split_first() else {
        return Err(ShodeError::parse(line_no, "redirection without a command"));
    };
    let mut cmd = CommandNode::new(name.clone(), args.iter().cloned());
    cmd.redirect = redirect;
    Ok(cmd)
}

fn as_assignment(cmd: &CommandNode) -> Option<AssignmentNode> {
    if !cmd.args.is_empty() || cmd.redirect.is_some() {
        return None;
    }
    let (name, value) = cmd.name.split_once('=')?;
    is_valid_name(name).then(|| AssignmentNode::new(name, value))
}

fn tokenize(line: &str, line_no: usize) -> Result<Vec<Token>> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut i = 0;

    let flush = |tokens: &mut Vec<Token>, word: &mut String, in_word: &mut bool| {
        if *in_word {
            tokens.push(Token::Word(std::mem::take(word)));
            *in_word = false;
        }
    };
    let starts_with = |at: usize, pat: &str| {
        let mut idx = at;
        for p in pat.chars() {
            if chars.get(idx) != Some(&p) {
                return false;
            }
            idx += 1;
        }
        true
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                flush(&mut tokens, &mut word, &mut in_word);
                i += 1;
            }
            '#' if !in_word => break,
            ';' => {
                flush(&mut tokens, &mut word, &mut in_word);
                tokens.push(Token::Semi);
                i += 1;
            }
            '|' => {
                flush(&mut tokens, &mut word, &mut in_word);
                tokens.push(Token::Pipe);
                i += 1;
            }
            '<' => {
                flush(&mut tokens, &mut word, &mut in_word);
                tokens.push(Token::Redirect { op: "<", fd: 0 });
                i += 1;
            }
            '>' => {
                flush(&mut tokens, &mut word, &mut in_word);
                if starts_with(i, ">>") {
                    tokens.push(Token::Redirect { op: ">>", fd: 1 });
                    i += 2;
                } else {
                    tokens.push(Token::Redirect { op: ">", fd: 1 });
                    i += 1;
                }
            }
            '&' => {
                if !starts_with(i, "&>") {
                    return Err(ShodeError::parse(line_no, "background jobs ('&') are not supported"));
                }
                flush(&mut tokens, &mut word, &mut in_word);
                tokens.push(Token::Redirect { op: "&>", fd: 1 });
                i += 2;
            }
            '1' | '2' if !in_word && starts_with(i + 1, ">") => {
                let fd = if c == '1' { 1 } else { 2 };
                if starts_with(i, "2>&1") {
                    tokens.push(Token::Redirect { op: "2>&1", fd: 2 });
                    i += 4;
                } else if starts_with(i + 1, ">>") {
                    tokens.push(Token::Redirect { op: ">>", fd });
                    i += 3;
                } else {
                    tokens.push(Token::Redirect { op: ">", fd });
                    i += 2;
                }
            }
            '\'' => {
                in_word = true;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ShodeError::parse(line_no, "unterminated single quote")),
                        Some('\'') => break,
                        Some('$') => word.push_str("\\$"),
                        Some(&other) => word.push(other),
                    }
                    i += 1;
                }
                i += 1;
            }
            '"' => {
                in_word = true;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ShodeError::parse(line_no, "unterminated double quote")),
                        Some('"') => break,
                        Some('\\') if matches!(chars.get(i + 1), Some('"') | Some('\\')) => {
                            word.push(chars[i + 1]);
                            i += 1;
                        }
                        Some(&other) => word.push(other),
                    }
                    i += 1;
                }
                i += 1;
            }
            '\\' => {
                in_word = true;
                match chars.get(i + 1) {
                    // Keep the escape so expansion sees a literal `$`.
                    Some('$') => word.push_str("\\$"),
                    Some(&next) => word.push(next),
                    None => word.push('\\'),
                }
                i += 2;
            }
            other => {
                in_word = true;
                word.push(other);
                i += 1;
            }
        }
    }

    flush(&mut tokens, &mut word, &mut in_word);
    Ok(tokens)
}

//! # Tag Expression Module / 标签表达式模块
//!
//! This module parses and evaluates boolean expressions over scenario tags.
//! Expressions combine tag literals with `&&`, `||`, `~` and parentheses,
//! for example `@e2e-performance && @docker-compose && ~@ebpf`.
//!
//! 此模块解析并求值基于场景标签的布尔表达式。
//! 表达式使用 `&&`、`||`、`~` 和括号组合标签字面量，
//! 例如 `@e2e-performance && @docker-compose && ~@ebpf`。
//!
//! ## Precedence / 优先级
//!
//! From lowest to highest: `||`, `&&`, `~`, then parenthesised groups and tags.
//!
//! 从低到高：`||`、`&&`、`~`，然后是括号分组和标签。

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Deepest nesting of groups and operators a parsed expression may have.
/// 已解析表达式允许的分组和运算符的最大嵌套深度。
pub const MAX_NESTING_DEPTH: usize = 256;

/// A malformed tag expression, with the 0-based character position of the
/// offending token.
/// 格式错误的标签表达式，附带出错记号的字符位置（从 0 开始）。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at position {position}: {message}")]
pub struct SyntaxError {
    pub position: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// A parsed, immutable tag expression.
/// 已解析的、不可变的标签表达式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagExpression {
    /// Produced by an empty expression; matches every tag set.
    /// 由空表达式产生；匹配所有标签集合。
    Always,
    /// A single tag, stored without its `@` prefix.
    /// 单个标签，存储时不带 `@` 前缀。
    Tag(String),
    Not(Box<TagExpression>),
    And(Box<TagExpression>, Box<TagExpression>),
    Or(Box<TagExpression>, Box<TagExpression>),
}

/// Strips the optional `@` marker from a tag.
pub fn normalize_tag(tag: &str) -> &str {
    tag.strip_prefix('@').unwrap_or(tag)
}

impl TagExpression {
    /// Parses a tag expression. Empty or whitespace-only input yields
    /// [`TagExpression::Always`].
    ///
    /// 解析标签表达式。空输入或仅包含空白的输入会得到 [`TagExpression::Always`]。
    pub fn parse(input: &str) -> Result<Self, SyntaxError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Ok(TagExpression::Always);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: input.chars().count(),
            group_depth: 0,
        };
        let (expr, _) = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(SyntaxError::new(
                token.position,
                format!("unexpected {}", token.kind.describe()),
            ));
        }
        Ok(expr)
    }

    /// Evaluates the expression against a scenario's tag set.
    /// Tags absent from the set simply do not match.
    ///
    /// 针对场景的标签集合对表达式求值。集合中不存在的标签只是不匹配。
    pub fn evaluate(&self, tags: &BTreeSet<String>) -> bool {
        match self {
            TagExpression::Always => true,
            TagExpression::Tag(tag) => tags.contains(tag.as_str()),
            TagExpression::Not(inner) => !inner.evaluate(tags),
            TagExpression::And(lhs, rhs) => lhs.evaluate(tags) && rhs.evaluate(tags),
            TagExpression::Or(lhs, rhs) => lhs.evaluate(tags) || rhs.evaluate(tags),
        }
    }

    /// Combines two fragments with AND. `Always` is the identity.
    ///
    /// 用 AND 组合两个片段。`Always` 是单位元。
    pub fn and(self, other: TagExpression) -> TagExpression {
        match (self, other) {
            (TagExpression::Always, expr) | (expr, TagExpression::Always) => expr,
            (lhs, rhs) => TagExpression::And(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, TagExpression::Always)
    }

    /// Returns every tag referenced by the expression.
    pub fn tags(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_tags(&mut out);
        out
    }

    fn collect_tags<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            TagExpression::Always => {}
            TagExpression::Tag(tag) => {
                out.insert(tag.as_str());
            }
            TagExpression::Not(inner) => inner.collect_tags(out),
            TagExpression::And(lhs, rhs) | TagExpression::Or(lhs, rhs) => {
                lhs.collect_tags(out);
                rhs.collect_tags(out);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            TagExpression::Or(..) => 1,
            TagExpression::And(..) => 2,
            TagExpression::Not(..) => 3,
            TagExpression::Always | TagExpression::Tag(_) => 4,
        }
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        let wrap = self.precedence() < min_precedence;
        if wrap {
            f.write_str("(")?;
        }
        match self {
            TagExpression::Always => {}
            TagExpression::Tag(tag) => write!(f, "@{tag}")?,
            TagExpression::Not(inner) => {
                f.write_str("~")?;
                inner.fmt_with(f, 3)?;
            }
            TagExpression::And(lhs, rhs) => {
                lhs.fmt_with(f, 2)?;
                f.write_str(" && ")?;
                rhs.fmt_with(f, 3)?;
            }
            TagExpression::Or(lhs, rhs) => {
                lhs.fmt_with(f, 1)?;
                f.write_str(" || ")?;
                rhs.fmt_with(f, 2)?;
            }
        }
        if wrap {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for TagExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with(f, 0)
    }
}

impl FromStr for TagExpression {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagExpression::parse(s)
    }
}

impl Default for TagExpression {
    fn default() -> Self {
        TagExpression::Always
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Tag(String),
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::And => "'&&'".to_string(),
            TokenKind::Or => "'||'".to_string(),
            TokenKind::Not => "'~'".to_string(),
            TokenKind::Tag(tag) => format!("tag '@{tag}'"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn is_tag_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '&' | '|' | '~' | '@')
}

fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let kind = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            '~' => {
                i += 1;
                TokenKind::Not
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(SyntaxError::new(start, format!("expected '{c}{c}'")));
                }
                i += 2;
                if c == '&' { TokenKind::And } else { TokenKind::Or }
            }
            _ => {
                if c == '@' {
                    i += 1;
                }
                let name_start = i;
                while i < chars.len() && is_tag_char(chars[i]) {
                    i += 1;
                }
                if i == name_start {
                    return Err(SyntaxError::new(start, "expected a tag name after '@'"));
                }
                TokenKind::Tag(chars[name_start..i].iter().collect())
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
    }

    Ok(tokens)
}

/// Recursive-descent parser over the token stream.
/// Every parse function also returns the depth of the tree it built.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    group_depth: usize,
}

type Parsed = Result<(TagExpression, usize), SyntaxError>;

fn too_deep(position: usize) -> SyntaxError {
    SyntaxError::new(position, "expression nested too deeply")
}

fn deepen(depth: usize, position: usize) -> Result<usize, SyntaxError> {
    if depth >= MAX_NESTING_DEPTH {
        Err(too_deep(position))
    } else {
        Ok(depth + 1)
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consumes a token of `kind` and returns its position.
    fn eat(&mut self, kind: &TokenKind) -> Option<usize> {
        let position = self
            .peek()
            .filter(|t| &t.kind == kind)
            .map(|t| t.position)?;
        self.pos += 1;
        Some(position)
    }

    fn parse_or(&mut self) -> Parsed {
        let (mut lhs, mut depth) = self.parse_and()?;
        while let Some(position) = self.eat(&TokenKind::Or) {
            let (rhs, rhs_depth) = self.parse_and()?;
            depth = deepen(depth.max(rhs_depth), position)?;
            lhs = TagExpression::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok((lhs, depth))
    }

    fn parse_and(&mut self) -> Parsed {
        let (mut lhs, mut depth) = self.parse_unary()?;
        while let Some(position) = self.eat(&TokenKind::And) {
            let (rhs, rhs_depth) = self.parse_unary()?;
            depth = deepen(depth.max(rhs_depth), position)?;
            lhs = TagExpression::And(Box::new(lhs), Box::new(rhs));
        }
        Ok((lhs, depth))
    }

    /// A run of `~` is read in a loop. Runs longer than two keep their parity,
    /// so `~~~@a` becomes `~@a` and `~~~~@a` becomes `~~@a`.
    fn parse_unary(&mut self) -> Parsed {
        let mut negations = 0usize;
        let mut first = None;
        while let Some(position) = self.eat(&TokenKind::Not) {
            first.get_or_insert(position);
            negations += 1;
        }

        let (mut expr, mut depth) = self.parse_primary()?;
        if negations > 2 {
            negations = 2 - negations % 2;
        }
        for _ in 0..negations {
            depth = deepen(depth, first.unwrap_or(self.end))?;
            expr = TagExpression::Not(Box::new(expr));
        }
        Ok((expr, depth))
    }

    fn parse_primary(&mut self) -> Parsed {
        match self.next() {
            Some(Token {
                kind: TokenKind::Tag(tag),
                ..
            }) => Ok((TagExpression::Tag(tag), 1)),
            Some(Token {
                kind: TokenKind::LParen,
                position,
            }) => {
                if self.group_depth >= MAX_NESTING_DEPTH {
                    return Err(too_deep(position));
                }
                self.group_depth += 1;
                let inner = self.parse_or()?;
                self.group_depth -= 1;
                if self.eat(&TokenKind::RParen).is_some() {
                    Ok(inner)
                } else {
                    Err(SyntaxError::new(position, "unbalanced '(': missing ')'"))
                }
            }
            Some(token) => Err(SyntaxError::new(
                token.position,
                format!("unexpected {}, expected a tag or '('", token.kind.describe()),
            )),
            None => Err(SyntaxError::new(
                self.end,
                "unexpected end of expression, expected a tag or '('",
            )),
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flat token stream consumed by the block transducer
//!
//! Block structure is expressed as open/close pairs; inline content is a
//! single `Inline` token carrying an ordered list of children. Tokens are
//! read-only input: the transducer only borrows them.

use crate::ast::ListKind;
use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::slice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Token {
    HeadingOpen {
        level: u8,
    },
    HeadingClose,
    ParagraphOpen,
    ParagraphClose,
    Inline {
        content: String,
        children: Vec<InlineChild>,
    },
    ListOpen {
        kind: ListKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<u32>,
    },
    ListClose,
    ListItemOpen,
    ListItemClose,
    /// Indented or fenced code
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<String>,
        content: String,
    },
    Rule,
    MathBlock {
        content: String,
    },
    BlockQuoteOpen,
    BlockQuoteClose,
    HtmlBlock {
        content: String,
    },
}

impl Token {
    pub fn inline(content: impl Into<String>, children: Vec<InlineChild>) -> Self {
        Token::Inline {
            content: content.into(),
            children,
        }
    }

    /// Inline token with no children, as a tokenizer emits for bare text
    pub fn bare_inline(content: impl Into<String>) -> Self {
        Self::inline(content, Vec::new())
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Token::Inline { .. })
    }

    /// Short name for log lines
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Token::HeadingOpen { .. } => "heading_open",
            Token::HeadingClose => "heading_close",
            Token::ParagraphOpen => "paragraph_open",
            Token::ParagraphClose => "paragraph_close",
            Token::Inline { .. } => "inline",
            Token::ListOpen { .. } => "list_open",
            Token::ListClose => "list_close",
            Token::ListItemOpen => "list_item_open",
            Token::ListItemClose => "list_item_close",
            Token::CodeBlock { .. } => "code_block",
            Token::Rule => "rule",
            Token::MathBlock { .. } => "math_block",
            Token::BlockQuoteOpen => "blockquote_open",
            Token::BlockQuoteClose => "blockquote_close",
            Token::HtmlBlock { .. } => "html_block",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineKind {
    Text,
    Strong,
    Emphasis,
    Code,
    Math,
    SoftBreak,
    HardBreak,
    /// Marker only; `content` holds the link target
    LinkOpen,
    LinkClose,
    /// `content` holds the alt text
    Image,
    Html,
    Strikethrough,
}

/// One child of an inline token. Styled children carry their own literal
/// text rather than nested children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineChild {
    pub kind: InlineKind,
    #[serde(default)]
    pub content: String,
}

impl InlineChild {
    pub fn new(kind: InlineKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(InlineKind::Text, content)
    }

    pub fn strong(content: impl Into<String>) -> Self {
        Self::new(InlineKind::Strong, content)
    }

    pub fn emphasis(content: impl Into<String>) -> Self {
        Self::new(InlineKind::Emphasis, content)
    }

    pub fn code(content: impl Into<String>) -> Self {
        Self::new(InlineKind::Code, content)
    }

    pub fn math(content: impl Into<String>) -> Self {
        Self::new(InlineKind::Math, content)
    }

    pub fn marker(kind: InlineKind) -> Self {
        Self::new(kind, String::new())
    }
}

/// Forward-only view over a token slice with one token of lookahead
pub struct TokenCursor<'a> {
    tokens: Peekable<slice::Iter<'a, Token>>,
    offset: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens: tokens.iter().peekable(),
            offset: 0,
        }
    }

    /// The token the next call to `next` would return
    pub fn peek(&mut self) -> Option<&'a Token> {
        self.tokens.peek().copied()
    }

    /// Consume the next token only if it satisfies `predicate`
    pub fn next_if(&mut self, predicate: impl FnOnce(&Token) -> bool) -> Option<&'a Token> {
        let token = self.tokens.next_if(|token| predicate(token))?;
        self.offset += 1;
        Some(token)
    }

    /// Index of the next token to be consumed
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for TokenCursor<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.tokens.next()?;
        self.offset += 1;
        Some(token)
    }
}

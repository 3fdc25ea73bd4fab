// SPDX-License-Identifier: AGPL-3.0-or-later
//! Markdown tokenizer using comrak
//!
//! comrak produces a tree; the transducer wants a flat stream of open/close
//! tokens with one `Inline` token per run of inline content. Inline nesting is
//! flattened into styled children: text below `Strong` becomes a `Strong`
//! child, text below `Emph` an `Emphasis` child, and adjacent children of the
//! same style are merged.

use crate::ast::ListKind;
use crate::token::{InlineChild, InlineKind, Token};
use crate::traits::{Result, Tokenizer, TokenizerOptions};
use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{parse_document, Arena, Options};

/// Info string that turns a fenced code block into display math
const MATH_INFO: &str = "math";

/// Markdown tokenizer using comrak (CommonMark plus dollar math)
#[derive(Debug, Clone, Default)]
pub struct MarkdownTokenizer {
    options: TokenizerOptions,
}

impl MarkdownTokenizer {
    pub fn new(options: TokenizerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TokenizerOptions {
        &self.options
    }

    fn comrak_options(&self) -> Options<'static> {
        let mut options = Options::default();
        options.extension.strikethrough = true;
        options.extension.autolink = self.options.autolink;
        options.extension.math_dollars = self.options.math_dollars;
        options.extension.math_code = self.options.math_code;
        options.parse.smart = self.options.smart_punctuation;
        options
    }
}

impl Tokenizer for MarkdownTokenizer {
    fn tokenize(&self, input: &str) -> Result<Vec<Token>> {
        let arena = Arena::new();
        let root = parse_document(&arena, input, &self.comrak_options());

        let mut flattener = BlockFlattener {
            options: &self.options,
            tokens: Vec::new(),
            item_depth: 0,
        };
        flattener.block(root);
        Ok(flattener.tokens)
    }
}

struct BlockFlattener<'o> {
    options: &'o TokenizerOptions,
    tokens: Vec<Token>,
    item_depth: usize,
}

impl<'o> BlockFlattener<'o> {
    fn children<'a>(&mut self, node: &'a AstNode<'a>) {
        for child in node.children() {
            self.block(child);
        }
    }

    fn block<'a>(&mut self, node: &'a AstNode<'a>) {
        let value = node.data.borrow().value.clone();

        match value {
            NodeValue::Paragraph => self.paragraph(node),

            NodeValue::Heading(heading) => {
                self.tokens.push(Token::HeadingOpen {
                    level: heading.level,
                });
                self.tokens.push(inline_token(node.children(), self.options));
                self.tokens.push(Token::HeadingClose);
            }

            NodeValue::List(list) => {
                let kind = match list.list_type {
                    ListType::Ordered => ListKind::Ordered,
                    ListType::Bullet => ListKind::Bullet,
                };
                let start = match kind {
                    ListKind::Ordered => u32::try_from(list.start).ok(),
                    ListKind::Bullet => None,
                };
                self.tokens.push(Token::ListOpen { kind, start });
                self.children(node);
                self.tokens.push(Token::ListClose);
            }

            NodeValue::Item(_) => {
                self.tokens.push(Token::ListItemOpen);
                self.item_depth += 1;
                self.children(node);
                self.item_depth -= 1;
                self.tokens.push(Token::ListItemClose);
            }

            NodeValue::CodeBlock(code) => {
                let info = code.info.split_whitespace().next().map(str::to_string);
                let content = code
                    .literal
                    .strip_suffix('\n')
                    .unwrap_or(&code.literal)
                    .to_string();
                if self.options.math_code && info.as_deref() == Some(MATH_INFO) {
                    self.tokens.push(Token::MathBlock { content });
                } else {
                    self.tokens.push(Token::CodeBlock { info, content });
                }
            }

            NodeValue::ThematicBreak => self.tokens.push(Token::Rule),

            NodeValue::BlockQuote => {
                self.tokens.push(Token::BlockQuoteOpen);
                self.children(node);
                self.tokens.push(Token::BlockQuoteClose);
            }

            NodeValue::HtmlBlock(html) => self.tokens.push(Token::HtmlBlock {
                content: html.literal,
            }),

            _ => self.children(node),
        }
    }

    /// A paragraph outside list items is split at display math, which becomes
    /// a `MathBlock` of its own
    fn paragraph<'a>(&mut self, node: &'a AstNode<'a>) {
        if self.item_depth > 0 || !node.children().any(is_display_math) {
            self.tokens.push(Token::ParagraphOpen);
            self.tokens.push(inline_token(node.children(), self.options));
            self.tokens.push(Token::ParagraphClose);
            return;
        }

        let mut segment: Vec<&'a AstNode<'a>> = Vec::new();
        for child in node.children() {
            if let NodeValue::Math(math) = &child.data.borrow().value {
                if math.display_math {
                    self.flush_segment(&mut segment);
                    self.tokens.push(Token::MathBlock {
                        content: math.literal.clone(),
                    });
                    continue;
                }
            }
            segment.push(child);
        }
        self.flush_segment(&mut segment);
    }

    fn flush_segment<'a>(&mut self, segment: &mut Vec<&'a AstNode<'a>>) {
        if segment.iter().all(|node| is_blank(node)) {
            segment.clear();
            return;
        }
        self.tokens.push(Token::ParagraphOpen);
        self.tokens
            .push(inline_token(segment.drain(..), self.options));
        self.tokens.push(Token::ParagraphClose);
    }
}

fn is_display_math<'a>(node: &'a AstNode<'a>) -> bool {
    matches!(&node.data.borrow().value, NodeValue::Math(math) if math.display_math)
}

fn is_blank<'a>(node: &'a AstNode<'a>) -> bool {
    match &node.data.borrow().value {
        NodeValue::SoftBreak | NodeValue::LineBreak => true,
        NodeValue::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Style applied to text reached through emphasis nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Style {
    Plain,
    Emphasis,
    Strong,
}

impl Style {
    fn kind(self) -> InlineKind {
        match self {
            Style::Plain => InlineKind::Text,
            Style::Emphasis => InlineKind::Emphasis,
            Style::Strong => InlineKind::Strong,
        }
    }
}

fn inline_token<'a>(
    nodes: impl IntoIterator<Item = &'a AstNode<'a>>,
    options: &TokenizerOptions,
) -> Token {
    let mut flattener = InlineFlattener {
        options,
        children: Vec::new(),
    };
    for node in nodes {
        flattener.inline(node, Style::Plain);
    }
    let mut content = String::new();
    for child in &flattener.children {
        push_source_text(&mut content, child);
    }
    Token::inline(content, flattener.children)
}

/// Source text of one child; math keeps its dollar delimiters
fn push_source_text(out: &mut String, child: &InlineChild) {
    match child.kind {
        InlineKind::SoftBreak | InlineKind::HardBreak => out.push('\n'),
        InlineKind::LinkOpen | InlineKind::LinkClose => {}
        InlineKind::Math => {
            out.push('$');
            out.push_str(&child.content);
            out.push('$');
        }
        _ => out.push_str(&child.content),
    }
}

struct InlineFlattener<'o> {
    options: &'o TokenizerOptions,
    children: Vec<InlineChild>,
}

impl<'o> InlineFlattener<'o> {
    fn inline<'a>(&mut self, node: &'a AstNode<'a>, style: Style) {
        let value = node.data.borrow().value.clone();

        match value {
            NodeValue::Text(text) => self.push_text(style.kind(), &text),
            NodeValue::Code(code) => self.push(InlineChild::code(code.literal)),
            NodeValue::Math(math) => self.push(InlineChild::math(math.literal)),
            NodeValue::SoftBreak => self.push(InlineChild::marker(if self.options.hard_breaks {
                InlineKind::HardBreak
            } else {
                InlineKind::SoftBreak
            })),
            NodeValue::LineBreak => self.push(InlineChild::marker(InlineKind::HardBreak)),
            NodeValue::Emph => self.descend(node, style.max(Style::Emphasis)),
            NodeValue::Strong => self.descend(node, Style::Strong),
            NodeValue::Strikethrough => {
                self.push(InlineChild::new(InlineKind::Strikethrough, literal_text(node)))
            }
            NodeValue::Link(link) => {
                self.push(InlineChild::new(InlineKind::LinkOpen, link.url));
                self.descend(node, style);
                self.push(InlineChild::marker(InlineKind::LinkClose));
            }
            NodeValue::Image(_) => self.push(InlineChild::new(InlineKind::Image, literal_text(node))),
            NodeValue::HtmlInline(html) => {
                if self.options.html {
                    self.push(InlineChild::new(InlineKind::Html, html));
                } else {
                    self.push_text(style.kind(), &html);
                }
            }
            _ => self.descend(node, style),
        }
    }

    fn descend<'a>(&mut self, node: &'a AstNode<'a>, style: Style) {
        for child in node.children() {
            self.inline(child, style);
        }
    }

    fn push_text(&mut self, kind: InlineKind, text: &str) {
        if let Some(last) = self.children.last_mut() {
            if last.kind == kind {
                last.content.push_str(text);
                return;
            }
        }
        self.children.push(InlineChild::new(kind, text));
    }

    fn push(&mut self, child: InlineChild) {
        self.children.push(child);
    }
}

/// Text below a node, with math spans keeping their dollar delimiters
fn literal_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut out = String::new();
    for descendant in node.descendants().skip(1) {
        match &descendant.data.borrow().value {
            NodeValue::Text(text) => out.push_str(text),
            NodeValue::Code(code) => out.push_str(&code.literal),
            NodeValue::Math(math) => {
                out.push('$');
                out.push_str(&math.literal);
                out.push('$');
            }
            NodeValue::SoftBreak | NodeValue::LineBreak => out.push(' '),
            _ => {}
        }
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Open/close pairs always balance
        #[test]
        fn prop_tokens_balanced(input in "[-#*$ 0-9a-z.>\n`]{0,120}") {
            let tokens = MarkdownTokenizer::default().tokenize(&input).unwrap();
            let mut lists = 0i64;
            let mut items = 0i64;
            let mut paragraphs = 0i64;
            for token in &tokens {
                match token {
                    Token::ListOpen { .. } => lists += 1,
                    Token::ListClose => lists -= 1,
                    Token::ListItemOpen => items += 1,
                    Token::ListItemClose => items -= 1,
                    Token::ParagraphOpen => paragraphs += 1,
                    Token::ParagraphClose => paragraphs -= 1,
                    _ => {}
                }
                prop_assert!(lists >= 0 && items >= 0 && paragraphs >= 0);
            }
            prop_assert_eq!((lists, items, paragraphs), (0, 0, 0));
        }

        // Plain words survive tokenizing as the paragraph's content
        #[test]
        fn prop_plain_paragraph_content(words in prop::collection::vec("[a-z]{1,8}", 1..10)) {
            let input = words.join(" ");
            let tokens = MarkdownTokenizer::default().tokenize(&input).unwrap();
            prop_assert_eq!(tokens.len(), 3);
            prop_assert_eq!(&tokens[1], &Token::inline(input.clone(), vec![InlineChild::text(input)]));
        }
    }
}

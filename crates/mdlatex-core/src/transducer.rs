// SPDX-License-Identifier: AGPL-3.0-or-later
//! Token stream to block sequence
//!
//! The transducer is a fold over the token stream. All mutable state lives in
//! a `BlockState` that is moved into each `step` and moved back out, so one
//! transducer can serve any number of conversions without sharing anything
//! between them.
//!
//! Numbering instances are allocated here as lists open, under the configured
//! `NumberingPolicy`, so every `ListParagraph` already names the counter it
//! belongs to when it reaches the assembler.

use crate::ast::{Block, ListKind, NumberingInstance, Run};
use crate::inline::InlineRunBuilder;
use crate::math::MathConverter;
use crate::token::{Token, TokenCursor};
use crate::traits::{ConversionError, MathRenderer, NumberingPolicy, Result, TransducerOptions};
use tracing::{debug, warn};

/// One open list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListFrame {
    kind: ListKind,
    instance: usize,
}

/// State carried across the scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockState {
    runs: Vec<Run>,
    lists: Vec<ListFrame>,
    open_items: usize,
    blocks: Vec<Block>,
    instances: Vec<NumberingInstance>,
}

impl BlockState {
    /// Blocks emitted so far
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Runs waiting for the enclosing paragraph or list item to close
    pub fn pending(&self) -> &[Run] {
        &self.runs
    }

    /// Number of lists currently open
    pub fn depth(&self) -> usize {
        self.lists.len()
    }

    fn in_item(&self) -> bool {
        self.open_items > 0
    }

    /// Emit pending runs as a block for the innermost open list, or as a
    /// plain paragraph outside lists
    fn flush_item(&mut self) {
        if self.runs.is_empty() {
            return;
        }
        let runs = std::mem::take(&mut self.runs);
        let block = match self.lists.last() {
            Some(frame) => Block::ListParagraph {
                runs,
                kind: frame.kind,
                level: self.lists.len() - 1,
                instance: frame.instance,
            },
            None => Block::Paragraph { runs },
        };
        self.blocks.push(block);
    }

    /// A block nested in a list item ends the item's text so far, which has
    /// to land ahead of it
    fn break_item(&mut self) {
        if self.in_item() {
            self.flush_item();
        }
    }

    fn allocate_instance(
        &mut self,
        kind: ListKind,
        start: Option<u32>,
        policy: NumberingPolicy,
    ) -> usize {
        let reuse = match policy {
            NumberingPolicy::Restart => self
                .lists
                .last()
                .filter(|parent| parent.kind == kind)
                .map(|parent| parent.instance),
            NumberingPolicy::Continue => self
                .instances
                .iter()
                .find(|instance| instance.kind == kind)
                .map(|instance| instance.id),
        };
        if let Some(id) = reuse {
            return id;
        }

        let id = self.instances.len() + 1;
        let start = match (kind, policy) {
            (ListKind::Bullet, _) => None,
            // Every new ordered instance carries a start so it never picks up
            // a count left by an earlier list
            (ListKind::Ordered, NumberingPolicy::Restart) => Some(start.unwrap_or(1)),
            (ListKind::Ordered, NumberingPolicy::Continue) => start,
        };
        debug!(id, ?kind, ?start, "allocated numbering instance");
        self.instances.push(NumberingInstance { id, kind, start });
        id
    }
}

/// Output of one transduction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockOutput {
    pub blocks: Vec<Block>,
    pub instances: Vec<NumberingInstance>,
}

/// Block transducer: walks tokens and emits document blocks
pub struct BlockTransducer<'m, R> {
    inline: InlineRunBuilder<'m, R>,
    math: &'m MathConverter<R>,
    options: TransducerOptions,
}

impl<'m, R: MathRenderer> BlockTransducer<'m, R> {
    pub fn new(math: &'m MathConverter<R>, options: TransducerOptions) -> Self {
        Self {
            inline: InlineRunBuilder::new(math),
            math,
            options,
        }
    }

    pub fn transduce(&self, tokens: &[Token]) -> Result<BlockOutput> {
        let mut cursor = TokenCursor::new(tokens);
        let mut state = BlockState::default();
        while let Some(token) = cursor.next() {
            state = self.step(state, token, &mut cursor)?;
        }
        Ok(self.finish(state))
    }

    /// Apply one token. `cursor` is positioned just past `token`; heading
    /// handling consumes the tokens that belong to it.
    pub fn step(
        &self,
        mut state: BlockState,
        token: &Token,
        cursor: &mut TokenCursor<'_>,
    ) -> Result<BlockState> {
        debug!(position = cursor.offset(), token = token.kind_name(), "step");

        match token {
            Token::HeadingOpen { level } => {
                state.break_item();
                if let Some(Token::Inline { content, .. }) = cursor.next_if(Token::is_inline) {
                    state.blocks.push(Block::heading(*level, content.as_str()));
                }
                cursor.next_if(|next| matches!(next, Token::HeadingClose));
            }
            Token::ParagraphOpen => {
                if !state.in_item() {
                    state.runs.clear();
                } else if !state.runs.is_empty() {
                    state.runs.push(Run::LineBreak);
                }
            }
            Token::Inline { content, children } => {
                state.runs.extend(self.inline.build(content, children));
            }
            Token::ParagraphClose => {
                if !state.in_item() && !state.runs.is_empty() {
                    let runs = std::mem::take(&mut state.runs);
                    state.blocks.push(Block::Paragraph { runs });
                }
            }
            Token::ListOpen { kind, start } => {
                state.break_item();
                let instance = state.allocate_instance(*kind, *start, self.options.numbering);
                state.lists.push(ListFrame {
                    kind: *kind,
                    instance,
                });
            }
            Token::ListClose => {
                if state.lists.pop().is_none() {
                    return Err(ConversionError::ListUnderflow {
                        position: cursor.offset().saturating_sub(1),
                    });
                }
            }
            Token::ListItemOpen => {
                state.runs.clear();
                state.open_items += 1;
            }
            Token::ListItemClose => {
                state.flush_item();
                state.open_items = state.open_items.saturating_sub(1);
            }
            Token::CodeBlock { info, content } => {
                state.break_item();
                state.blocks.push(Block::CodeBlock {
                    info: info.clone(),
                    text: content.clone(),
                });
            }
            Token::Rule => {
                state.break_item();
                state.blocks.push(Block::Rule);
            }
            Token::MathBlock { content } => {
                state.break_item();
                let math = self.math.convert(content, true);
                state.blocks.push(Block::MathBlock { math });
            }
            Token::HeadingClose
            | Token::BlockQuoteOpen
            | Token::BlockQuoteClose
            | Token::HtmlBlock { .. } => {}
        }

        Ok(state)
    }

    /// Close out the scan, deciding what happens to runs left pending
    pub fn finish(&self, mut state: BlockState) -> BlockOutput {
        if !state.runs.is_empty() {
            if self.options.flush_dangling {
                warn!(
                    runs = state.runs.len(),
                    open_lists = state.lists.len(),
                    "token stream ended inside an open block, flushing its content"
                );
                state.flush_item();
            } else {
                debug!(runs = state.runs.len(), "dropping content pending at end of stream");
            }
        }

        BlockOutput {
            blocks: state.blocks,
            instances: state.instances,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::math::LatexRenderer;
    use proptest::prelude::*;

    /// Build a well-formed nested list from per-item depths. Each item is at
    /// most one level deeper than the one before it.
    fn nested_list(items: &[(usize, String)]) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut open = 0usize;
        for (depth, text) in items {
            while open > depth + 1 {
                tokens.push(Token::ListItemClose);
                tokens.push(Token::ListClose);
                open -= 1;
            }
            if open == depth + 1 {
                tokens.push(Token::ListItemClose);
            } else {
                tokens.push(Token::ListOpen {
                    kind: ListKind::Ordered,
                    start: None,
                });
                open += 1;
            }
            tokens.push(Token::ListItemOpen);
            tokens.push(Token::ParagraphOpen);
            tokens.push(Token::bare_inline(text.as_str()));
            tokens.push(Token::ParagraphClose);
        }
        while open > 0 {
            tokens.push(Token::ListItemClose);
            tokens.push(Token::ListClose);
            open -= 1;
        }
        tokens
    }

    fn depths_strategy() -> impl Strategy<Value = Vec<(usize, String)>> {
        prop::collection::vec((0usize..6, "[a-z]{1,8}"), 1..20).prop_map(|raw| {
            let mut previous: Option<usize> = None;
            raw.into_iter()
                .map(|(choice, text)| {
                    let depth = match previous {
                        None => 0,
                        Some(prev) => choice % (prev + 2),
                    };
                    previous = Some(depth);
                    (depth, text)
                })
                .collect()
        })
    }

    proptest! {
        // Every item surfaces once, in order, at the nesting level it was written at
        #[test]
        fn prop_list_levels_follow_depth(items in depths_strategy()) {
            let tokens = nested_list(&items);
            let math = MathConverter::new(LatexRenderer::default());
            let output = BlockTransducer::new(&math, TransducerOptions::default())
                .transduce(&tokens)
                .unwrap();

            prop_assert_eq!(output.blocks.len(), items.len());
            for (block, (depth, text)) in output.blocks.iter().zip(&items) {
                match block {
                    Block::ListParagraph { runs, level, .. } => {
                        prop_assert_eq!(level, depth);
                        prop_assert_eq!(runs, &vec![Run::PlainText(text.clone())]);
                    }
                    other => prop_assert!(false, "unexpected block {:?}", other),
                }
            }
        }

        // Under the restart policy only same-kind nesting shares an instance,
        // so a flat ordered list always has exactly one
        #[test]
        fn prop_flat_list_single_instance(count in 1usize..10) {
            let items: Vec<(usize, String)> = (0..count).map(|i| (0, format!("item{i}"))).collect();
            let tokens = nested_list(&items);
            let math = MathConverter::new(LatexRenderer::default());
            let output = BlockTransducer::new(&math, TransducerOptions::default())
                .transduce(&tokens)
                .unwrap();
            prop_assert_eq!(output.instances.len(), 1);
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inline token children to styled runs

use crate::ast::Run;
use crate::math::MathConverter;
use crate::token::{InlineChild, InlineKind};
use crate::traits::MathRenderer;
use tracing::debug;

/// Character that marks a span as math source
pub const MATH_DELIMITER: char = '$';

/// Maps the children of one inline token to runs, in input order
pub struct InlineRunBuilder<'m, R> {
    math: &'m MathConverter<R>,
}

impl<'m, R: MathRenderer> InlineRunBuilder<'m, R> {
    pub fn new(math: &'m MathConverter<R>) -> Self {
        Self { math }
    }

    /// Runs for an inline token. A childless token contributes its own
    /// content as one plain run, unless that content is blank.
    pub fn build(&self, content: &str, children: &[InlineChild]) -> Vec<Run> {
        if children.is_empty() {
            if content.trim().is_empty() {
                return Vec::new();
            }
            return vec![Run::PlainText(content.to_string())];
        }

        children
            .iter()
            .filter_map(|child| self.build_child(child))
            .collect()
    }

    fn build_child(&self, child: &InlineChild) -> Option<Run> {
        let content = &child.content;
        match child.kind {
            InlineKind::Text => non_empty(content).map(Run::PlainText),
            InlineKind::Strong => non_empty(content).map(Run::Bold),
            InlineKind::Emphasis => non_empty(content).map(Run::Italic),
            InlineKind::Code => non_empty(content).map(Run::Monospace),
            InlineKind::SoftBreak | InlineKind::HardBreak => Some(Run::LineBreak),
            InlineKind::Math => Some(Run::MathInline(self.math.convert(content, false))),
            InlineKind::LinkOpen | InlineKind::LinkClose => None,
            InlineKind::Image | InlineKind::Html | InlineKind::Strikethrough => {
                self.recover(child)
            }
        }
    }

    /// Children the output model has no style for. Anything carrying a math
    /// delimiter is treated as an untagged math span.
    fn recover(&self, child: &InlineChild) -> Option<Run> {
        if child.content.contains(MATH_DELIMITER) {
            let source: String = child
                .content
                .chars()
                .filter(|&ch| ch != MATH_DELIMITER)
                .collect();
            debug!(kind = ?child.kind, "routing untagged math-looking span through math");
            return Some(Run::MathInline(self.math.convert(source.trim(), false)));
        }
        non_empty(&child.content).map(Run::PlainText)
    }
}

fn non_empty(content: &str) -> Option<String> {
    (!content.is_empty()).then(|| content.to_string())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Math source to office-math element tree
//!
//! Conversion runs in three stages: render the source to a presentation-math
//! fragment, cut the `<math>`-rooted subtree out of it, then relabel that
//! subtree node for node into a `MathElement` tree. The relabeling is generic:
//! tags, attributes and child order are kept as rendered, text leaves are
//! carried verbatim, and anything that is neither an element nor text is
//! dropped. Semantic lowering to OMML happens at serialization.
//!
//! `MathConverter::convert` is total. Every failure is logged and turned into
//! `MathContent::Fallback` carrying the original source.

use crate::ast::{MathContent, MathElement, MathNode};
use crate::traits::{MathError, MathMode, MathOptions, MathRenderer};
use regex::{Captures, Regex};
use roxmltree::{Node, NodeType};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;
use tracing::{debug, warn};

static MATH_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<math(?:\s[^>]*)?(?:/>|>.*?</math\s*>)").unwrap());

/// Token elements whose content is text only
static TOKEN_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(<(?:mi|mn|mo|ms|mtext)(?:\s[^>/]*)?>)(.*?)(</(?:mi|mn|mo|ms|mtext)\s*>)")
        .unwrap()
});

static BARE_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#[0-9]+|#x[0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);|[&<]").unwrap()
});

/// Renders LaTeX to MathML with `latex2mathml`, expanding configured macros
/// first
#[derive(Debug, Clone, Default)]
pub struct LatexRenderer {
    macros: BTreeMap<String, String>,
}

impl LatexRenderer {
    pub fn new(options: &MathOptions) -> Self {
        Self {
            macros: options.macros.clone(),
        }
    }

    /// Replace every control word that names a macro. Only whole control
    /// words match, so `\RR` does not fire inside `\RRR`.
    pub fn expand_macros<'s>(&self, source: &'s str) -> Cow<'s, str> {
        if self.macros.is_empty() || !source.contains('\\') {
            return Cow::Borrowed(source);
        }

        let mut out = String::with_capacity(source.len());
        let mut chars = source.char_indices().peekable();
        let mut changed = false;

        while let Some((start, ch)) = chars.next() {
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            let mut end = start + 1;
            while let Some(&(idx, next)) = chars.peek() {
                if !next.is_ascii_alphabetic() {
                    break;
                }
                end = idx + next.len_utf8();
                chars.next();
            }
            let word = &source[start..end];
            match self.macros.get(word) {
                Some(expansion) => {
                    out.push_str(expansion);
                    changed = true;
                }
                None => out.push_str(word),
            }
        }

        if changed {
            Cow::Owned(out)
        } else {
            Cow::Borrowed(source)
        }
    }
}

impl MathRenderer for LatexRenderer {
    fn render(&self, source: &str, mode: MathMode) -> Result<String, MathError> {
        let expanded = self.expand_macros(source);
        let style = match mode {
            MathMode::Inline => latex2mathml::DisplayStyle::Inline,
            MathMode::Display => latex2mathml::DisplayStyle::Block,
        };
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
            latex2mathml::latex_to_mathml(&expanded, style)
        }))
        .map_err(|_| MathError::Panicked)?;
        rendered.map_err(|err| MathError::Render(err.to_string()))
    }
}

/// Converts math spans through a renderer, degrading to fallback text
#[derive(Debug, Clone, Default)]
pub struct MathConverter<R = LatexRenderer> {
    renderer: R,
}

impl<R: MathRenderer> MathConverter<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn convert(&self, source: &str, is_block: bool) -> MathContent {
        let mode = MathMode::from_block(is_block);
        match self.try_convert(source, mode) {
            Ok(tree) => {
                debug!(?mode, nodes = tree.node_count(), "converted math span");
                MathContent::Tree(tree)
            }
            Err(err) => {
                warn!(?mode, source = %source, error = %err, "math conversion failed, using text");
                MathContent::Fallback(source.to_string())
            }
        }
    }

    fn try_convert(&self, source: &str, mode: MathMode) -> Result<MathElement, MathError> {
        if source.trim().is_empty() {
            return Err(MathError::Empty);
        }
        let rendered = self.renderer.render(source, mode)?;
        let fragment = extract_math_root(&rendered).ok_or(MathError::MissingRoot)?;
        let fragment = escape_token_text(fragment);
        let document = roxmltree::Document::parse(&fragment)?;
        Ok(relabel_element(document.root_element()))
    }
}

/// First `<math>`-rooted fragment in rendered output
pub fn extract_math_root(rendered: &str) -> Option<&str> {
    MATH_ROOT.find(rendered).map(|found| found.as_str())
}

/// Escape `<` and `&` left bare inside token elements; `latex2mathml`
/// writes `x < y` as `<mo><</mo>`. Entity references are kept.
pub fn escape_token_text(fragment: &str) -> Cow<'_, str> {
    TOKEN_ELEMENT.replace_all(fragment, |element: &Captures<'_>| {
        let text = BARE_MARKUP.replace_all(&element[2], |found: &Captures<'_>| {
            match &found[0] {
                "<" => "&lt;".to_string(),
                "&" => "&amp;".to_string(),
                entity => entity.to_string(),
            }
        });
        format!("{}{}{}", &element[1], text, &element[3])
    })
}

fn relabel_element(node: Node<'_, '_>) -> MathElement {
    MathElement {
        tag: node.tag_name().name().to_string(),
        attributes: node
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect(),
        children: node.children().filter_map(relabel_node).collect(),
    }
}

fn relabel_node(node: Node<'_, '_>) -> Option<MathNode> {
    match node.node_type() {
        NodeType::Element => Some(MathNode::Element(relabel_element(node))),
        NodeType::Text => node.text().map(|text| MathNode::Text(text.to_string())),
        NodeType::Root | NodeType::Comment | NodeType::PI => None,
    }
}

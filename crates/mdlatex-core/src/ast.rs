// SPDX-License-Identifier: AGPL-3.0-or-later
//! Word-processing document model
//!
//! The model is flat on purpose: a document is an ordered sequence of blocks,
//! paragraph-like blocks own an ordered sequence of runs, and runs never nest.
//! Math is the only tree-shaped content, carried as an element tree that
//! mirrors the markup the renderer produced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deepest heading level the document model distinguishes
pub const MAX_HEADING_LEVEL: u8 = 4;

/// Kind of list a list paragraph belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Ordered,
    Bullet,
}

impl ListKind {
    /// Name of the numbering definition list items of this kind reference
    pub const fn definition_name(&self) -> &'static str {
        match self {
            Self::Ordered => "ordered",
            Self::Bullet => "bullet",
        }
    }

    pub const ALL: [Self; 2] = [Self::Ordered, Self::Bullet];
}

/// One element of a math tree: tag name, attributes and ordered children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MathNode>,
}

impl MathElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: MathNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(MathNode::Text(text.into()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Element children in order, skipping text leaves
    pub fn elements(&self) -> impl Iterator<Item = &MathElement> {
        self.children.iter().filter_map(|child| match child {
            MathNode::Element(element) => Some(element),
            MathNode::Text(_) => None,
        })
    }

    /// Concatenated text of every leaf below this element
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                MathNode::Element(element) => element.collect_text(out),
                MathNode::Text(text) => out.push_str(text),
            }
        }
    }

    /// Number of nodes in the subtree, this element and text leaves included
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| match child {
                MathNode::Element(element) => element.node_count(),
                MathNode::Text(_) => 1,
            })
            .sum::<usize>()
    }
}

/// A child of a math element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MathNode {
    Text(String),
    Element(MathElement),
}

/// Result of converting one math span
///
/// `Fallback` carries the original source so the formula stays legible when
/// it could not be converted; it is rendered as italic text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathContent {
    Tree(MathElement),
    Fallback(String),
}

impl MathContent {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn tree(&self) -> Option<&MathElement> {
        match self {
            Self::Tree(tree) => Some(tree),
            Self::Fallback(_) => None,
        }
    }
}

/// A styled, non-nested span inside a paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Run {
    PlainText(String),
    Bold(String),
    Italic(String),
    Monospace(String),
    LineBreak,
    MathInline(MathContent),
}

impl Run {
    /// Literal text of a text-carrying run
    pub fn text(&self) -> Option<&str> {
        match self {
            Run::PlainText(text) | Run::Bold(text) | Run::Italic(text) | Run::Monospace(text) => {
                Some(text)
            }
            Run::MathInline(MathContent::Fallback(source)) => Some(source),
            Run::LineBreak | Run::MathInline(MathContent::Tree(_)) => None,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text().map_or(0, |text| text.split_whitespace().count())
    }
}

/// Block-level node, in document reading order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Heading with level 1-4
    Heading { level: u8, text: String },

    Paragraph { runs: Vec<Run> },

    /// Paragraph inside a list; `instance` names the numbering instance it
    /// counts against
    ListParagraph {
        runs: Vec<Run>,
        kind: ListKind,
        level: usize,
        instance: usize,
    },

    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<String>,
        text: String,
    },

    /// Horizontal rule
    Rule,

    /// Display math
    MathBlock { math: MathContent },
}

impl Block {
    /// Build a heading, collapsing levels above 4 to 4
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level: level.clamp(1, MAX_HEADING_LEVEL),
            text: text.into(),
        }
    }

    pub fn runs(&self) -> &[Run] {
        match self {
            Block::Paragraph { runs } | Block::ListParagraph { runs, .. } => runs,
            _ => &[],
        }
    }

    pub fn word_count(&self) -> usize {
        match self {
            Block::Heading { text, .. } | Block::CodeBlock { text, .. } => {
                text.split_whitespace().count()
            }
            Block::Paragraph { runs } | Block::ListParagraph { runs, .. } => {
                runs.iter().map(Run::word_count).sum()
            }
            Block::Rule | Block::MathBlock { .. } => 0,
        }
    }
}

/// Number format of one list level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberFormat {
    Decimal,
    Bullet,
}

impl NumberFormat {
    /// Value of `w:numFmt`
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Decimal => "decimal",
            Self::Bullet => "bullet",
        }
    }
}

/// Formatting of one level of a numbering definition; indents are in twips
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFormat {
    pub level: usize,
    pub format: NumberFormat,
    pub text: String,
    pub indent_left: u32,
    pub hanging: u32,
}

/// Named per-level formatting rule set shared by every list of one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingDefinition {
    pub name: String,
    pub kind: ListKind,
    pub levels: Vec<LevelFormat>,
}

/// One numbering counter; list paragraphs sharing an instance count together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingInstance {
    pub id: usize,
    pub kind: ListKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NumberingTable {
    pub definitions: Vec<NumberingDefinition>,
    pub instances: Vec<NumberingInstance>,
}

impl NumberingTable {
    pub fn definition(&self, kind: ListKind) -> Option<&NumberingDefinition> {
        self.definitions.iter().find(|definition| definition.kind == kind)
    }

    pub fn instance(&self, id: usize) -> Option<&NumberingInstance> {
        self.instances.iter().find(|instance| instance.id == id)
    }
}

/// The assembled document handed to a serializer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub numbering: NumberingTable,
}

impl Document {
    /// Count words in the document
    pub fn word_count(&self) -> usize {
        self.blocks.iter().map(Block::word_count).sum()
    }

    /// Count math spans, inline and display
    pub fn math_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| match block {
                Block::MathBlock { .. } => 1,
                other => other
                    .runs()
                    .iter()
                    .filter(|run| matches!(run, Run::MathInline(_)))
                    .count(),
            })
            .sum()
    }
}

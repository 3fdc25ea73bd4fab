// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document assembly: blocks plus numbering definitions

use crate::ast::{
    Document, LevelFormat, ListKind, NumberFormat, NumberingDefinition, NumberingTable,
};
use crate::transducer::BlockOutput;
use tracing::debug;

/// Levels per numbering definition
pub const NUMBERING_LEVELS: usize = 9;

/// Left indent step per level, in twips
pub const INDENT_STEP: u32 = 720;

/// Hanging indent for the number or bullet, in twips
pub const HANGING_INDENT: u32 = 360;

const BULLET_GLYPHS: [&str; 2] = ["\u{25CF}", "\u{25CB}"];

/// Per-level formatting for one list kind
pub fn definition(kind: ListKind) -> NumberingDefinition {
    let levels = (0..NUMBERING_LEVELS)
        .map(|level| {
            let (format, text) = match kind {
                ListKind::Ordered => (NumberFormat::Decimal, format!("%{}.", level + 1)),
                ListKind::Bullet => (
                    NumberFormat::Bullet,
                    BULLET_GLYPHS[level % BULLET_GLYPHS.len()].to_string(),
                ),
            };
            LevelFormat {
                level,
                format,
                text,
                indent_left: INDENT_STEP * (level as u32 + 1),
                hanging: HANGING_INDENT,
            }
        })
        .collect();

    NumberingDefinition {
        name: kind.definition_name().to_string(),
        kind,
        levels,
    }
}

/// Wraps transducer output into the document handed to a serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentAssembler;

impl DocumentAssembler {
    pub fn assemble(&self, output: BlockOutput) -> Document {
        debug!(
            blocks = output.blocks.len(),
            instances = output.instances.len(),
            "assembling document"
        );
        Document {
            blocks: output.blocks,
            numbering: NumberingTable {
                definitions: ListKind::ALL.into_iter().map(definition).collect(),
                instances: output.instances,
            },
        }
    }
}

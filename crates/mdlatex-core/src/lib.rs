// SPDX-License-Identifier: AGPL-3.0-or-later
//! mdlatex core - Markdown with LaTeX math to word-processing documents
//!
//! This crate provides:
//! - A flat token model and a comrak-backed Markdown tokenizer
//! - The block transducer that turns tokens into a document model
//! - LaTeX to office-math conversion with plain-text fallback
//! - A `.docx` serializer writing math as native OMML

pub mod assembler;
pub mod ast;
pub mod convert;
pub mod formats;
pub mod inline;
pub mod math;
pub mod token;
pub mod traits;
pub mod transducer;

pub use assembler::DocumentAssembler;
pub use ast::{Block, Document, ListKind, MathContent, MathElement, MathNode, Run};
pub use convert::Converter;
pub use formats::{DocxSerializer, MarkdownTokenizer};
pub use inline::InlineRunBuilder;
pub use math::{LatexRenderer, MathConverter};
pub use token::{InlineChild, InlineKind, Token, TokenCursor};
pub use traits::{
    ConversionError, ConvertConfig, MathError, MathMode, MathOptions, MathRenderer,
    NumberingPolicy, Result, Serializer, SerializerExt, Tokenizer, TokenizerOptions,
    TransducerOptions,
};
pub use transducer::{BlockOutput, BlockState, BlockTransducer};

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Concrete tokenizer and serializer

pub mod docx;
pub mod markdown;
pub mod omml;

pub use docx::DocxSerializer;
pub use markdown::MarkdownTokenizer;

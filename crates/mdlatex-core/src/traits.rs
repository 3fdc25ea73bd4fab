// SPDX-License-Identifier: AGPL-3.0-or-later
//! Collaborator traits, error type and conversion configuration

use crate::ast::Document;
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Error type for a whole conversion
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Tokenizer rejected input: {message}")]
    Tokenize { message: String },

    #[error("List closed with no open list at token {position}")]
    ListUnderflow { position: usize },

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Failure inside the math pipeline. Never escapes the math converter; it is
/// logged and replaced by fallback text.
#[derive(Debug, thiserror::Error)]
pub enum MathError {
    #[error("empty math source")]
    Empty,

    #[error("renderer failed: {0}")]
    Render(String),

    #[error("renderer panicked")]
    Panicked,

    #[error("no <math> root in rendered output")]
    MissingRoot,

    #[error("malformed presentation markup: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Options forwarded to the tokenizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerOptions {
    /// Pass raw HTML through as tokens
    pub html: bool,
    /// Turn bare URLs into links
    pub autolink: bool,
    /// Typographic quotes and dashes
    pub smart_punctuation: bool,
    /// Promote soft breaks to hard breaks
    pub hard_breaks: bool,
    /// `$...$` inline and `$$...$$` display math
    pub math_dollars: bool,
    /// Fenced code blocks tagged `math` become display math
    pub math_code: bool,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            html: true,
            autolink: true,
            smart_punctuation: true,
            hard_breaks: true,
            math_dollars: true,
            math_code: true,
        }
    }
}

/// Options for the math renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MathOptions {
    /// Control words expanded before rendering, e.g. `\RR` -> `\mathbb{R}`
    pub macros: BTreeMap<String, String>,
}

impl Default for MathOptions {
    fn default() -> Self {
        let mut macros = BTreeMap::new();
        macros.insert(r"\RR".to_string(), r"\mathbb{R}".to_string());
        Self { macros }
    }
}

/// How list occurrences map onto numbering instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberingPolicy {
    /// Every outermost list gets its own instance and restarts its count
    #[default]
    Restart,
    /// One instance per list kind, counting across the whole document
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransducerOptions {
    pub numbering: NumberingPolicy,
    /// Emit runs still pending when the token stream ends instead of
    /// dropping them
    pub flush_dangling: bool,
}

impl Default for TransducerOptions {
    fn default() -> Self {
        Self {
            numbering: NumberingPolicy::default(),
            flush_dangling: true,
        }
    }
}

/// Configuration for one conversion
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub tokenizer: TokenizerOptions,
    pub math: MathOptions,
    #[serde(flatten)]
    pub transducer: TransducerOptions,
}

/// Tokenizer trait: raw text to flat token stream
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, input: &str) -> Result<Vec<Token>>;
}

/// Display mode of a math span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathMode {
    Inline,
    Display,
}

impl MathMode {
    pub const fn from_block(is_block: bool) -> Self {
        if is_block {
            Self::Display
        } else {
            Self::Inline
        }
    }
}

/// Math renderer trait: math source to a serialized presentation-math
/// fragment. Implementations degrade on malformed input instead of failing
/// where they can.
pub trait MathRenderer: Send + Sync {
    fn render(&self, source: &str, mode: MathMode) -> std::result::Result<String, MathError>;
}

/// Serializer trait: document model to a binary package
pub trait Serializer: Send + Sync {
    fn serialize(&self, document: &Document) -> Result<Vec<u8>>;
}

/// Extension trait for streaming output (not dyn-compatible)
pub trait SerializerExt: Serializer {
    fn serialize_writer<W: Write>(&self, document: &Document, writer: &mut W) -> Result<()> {
        let bytes = self.serialize(document)?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

impl<T: Serializer> SerializerExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_enables_math() {
        let config = ConvertConfig::default();
        assert!(config.tokenizer.math_dollars);
        assert!(config.transducer.flush_dangling);
        assert_eq!(config.transducer.numbering, NumberingPolicy::Restart);
        assert_eq!(
            config.math.macros.get(r"\RR").map(String::as_str),
            Some(r"\mathbb{R}")
        );
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: ConvertConfig =
            serde_json::from_str(r#"{"numbering":"continue","tokenizer":{"html":false}}"#)
                .unwrap();
        assert_eq!(config.transducer.numbering, NumberingPolicy::Continue);
        assert!(!config.tokenizer.html);
        assert!(config.tokenizer.autolink);
        assert!(config.transducer.flush_dangling);
    }
}

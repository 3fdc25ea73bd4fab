// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end conversion: text to tokens to blocks to document to package

use crate::assembler::DocumentAssembler;
use crate::ast::Document;
use crate::formats::{DocxSerializer, MarkdownTokenizer};
use crate::math::{LatexRenderer, MathConverter};
use crate::token::Token;
use crate::traits::{
    ConversionError, ConvertConfig, MathRenderer, Result, Serializer, Tokenizer, TransducerOptions,
};
use crate::transducer::{BlockOutput, BlockTransducer};
use tracing::info;

/// One configured conversion pipeline. Holds no per-document state, so a
/// single converter can be shared across threads.
pub struct Converter<T = MarkdownTokenizer, R = LatexRenderer, S = DocxSerializer> {
    tokenizer: T,
    math: MathConverter<R>,
    serializer: S,
    options: TransducerOptions,
}

impl Converter {
    pub fn new(config: &ConvertConfig) -> Self {
        Self::with_parts(
            MarkdownTokenizer::new(config.tokenizer.clone()),
            LatexRenderer::new(&config.math),
            DocxSerializer,
            config.transducer,
        )
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(&ConvertConfig::default())
    }
}

impl<T: Tokenizer, R: MathRenderer, S: Serializer> Converter<T, R, S> {
    pub fn with_parts(tokenizer: T, renderer: R, serializer: S, options: TransducerOptions) -> Self {
        Self {
            tokenizer,
            math: MathConverter::new(renderer),
            serializer,
            options,
        }
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>> {
        let tokens = self.tokenizer.tokenize(input)?;
        info!(bytes = input.len(), tokens = tokens.len(), "tokenized input");
        Ok(tokens)
    }

    pub fn transduce(&self, tokens: &[Token]) -> Result<BlockOutput> {
        let output = BlockTransducer::new(&self.math, self.options).transduce(tokens)?;
        info!(
            blocks = output.blocks.len(),
            numbering_instances = output.instances.len(),
            "transduced token stream"
        );
        Ok(output)
    }

    /// Document model for `input`, before serialization
    pub fn to_document(&self, input: &str) -> Result<Document> {
        let tokens = self.tokenize(input)?;
        let output = self.transduce(&tokens)?;
        Ok(DocumentAssembler.assemble(output))
    }

    /// Serialized package for `input`
    pub fn convert(&self, input: &str) -> Result<Vec<u8>> {
        let document = self.to_document(input)?;
        let bytes = self.serializer.serialize(&document)?;
        info!(
            words = document.word_count(),
            math = document.math_count(),
            bytes = bytes.len(),
            "conversion complete"
        );
        Ok(bytes)
    }

    /// Like `convert`, for raw bytes that must be UTF-8
    pub fn convert_bytes(&self, input: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(input).map_err(|err| ConversionError::Tokenize {
            message: format!("input is not valid UTF-8: {err}"),
        })?;
        self.convert(text)
    }
}

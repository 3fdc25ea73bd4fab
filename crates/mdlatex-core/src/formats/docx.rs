// SPDX-License-Identifier: AGPL-3.0-or-later
//! WordprocessingML package writer
//!
//! Produces a minimal `.docx`: document body, a small style sheet, the list
//! numbering part and the relationships tying them together. Math is written
//! as native OMML through `formats::omml`.

use super::omml;
use crate::ast::{Block, Document, ListKind, MathContent, NumberingTable, Run};
use crate::traits::{ConversionError, Result, Serializer};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deepest `w:ilvl` a numbering definition carries
pub const MAX_LIST_LEVEL: usize = 8;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_M: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const MONOSPACE_RUN_PROPS: &str = r#"<w:rFonts w:ascii="Courier New" w:hAnsi="Courier New" w:cs="Courier New"/><w:sz w:val="20"/>"#;

/// Writes documents as OOXML word-processing packages
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxSerializer;

impl DocxSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for DocxSerializer {
    fn serialize(&self, document: &Document) -> Result<Vec<u8>> {
        check_numbering(document)?;

        let parts = [
            ("[Content_Types].xml", content_types_xml().to_string()),
            ("_rels/.rels", package_rels_xml().to_string()),
            ("word/document.xml", document_xml(document)),
            ("word/styles.xml", styles_xml()),
            ("word/numbering.xml", numbering_xml(&document.numbering)),
            ("word/_rels/document.xml.rels", document_rels_xml().to_string()),
        ];

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, content) in &parts {
            zip.start_file(*name, options)?;
            zip.write_all(content.as_bytes())?;
        }
        let bytes = zip.finish()?.into_inner();

        debug!(bytes = bytes.len(), parts = parts.len(), "wrote docx package");
        Ok(bytes)
    }
}

/// Every list paragraph must count against a declared numbering instance
fn check_numbering(document: &Document) -> Result<()> {
    for block in &document.blocks {
        if let Block::ListParagraph { instance, .. } = block {
            if document.numbering.instance(*instance).is_none() {
                return Err(ConversionError::Serialize(format!(
                    "list paragraph references undeclared numbering instance {instance}"
                )));
            }
        }
    }
    Ok(())
}

/// `word/document.xml`
pub fn document_xml(document: &Document) -> String {
    let mut body = String::new();
    for block in &document.blocks {
        write_block(&mut body, block);
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{NS_W}" xmlns:m="{NS_M}" xmlns:r="{NS_R}"><w:body>{body}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    )
}

fn write_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading { level, text } => {
            out.push_str(&format!(
                r#"<w:p><w:pPr><w:pStyle w:val="Heading{level}"/></w:pPr>"#
            ));
            write_text_run(out, text, "");
            out.push_str("</w:p>");
        }
        Block::Paragraph { runs } => {
            out.push_str("<w:p>");
            write_runs(out, runs);
            out.push_str("</w:p>");
        }
        Block::ListParagraph {
            runs,
            level,
            instance,
            ..
        } => {
            let level = (*level).min(MAX_LIST_LEVEL);
            out.push_str(&format!(
                r#"<w:p><w:pPr><w:pStyle w:val="ListParagraph"/><w:numPr><w:ilvl w:val="{level}"/><w:numId w:val="{instance}"/></w:numPr></w:pPr>"#
            ));
            write_runs(out, runs);
            out.push_str("</w:p>");
        }
        Block::CodeBlock { text, .. } => {
            out.push_str(r#"<w:p><w:pPr><w:pStyle w:val="Code"/></w:pPr><w:r>"#);
            for (index, line) in text.split('\n').enumerate() {
                if index > 0 {
                    out.push_str("<w:br/>");
                }
                out.push_str(&format!(
                    r#"<w:t xml:space="preserve">{}</w:t>"#,
                    xml_text(line)
                ));
            }
            out.push_str("</w:r></w:p>");
        }
        Block::Rule => out.push_str(
            r#"<w:p><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="auto"/></w:pBdr></w:pPr></w:p>"#,
        ),
        Block::MathBlock { math } => match math {
            MathContent::Tree(tree) => {
                out.push_str("<w:p>");
                out.push_str(&omml::omath_para(tree));
                out.push_str("</w:p>");
            }
            MathContent::Fallback(source) => {
                out.push_str(r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr>"#);
                write_text_run(out, source, "<w:i/>");
                out.push_str("</w:p>");
            }
        },
    }
}

fn write_runs(out: &mut String, runs: &[Run]) {
    for run in runs {
        match run {
            Run::PlainText(text) => write_text_run(out, text, ""),
            Run::Bold(text) => write_text_run(out, text, "<w:b/>"),
            Run::Italic(text) => write_text_run(out, text, "<w:i/>"),
            Run::Monospace(text) => write_text_run(out, text, MONOSPACE_RUN_PROPS),
            Run::LineBreak => out.push_str("<w:r><w:br/></w:r>"),
            Run::MathInline(MathContent::Tree(tree)) => out.push_str(&omml::omath(tree)),
            Run::MathInline(MathContent::Fallback(source)) => {
                write_text_run(out, source, "<w:i/>")
            }
        }
    }
}

fn write_text_run(out: &mut String, text: &str, props: &str) {
    out.push_str("<w:r>");
    if !props.is_empty() {
        out.push_str("<w:rPr>");
        out.push_str(props);
        out.push_str("</w:rPr>");
    }
    out.push_str(&format!(
        r#"<w:t xml:space="preserve">{}</w:t></w:r>"#,
        xml_text(text)
    ));
}

/// Escape text content, dropping control characters XML 1.0 cannot carry
fn xml_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|&ch| ch == '\t' || !ch.is_control())
        .collect();
    encode_text(&cleaned).into_owned()
}

/// `word/numbering.xml`: one abstract definition per list kind, one `w:num`
/// per numbering instance
pub fn numbering_xml(numbering: &NumberingTable) -> String {
    let mut out = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="{NS_W}">"#
    );

    for (abstract_id, definition) in numbering.definitions.iter().enumerate() {
        out.push_str(&format!(
            r#"<w:abstractNum w:abstractNumId="{abstract_id}"><w:multiLevelType w:val="hybridMultilevel"/>"#
        ));
        for level in definition.levels.iter().take(MAX_LIST_LEVEL + 1) {
            out.push_str(&format!(
                r#"<w:lvl w:ilvl="{}"><w:start w:val="1"/><w:numFmt w:val="{}"/><w:lvlText w:val="{}"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="{}" w:hanging="{}"/></w:pPr></w:lvl>"#,
                level.level,
                level.format.as_str(),
                encode_double_quoted_attribute(&level.text),
                level.indent_left,
                level.hanging,
            ));
        }
        out.push_str("</w:abstractNum>");
    }

    for instance in &numbering.instances {
        let Some(abstract_id) = abstract_id(numbering, instance.kind) else {
            continue;
        };
        out.push_str(&format!(
            r#"<w:num w:numId="{}"><w:abstractNumId w:val="{abstract_id}"/>"#,
            instance.id
        ));
        if let Some(start) = instance.start {
            out.push_str(&format!(
                r#"<w:lvlOverride w:ilvl="0"><w:startOverride w:val="{start}"/></w:lvlOverride>"#
            ));
        }
        out.push_str("</w:num>");
    }

    out.push_str("</w:numbering>");
    out
}

fn abstract_id(numbering: &NumberingTable, kind: ListKind) -> Option<usize> {
    numbering
        .definitions
        .iter()
        .position(|definition| definition.kind == kind)
}

/// `word/styles.xml`
pub fn styles_xml() -> String {
    const HEADING_SIZES: [u32; 4] = [32, 28, 26, 24];

    let headings: String = HEADING_SIZES
        .iter()
        .enumerate()
        .map(|(index, size)| {
            let level = index + 1;
            format!(
                r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="{index}"/></w:pPr><w:rPr><w:b/><w:sz w:val="{size}"/></w:rPr></w:style>"#
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{NS_W}"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>{headings}<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/><w:qFormat/><w:pPr><w:ind w:left="720"/><w:contextualSpacing/></w:pPr></w:style><w:style w:type="paragraph" w:styleId="Code"><w:name w:val="Code"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:before="0" w:after="0"/></w:pPr><w:rPr>{MONOSPACE_RUN_PROPS}</w:rPr></w:style></w:styles>"#
    )
}

fn content_types_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#
}

fn package_rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
}

fn document_rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/></Relationships>"#
}

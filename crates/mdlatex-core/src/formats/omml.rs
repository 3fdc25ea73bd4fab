// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lowering of math element trees to Office Math Markup
//!
//! The document model keeps math as the presentation tree the renderer
//! produced. Word wants OMML, whose structures are positional (`m:f` holds
//! `m:num` then `m:den`, `m:sSup` holds `m:e` then `m:sup`), so each
//! presentation element is mapped onto the OMML structure with the same
//! meaning. Layout-only wrappers (`mrow`, `mstyle`, `mpadded`, ...) are
//! transparent.

use crate::ast::{MathElement, MathNode};
use html_escape::{encode_double_quoted_attribute, encode_text};

/// Operators that take limits as an n-ary structure
const LARGE_OPERATORS: &[char] = &[
    '∑', '∏', '∐', '∫', '∬', '∭', '∮', '⋃', '⋂', '⋁', '⋀', '⨁', '⨂', '⨀',
];

/// `<m:oMath>` for an inline formula
pub fn omath(tree: &MathElement) -> String {
    format!("<m:oMath>{}</m:oMath>", lower(tree))
}

/// Centred `<m:oMathPara>` for a display formula
pub fn omath_para(tree: &MathElement) -> String {
    format!(
        r#"<m:oMathPara><m:oMathParaPr><m:jc m:val="center"/></m:oMathParaPr>{}</m:oMathPara>"#,
        omath(tree)
    )
}

/// OMML content for a tree, without the `m:oMath` wrapper
pub fn lower(tree: &MathElement) -> String {
    let mut writer = OmmlWriter::default();
    writer.element(tree);
    writer.out
}

#[derive(Default)]
struct OmmlWriter {
    out: String,
}

impl OmmlWriter {
    fn element(&mut self, element: &MathElement) {
        match element.tag.as_str() {
            "mi" => {
                let text = element.text();
                let italic = text.chars().count() == 1
                    && element.attribute("mathvariant") != Some("normal");
                self.run(&text, italic);
            }
            "mn" | "mo" | "mtext" | "ms" => self.run(&element.text(), false),
            "mspace" => self.run(" ", false),
            "mfrac" => {
                self.out.push_str("<m:f>");
                if element.attribute("linethickness") == Some("0") {
                    self.out
                        .push_str(r#"<m:fPr><m:type m:val="noBar"/></m:fPr>"#);
                }
                self.wrap("m:num", arg(element, 0));
                self.wrap("m:den", arg(element, 1));
                self.out.push_str("</m:f>");
            }
            "msup" => self.script("m:sSup", element, &[("m:e", 0), ("m:sup", 1)]),
            "msub" => self.script("m:sSub", element, &[("m:e", 0), ("m:sub", 1)]),
            "msubsup" => match large_operator(arg(element, 0)) {
                Some(op) => self.nary(op, "subSup", arg(element, 1), arg(element, 2)),
                None => self.script(
                    "m:sSubSup",
                    element,
                    &[("m:e", 0), ("m:sub", 1), ("m:sup", 2)],
                ),
            },
            "msqrt" => {
                self.out.push_str(
                    r#"<m:rad><m:radPr><m:degHide m:val="1"/></m:radPr><m:deg/><m:e>"#,
                );
                self.children(element);
                self.out.push_str("</m:e></m:rad>");
            }
            "mroot" => self.script("m:rad", element, &[("m:deg", 1), ("m:e", 0)]),
            "mover" => match arg(element, 1).filter(|over| over.tag == "mo") {
                Some(accent) => {
                    self.out.push_str(&format!(
                        r#"<m:acc><m:accPr><m:chr m:val="{}"/></m:accPr>"#,
                        encode_double_quoted_attribute(&accent.text())
                    ));
                    self.wrap("m:e", arg(element, 0));
                    self.out.push_str("</m:acc>");
                }
                None => self.script("m:limUpp", element, &[("m:e", 0), ("m:lim", 1)]),
            },
            "munder" => self.script("m:limLow", element, &[("m:e", 0), ("m:lim", 1)]),
            "munderover" => match large_operator(arg(element, 0)) {
                Some(op) => self.nary(op, "undOvr", arg(element, 1), arg(element, 2)),
                None => {
                    self.out.push_str("<m:limUpp><m:e><m:limLow>");
                    self.wrap("m:e", arg(element, 0));
                    self.wrap("m:lim", arg(element, 1));
                    self.out.push_str("</m:limLow></m:e>");
                    self.wrap("m:lim", arg(element, 2));
                    self.out.push_str("</m:limUpp>");
                }
            },
            "mfenced" => {
                self.out.push_str(&format!(
                    r#"<m:d><m:dPr><m:begChr m:val="{}"/><m:endChr m:val="{}"/></m:dPr>"#,
                    encode_double_quoted_attribute(element.attribute("open").unwrap_or("(")),
                    encode_double_quoted_attribute(element.attribute("close").unwrap_or(")")),
                ));
                for child in element.elements() {
                    self.wrap("m:e", Some(child));
                }
                self.out.push_str("</m:d>");
            }
            "mtable" => {
                self.out.push_str("<m:m>");
                for row in element.elements() {
                    self.out.push_str("<m:mr>");
                    for cell in row.elements() {
                        self.out.push_str("<m:e>");
                        self.children(cell);
                        self.out.push_str("</m:e>");
                    }
                    self.out.push_str("</m:mr>");
                }
                self.out.push_str("</m:m>");
            }
            "semantics" => {
                if let Some(first) = element.elements().next() {
                    self.element(first);
                }
            }
            "annotation" | "annotation-xml" => {}
            _ => self.children(element),
        }
    }

    fn children(&mut self, element: &MathElement) {
        for child in &element.children {
            match child {
                MathNode::Element(child) => self.element(child),
                MathNode::Text(text) if !text.trim().is_empty() => self.run(text, false),
                MathNode::Text(_) => {}
            }
        }
    }

    fn run(&mut self, text: &str, italic: bool) {
        let style = if italic { "i" } else { "p" };
        self.out.push_str(&format!(
            r#"<m:r><m:rPr><m:sty m:val="{style}"/></m:rPr><m:t xml:space="preserve">{}</m:t></m:r>"#,
            encode_text(text)
        ));
    }

    fn wrap(&mut self, tag: &str, content: Option<&MathElement>) {
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push('>');
        if let Some(content) = content {
            self.element(content);
        }
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    /// Positional structure: each slot takes the element child at an index
    fn script(&mut self, tag: &str, element: &MathElement, slots: &[(&str, usize)]) {
        self.out.push_str(&format!("<{tag}>"));
        for (slot, index) in slots {
            self.wrap(slot, arg(element, *index));
        }
        self.out.push_str(&format!("</{tag}>"));
    }

    fn nary(
        &mut self,
        op: char,
        location: &str,
        lower: Option<&MathElement>,
        upper: Option<&MathElement>,
    ) {
        self.out.push_str(&format!(
            r#"<m:nary><m:naryPr><m:chr m:val="{op}"/><m:limLoc m:val="{location}"/></m:naryPr>"#
        ));
        self.wrap("m:sub", lower);
        self.wrap("m:sup", upper);
        self.out.push_str("<m:e/></m:nary>");
    }
}

fn arg(element: &MathElement, index: usize) -> Option<&MathElement> {
    element.elements().nth(index)
}

/// The operator character when `base` is a single large operator
fn large_operator(base: Option<&MathElement>) -> Option<char> {
    let base = base.filter(|base| base.tag == "mo")?;
    let text = base.text();
    let mut chars = text.trim().chars();
    let op = chars.next()?;
    (chars.next().is_none() && LARGE_OPERATORS.contains(&op)).then_some(op)
}

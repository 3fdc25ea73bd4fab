// SPDX-License-Identifier: AGPL-3.0-or-later
//! Markdown to document model, end to end

use mdlatex_core::ast::NumberingInstance;
use mdlatex_core::{
    Block, BlockState, BlockTransducer, ConvertConfig, Converter, DocxSerializer, LatexRenderer,
    ListKind, MarkdownTokenizer, MathContent, MathConverter, MathError, MathMode, MathRenderer,
    NumberingPolicy, Run, TokenCursor, Tokenizer, TransducerOptions,
};
use pretty_assertions::assert_eq;

struct Failing;

impl MathRenderer for Failing {
    fn render(&self, _source: &str, _mode: MathMode) -> Result<String, MathError> {
        Err(MathError::Render("stubbed".to_string()))
    }
}

fn blocks(input: &str) -> Vec<Block> {
    Converter::default().to_document(input).unwrap().blocks
}

fn item(text: &str, kind: ListKind, level: usize, instance: usize) -> Block {
    Block::ListParagraph {
        runs: vec![Run::PlainText(text.to_string())],
        kind,
        level,
        instance,
    }
}

#[test]
fn heading_then_styled_paragraph() {
    assert_eq!(
        blocks("# Title\n\nHello **world**"),
        vec![
            Block::heading(1, "Title"),
            Block::Paragraph {
                runs: vec![
                    Run::PlainText("Hello ".to_string()),
                    Run::Bold("world".to_string()),
                ]
            },
        ]
    );
}

#[test]
fn ordered_list_items_at_level_zero() {
    assert_eq!(
        blocks("1. a\n2. b"),
        vec![
            item("a", ListKind::Ordered, 0, 1),
            item("b", ListKind::Ordered, 0, 1),
        ]
    );
}

#[test]
fn display_math_converts_to_tree() {
    let blocks = blocks("$$E=mc^2$$");
    assert_eq!(blocks.len(), 1);
    let Block::MathBlock { math } = &blocks[0] else {
        panic!("expected a math block, got {:?}", blocks[0]);
    };
    let tree = math.tree().expect("E=mc^2 converts");
    assert_eq!(tree.tag, "math");
    let text = tree.text();
    assert!(text.contains('E') && text.contains('c') && text.contains('2'));
}

#[test]
fn display_math_falls_back_to_source() {
    let converter = Converter::with_parts(
        MarkdownTokenizer::default(),
        Failing,
        DocxSerializer,
        TransducerOptions::default(),
    );
    let document = converter.to_document("$$E=mc^2$$").unwrap();
    assert_eq!(
        document.blocks,
        vec![Block::MathBlock {
            math: MathContent::Fallback("E=mc^2".to_string())
        }]
    );
}

#[test]
fn separated_lists_restart_numbering() {
    let document = Converter::default()
        .to_document("1. x\n2. y\n\nBetween\n\n1. z")
        .unwrap();

    assert_eq!(
        document.blocks,
        vec![
            item("x", ListKind::Ordered, 0, 1),
            item("y", ListKind::Ordered, 0, 1),
            Block::Paragraph {
                runs: vec![Run::PlainText("Between".to_string())]
            },
            item("z", ListKind::Ordered, 0, 2),
        ]
    );
    assert_eq!(
        document.numbering.instances,
        vec![
            NumberingInstance {
                id: 1,
                kind: ListKind::Ordered,
                start: Some(1)
            },
            NumberingInstance {
                id: 2,
                kind: ListKind::Ordered,
                start: Some(1)
            },
        ]
    );
}

#[test]
fn separated_lists_continue_when_configured() {
    let mut config = ConvertConfig::default();
    config.transducer.numbering = NumberingPolicy::Continue;
    let document = Converter::new(&config)
        .to_document("1. x\n\nBetween\n\n1. z")
        .unwrap();

    assert_eq!(document.numbering.instances.len(), 1);
    assert_eq!(document.blocks[2], item("z", ListKind::Ordered, 0, 1));
}

#[test]
fn list_keeps_its_start_number() {
    let document = Converter::default().to_document("10. ten\n11. eleven").unwrap();
    assert_eq!(document.numbering.instances[0].start, Some(10));
}

#[test]
fn nested_bullets_share_instance_and_step_level() {
    assert_eq!(
        blocks("- a\n  - b\n- c"),
        vec![
            item("a", ListKind::Bullet, 0, 1),
            item("b", ListKind::Bullet, 1, 1),
            item("c", ListKind::Bullet, 0, 1),
        ]
    );
}

#[test]
fn heading_with_math_keeps_its_source() {
    assert_eq!(blocks("## Energy $E=mc^2$"), vec![Block::heading(2, "Energy $E=mc^2$")]);
}

#[test]
fn deep_headings_clamp() {
    assert_eq!(blocks("###### Deep"), vec![Block::heading(4, "Deep")]);
}

#[test]
fn code_and_rule_pass_through() {
    assert_eq!(
        blocks("```python\nprint(1)\n```\n\n---"),
        vec![
            Block::CodeBlock {
                info: Some("python".to_string()),
                text: "print(1)".to_string(),
            },
            Block::Rule,
        ]
    );
}

#[test]
fn code_inside_item_stays_after_item_text() {
    assert_eq!(
        blocks("- item text\n\n  ```\n  code\n  ```\n- next"),
        vec![
            item("item text", ListKind::Bullet, 0, 1),
            Block::CodeBlock {
                info: None,
                text: "code".to_string(),
            },
            item("next", ListKind::Bullet, 0, 1),
        ]
    );
}

#[test]
fn inequalities_convert_to_trees() {
    for source in ["$$x < y$$", "$$0 < x \\le 1$$", "Since $a<b$ holds"] {
        let blocks = blocks(source);
        let math = match &blocks[0] {
            Block::MathBlock { math } => math,
            Block::Paragraph { runs } => match runs.iter().find_map(|run| match run {
                Run::MathInline(math) => Some(math),
                _ => None,
            }) {
                Some(math) => math,
                None => panic!("no math in {runs:?}"),
            },
            other => panic!("unexpected block {other:?}"),
        };
        assert!(math.tree().is_some(), "{source} fell back to {math:?}");
    }
}

#[test]
fn transducer_steps_driven_by_caller() {
    let tokens = MarkdownTokenizer::default()
        .tokenize("1. one\n2. two\n\nAfter")
        .unwrap();
    let math = MathConverter::new(LatexRenderer::default());
    let transducer = BlockTransducer::new(&math, TransducerOptions::default());

    let mut cursor = TokenCursor::new(&tokens);
    let mut state = BlockState::default();
    let mut max_depth = 0;
    while let Some(token) = cursor.next() {
        state = transducer.step(state, token, &mut cursor).unwrap();
        max_depth = max_depth.max(state.depth());
    }
    assert_eq!(cursor.offset(), tokens.len());
    assert_eq!(max_depth, 1);

    let output = transducer.finish(state);
    assert_eq!(
        output.blocks,
        vec![
            item("one", ListKind::Ordered, 0, 1),
            item("two", ListKind::Ordered, 0, 1),
            Block::Paragraph {
                runs: vec![Run::PlainText("After".to_string())]
            },
        ]
    );
}

#[test]
fn whole_document_serializes() {
    let input = "# Notes\n\nLet $x \\in \\RR$ and\n\n$$\\sum_{i=1}^n i = \\frac{n(n+1)}{2}$$\n\n1. first\n   - inner\n2. second\n";
    let bytes = Converter::default().convert(input).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

use std::ops::Range;

use crate::block::{Block, CodeBlock, TextBlock};
use crate::parser::code::tokenize_code;
use crate::symbols::{self, BLOCK_ENDER, BLOCK_STARTER, ESCAPE_CHAR};

/// Length of the shortest possible code block, `{{}}`.
const MIN_CODE_BLOCK_LENGTH: usize = 4;

/// Split a template into Text, Variable and Code blocks.
///
/// Code segments are delimited by `{{` and `}}`. Inside a segment, `}}`
/// within a quoted value does not close it. Segments that are never closed
/// stay text. Blocks are not validated here.
pub fn tokenize(text: &str) -> Vec<Block> {
    if text.is_empty() {
        return vec![Block::Text(TextBlock::new("", 0..0))];
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    if chars.len() < MIN_CODE_BLOCK_LENGTH {
        return vec![Block::Text(TextBlock::new(text, 0..text.len()))];
    }

    // Byte offset of the char at `index`, or the end of the text.
    let offset = |index: usize| chars.get(index).map_or(text.len(), |(o, _)| *o);

    let mut blocks = Vec::new();
    let mut end_of_last_block = 0;
    let mut block_start = 0;
    let mut block_start_found = false;
    let mut inside_value = false;
    let mut value_delimiter = '\0';
    let mut skip_next_char = false;

    for cursor in 1..chars.len() {
        let current = chars[cursor - 1].1;
        let next = chars[cursor].1;

        if skip_next_char {
            skip_next_char = false;
            continue;
        }

        // "{{ {{x}}" starts the block at the last "{{"
        if !inside_value && current == BLOCK_STARTER && next == BLOCK_STARTER {
            block_start = cursor - 1;
            block_start_found = true;
        }

        if !block_start_found {
            continue;
        }

        if inside_value {
            if current == ESCAPE_CHAR && symbols::can_be_escaped(next) {
                skip_next_char = true;
                continue;
            }
            if current == value_delimiter {
                inside_value = false;
            }
        } else if symbols::is_quote(current) {
            inside_value = true;
            value_delimiter = current;
        } else if current == BLOCK_ENDER && next == BLOCK_ENDER {
            if block_start > end_of_last_block {
                let span = offset(end_of_last_block)..offset(block_start);
                blocks.push(Block::Text(TextBlock::new(&text[span.clone()], span)));
            }

            let outer = offset(block_start)..offset(cursor + 1);
            let inner_start = offset(block_start + 2);
            let inner_end = offset(cursor - 1);
            blocks.push(code_segment(text, outer, inner_start..inner_end));

            end_of_last_block = cursor + 1;
            block_start_found = false;
        }
    }

    if end_of_last_block < chars.len() {
        let span = offset(end_of_last_block)..text.len();
        blocks.push(Block::Text(TextBlock::new(&text[span.clone()], span)));
    }

    blocks
}

/// Build the block for one `{{ ... }}` segment.
fn code_segment(text: &str, outer: Range<usize>, inner: Range<usize>) -> Block {
    let raw = &text[inner.clone()];
    let content = raw.trim();
    if content.is_empty() {
        return Block::Text(TextBlock::new(&text[outer.clone()], outer));
    }

    let start = inner.start + (raw.len() - raw.trim_start().len());
    let span = start..start + content.len();
    let mut code = tokenize_code(content, start);

    // A lone variable is substituted directly rather than through a code block.
    if code.error.is_none()
        && code.tokens.len() == 1
        && matches!(code.tokens.first(), Some(Block::Variable(_)))
    {
        if let Some(var) = code.tokens.pop() {
            return var;
        }
    }

    Block::Code(CodeBlock::new(content, code.tokens, span).with_tokenizer_error(code.error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockType;

    fn shape(blocks: &[Block]) -> Vec<(BlockType, &str)> {
        blocks.iter().map(|b| (b.block_type(), b.content())).collect()
    }

    #[test]
    fn empty_template_is_one_empty_text_block() {
        let blocks = tokenize("");
        assert_eq!(shape(&blocks), vec![(BlockType::Text, "")]);
    }

    #[test]
    fn short_template_is_text() {
        assert_eq!(shape(&tokenize("{{}")), vec![(BlockType::Text, "{{}")]);
    }

    #[test]
    fn plain_text_is_one_block() {
        let blocks = tokenize("Hello world, no code here.");
        assert_eq!(shape(&blocks), vec![(BlockType::Text, "Hello world, no code here.")]);
    }

    #[test]
    fn splits_text_variables_and_code() {
        let blocks = tokenize("Hello {{$name}}, you ordered {{menu.getSpecial}}!");
        assert_eq!(
            shape(&blocks),
            vec![
                (BlockType::Text, "Hello "),
                (BlockType::Variable, "$name"),
                (BlockType::Text, ", you ordered "),
                (BlockType::Code, "menu.getSpecial"),
                (BlockType::Text, "!"),
            ]
        );
    }

    #[test]
    fn spans_point_into_source() {
        let source = "ab {{ $x }} cd";
        let blocks = tokenize(source);
        assert_eq!(&source[blocks[1].span().clone()], "$x");
        assert_eq!(&source[blocks[2].span().clone()], " cd");
    }

    #[test]
    fn single_value_stays_inside_code_block() {
        let blocks = tokenize("{{ 'x' }}");
        assert_eq!(shape(&blocks), vec![(BlockType::Code, "'x'")]);
    }

    #[test]
    fn empty_code_segment_is_text() {
        assert_eq!(shape(&tokenize("a {{  }} b")), vec![
            (BlockType::Text, "a "),
            (BlockType::Text, "{{  }}"),
            (BlockType::Text, " b"),
        ]);
    }

    #[test]
    fn last_opening_delimiter_wins() {
        let blocks = tokenize("{{ {{$x}}");
        assert_eq!(shape(&blocks), vec![(BlockType::Text, "{{ "), (BlockType::Variable, "$x")]);

        let blocks = tokenize("{{{$x}}}");
        assert_eq!(
            shape(&blocks),
            vec![(BlockType::Text, "{"), (BlockType::Variable, "$x"), (BlockType::Text, "}")]
        );
    }

    #[test]
    fn closing_braces_inside_quotes_do_not_close() {
        let blocks = tokenize("{{ f '}}' }}");
        assert_eq!(shape(&blocks), vec![(BlockType::Code, "f '}}'")]);
    }

    #[test]
    fn escaped_quote_inside_value() {
        let blocks = tokenize(r"{{ f 'it\'s }}' }}");
        assert_eq!(blocks.len(), 1);
        let Block::Code(code) = &blocks[0] else { panic!("expected code block") };
        let Block::Value(val) = &code.tokens[1] else { panic!("expected value") };
        assert_eq!(val.value, "it's }}");
    }

    #[test]
    fn unterminated_segment_is_text() {
        let blocks = tokenize("Hi {{ $name");
        assert_eq!(shape(&blocks), vec![(BlockType::Text, "Hi {{ $name")]);
    }

    #[test]
    fn unterminated_quote_keeps_rest_as_text() {
        let blocks = tokenize("{{ f 'oops }} tail");
        assert_eq!(shape(&blocks), vec![(BlockType::Text, "{{ f 'oops }} tail")]);
    }

    #[test]
    fn quotes_in_plain_text_are_ignored() {
        let blocks = tokenize("it's {{$x}}");
        assert_eq!(shape(&blocks), vec![(BlockType::Text, "it's "), (BlockType::Variable, "$x")]);
    }

    #[test]
    fn multibyte_text_keeps_byte_spans() {
        let source = "héllo {{$x}} wörld";
        let blocks = tokenize(source);
        for block in &blocks {
            assert_eq!(&source[block.span().clone()], block.content());
        }
        assert_eq!(blocks.len(), 3);
    }
}

use std::ops::Range;

use crate::block::{Block, BlockError, BlockType, FunctionIdBlock, NamedArgBlock, ValBlock, VarBlock};
use crate::symbols::{self, ESCAPE_CHAR, NAMED_ARG_SEPARATOR, VAR_PREFIX};

/// Tokens of one code segment, plus the first structural problem found.
#[derive(Debug, Clone, Default)]
pub struct CodeTokens {
    pub tokens: Vec<Block>,
    /// Deferred to validation so tokenizing never fails.
    pub error: Option<BlockError>,
}

/// Split the inside of a `{{ ... }}` segment into Value, Variable,
/// FunctionId and NamedArg tokens.
///
/// `offset` is the byte position of `text` in the template source; token
/// spans are reported relative to the source.
pub fn tokenize_code(text: &str, offset: usize) -> CodeTokens {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte = |index: usize| chars.get(index).map_or(text.len(), |(o, _)| *o);

    let mut result = CodeTokens::default();
    let mut separated = true;
    let mut i = 0;

    while i < chars.len() {
        let first = chars[i].1;
        if symbols::is_blank_space(first) {
            separated = true;
            i += 1;
            continue;
        }

        let start = i;
        if !separated && result.error.is_none() {
            let at = offset + byte(start);
            result.error = Some(BlockError::new(
                BlockType::Code,
                "Tokens must be separated by one space at least",
                at..at + first.len_utf8(),
            ));
        }

        i = if symbols::is_quote(first) {
            scan_quoted(&chars, i)
        } else {
            scan_word(&chars, i)
        };

        let content = &text[byte(start)..byte(i)];
        let span: Range<usize> = offset + byte(start)..offset + byte(i);
        let token = if symbols::is_quote(first) {
            Block::Value(ValBlock::parse(content, span))
        } else if first == VAR_PREFIX {
            Block::Variable(VarBlock::new(content, span))
        } else if content.contains(NAMED_ARG_SEPARATOR) {
            Block::NamedArg(NamedArgBlock::new(content, span))
        } else {
            Block::FunctionId(FunctionIdBlock::new(content, span))
        };
        result.tokens.push(token);
        separated = false;
    }

    result
}

/// Index just past the quote closing the value that opens at `start`, or
/// the end of input when the value is unterminated.
fn scan_quoted(chars: &[(usize, char)], start: usize) -> usize {
    let quote = chars[start].1;
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == ESCAPE_CHAR && chars.get(i + 1).is_some_and(|(_, n)| symbols::can_be_escaped(*n)) {
            i += 2;
            continue;
        }
        if c == quote {
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Index of the whitespace ending the word that starts at `start`. A quoted
/// value right after `=` is read whole, spaces included.
fn scan_word(chars: &[(usize, char)], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i].1;
        if symbols::is_blank_space(c) {
            break;
        }
        if c == NAMED_ARG_SEPARATOR && chars.get(i + 1).is_some_and(|(_, n)| symbols::is_quote(*n)) {
            i = scan_quoted(chars, i + 1);
            continue;
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &CodeTokens) -> Vec<(BlockType, &str)> {
        code.tokens.iter().map(|t| (t.block_type(), t.content())).collect()
    }

    #[test]
    fn empty_input_has_no_tokens() {
        let code = tokenize_code("", 0);
        assert!(code.tokens.is_empty());
        assert!(code.error.is_none());
    }

    #[test]
    fn single_tokens() {
        assert_eq!(kinds(&tokenize_code("$x", 0)), vec![(BlockType::Variable, "$x")]);
        assert_eq!(kinds(&tokenize_code("'x'", 0)), vec![(BlockType::Value, "'x'")]);
        assert_eq!(kinds(&tokenize_code("f", 0)), vec![(BlockType::FunctionId, "f")]);
        assert_eq!(kinds(&tokenize_code("$", 0)), vec![(BlockType::Variable, "$")]);
    }

    #[test]
    fn function_call_with_arguments() {
        let code = tokenize_code("weather.get  $city unit='celsius' day=$day", 0);
        assert_eq!(
            kinds(&code),
            vec![
                (BlockType::FunctionId, "weather.get"),
                (BlockType::Variable, "$city"),
                (BlockType::NamedArg, "unit='celsius'"),
                (BlockType::NamedArg, "day=$day"),
            ]
        );
        assert!(code.error.is_none());
    }

    #[test]
    fn quoted_values_keep_spaces() {
        let code = tokenize_code("f 'hello world' greeting=\"good  morning\"", 0);
        assert_eq!(
            kinds(&code),
            vec![
                (BlockType::FunctionId, "f"),
                (BlockType::Value, "'hello world'"),
                (BlockType::NamedArg, "greeting=\"good  morning\""),
            ]
        );
    }

    #[test]
    fn escaped_quotes_do_not_end_value() {
        let code = tokenize_code(r#"f 'a \' b'"#, 0);
        let Block::Value(val) = &code.tokens[1] else { panic!("expected value") };
        assert_eq!(val.value, "a ' b");
        assert!(val.terminated);
    }

    #[test]
    fn unterminated_value_is_kept_for_validation() {
        let code = tokenize_code("f 'abc", 0);
        assert!(code.error.is_none());
        let Block::Value(val) = &code.tokens[1] else { panic!("expected value") };
        assert!(!val.terminated);
        assert!(val.validate().is_err());
    }

    #[test]
    fn missing_separator_is_deferred() {
        let code = tokenize_code("f 'a'$b", 10);
        assert_eq!(code.tokens.len(), 3);
        let err = code.error.expect("deferred error");
        assert!(err.message.contains("separated by one space"));
        assert_eq!(err.span, 15..16);
    }

    #[test]
    fn spans_are_offset_into_source() {
        let code = tokenize_code("f $x", 7);
        assert_eq!(code.tokens[0].span(), &(7..8));
        assert_eq!(code.tokens[1].span(), &(9..11));
    }

    #[test]
    fn unprefixed_named_value_becomes_invalid_named_arg() {
        let code = tokenize_code("f x=y", 0);
        assert_eq!(code.tokens[1].block_type(), BlockType::NamedArg);
        assert!(code.tokens[1].validate().is_err());
    }
}

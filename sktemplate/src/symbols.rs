//! Characters with a meaning in the template language.

pub const BLOCK_STARTER: char = '{';
pub const BLOCK_ENDER: char = '}';
pub const VAR_PREFIX: char = '$';
pub const DBL_QUOTE: char = '"';
pub const SGL_QUOTE: char = '\'';
pub const ESCAPE_CHAR: char = '\\';
pub const NAMED_ARG_SEPARATOR: char = '=';
pub const FUNCTION_SEPARATOR: char = '.';

pub fn is_quote(c: char) -> bool {
    c == DBL_QUOTE || c == SGL_QUOTE
}

pub fn is_blank_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Characters that may follow `\` inside a quoted value.
pub fn can_be_escaped(c: char) -> bool {
    c == DBL_QUOTE || c == SGL_QUOTE || c == ESCAPE_CHAR
}

/// Letters, digits and underscore.
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

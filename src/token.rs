//! The token definition for range filter expressions such as `gte(10)`.

/// A token is a single unit of a range expression, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Operator names: "lt", "lte", "gt", "gte" (any casing)
    Ident(&'a str),

    // Literals
    Number(&'a str), // The raw digit run, unparsed

    // Punctuation
    LParen, // (
    RParen, // )

    // Special
    Illegal(char), // Anything else, including whitespace
    Eof,           // End of input
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

//! Token kinds produced by the lexer.
//!
//! Knight's surface grammar has no lexical ambiguity: every token is
//! recognized by its leading byte, so the scanner stays a thin, regular
//! pass. This module documents the shape the parser consumes.

use crate::diagnostic::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    IntegerLiteral,
    /// `span` covers the literal's contents with the surrounding quotes
    /// already stripped.
    StringLiteral,
    Identifier,
    /// A single-character function tag (`+ - * / % ^ < > ? | ; = & : ! ~ , [ ] @`).
    SymbolFunction,
    /// A function tag spelled as an uppercase word (`BLOCK`, `OUTPUT`, ...).
    /// `span` covers the whole uppercase run; only its first byte is
    /// semantically significant (Knight word-functions are identified by
    /// their leading letter, the rest reads as a mnemonic comment).
    WordFunction,
    LParen,
    RParen,
    Eof,
    Invalid,
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

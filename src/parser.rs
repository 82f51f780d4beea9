//! Recursive-descent parser: tokens in, a flat [`Ast`] out.
//!
//! Every function tag has a fixed arity, so parsing never needs
//! lookahead beyond the current token: read the tag, then recursively
//! parse exactly `arity` operands. Parentheses are purely decorative —
//! `(expr)` lowers to the same node as `expr`.

use crate::ast::{Ast, NodeData, NodeKind};
use crate::diagnostic::{Diagnostic, Span};
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    ast: Ast,
}

impl<'src> Parser<'src> {
    pub fn parse(source: &'src str) -> Result<Ast> {
        let tokens = Lexer::new(source).tokenize();
        let mut parser = Parser { tokens, pos: 0, source, ast: Ast::default() };
        let root = parser.parse_expr()?;
        debug_assert_eq!(root, 0, "root node must be allocated first");
        parser.expect_eof()?;
        Ok(parser.ast)
    }

    fn current(&self) -> Token {
        self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.current();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&mut self) -> Result<()> {
        let tok = self.current();
        if tok.kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error_at(tok.span, "trailing input after a complete expression"))
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        let tok = self.advance();
        if tok.kind == kind {
            Ok(tok)
        } else {
            Err(self.error_at(tok.span, &format!("expected {what}")))
        }
    }

    fn error_at(&self, span: Span, message: &str) -> Error {
        let diag = Diagnostic::new(format!("parse error: {message}"))
            .with_source(self.source.to_string())
            .with_label(span, message.to_string());
        Error::Parse(diag)
    }

    fn leaf(&mut self, kind: NodeKind, span: Span) -> u32 {
        let idx = self.ast.kinds.len() as u32;
        self.ast.kinds.push(kind);
        self.ast.data.push(NodeData::Text(span));
        self.ast.spans.push(span);
        idx
    }

    pub fn parse_expr(&mut self) -> Result<u32> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::IntegerLiteral => Ok(self.leaf(NodeKind::IntegerLiteral, tok.span)),
            TokenKind::StringLiteral => Ok(self.leaf(NodeKind::StringLiteral, tok.span)),
            TokenKind::Identifier => Ok(self.leaf(NodeKind::Identifier, tok.span)),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "a closing ')'")?;
                Ok(inner)
            }
            TokenKind::SymbolFunction => self.parse_function(tok, true),
            TokenKind::WordFunction => self.parse_function(tok, false),
            TokenKind::Eof => Err(self.error_at(tok.span, "expected an expression, found end of input")),
            TokenKind::RParen => Err(self.error_at(tok.span, "unexpected ')'")),
            TokenKind::Invalid => Err(self.error_at(tok.span, "unrecognized character")),
        }
    }

    fn parse_function(&mut self, tok: Token, is_symbol: bool) -> Result<u32> {
        let byte = self.source.as_bytes()[tok.span.start];
        let Some((kind, arity)) = classify(byte, is_symbol) else {
            return Err(self.error_at(tok.span, "unknown function tag"));
        };

        let idx = self.ast.kinds.len() as u32;
        self.ast.kinds.push(kind);
        self.ast.data.push(NodeData::Children { start: 0, end: 0 });
        self.ast.spans.push(tok.span);

        let mut operands = Vec::with_capacity(arity);
        for _ in 0..arity {
            operands.push(self.parse_expr()?);
        }

        let start = self.ast.children.len() as u32;
        self.ast.children.extend(&operands);
        let end = self.ast.children.len() as u32;
        self.ast.data[idx as usize] = NodeData::Children { start, end };

        // Extend the node's span from the tag through its last operand
        // (if any) so diagnostics anchored on this node underline the
        // whole subexpression, not just the leading tag byte.
        if let Some(&last) = operands.last() {
            let last_span = self.ast.spans[last as usize];
            self.ast.spans[idx as usize] = Span::new(tok.span.start, last_span.end);
        }
        Ok(idx)
    }
}

/// Maps a function tag's leading byte to its node kind and arity.
/// Word functions are identified solely by their first letter;
/// the rest of an uppercase run reads as a mnemonic comment.
fn classify(byte: u8, is_symbol: bool) -> Option<(NodeKind, usize)> {
    if is_symbol {
        Some(match byte {
            b'@' => (NodeKind::EmptyList, 0),
            b':' => (NodeKind::Identity, 1),
            b'!' => (NodeKind::Not, 1),
            b'~' => (NodeKind::Negate, 1),
            b',' => (NodeKind::BoxOp, 1),
            b'[' => (NodeKind::Head, 1),
            b']' => (NodeKind::Tail, 1),
            b'+' => (NodeKind::Add, 2),
            b'-' => (NodeKind::Sub, 2),
            b'*' => (NodeKind::Mult, 2),
            b'/' => (NodeKind::Div, 2),
            b'&' => (NodeKind::And, 2),
            b'%' => (NodeKind::Mod, 2),
            b'^' => (NodeKind::Exp, 2),
            b'<' => (NodeKind::Less, 2),
            b'>' => (NodeKind::Greater, 2),
            b'?' => (NodeKind::Equal, 2),
            b'|' => (NodeKind::Or, 2),
            b';' => (NodeKind::Then, 2),
            b'=' => (NodeKind::Assign, 2),
            _ => return None,
        })
    } else {
        Some(match byte {
            b'T' => (NodeKind::True, 0),
            b'F' => (NodeKind::False, 0),
            b'N' => (NodeKind::Null, 0),
            b'P' => (NodeKind::Prompt, 0),
            b'R' => (NodeKind::Random, 0),
            b'A' => (NodeKind::Ascii, 1),
            b'B' => (NodeKind::BlockExpr, 1),
            b'C' => (NodeKind::CallOp, 1),
            b'D' => (NodeKind::DumpOp, 1),
            b'L' => (NodeKind::LengthOp, 1),
            b'O' => (NodeKind::OutputOp, 1),
            b'Q' => (NodeKind::QuitOp, 1),
            b'W' => (NodeKind::While, 2),
            b'I' => (NodeKind::If, 3),
            b'G' => (NodeKind::Get, 3),
            b'S' => (NodeKind::Set, 4),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal() {
        let ast = Parser::parse("123").unwrap();
        assert_eq!(ast.kinds[0], NodeKind::IntegerLiteral);
    }

    #[test]
    fn parses_binary_with_nested_unary() {
        let ast = Parser::parse("+ 1 ~2").unwrap();
        assert_eq!(ast.kinds[0], NodeKind::Add);
        let children = ast.children(0);
        assert_eq!(children.len(), 2);
        assert_eq!(ast.kinds[children[1] as usize], NodeKind::Negate);
    }

    #[test]
    fn parens_are_transparent() {
        let ast = Parser::parse("(1)").unwrap();
        assert_eq!(ast.kinds[0], NodeKind::IntegerLiteral);
    }

    #[test]
    fn function_node_span_covers_tag_through_last_operand() {
        let ast = Parser::parse("+ 1 ~2").unwrap();
        // The whole `+ 1 ~2` expression, not just the leading `+` byte.
        assert_eq!(ast.span(0), crate::diagnostic::Span::new(0, 6));
        let children = ast.children(0);
        // `~2`, not just the leading `~` byte.
        assert_eq!(ast.span(children[1]), crate::diagnostic::Span::new(4, 6));
    }

    #[test]
    fn if_takes_three_operands() {
        let ast = Parser::parse("I T 1 2").unwrap();
        assert_eq!(ast.kinds[0], NodeKind::If);
        assert_eq!(ast.children(0).len(), 3);
    }

    #[test]
    fn word_function_reads_only_its_first_letter() {
        // "IF" lexes as one WordFunction token; only its leading `I`
        // matters, so it still parses as IF with three operands.
        let ast = Parser::parse("IF cond a b").unwrap();
        assert_eq!(ast.kinds[0], NodeKind::If);
        assert_eq!(ast.children(0).len(), 3);
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(Parser::parse("1 2").is_err());
    }
}

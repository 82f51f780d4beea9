//! Crate-wide error type.
//!
//! A single `thiserror`-derived enum with one `#[error("...")]` message
//! per failure mode and a crate-local `Result` alias.

use thiserror::Error;

use crate::diagnostic::Diagnostic;

#[derive(Debug, Error)]
pub enum Error {
    /// Lexer produced a token it cannot classify, or the token stream
    /// ends where an operand is required.
    #[error("parse error: {0}")]
    Parse(Diagnostic),

    /// `=` whose first argument is not an identifier.
    #[error("invalid store destination: {0}")]
    InvalidStoreDestination(Diagnostic),

    /// An integer literal's decimal text does not fit the configured
    /// numeric width.
    #[error("integer literal overflow: {0}")]
    LiteralOverflow(Diagnostic),

    /// Checked `Add`/`Sub`/`Mult` overflowed under Strict mode.
    #[error("arithmetic overflow")]
    Overflow,

    /// `ASCII` on a type other than `Number` or a non-empty `String`.
    #[error("ASCII: expected a Number or a non-empty String, got {0}")]
    BadAscii(&'static str),

    /// `+` on operand types that do not support addition.
    #[error("ADD: unsupported operand type {0}")]
    BadAdd(&'static str),

    /// `-` on a non-Number left operand.
    #[error("SUB: left operand must be a Number, got {0}")]
    BadSub(&'static str),

    /// `*` on operand types that do not support multiplication/repeat.
    #[error("MULT: unsupported operand type {0}")]
    BadMult(&'static str),

    /// `/` on a non-Number operand, or division by zero.
    #[error("DIV: {0}")]
    BadDiv(&'static str),

    /// `%` on a non-Number operand, a negative operand, or modulo by zero.
    #[error("MOD: {0}")]
    BadMod(&'static str),

    /// `^` on operand types that do not support exponentiation/join.
    #[error("EXP: unsupported operand type {0}")]
    BadExp(&'static str),

    /// `[` (HEAD) on an empty String/List or any other type.
    #[error("HEAD: {0}")]
    BadHead(&'static str),

    /// `]` (TAIL) on an empty String/List or any other type.
    #[error("TAIL: {0}")]
    BadTail(&'static str),

    /// `G` (GET) with an out-of-range slice or wrong container type.
    #[error("GET: {0}")]
    BadGet(&'static str),

    /// `S` (SET) with an out-of-range slice or wrong container type.
    #[error("SET: {0}")]
    BadSet(&'static str),

    /// A `Block` value reached an arithmetic/comparison/coercion context
    /// under Strict mode.
    #[error("BLOCK: not allowed in this context")]
    BlockNotAllowed,

    /// `CALL` popped a value that is not a `Block`.
    #[error("CALL: expected a Block, got {0}")]
    NotCallable(&'static str),

    /// The `O`-applied-directly-to-an-identifier `Invalid` opcode fired
    /// under Strict mode.
    #[error("invalid opcode reached")]
    Invalid,

    /// Popped from an empty value stack where an operand was required.
    #[error("stack underflow")]
    StackUnderflow,

    /// `max_instructions` was exceeded. Uncatchable; aborts execution.
    #[error("instruction limit of {0} exceeded")]
    InstructionLimitExceeded(u64),

    /// Wraps an I/O failure from the output sink or input source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

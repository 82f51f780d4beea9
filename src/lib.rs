//! knight - a bytecode compiler and stack VM for the Knight programming language.
//!
//! Knight programs compile in three passes — a parser builds a flat
//! AST, an analyzer resolves every identifier to a dense global slot,
//! an emitter lowers the AST to linear bytecode — and then run on a
//! stack-based VM. [`Interpreter`] wires the three passes and the VM
//! together behind a single entry point.
//!
//! # Quick start
//!
//! ```
//! use knight::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! let output = interp.capture("OUTPUT \"hi\"").unwrap();
//! assert_eq!(output.text, "hi\n");
//! ```
//!
//! # Execution modes
//!
//! [`Mode::Strict`] raises an error the moment a `Block` value reaches
//! an arithmetic, comparison, or coercion context, and on the
//! ambiguous `OUTPUT`-of-bare-identifier opcode. [`Mode::Lenient`]
//! treats both as no-ops instead. `Interpreter` defaults to Strict;
//! call [`Interpreter::mode`] to change it.
//!
//! # Resource limits
//!
//! [`Limits::max_instructions`] bounds total dispatched instructions
//! per [`Interpreter::run`]/[`Interpreter::capture`] call, guarding
//! against runaway `WHILE`/`CALL` recursion — there is no host call
//! stack to overflow, since `CALL` runs on an explicit frame stack
//! rather than Rust recursion, so this is the only backstop.
//!
//! # Not supported
//!
//! - User-defined extension functions (the reference dialect's
//!   `X`-prefixed tags) are not part of the core function table this
//!   crate implements.
//! - Source encodings other than ASCII/UTF-8 byte text.

mod analyzer;
mod ast;
mod bytecode;
mod diagnostic;
mod emitter;
mod error;
mod lexer;
mod operators;
mod parser;
mod token;
mod value;
mod vm;

use std::io::{BufRead, Cursor, Write};

use rand::RngCore;

pub use bytecode::{Instruction, Program};
pub use diagnostic::{Diagnostic, Label, Span};
pub use error::{Error, Result};
pub use value::{Mode, Value};
pub use vm::Limits;

/// Compiles Knight source into a [`Program`] without running it.
///
/// Useful for inspecting bytecode or caching a compiled program across
/// several [`Interpreter::run_compiled`] calls.
pub fn compile(source: &str) -> Result<Program> {
    let ast = parser::Parser::parse(source)?;
    let analysis = analyzer::analyze(&ast, source);
    emitter::emit(&ast, &analysis, source)
}

/// Output of an [`Interpreter::capture`] run: the program's exit code
/// (`None` if it ran off the end without `QUIT`) and everything it
/// wrote via `OUTPUT`/`DUMP`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub exit_code: Option<u8>,
    pub text: String,
}

/// Entry point wiring the compiler pipeline and the VM together.
///
/// # Example
///
/// ```
/// use knight::{Interpreter, Mode};
///
/// let mut interp = Interpreter::new().mode(Mode::Lenient);
/// let output = interp.capture("; = a 1 D a").unwrap();
/// assert_eq!(output.text, "1");
/// ```
pub struct Interpreter {
    mode: Mode,
    limits: Limits,
}

impl Interpreter {
    pub fn new() -> Self {
        Self { mode: Mode::Strict, limits: Limits::default() }
    }

    /// Sets Strict vs. Lenient handling of `Block`-in-coercion-context
    /// and the bare-identifier `OUTPUT` opcode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Bounds total dispatched instructions per run; `None` (the
    /// default) means unlimited.
    pub fn limit(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Compiles and runs `source`, writing `OUTPUT`/`DUMP` text to
    /// `output`, reading `PROMPT` lines from `input`, and drawing
    /// `RANDOM` values from `rng`.
    pub fn run_with(
        &self,
        source: &str,
        output: &mut dyn Write,
        input: &mut dyn BufRead,
        rng: &mut dyn RngCore,
    ) -> Result<Option<u8>> {
        let program = compile(source)?;
        self.run_compiled(&program, output, input, rng)
    }

    /// Runs an already-[`compile`]d program against the given sinks.
    pub fn run_compiled(
        &self,
        program: &Program,
        output: &mut dyn Write,
        input: &mut dyn BufRead,
        rng: &mut dyn RngCore,
    ) -> Result<Option<u8>> {
        let mut vm = vm::Vm::new(program, self.mode, self.limits);
        vm.execute(output, input, rng)
    }

    /// Compiles and runs `source` against the process's real stdin
    /// and a thread-local random number generator, writing `OUTPUT`/
    /// `DUMP` text directly to `output`.
    pub fn run(&self, source: &str, output: &mut dyn Write) -> Result<Option<u8>> {
        let stdin = std::io::stdin();
        let mut locked = stdin.lock();
        let mut rng = rand::thread_rng();
        self.run_with(source, output, &mut locked, &mut rng)
    }

    /// Runs `source` with no stdin available and a fixed-seed RNG,
    /// capturing all output into a string. Convenient for tests and
    /// one-off evaluation; use [`run_with`](Self::run_with) to supply
    /// real input or randomness.
    pub fn capture(&mut self, source: &str) -> Result<Captured> {
        let program = compile(source)?;
        let mut out = Vec::new();
        let mut input = Cursor::new(Vec::new());
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        let exit_code = self.run_compiled(&program, &mut out, &mut input, &mut rng)?;
        Ok(Captured { exit_code, text: String::from_utf8_lossy(&out).into_owned() })
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_collects_output_and_exit_code() {
        let mut interp = Interpreter::new();
        let out = interp.capture("; OUTPUT \"hi\" QUIT 7").unwrap();
        assert_eq!(out.text, "hi\n");
        assert_eq!(out.exit_code, Some(7));
    }

    #[test]
    fn run_off_the_end_has_no_exit_code() {
        let mut interp = Interpreter::new();
        let out = interp.capture("D 1").unwrap();
        assert_eq!(out.exit_code, None);
    }

    #[test]
    fn instruction_limit_aborts_runaway_loop() {
        let mut interp = Interpreter::new().limit(Limits { max_instructions: Some(50) });
        let err = interp.capture("W T 0").unwrap_err();
        assert!(matches!(err, Error::InstructionLimitExceeded(50)));
    }

    #[test]
    fn compile_surfaces_parse_errors_before_running() {
        assert!(compile("+ 1").is_err());
    }
}

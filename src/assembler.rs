//! Translates MULTIX source into a stream of little-endian RV64I
//! machine-code words, in two passes.
//!
//! Pass 1 walks the lexed lines once, sizing every line with the
//! shared form classifier and recording every label's address. Pass 2
//! re-walks the same lines with the resolved symbol table and expands
//! each line into its primitive instructions.
//!
//! Structured control flow is written with single-glyph tokens: `&`
//! opens a `while` or `range` loop (disambiguated by its second
//! token), `?` opens an `if`, `.`/`..` break/continue the nearest
//! loop, `_` halts, `=` returns, and a bare label name followed by a
//! pre-decrementing bracket register calls. Indentation is the only
//! block-nesting device; a dedent closes every block opened at or
//! past that column.

pub mod block;
pub mod encoder;
pub mod form;
pub mod lexer;
pub mod pass1;
pub mod pass2;
pub mod resolver;
pub mod symbol;

use std::fmt;
use std::fs;

use lexer::LineRecord;
use symbol::SymbolTable;

/// Assembles MULTIX source read from a file.
pub fn assemble_from_file(path: &str) -> Result<Vec<u8>, Error> {
    let source = fs::read_to_string(path).map_err(|_| Error::ReadError { path: path.to_string() })?;
    let mut assembler = Assembler::new();
    assembler.compile(&source)
}

/// The compiler: owns nothing across calls to [`Assembler::compile`]
/// except the artifacts of the most recent successful compile, so a
/// single instance can process multiple sources serially.
#[derive(Default)]
pub struct Assembler {
    trace: Vec<String>,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler::default()
    }

    /// Clears any state left over from a previous compile. Called
    /// internally at the start of [`Assembler::compile`]; exposed so a
    /// caller can recover explicitly after a failed compile.
    pub fn reset(&mut self) {
        self.trace.clear();
    }

    /// Compile MULTIX source into a byte vector. On success, the
    /// expansion trace is available via [`Assembler::trace`]. On
    /// failure no partial bytes or trace entries are retained.
    pub fn compile(&mut self, source: &str) -> Result<Vec<u8>, Error> {
        self.reset();
        let lines: Vec<LineRecord> = lexer::preprocess(source);
        let sizing = pass1::run(&lines)?;
        let (bytes, trace) = pass2::run(&lines, &sizing.symbols, sizing.origin)?;
        debug_assert_eq!(bytes.len() as u32, sizing.final_pc - sizing.origin);
        self.trace = trace;
        Ok(bytes)
    }

    /// The expansion trace of the most recent successful compile.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }
}

/// Render a byte vector as uppercase 2-hex-digit bytes, space
/// separated, with a line break every 16 bytes — the observable
/// console form.
pub fn render_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 3);
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            output.push(if index % 16 == 0 { '\n' } else { ' ' });
        }
        output.push_str(&format!("{byte:02X}"));
    }
    output
}

/// An error encountered while compiling MULTIX source.
#[derive(Debug)]
pub enum Error {
    /// A token in a register position is not one of `x0`..`x31`.
    UnknownRegister { token: String, line_number: usize },
    /// A conditional opener does not match the register-operator-register shape.
    InvalidCondition { operator: String, line_number: usize },
    /// A `.` or `..` with no enclosing `while`/`range` frame.
    BreakContinueOutsideLoop { line_number: usize },
    /// A jump target pass 2 could not find. Pass 1 makes this
    /// impossible for well-formed input; seeing it means an internal
    /// inconsistency between the two passes.
    UnresolvedLabel { name: String },
    /// A constant or label name was defined more than once.
    DuplicateDefinition { name: String, line_number: usize },
    /// A line did not match any recognized syntactic form.
    UnrecognizedForm { line: String, line_number: usize },
    /// A source file could not be read.
    ReadError { path: String },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownRegister { token, line_number } => {
                write!(f, "unknown register \"{token}\" at line {line_number}")
            }
            Error::InvalidCondition { operator, line_number } => {
                write!(f, "invalid condition \"{operator}\" at line {line_number}")
            }
            Error::BreakContinueOutsideLoop { line_number } => {
                write!(f, "break or continue outside any loop at line {line_number}")
            }
            Error::UnresolvedLabel { name } => {
                write!(f, "unresolved label \"{name}\"")
            }
            Error::DuplicateDefinition { name, line_number } => {
                write!(f, "\"{name}\" is already defined, redefined at line {line_number}")
            }
            Error::UnrecognizedForm { line, line_number } => {
                write!(f, "unrecognized form at line {line_number}: \"{line}\"")
            }
            Error::ReadError { path } => {
                write!(f, "failed to read file {path}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_the_halt_only_scenario() {
        let mut assembler = Assembler::new();
        let bytes = assembler.compile(": 0\n_").unwrap();
        assert_eq!(bytes, vec![0x6F, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn reset_discards_the_previous_trace() {
        let mut assembler = Assembler::new();
        assembler.compile(": 0\nx5 7\n_").unwrap();
        assert!(!assembler.trace().is_empty());
        assembler.reset();
        assert!(assembler.trace().is_empty());
    }

    #[test]
    fn a_failed_compile_leaves_no_partial_trace() {
        let mut assembler = Assembler::new();
        assembler.compile(": 0\nx5 7\n_").unwrap();
        let err = assembler.compile(": 0\nloop :\nloop :\n_");
        assert!(err.is_err());
        assert!(assembler.trace().is_empty());
    }

    #[test]
    fn render_hex_breaks_every_sixteen_bytes() {
        let bytes = vec![0u8; 17];
        let rendered = render_hex(&bytes);
        assert_eq!(rendered.lines().count(), 2);
    }

    #[test]
    fn call_and_return_with_a_manual_shadow_stack() {
        let source = "\
: 0
x31 0x9000
x1 5
[--x31] x1
increment [--x31]
x2 [x31++]
_
increment :
x3 [x31]
x3 x3 + 1
[--x31] x3
= [x31++]
";
        let mut assembler = Assembler::new();
        let bytes = assembler.compile(source).unwrap();
        // init x31 (4) + init x1 (4) + push (8) + call (20) + pop (8) + halt (4)
        // + subroutine: pop (4) + add-immediate (4) + push (8) + return (12)
        assert_eq!(bytes.len(), 4 + 4 + 8 + 20 + 8 + 4 + 4 + 4 + 8 + 12);
    }

    #[test]
    fn break_and_continue_jump_to_the_loops_edges() {
        let source = "\
: 0
& x1 < x2
  ..
  x3 9
  .
_
";
        let mut assembler = Assembler::new();
        let bytes = assembler.compile(source).unwrap();
        // opener (4) + continue (4) + move (4) + break (4) + closer (4) + halt (4)
        assert_eq!(bytes.len(), 4 + 4 + 4 + 4 + 4 + 4);
    }
}

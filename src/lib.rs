//! MULTIX Assembler (MSA): a two-pass assembler that translates the
//! indentation-structured MULTIX notation into little-endian RV64I
//! machine code.

pub mod assembler;
pub mod logging;

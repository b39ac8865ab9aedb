//! Pass 1 — Sizing and Symbol Placement. Walks the line records once,
//! advancing a synthetic program counter by each line's byte
//! contribution (from the shared [`form`] classifier) and recording
//! every label's resolved address, so pass 2 can resolve any
//! identifier without a forward-reference problem.

use crate::assembler::block::{BlockKind, BlockStack};
use crate::assembler::form::{self, Form};
use crate::assembler::lexer::LineRecord;
use crate::assembler::resolver;
use crate::assembler::symbol::SymbolTable;
use crate::assembler::Error;

/// What pass 1 hands to pass 2: the fully-populated symbol table, the
/// origin address, and the final program counter (used to verify the
/// output buffer length at the end of pass 2).
pub struct Sizing {
    pub symbols: SymbolTable,
    pub origin: u32,
    pub final_pc: u32,
}

pub fn run(lines: &[LineRecord]) -> Result<Sizing, Error> {
    let mut symbols = SymbolTable::new();
    let mut blocks = BlockStack::new();
    let mut pc: u32 = 0;
    let mut origin: u32 = 0;
    let mut in_code = false;

    for line in lines {
        close_blocks(&mut blocks, &mut symbols, &mut pc, line.indent, line.line_number)?;

        let form = form::classify(line, in_code)?;
        match &form {
            Form::ConstDef { name, value } => {
                let resolved = resolver::resolve(value, &symbols);
                symbols.define_constant(name, resolved, line.line_number)?;
            }
            Form::Entry { value } => {
                if let Some(value) = value {
                    origin = resolver::resolve(value, &symbols) as u32;
                }
                pc = origin;
                symbols.define_label(":", pc, line.line_number)?;
                in_code = true;
            }
            Form::Label { name } => {
                symbols.define_label(name, pc, line.line_number)?;
                in_code = true;
                pc += form::byte_cost(&form);
            }
            Form::Break | Form::Continue => {
                if blocks.nearest_loop().is_none() {
                    return Err(Error::BreakContinueOutsideLoop { line_number: line.line_number });
                }
                pc += form::byte_cost(&form);
            }
            Form::RangeOpener { rd, step, .. } => {
                let resolved_step = resolver::resolve(step, &symbols);
                let frame = blocks.open(BlockKind::Range, line.indent, Some(*rd), resolved_step);
                symbols.define_label(&frame.start_label, pc + 4, line.line_number)?;
                pc += form::byte_cost(&form);
            }
            Form::WhileOpener { .. } => {
                let frame = blocks.open(BlockKind::While, line.indent, None, 1);
                symbols.define_label(&frame.start_label, pc, line.line_number)?;
                pc += form::byte_cost(&form);
            }
            Form::IfOpener { .. } => {
                blocks.open(BlockKind::If, line.indent, None, 1);
                pc += form::byte_cost(&form);
            }
            _ => {
                pc += form::byte_cost(&form);
            }
        }
    }

    close_blocks(&mut blocks, &mut symbols, &mut pc, 0, lines.last().map(|l| l.line_number).unwrap_or(0))?;

    Ok(Sizing { symbols, origin, final_pc: pc })
}

/// Pop every frame the given indent dedents past, charging its closing
/// byte contribution to `pc` and recording its end label at the
/// resulting address.
fn close_blocks(
    blocks: &mut BlockStack,
    symbols: &mut SymbolTable,
    pc: &mut u32,
    indent: usize,
    line_number: usize,
) -> Result<(), Error> {
    for frame in blocks.pop_closed(indent) {
        *pc += frame.kind.close_bytes();
        symbols.define_label(&frame.end_label, *pc, line_number)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lexer::preprocess;

    #[test]
    fn halt_only_sizes_to_four_bytes() {
        let lines = preprocess(": 0\n_");
        let sizing = run(&lines).unwrap();
        assert_eq!(sizing.origin, 0);
        assert_eq!(sizing.final_pc, 4);
    }

    #[test]
    fn range_loop_example_sizes_as_documented() {
        let source = "RAM 0x8000\n: RAM\nx1 RAM + 0x100\nx2 RAM + 0x120\nx3 0xAA\n  & x4 x1 x2 8\n    [x4] x3\n  _";
        let lines = preprocess(source);
        let sizing = run(&lines).unwrap();
        // 3 init moves (12 bytes) + range opener (8) + store (4) + range closer (8) + halt (4)
        assert_eq!(sizing.final_pc - sizing.origin, 12 + 8 + 4 + 8 + 4);
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let lines = preprocess(": 0\n.");
        let err = run(&lines).unwrap_err();
        assert!(matches!(err, Error::BreakContinueOutsideLoop { .. }));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let lines = preprocess(": 0\nloop :\nloop :\n_");
        let err = run(&lines).unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition { .. }));
    }

    #[test]
    fn while_start_label_is_at_the_opener_pc() {
        let lines = preprocess(": 0\n& x1 < x2\n  x3 1\n_");
        let sizing = run(&lines).unwrap();
        assert_eq!(sizing.symbols.label("_B_START_0"), Some(0));
    }

    #[test]
    fn immediate_minus_register_sizes_as_two_instructions() {
        let lines = preprocess("RAM 0x100\n: 0\nx1 RAM - x4\n_");
        let sizing = run(&lines).unwrap();
        assert_eq!(sizing.final_pc - sizing.origin, 4 + 4 + 4);
    }

    #[test]
    fn register_minus_immediate_still_sizes_as_one_instruction() {
        let lines = preprocess(": 0\nx1 x4 - 5\n_");
        let sizing = run(&lines).unwrap();
        assert_eq!(sizing.final_pc - sizing.origin, 4 + 4);
    }
}

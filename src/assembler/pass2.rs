//! Pass 2 — Emission. Re-walks the line records with pass 1's
//! resolved symbol table and a fresh block stack, re-deriving each
//! line's [`Form`] (so the two passes can never disagree about a
//! line's shape) and expanding it into its primitive RV64I
//! instructions via the [`super::encoder`].

use crate::assembler::block::{BlockFrame, BlockKind, BlockStack};
use crate::assembler::encoder;
use crate::assembler::form::{self, ArithOp, CondOp, Form};
use crate::assembler::lexer::LineRecord;
use crate::assembler::resolver;
use crate::assembler::symbol::SymbolTable;
use crate::assembler::Error;

/// Smallest and largest value that fits a single `addi rd, x0, imm`
/// load-immediate (spec's single-instruction load-immediate budget).
const IMM12_MIN: i64 = -2048;
const IMM12_MAX: i64 = 2047;

pub fn run(lines: &[LineRecord], symbols: &SymbolTable, origin: u32) -> Result<(Vec<u8>, Vec<String>), Error> {
    let mut bytes = Vec::new();
    let mut trace = Vec::new();
    let mut blocks = BlockStack::new();
    let mut pc: u32 = 0;
    let mut in_code = false;

    for line in lines {
        close_blocks(&mut blocks, symbols, &mut pc, &mut bytes, &mut trace, line.indent)?;

        let form = form::classify(line, in_code)?;
        trace.push(format!("; {}", line.text));

        match form {
            Form::ConstDef { .. } => {}
            Form::Entry { .. } => {
                pc = origin;
                in_code = true;
            }
            Form::Label { .. } => {
                in_code = true;
            }
            Form::Halt => emit_one(&mut bytes, &mut trace, &mut pc, encoder::halt(), "jal x0, 0".to_string()),
            Form::Return { reg } => emit_return(reg, &mut bytes, &mut trace, &mut pc),
            Form::Call { target, reg } => emit_call(&target, reg, symbols, &mut bytes, &mut trace, &mut pc)?,
            Form::Store { reg, src } => emit_store(reg, &src, line.line_number, &mut bytes, &mut trace, &mut pc)?,
            Form::StorePreDec { reg, src } => {
                emit_store_predec(reg, &src, line.line_number, &mut bytes, &mut trace, &mut pc)?
            }
            Form::Load { rd, reg } => emit_load(rd, reg, &mut bytes, &mut trace, &mut pc),
            Form::LoadPostInc { rd, reg } => emit_load_postinc(rd, reg, &mut bytes, &mut trace, &mut pc),
            Form::Arithmetic { rd, t1, op, t2 } => {
                emit_arithmetic(rd, &t1, op, &t2, symbols, &mut bytes, &mut trace, &mut pc)
            }
            Form::Move { rd, src } => emit_move(rd, &src, symbols, &mut bytes, &mut trace, &mut pc),
            Form::Jump { target } => emit_jump(&target, symbols, &mut bytes, &mut trace, &mut pc)?,
            Form::Break => emit_loop_edge(&blocks, true, symbols, &mut bytes, &mut trace, &mut pc)?,
            Form::Continue => emit_loop_edge(&blocks, false, symbols, &mut bytes, &mut trace, &mut pc)?,
            Form::WhileOpener { rs1, op, rs2 } => {
                let frame = blocks.open(BlockKind::While, line.indent, None, 1);
                emit_conditional_skip(rs1, op, rs2, &frame, symbols, &mut bytes, &mut trace, &mut pc)?;
            }
            Form::IfOpener { rs1, op, rs2 } => {
                let frame = blocks.open(BlockKind::If, line.indent, None, 1);
                emit_conditional_skip(rs1, op, rs2, &frame, symbols, &mut bytes, &mut trace, &mut pc)?;
            }
            Form::RangeOpener { rd, rsrc, rend, step } => {
                emit_range_opener(rd, rsrc, rend, &step, line.indent, &mut blocks, symbols, &mut bytes, &mut trace, &mut pc)?;
            }
        }
    }

    close_blocks(&mut blocks, symbols, &mut pc, &mut bytes, &mut trace, 0)?;

    Ok((bytes, trace))
}

fn emit_one(bytes: &mut Vec<u8>, trace: &mut Vec<String>, pc: &mut u32, word: u32, mnemonic: String) {
    bytes.extend_from_slice(&encoder::to_le_bytes(word));
    trace.push(format!("  {mnemonic}"));
    *pc += 4;
}

fn register_operand(token: &str, line_number: usize) -> Result<u8, Error> {
    resolver::parse_register(token).ok_or_else(|| Error::UnknownRegister {
        token: token.to_string(),
        line_number,
    })
}

fn close_blocks(
    blocks: &mut BlockStack,
    symbols: &SymbolTable,
    pc: &mut u32,
    bytes: &mut Vec<u8>,
    trace: &mut Vec<String>,
    indent: usize,
) -> Result<(), Error> {
    for frame in blocks.pop_closed(indent) {
        match frame.kind {
            BlockKind::While => {
                let offset = label_offset(&frame.start_label, symbols, *pc)?;
                emit_one(bytes, trace, pc, encoder::jal(0, offset), format!("jal x0, {offset}"));
            }
            BlockKind::Range => {
                let rd = frame.iter_reg.expect("range frame always carries an iterator register");
                emit_one(
                    bytes,
                    trace,
                    pc,
                    encoder::addi(rd, rd, frame.step as i32),
                    format!("addi x{rd}, x{rd}, {}", frame.step),
                );
                let offset = label_offset(&frame.start_label, symbols, *pc)?;
                emit_one(bytes, trace, pc, encoder::jal(0, offset), format!("jal x0, {offset}"));
            }
            BlockKind::If => {}
        }
        trace.push(format!("; --- End of Block {} ---", frame.end_label));
    }
    Ok(())
}

fn label_offset(name: &str, symbols: &SymbolTable, pc: u32) -> Result<i32, Error> {
    let address = symbols
        .label(name)
        .ok_or_else(|| Error::UnresolvedLabel { name: name.to_string() })?;
    Ok(address as i64 as i32 - pc as i32)
}

fn emit_return(reg: u8, bytes: &mut Vec<u8>, trace: &mut Vec<String>, pc: &mut u32) {
    emit_one(bytes, trace, pc, encoder::ld(1, reg, 0), format!("ld x1, 0(x{reg})"));
    emit_one(bytes, trace, pc, encoder::addi(reg, reg, 8), format!("addi x{reg}, x{reg}, 8"));
    emit_one(bytes, trace, pc, encoder::jalr(0, 1, 0), "jalr x0, x1, 0".to_string());
}

fn emit_call(
    target: &str,
    reg: u8,
    symbols: &SymbolTable,
    bytes: &mut Vec<u8>,
    trace: &mut Vec<String>,
    pc: &mut u32,
) -> Result<(), Error> {
    emit_one(bytes, trace, pc, encoder::auipc(1, 0), "auipc x1, 0".to_string());
    emit_one(bytes, trace, pc, encoder::addi(1, 1, 20), "addi x1, x1, 20".to_string());
    emit_one(bytes, trace, pc, encoder::addi(reg, reg, -8), format!("addi x{reg}, x{reg}, -8"));
    emit_one(bytes, trace, pc, encoder::sd(reg, 1, 0), format!("sd x1, 0(x{reg})"));
    let offset = label_offset(target, symbols, *pc)?;
    emit_one(bytes, trace, pc, encoder::jal(0, offset), format!("jal x0, {offset}"));
    Ok(())
}

fn emit_store(
    reg: u8,
    src: &str,
    line_number: usize,
    bytes: &mut Vec<u8>,
    trace: &mut Vec<String>,
    pc: &mut u32,
) -> Result<(), Error> {
    let src_reg = register_operand(src, line_number)?;
    emit_one(bytes, trace, pc, encoder::sd(reg, src_reg, 0), format!("sd x{src_reg}, 0(x{reg})"));
    Ok(())
}

fn emit_store_predec(
    reg: u8,
    src: &str,
    line_number: usize,
    bytes: &mut Vec<u8>,
    trace: &mut Vec<String>,
    pc: &mut u32,
) -> Result<(), Error> {
    let src_reg = register_operand(src, line_number)?;
    emit_one(bytes, trace, pc, encoder::addi(reg, reg, -8), format!("addi x{reg}, x{reg}, -8"));
    emit_one(bytes, trace, pc, encoder::sd(reg, src_reg, 0), format!("sd x{src_reg}, 0(x{reg})"));
    Ok(())
}

fn emit_load(rd: u8, reg: u8, bytes: &mut Vec<u8>, trace: &mut Vec<String>, pc: &mut u32) {
    emit_one(bytes, trace, pc, encoder::ld(rd, reg, 0), format!("ld x{rd}, 0(x{reg})"));
}

fn emit_load_postinc(rd: u8, reg: u8, bytes: &mut Vec<u8>, trace: &mut Vec<String>, pc: &mut u32) {
    emit_one(bytes, trace, pc, encoder::ld(rd, reg, 0), format!("ld x{rd}, 0(x{reg})"));
    emit_one(bytes, trace, pc, encoder::addi(reg, reg, 8), format!("addi x{reg}, x{reg}, 8"));
}

fn emit_load_immediate(rd: u8, value: i64, bytes: &mut Vec<u8>, trace: &mut Vec<String>, pc: &mut u32) {
    if (IMM12_MIN..=IMM12_MAX).contains(&value) {
        emit_one(bytes, trace, pc, encoder::addi(rd, 0, value as i32), format!("addi x{rd}, x0, {value}"));
    } else {
        let imm20 = ((value >> 12) & 0xF_FFFF) as u32;
        emit_one(bytes, trace, pc, encoder::lui(rd, imm20), format!("lui x{rd}, {imm20:#x}"));
    }
}

fn emit_arithmetic(
    rd: u8,
    t1: &str,
    op: ArithOp,
    t2: &str,
    symbols: &SymbolTable,
    bytes: &mut Vec<u8>,
    trace: &mut Vec<String>,
    pc: &mut u32,
) {
    let r1 = resolver::parse_register(t1);
    let r2 = resolver::parse_register(t2);
    match (r1, r2) {
        (Some(r1), Some(r2)) => {
            let (word, name) = match op {
                ArithOp::Add => (encoder::add(rd, r1, r2), "add"),
                ArithOp::Sub => (encoder::sub(rd, r1, r2), "sub"),
                ArithOp::Or => (encoder::or(rd, r1, r2), "or"),
                ArithOp::And => (encoder::and(rd, r1, r2), "and"),
                ArithOp::Xor => (encoder::xor(rd, r1, r2), "xor"),
            };
            emit_one(bytes, trace, pc, word, format!("{name} x{rd}, x{r1}, x{r2}"));
        }
        (Some(r1), None) => {
            let imm = resolver::resolve(t2, symbols);
            let (word, name, shown) = match op {
                ArithOp::Add => (encoder::addi(rd, r1, imm as i32), "addi", imm),
                ArithOp::Sub => (encoder::addi(rd, r1, (-imm) as i32), "addi", -imm),
                ArithOp::Or => (encoder::ori(rd, r1, imm as i32), "ori", imm),
                ArithOp::And => (encoder::andi(rd, r1, imm as i32), "andi", imm),
                ArithOp::Xor => (encoder::xori(rd, r1, imm as i32), "xori", imm),
            };
            emit_one(bytes, trace, pc, word, format!("{name} x{rd}, x{r1}, {shown}"));
        }
        (None, Some(r2)) => {
            let imm = resolver::resolve(t1, symbols);
            match op {
                // Commutative: `t1 op t2` == `t2 op t1`, so the register
                // can serve as the base just like the (Some, None) arm.
                ArithOp::Add => {
                    emit_one(bytes, trace, pc, encoder::addi(rd, r2, imm as i32), format!("addi x{rd}, x{r2}, {imm}"))
                }
                ArithOp::Or => {
                    emit_one(bytes, trace, pc, encoder::ori(rd, r2, imm as i32), format!("ori x{rd}, x{r2}, {imm}"))
                }
                ArithOp::And => {
                    emit_one(bytes, trace, pc, encoder::andi(rd, r2, imm as i32), format!("andi x{rd}, x{r2}, {imm}"))
                }
                ArithOp::Xor => {
                    emit_one(bytes, trace, pc, encoder::xori(rd, r2, imm as i32), format!("xori x{rd}, x{r2}, {imm}"))
                }
                // Not commutative and there is no reverse-subtract-
                // immediate opcode: negate the register, then add the
                // immediate. Matches the two-word cost in `byte_cost`.
                ArithOp::Sub => {
                    emit_one(bytes, trace, pc, encoder::sub(rd, 0, r2), format!("sub x{rd}, x0, x{r2}"));
                    emit_one(bytes, trace, pc, encoder::addi(rd, rd, imm as i32), format!("addi x{rd}, x{rd}, {imm}"));
                }
            }
        }
        _ => {
            let v1 = resolver::resolve(t1, symbols);
            let v2 = resolver::resolve(t2, symbols);
            let folded = match op {
                ArithOp::Add => v1 + v2,
                ArithOp::Sub => v1 - v2,
                ArithOp::Or => v1 | v2,
                ArithOp::And => v1 & v2,
                ArithOp::Xor => v1 ^ v2,
            };
            emit_load_immediate(rd, folded, bytes, trace, pc);
        }
    }
}

fn emit_move(rd: u8, src: &str, symbols: &SymbolTable, bytes: &mut Vec<u8>, trace: &mut Vec<String>, pc: &mut u32) {
    match resolver::parse_register(src) {
        Some(r) => emit_one(bytes, trace, pc, encoder::addi(rd, r, 0), format!("addi x{rd}, x{r}, 0")),
        None => emit_load_immediate(rd, resolver::resolve(src, symbols), bytes, trace, pc),
    }
}

fn emit_jump(target: &str, symbols: &SymbolTable, bytes: &mut Vec<u8>, trace: &mut Vec<String>, pc: &mut u32) -> Result<(), Error> {
    let offset = label_offset(target, symbols, *pc)?;
    emit_one(bytes, trace, pc, encoder::jal(0, offset), format!("jal x0, {offset}"));
    Ok(())
}

/// `.`/`..` — jump to the nearest enclosing loop's end/start label.
fn emit_loop_edge(
    blocks: &BlockStack,
    is_break: bool,
    symbols: &SymbolTable,
    bytes: &mut Vec<u8>,
    trace: &mut Vec<String>,
    pc: &mut u32,
) -> Result<(), Error> {
    let frame = blocks.nearest_loop().expect("pass 1 already rejected break/continue outside a loop");
    let target = if is_break { &frame.end_label } else { &frame.start_label };
    let offset = label_offset(target, symbols, *pc)?;
    emit_one(bytes, trace, pc, encoder::jal(0, offset), format!("jal x0, {offset}"));
    Ok(())
}

/// Shared by `?` and while-form `&`: branch past the block on the
/// negation of the source condition. `<=`/`>` are generated by
/// swapping the branch operands through the same inversion discipline
/// used for the four directly-supported operators.
fn emit_conditional_skip(
    rs1: u8,
    op: CondOp,
    rs2: u8,
    frame: &BlockFrame,
    symbols: &SymbolTable,
    bytes: &mut Vec<u8>,
    trace: &mut Vec<String>,
    pc: &mut u32,
) -> Result<(), Error> {
    let offset = label_offset(&frame.end_label, symbols, *pc)?;
    let (word, mnemonic) = match op {
        CondOp::Lt => (encoder::bge(rs1, rs2, offset), format!("bge x{rs1}, x{rs2}, {offset}")),
        CondOp::Ge => (encoder::blt(rs1, rs2, offset), format!("blt x{rs1}, x{rs2}, {offset}")),
        CondOp::Eq => (encoder::bne(rs1, rs2, offset), format!("bne x{rs1}, x{rs2}, {offset}")),
        CondOp::Ne => (encoder::beq(rs1, rs2, offset), format!("beq x{rs1}, x{rs2}, {offset}")),
        CondOp::Le => (encoder::blt(rs2, rs1, offset), format!("blt x{rs2}, x{rs1}, {offset}")),
        CondOp::Gt => (encoder::bge(rs2, rs1, offset), format!("bge x{rs2}, x{rs1}, {offset}")),
    };
    emit_one(bytes, trace, pc, word, mnemonic);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit_range_opener(
    rd: u8,
    rsrc: u8,
    rend: u8,
    step: &str,
    indent: usize,
    blocks: &mut BlockStack,
    symbols: &SymbolTable,
    bytes: &mut Vec<u8>,
    trace: &mut Vec<String>,
    pc: &mut u32,
) -> Result<(), Error> {
    emit_one(bytes, trace, pc, encoder::addi(rd, rsrc, 0), format!("addi x{rd}, x{rsrc}, 0"));
    let resolved_step = resolver::resolve(step, symbols);
    let frame = blocks.open(BlockKind::Range, indent, Some(rd), resolved_step);
    let offset = label_offset(&frame.end_label, symbols, *pc)?;
    emit_one(bytes, trace, pc, encoder::bge(rd, rend, offset), format!("bge x{rd}, x{rend}, {offset}"));
    Ok(())
}

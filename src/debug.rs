//! Human-readable listings of bytecode, for logging compiled chunks and traced execution.
use std::fmt::Write;

use crate::chunk::{Chunk, OpCode};

/// Returns a listing of every instruction in the chunk, under a `== name ==` header.
///
/// ```
/// # use hydro::chunk::{Chunk, OpCode};
/// # use hydro::debug::disassemble_chunk;
/// let mut chunk = Chunk::new();
/// let index = chunk.add_constant(1.2.into()) as u8;
/// chunk.write_opcode(OpCode::Constant, 123).with_operand(index);
/// chunk.write_opcode(OpCode::Return, 123);
///
/// let listing = disassemble_chunk(&chunk, "test chunk");
/// assert_eq!(
///     "== test chunk ==\n\
///      0000  123 OP_CONSTANT         0 '1.2'\n\
///      0002    | OP_RETURN\n",
///     listing
/// );
/// ```
pub fn disassemble_chunk(c: &Chunk, name: &str) -> String {
    let mut listing = format!("== {name} ==\n");

    let mut offset = 0;
    while offset < c.len() {
        let (line, next) = disassemble_instruction(c, offset);
        listing.push_str(&line);
        listing.push('\n');
        offset = next;
    }

    listing
}

/// Returns the listing of the instruction at `offset`, and the offset of the next instruction.
pub fn disassemble_instruction(c: &Chunk, offset: usize) -> (String, usize) {
    let mut out = format!("{offset:04} ");

    let line_no = c.line_number_for(offset);
    if offset > 0 && line_no == c.line_number_for(offset - 1) {
        out.push_str("   | ");
    } else {
        let _ = match line_no {
            Some(line_no) => write!(out, "{line_no:4} "),
            None => write!(out, "   ? "),
        };
    }

    let Some(byte) = c.get(offset).map(|entry| entry.as_byte()) else {
        out.push_str("<end of chunk>");
        return (out, offset + 1);
    };
    let Ok(instruction) = OpCode::try_from(byte) else {
        let _ = write!(out, "Unknown opcode {byte}");
        return (out, offset + 1);
    };

    let next = if !instruction.has_operand() {
        simple_instruction(&mut out, instruction, offset)
    } else if matches!(instruction, OpCode::GetLocal | OpCode::SetLocal) {
        // Slots are shown as they are; every other operand indexes the constant pool.
        byte_instruction(&mut out, instruction, c, offset)
    } else {
        constant_instruction(&mut out, instruction, c, offset)
    };

    (out, next)
}

/// Returns the name of the instruction as printed in listings, e.g., `OP_DEFINE_GLOBAL`.
pub fn opcode_name(opcode: OpCode) -> &'static str {
    use OpCode::*;
    match opcode {
        Constant => "OP_CONSTANT",
        Nil => "OP_NIL",
        True => "OP_TRUE",
        False => "OP_FALSE",
        Pop => "OP_POP",
        GetLocal => "OP_GET_LOCAL",
        SetLocal => "OP_SET_LOCAL",
        GetGlobal => "OP_GET_GLOBAL",
        DefineGlobal => "OP_DEFINE_GLOBAL",
        SetGlobal => "OP_SET_GLOBAL",
        Equal => "OP_EQUAL",
        NotEqual => "OP_NOT_EQUAL",
        Greater => "OP_GREATER",
        GreaterEqual => "OP_GREATER_EQUAL",
        Less => "OP_LESS",
        LessEqual => "OP_LESS_EQUAL",
        Add => "OP_ADD",
        Subtract => "OP_SUBTRACT",
        Multiply => "OP_MULTIPLY",
        Divide => "OP_DIVIDE",
        Not => "OP_NOT",
        Negate => "OP_NEGATE",
        Print => "OP_PRINT",
        Return => "OP_RETURN",
    }
}

fn simple_instruction(out: &mut String, opcode: OpCode, offset: usize) -> usize {
    out.push_str(opcode_name(opcode));
    offset + 1
}

fn byte_instruction(out: &mut String, opcode: OpCode, chunk: &Chunk, offset: usize) -> usize {
    // Writing to a String cannot fail.
    let _ = match chunk.get(offset + 1) {
        Some(slot) => write!(out, "{:<16} {:4}", opcode_name(opcode), slot.as_slot()),
        None => write!(out, "{:<16} <missing operand>", opcode_name(opcode)),
    };
    offset + 2
}

fn constant_instruction(out: &mut String, opcode: OpCode, chunk: &Chunk, offset: usize) -> usize {
    let name = opcode_name(opcode);
    let _ = match chunk.get(offset + 1) {
        Some(entry) => {
            let index = entry.as_constant_index();
            match entry.resolve_constant() {
                Some(value) => write!(out, "{name:<16} {index:4} '{value}'"),
                None => write!(out, "{name:<16} {index:4} <invalid constant>"),
            }
        }
        None => write!(out, "{name:<16} <missing operand>"),
    };
    offset + 2
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::compile;
    use crate::gc::Gc;
    use crate::table::Table;
    use crate::value::Value;

    #[test]
    fn disassembles_compiled_code() {
        let mut gc = Gc::default();
        let mut strings = Table::default();
        let chunk = compile("var x = 1;\n{ var y = x; }", &mut gc, &mut strings).unwrap();

        let listing = disassemble_chunk(&chunk, "code");
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(
            vec![
                "== code ==",
                "0000    1 OP_CONSTANT         1 '1'",
                "0002    | OP_DEFINE_GLOBAL    0 'x'",
                "0004    2 OP_GET_GLOBAL       2 'x'",
                "0006    | OP_POP",
                "0007    | OP_RETURN",
            ],
            lines
        );
    }

    #[test]
    fn local_slots_are_shown() {
        let mut gc = Gc::default();
        let mut strings = Table::default();
        let chunk = compile("{ var a = nil; a = a; }", &mut gc, &mut strings).unwrap();

        let listing = disassemble_chunk(&chunk, "locals");
        assert!(listing.contains("OP_GET_LOCAL        0"), "{listing}");
        assert!(listing.contains("OP_SET_LOCAL        0"), "{listing}");
    }

    #[test]
    fn instructions_with_operands_are_two_bytes() {
        for &opcode in OpCode::ALL {
            let mut chunk = Chunk::new();
            chunk.add_constant(Value::Nil);
            if opcode.has_operand() {
                chunk.write_opcode(opcode, 1).with_operand(0);
            } else {
                chunk.write_opcode(opcode, 1);
            }

            let (text, next) = disassemble_instruction(&chunk, 0);
            assert_eq!(chunk.len(), next, "{text}");
            assert!(text.contains(opcode_name(opcode)), "{text}");
        }
    }

    #[test]
    fn unknown_opcodes_do_not_panic() {
        let mut chunk = Chunk::new();
        chunk.write_opcode(OpCode::Constant, 1).with_operand(7);
        let (text, next) = disassemble_instruction(&chunk, 0);
        assert_eq!("0000    1 OP_CONSTANT         7 <invalid constant>", text);
        assert_eq!(2, next);

        let (text, next) = disassemble_instruction(&chunk, 5);
        assert!(text.ends_with("<end of chunk>"));
        assert_eq!(6, next);
    }
}

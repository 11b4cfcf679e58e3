//! Contains a [Chunk] of [OpCode].

use crate::extension_traits::GrowGeometrically;
use crate::value::{Value, ValueArray};
use crate::with_try_from_u8;

extern crate static_assertions as sa;

with_try_from_u8! {
    /// A one-byte operation code for hydro.
    ///
    /// Instructions with an operand are followed by exactly one operand byte.
    #[repr(u8)]
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum OpCode {
        /// Push a constant. Operand: constant index.
        Constant,
        Nil,
        True,
        False,
        Pop,
        /// Operand: stack slot.
        GetLocal,
        /// Operand: stack slot.
        SetLocal,
        /// Operand: constant index of the variable name.
        GetGlobal,
        /// Operand: constant index of the variable name.
        DefineGlobal,
        /// Operand: constant index of the variable name.
        SetGlobal,
        Equal,
        NotEqual,
        Greater,
        GreaterEqual,
        Less,
        LessEqual,
        Add,
        Subtract,
        Multiply,
        Divide,
        Not,
        Negate,
        Print,
        Return,
    }
}

sa::assert_eq_size!(OpCode, u8);

/// A chunk of code, with metadata.
///
/// (See Crafting Interpreters, p. 244)
#[derive(Default, Debug)]
pub struct Chunk {
    code: Vec<u8>,
    /// The source line of every byte in `code`.
    lines: Vec<usize>,
    constants: ValueArray,
}

/// A valid byte from a chunk. This byte can then be interpreted as required.
#[derive(Clone, Copy)]
pub struct BytecodeEntry<'a> {
    byte: u8,
    provenance: &'a Chunk,
}

/// An [OpCode] that has already been written to the bytestream.
///
/// This opcode can be augmented with an additional operand.
pub struct WrittenOpcode<'a> {
    line: usize,
    provenance: &'a mut Chunk,
}

///////////////////////////////////////// Implementation //////////////////////////////////////////

impl OpCode {
    /// Returns true if this instruction is followed by a one-byte operand.
    pub fn has_operand(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            Constant | GetLocal | SetLocal | GetGlobal | DefineGlobal | SetGlobal
        )
    }
}

impl Chunk {
    /// Return a new, empty [Chunk].
    pub fn new() -> Self {
        Chunk::default()
    }

    /// Get an entry from the bytecode stream.
    ///
    /// Returns `Some(entry)` when the offset is in [0, self.len()).
    pub fn get(&self, offset: usize) -> Option<BytecodeEntry<'_>> {
        self.code.get(offset).copied().map(|byte| BytecodeEntry {
            byte,
            provenance: self,
        })
    }

    /// Append a single [OpCode] to the chunk.
    pub fn write_opcode(&mut self, opcode: OpCode, line: usize) -> WrittenOpcode<'_> {
        self.write(opcode as u8, line);

        WrittenOpcode {
            line,
            provenance: self,
        }
    }

    /// Adds a constant to the constant pool, and returns its index.
    ///
    /// The index is not range-checked: only the first 256 constants can be referred to by an
    /// operand, and it is up to the caller to check.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.write(value)
    }

    /// Returns the constant at the given index.
    #[inline]
    pub fn constant(&self, index: usize) -> Option<&Value> {
        self.constants.get(index)
    }

    /// Returns the constant pool.
    pub fn constants(&self) -> &ValueArray {
        &self.constants
    }

    /// Returns the line number for whatever is at the given offset.
    #[inline]
    pub fn line_number_for(&self, offset: usize) -> Option<usize> {
        self.lines.get(offset).copied()
    }

    /// Returns the raw bytecode.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Returns the line numbers, one per byte of bytecode.
    pub fn lines(&self) -> &[usize] {
        &self.lines
    }

    /// Returns the length of the byte stream.
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Returns true if nothing has been appended to the byte stream.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Actually writes to the byte stream.
    fn write(&mut self, payload: u8, line_number: usize) {
        self.code.push_growing(payload);
        self.lines.push_growing(line_number);
        debug_assert_eq!(self.code.len(), self.lines.len());
    }
}

impl<'a> BytecodeEntry<'a> {
    /// Returns the raw byte.
    #[inline(always)]
    pub fn as_byte(self) -> u8 {
        self.byte
    }

    /// Returns the byte as an index into the constant pool.
    #[inline(always)]
    pub fn as_constant_index(self) -> usize {
        self.byte as usize
    }

    /// Returns the byte as a slot on the value stack.
    #[inline(always)]
    pub fn as_slot(self) -> usize {
        self.byte as usize
    }

    /// Yanks out a constant from the constant pool.
    #[inline]
    pub fn resolve_constant(self) -> Option<&'a Value> {
        self.provenance.constant(self.as_constant_index())
    }
}

impl<'a> WrittenOpcode<'a> {
    /// Consumes `self` and appends the operand to the byte stream for the last written instruction.
    /// The operand shares the line number of its opcode.
    #[inline]
    pub fn with_operand(self, operand: u8) {
        self.provenance.write(operand, self.line);
    }
}

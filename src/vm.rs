//! The bytecode virtual machine.

use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, log_enabled, trace, Level};

use crate::chunk::BytecodeEntry;
use crate::compiler;
use crate::object::{hash_string, take_string};
use crate::prelude::*;

/// The maximum number of values on the stack. Pushing one more is a runtime error.
pub const STACK_MAX: usize = 256;

/// Maintains state for the hydro virtual machine.
///
/// The VM outlives many calls to [VM::interpret()]: global variables and interned strings
/// persist from one call to the next, which is what makes the REPL work.
///
/// `print` statements write to `W`, which is standard output unless the VM is created with
/// [VM::with_output()].
pub struct VM<W: Write = io::Stdout> {
    /// Instruction pointer --- index into the chunk for the next opcode to be executed
    ip: usize,
    /// Value stack -- modified as elements are pushed and popped from the stack.
    stack: Vec<Value>,
    /// Every heap object ever allocated.
    gc: Gc,
    /// The string intern pool.
    strings: Table,
    /// Global variables.
    globals: Table,
    out: W,
}

/// Fetches the next bytecode in the chunk, **AND** increments the instruction pointer.
///
/// Note: use [current_ip] to get the "current" value of the instruction pointer being executed
/// right now.
macro_rules! next_bytecode {
    ($self: ident, $chunk: ident) => {{
        let byte = $chunk.get($self.ip);
        $self.ip += 1;
        byte
    }};
}

/// Gets the value of the current instruction pointer. To be used in conjunction with
/// [next_bytecode].
macro_rules! current_ip {
    ($self: ident) => {
        $self.ip.saturating_sub(1)
    };
}

type Execution<T> = Result<T, RuntimeErrorKind>;

impl VM {
    /// Creates a VM that prints to standard output.
    pub fn new() -> Self {
        VM::with_output(io::stdout())
    }
}

impl Default for VM {
    fn default() -> Self {
        VM::new()
    }
}

impl<W: Write> VM<W> {
    /// Creates a VM that prints to the given writer.
    pub fn with_output(out: W) -> Self {
        // Create a VM with the value stack pre-allocated to its maximum size.
        VM {
            ip: 0,
            stack: Vec::with_capacity(STACK_MAX),
            gc: Gc::default(),
            strings: Table::default(),
            globals: Table::default(),
            out,
        }
    }

    /// Compiles and runs some hydro source code.
    ///
    /// On a runtime error the stack is emptied, but the VM stays usable.
    ///
    /// ```
    /// # use hydro::prelude::*;
    /// let mut vm = VM::with_output(Vec::new());
    /// vm.interpret("var x = 6.9;").unwrap();
    /// vm.interpret("print x;").unwrap();
    /// assert_eq!(Some(Value::Number(6.9)), vm.global("x"));
    /// assert_eq!(b"6.9\n", vm.output().as_slice());
    ///
    /// let Err(InterpretationError::Runtime(error)) = vm.interpret("x = -true;") else {
    ///     panic!("expected a runtime error");
    /// };
    /// assert_eq!(RuntimeErrorKind::OperandMustBeNumber, error.kind);
    /// ```
    pub fn interpret(&mut self, source: &str) -> crate::Result<()> {
        let chunk = compiler::compile(source, &mut self.gc, &mut self.strings)?;
        debug!(
            "running {} byte(s); {} object(s) allocated so far",
            chunk.len(),
            self.gc.n_objects()
        );

        self.ip = 0;
        self.run(&chunk).map_err(|kind| {
            let line = chunk
                .line_number_for(current_ip!(self))
                .unwrap_or_default();
            self.reset_stack();
            debug!("runtime error on line {line}: {kind}");
            InterpretationError::from(RuntimeError { kind, line })
        })
    }

    /// Returns the value of a global variable, if it is defined.
    pub fn global(&self, name: &str) -> Option<Value> {
        let name = self.strings.find_string(name, hash_string(name))?;
        self.globals.get(&name)
    }

    /// Returns the number of values on the stack. Zero between successful calls to
    /// [VM::interpret()], and after any runtime error.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Returns how many heap objects have been allocated.
    pub fn n_objects(&self) -> usize {
        self.gc.n_objects()
    }

    /// Returns the writer that `print` writes to.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// The main opcode interpreter loop.
    fn run(&mut self, chunk: &Chunk) -> Execution<()> {
        use OpCode::*;

        loop {
            if cfg!(feature = "trace_execution") && log_enabled!(Level::Trace) {
                self.trace_instruction(chunk);
            }

            let byte = next_bytecode!(self, chunk)
                .ok_or(RuntimeErrorKind::UnexpectedEndOfChunk)?
                .as_byte();
            let opcode = OpCode::try_from(byte).map_err(RuntimeErrorKind::InvalidOpcode)?;

            match opcode {
                Constant => {
                    let constant = self.read_constant(chunk)?;
                    self.push(constant)?;
                }
                Nil => self.push(Value::Nil)?,
                True => self.push(true.into())?,
                False => self.push(false.into())?,
                Pop => {
                    self.pop()?;
                }
                GetLocal => {
                    let slot = self.read_operand(chunk)?.as_slot();
                    let value = self
                        .stack
                        .get(slot)
                        .cloned()
                        .ok_or(RuntimeErrorKind::StackUnderflow)?;
                    self.push(value)?;
                }
                SetLocal => {
                    let slot = self.read_operand(chunk)?.as_slot();
                    // Assignment is an expression: the value stays on top of the stack.
                    let value = self.peek(0)?.clone();
                    let local = self
                        .stack
                        .get_mut(slot)
                        .ok_or(RuntimeErrorKind::StackUnderflow)?;
                    *local = value;
                }
                GetGlobal => {
                    let name = self.read_name(chunk)?;
                    let value = self
                        .globals
                        .get(&name)
                        .ok_or_else(|| RuntimeErrorKind::UndefinedVariable(name.as_str().into()))?;
                    self.push(value)?;
                }
                DefineGlobal => {
                    let name = self.read_name(chunk)?;
                    let value = self.peek(0)?.clone();
                    self.globals.set(name, value);
                    self.pop()?;
                }
                SetGlobal => {
                    let name = self.read_name(chunk)?;
                    let value = self.peek(0)?.clone();
                    if self.globals.set(name.clone(), value) {
                        // The variable did not exist; undo the accidental definition.
                        self.globals.delete(&name);
                        return Err(RuntimeErrorKind::UndefinedVariable(name.as_str().into()));
                    }
                }
                Equal => {
                    let (a, b) = self.pop_pair()?;
                    self.push(a.equal(&b).into())?;
                }
                NotEqual => {
                    let (a, b) = self.pop_pair()?;
                    self.push((!a.equal(&b)).into())?;
                }
                Greater => self.comparison_op(|a, b| a > b)?,
                GreaterEqual => self.comparison_op(|a, b| a >= b)?,
                Less => self.comparison_op(|a, b| a < b)?,
                LessEqual => self.comparison_op(|a, b| a <= b)?,
                Add => self.add()?,
                Subtract => self.binary_op(|a, b| a - b)?,
                Multiply => self.binary_op(|a, b| a * b)?,
                Divide => self.binary_op(|a, b| a / b)?,
                Not => {
                    let value = self.pop()?;
                    self.push(value.is_falsy().into())?;
                }
                Negate => {
                    let num = self
                        .peek(0)?
                        .as_number()
                        .ok_or(RuntimeErrorKind::OperandMustBeNumber)?;
                    self.pop()?;
                    self.push((-num).into())?;
                }
                Print => {
                    let value = self.pop()?;
                    writeln!(self.out, "{value}")
                        .map_err(|e| RuntimeErrorKind::Output(e.to_string()))?;
                }
                Return => {
                    return Ok(());
                }
            }
        }
    }

    /// `+` adds numbers and concatenates strings.
    fn add(&mut self) -> Execution<()> {
        let (lhs, rhs) = (self.peek(1)?, self.peek(0)?);

        if let (Some(a), Some(b)) = (lhs.as_string(), rhs.as_string()) {
            let mut concatenated = String::with_capacity(a.len() + b.len());
            concatenated.push_str(a.as_str());
            concatenated.push_str(b.as_str());

            self.pop_pair()?;
            let result = take_string(&mut self.gc, &mut self.strings, concatenated);
            return self.push(result.into());
        }

        if lhs.is_number() && rhs.is_number() {
            self.binary_op(|a, b| a + b)
        } else {
            Err(RuntimeErrorKind::OperandsMustBeNumbersOrStrings)
        }
    }

    /// Pops two numeric operands on the stack to perform a binary arithmetic operation.
    fn binary_op<F>(&mut self, op: F) -> Execution<()>
    where
        F: Fn(f64, f64) -> f64,
    {
        let (a, b) = self.number_operands()?;
        self.pop_pair()?;
        self.push(op(a, b).into())
    }

    /// Pops two numeric operands on the stack to compare them.
    fn comparison_op<F>(&mut self, op: F) -> Execution<()>
    where
        F: Fn(f64, f64) -> bool,
    {
        let (a, b) = self.number_operands()?;
        self.pop_pair()?;
        self.push(op(a, b).into())
    }

    /// Returns the top two values as numbers, without popping them.
    fn number_operands(&self) -> Execution<(f64, f64)> {
        match (self.peek(1)?.as_number(), self.peek(0)?.as_number()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(RuntimeErrorKind::OperandsMustBeNumbers),
        }
    }

    /// Reads the operand byte of the current instruction.
    fn read_operand<'c>(&mut self, chunk: &'c Chunk) -> Execution<BytecodeEntry<'c>> {
        next_bytecode!(self, chunk).ok_or(RuntimeErrorKind::UnexpectedEndOfChunk)
    }

    /// Reads the operand as a constant index, and returns the constant.
    fn read_constant(&mut self, chunk: &Chunk) -> Execution<Value> {
        let operand = self.read_operand(chunk)?;
        operand
            .resolve_constant()
            .cloned()
            .ok_or(RuntimeErrorKind::InvalidConstant(operand.as_byte()))
    }

    /// Reads a constant that must be the interned name of a global.
    fn read_name(&mut self, chunk: &Chunk) -> Execution<Rc<ObjString>> {
        self.read_constant(chunk)?
            .as_string()
            .cloned()
            .ok_or(RuntimeErrorKind::InvalidGlobalName)
    }

    /// Pushes a [Value] on to the value stack.
    #[inline]
    fn push(&mut self, value: Value) -> Execution<()> {
        if self.stack.len() == STACK_MAX {
            return Err(RuntimeErrorKind::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pops and returns the top [Value] on the value stack.
    #[inline(always)]
    fn pop(&mut self) -> Execution<Value> {
        self.stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)
    }

    /// Pops the top two values, returning them in the order they were pushed.
    fn pop_pair(&mut self) -> Execution<(Value, Value)> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        Ok((lhs, rhs))
    }

    /// Returns the value `distance` slots down from the top of the stack, without popping it.
    #[inline]
    fn peek(&self, distance: usize) -> Execution<&Value> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|index| self.stack.get(index))
            .ok_or(RuntimeErrorKind::StackUnderflow)
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
    }

    /// Logs the current stack and the next instruction.
    fn trace_instruction(&self, chunk: &Chunk) {
        let stack: String = self.stack.iter().map(|value| format!("[ {value} ]")).collect();
        trace!("          {stack}");
        let (instruction, _) = crate::debug::disassemble_instruction(chunk, self.ip);
        trace!("{instruction}");
    }
}

impl<W: Write> Drop for VM<W> {
    fn drop(&mut self) {
        debug!(
            "tearing down VM: {} global(s), {} interned string(s)",
            self.globals.len(),
            self.strings.len()
        );
        self.gc.free_objects();
    }
}

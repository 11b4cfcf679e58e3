//! hydro main module.
//!
//! Source code is scanned ([scanner]), compiled in a single pass into a [Chunk] of bytecode
//! ([compiler]) and executed by a stack-based [VM] ([vm]).
//!
//! ```
//! use hydro::prelude::*;
//!
//! let mut vm = VM::with_output(Vec::new());
//! vm.interpret("var greeting = \"hello\"; print greeting + \", world\";").unwrap();
//! assert_eq!(b"hello, world\n", vm.output().as_slice());
//! ```

pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod error;
pub mod extension_traits;
pub mod gc;
pub mod object;
pub mod scanner;
pub mod table;
pub mod value;
pub mod vm;
mod with_try_from_u8;

pub use error::InterpretationError;

/// The result of compiling or interpreting hydro code.
pub type Result<T> = std::result::Result<T, InterpretationError>;

/// Re-exports common items.
pub mod prelude {
    pub use crate::chunk::{Chunk, OpCode};
    pub use crate::error::{CompileError, InterpretationError, RuntimeError, RuntimeErrorKind};
    pub use crate::gc::Gc;
    pub use crate::object::{Obj, ObjString};
    pub use crate::scanner::{Lexeme, Scanner, Token};
    pub use crate::table::Table;
    pub use crate::value::Value;
    pub use crate::vm::VM;
}

//! Contains the hydro parser and bytecode compiler.
//!
//! There is no syntax tree: a Pratt parser reads [Lexeme]s straight from the [Scanner] and emits
//! bytecode as it recognizes each construct. Local variables are resolved to stack slots here, so
//! the VM never looks up a local by name.
use enum_map::{enum_map, EnumMap};
use log::{debug, trace};

use crate::chunk::WrittenOpcode;
use crate::error::{CompileError, ErrorLocation};
use crate::object::copy_string;
use crate::prelude::*;

/// How many locals can be in scope at once. Slots are encoded in one byte.
pub const UINT8_COUNT: usize = u8::MAX as usize + 1;

/////////////////////////////////////////// Public API ////////////////////////////////////////////

/// Compiles the given hydro source code and, if successful returns one bytecode [Chunk].
///
/// String literals and variable names are interned into `strings`, and registered with the `gc`,
/// which must outlive the chunk.
///
/// Compilation does not stop at the first error: every error found is returned in
/// [InterpretationError::Compile].
///
/// ```
/// # use hydro::compiler::compile;
/// # use hydro::prelude::*;
/// let mut gc = Gc::default();
/// let mut strings = Table::default();
///
/// let chunk = compile("69 + 420;", &mut gc, &mut strings).unwrap();
/// use OpCode::*;
/// assert_eq!(
///     &[Constant as u8, 0, Constant as u8, 1, Add as u8, Pop as u8, Return as u8],
///     chunk.code()
/// );
///
/// let Err(InterpretationError::Compile(errors)) = compile("1 +;", &mut gc, &mut strings) else {
///     panic!("expected a compile error");
/// };
/// assert_eq!("[line 1] Error at ';': Expect expression.", errors[0].to_string());
/// ```
pub fn compile(source: &str, gc: &mut Gc, strings: &mut Table) -> crate::Result<Chunk> {
    let parser = Parser::new(source);
    let compiler = Compiler::new(parser, gc, strings);
    compiler.compile()
}

///////////////////////////////////// Implementation details //////////////////////////////////////

/// Precedence rules for [Token]s in hydro.
///
/// Precedence rules have a well-defined partial ordering ([PartialOrd]), which is required for use
/// in the Pratt parsing algorithm.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq)]
enum Precedence {
    /// Not an operator.
    None,
    /// `=`
    Assignment,
    /// `or`
    Or,
    /// `and`
    And,
    /// `==` `!=`
    Equality,
    /// `<` `>` `<=` `>=`
    Comparison,
    /// + -
    Term,
    /// `*` `/`
    Factor,
    /// `!` `-`
    Unary,
    /// `.` `()`
    Call,
    /// Literals, and groupings
    Primary,
}

/// A rule in the Pratt parser table. See [Compiler::parse_precedence()] for usage.
#[derive(Copy, Clone)]
struct ParserRule {
    prefix: Option<ParserFn>,
    infix: Option<ParserFn>,
    precedence: Precedence,
}

/// Any possible action taken from the parsing table. Actions take the entire compiler state, and
/// convert it, usually emitting bytecode.
type ParserFn = fn(&mut Compiler<'_>, bool);

/// Contains the parser state: the scanner, a one-token lookahead, and the error status.
#[derive(Debug)]
struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Lexeme<'a>,
    previous: Lexeme<'a>,
    errors: Vec<CompileError>,
    panic_mode: bool,
}

/// A local variable in scope.
#[derive(Debug, Clone, Copy)]
struct Local<'a> {
    name: Lexeme<'a>,
    /// The scope depth of the block that declared the local. `None` while the local's own
    /// initializer is being compiled.
    depth: Option<usize>,
}

/// Contains the compiler state, which includes the [Parser], the locals in scope, and the chunk
/// being produced.
struct Compiler<'a> {
    parser: Parser<'a>,
    compiling_chunk: Chunk,
    rules: EnumMap<Token, ParserRule>,
    /// Every local in scope, innermost last. A local's index is its stack slot.
    locals: Vec<Local<'a>>,
    scope_depth: usize,
    gc: &'a mut Gc,
    strings: &'a mut Table,
}

impl Precedence {
    /// Returns the next higher level of precedence. The precedence of [Precedence::Primary] is
    /// already the highest, so it is its own "higher" precedence.
    #[inline]
    fn higher_precedence(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

impl ParserRule {
    /// Returns one level of precedence higher than the rule's precedence.
    /// See [Precedence::higher_precedence()].
    #[inline(always)]
    fn higher_precedence(&self) -> Precedence {
        self.precedence.higher_precedence()
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code, primed with the first lexeme.
    fn new(source: &'a str) -> Parser<'a> {
        let scanner = Scanner::new(source);
        let sentinel = scanner.make_sentinel("<before first token>");

        let mut parser = Parser {
            scanner,
            previous: sentinel,
            current: sentinel,
            errors: Vec::new(),
            panic_mode: false,
        };
        parser.advance();
        parser
    }

    /// Update self.previous and self.current such that they move one token further in the token
    /// stream. Error lexemes are reported and skipped.
    fn advance(&mut self) {
        self.previous = self.current;

        // Get tokens until we get a non-error token.
        loop {
            self.current = self.scanner.scan_token();
            trace!(
                "line {}: {:?} {:?}",
                self.current.line(),
                self.current.token(),
                self.current.text()
            );
            if self.current.token() != Token::Error {
                break;
            }

            self.error_at_current(self.current.text())
        }
    }

    /// Scan the next token. If the token is not of the desired type, an error is reported.
    fn consume(&mut self, desired_token: Token, message: &'static str) {
        if self.current.token() == desired_token {
            return self.advance();
        }

        self.error_at_current(message);
    }

    /// Return true if the current token is equal to the given token.
    fn check(&self, token: Token) -> bool {
        self.current.token() == token
    }

    /// Scan the next token. Advances if the token matches `desired_token`. Returns whether
    /// `desired_token` was matched.
    fn match_and_advance(&mut self, desired_token: Token) -> bool {
        if self.check(desired_token) {
            self.advance();
            return true;
        }
        false
    }

    /// Report a compiler error, located at the previous [Lexeme]. In Pratt parsing, this is the
    /// handler you usually want to call, because the previous lexeme decided which [ParserRule]
    /// was accepted.
    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message)
    }

    /// Report a compiler error, located at the current [Lexeme].
    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message)
    }

    /// Report a compiler error, located at the given [Lexeme].
    fn error_at(&mut self, lexeme: Lexeme<'a>, message: &str) {
        // *Attempt* to prevent a deluge of spurious syntax errors:
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let location = match lexeme.token() {
            Token::Eof => ErrorLocation::AtEnd,
            Token::Error => ErrorLocation::Unspecified,
            _ => ErrorLocation::At(lexeme.text().to_owned()),
        };
        let error = CompileError {
            line: lexeme.line(),
            location,
            message: message.to_owned(),
        };
        debug!("{error}");
        self.errors.push(error);
    }

    /// Returns true if any error has been reported.
    fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Synchronize after being in panic mode.
    ///
    /// The heuristic is that we're going to gobble up and discard tokens until we **think** we're
    /// a point that makes sense in the grammar. Points that make sense in a grammar are the start
    /// of statements (statement boundaries). We could be wrong!
    fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.token() != Token::Eof {
            if self.previous.token() == Token::Semicolon {
                return;
            }

            match self.current.token() {
                Token::Class
                | Token::Fun
                | Token::Var
                | Token::For
                | Token::If
                | Token::While
                | Token::Print
                | Token::Return => return,
                _ => (), // continue panicking
            }

            self.advance();
        }
    }
}

impl<'a> Compiler<'a> {
    /// Creates a new compiler with the given [Parser].
    fn new(parser: Parser<'a>, gc: &'a mut Gc, strings: &'a mut Table) -> Compiler<'a> {
        Compiler {
            parser,
            compiling_chunk: Chunk::default(),
            rules: parser_rules(),
            locals: Vec::with_capacity(UINT8_COUNT),
            scope_depth: 0,
            gc,
            strings,
        }
    }

    /// Takes ownership of the compiler, and returns the chunk
    fn compile(mut self) -> crate::Result<Chunk> {
        while !self.match_and_advance(Token::Eof) {
            self.declaration();
        }
        self.end_compiler();

        if self.parser.had_error() {
            return Err(InterpretationError::Compile(self.parser.errors));
        }

        debug!(
            "compiled {} byte(s) of bytecode, {} constant(s)",
            self.compiling_chunk.len(),
            self.compiling_chunk.constants().len()
        );
        Ok(self.compiling_chunk)
    }

    /// Signal the end of compilation.
    fn end_compiler(&mut self) {
        self.emit_return();

        // Log a listing of the bytecode to manually inspect compiled output.
        if cfg!(feature = "print_code") && !self.parser.had_error() {
            debug!(
                "{}",
                crate::debug::disassemble_chunk(self.current_chunk(), "code")
            );
        }
    }

    /// The core of the Pratt parsing algorithm.
    ///
    /// See: <https://en.wikipedia.org/wiki/Operator-precedence_parser#Pratt_parsing>
    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();

        let can_assign = precedence <= Precedence::Assignment;

        // First, figure out how to parse the prefix.
        let Some(prefix_rule) = self.rule_from_previous().prefix else {
            self.parser.error("Expect expression.");
            return;
        };
        prefix_rule(self, can_assign);

        while precedence <= self.rule_from_current().precedence {
            // current is now previous:
            self.advance();
            // Every token with a precedence has an infix rule.
            if let Some(infix_rule) = self.rule_from_previous().infix {
                infix_rule(self, can_assign);
            }
        }

        // Nothing consumed the `=`, so whatever is on its left cannot be assigned to.
        if can_assign && self.match_and_advance(Token::Equal) {
            self.parser.error("Invalid assignment target.");
        }
    }

    /// Add the identifier text to the current chunk's constants table.
    fn identifier_constant(&mut self, lexeme: Lexeme) -> u8 {
        let name = copy_string(self.gc, self.strings, lexeme.text());
        self.make_constant(name.into())
    }

    /// Consume the next identifier and declare it as a variable.
    /// Returns the constant for the identifier name if it is a global, or `0` for a local.
    fn parse_variable(&mut self, error_message: &'static str) -> u8 {
        self.parser.consume(Token::Identifier, error_message);

        self.declare_variable();
        if self.scope_depth > 0 {
            return 0;
        }

        self.identifier_constant(self.parser.previous)
    }

    /// Record the existence of a local variable. Globals are late-bound, so nothing is recorded
    /// for them.
    fn declare_variable(&mut self) {
        if self.scope_depth == 0 {
            return;
        }

        let name = self.parser.previous;
        let already_declared = self
            .locals
            .iter()
            .rev()
            .take_while(|local| !matches!(local.depth, Some(depth) if depth < self.scope_depth))
            .any(|local| local.name.text() == name.text());
        if already_declared {
            self.parser
                .error("Already a variable with this name in this scope.");
        }

        self.add_local(name);
    }

    /// Appends a new, uninitialized local.
    fn add_local(&mut self, name: Lexeme<'a>) {
        if self.locals.len() == UINT8_COUNT {
            self.parser.error("Too many local variables in scope.");
            return;
        }

        self.locals.push(Local { name, depth: None });
    }

    /// The most recently declared local can now be used.
    fn mark_initialized(&mut self) {
        let depth = self.scope_depth;
        if let Some(local) = self.locals.last_mut() {
            local.depth = Some(depth);
        }
    }

    /// Define a new variable. A global gets an instruction; a local is simply the value left on
    /// top of the stack.
    fn define_variable(&mut self, global: u8) {
        if self.scope_depth > 0 {
            self.mark_initialized();
            return;
        }

        self.emit_instruction(OpCode::DefineGlobal)
            .with_operand(global);
    }

    /// Returns the stack slot of the innermost local with this name, if any.
    fn resolve_local(&mut self, name: Lexeme) -> Option<u8> {
        let (slot, local) = self
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name.text() == name.text())?;

        if local.depth.is_none() {
            self.parser
                .error("Can't read local variable in its own initializer.");
        }

        // There are never more than UINT8_COUNT locals.
        u8::try_from(slot).ok()
    }

    /// Parse a variable. This could either be a variable access or an assignment, depending on
    /// `can_assign` and the syntactic context.
    fn named_variable(&mut self, lexeme: Lexeme<'a>, can_assign: bool) {
        let (get_op, set_op, arg) = match self.resolve_local(lexeme) {
            Some(slot) => (OpCode::GetLocal, OpCode::SetLocal, slot),
            None => {
                let arg = self.identifier_constant(lexeme);
                (OpCode::GetGlobal, OpCode::SetGlobal, arg)
            }
        };

        // Peek ahead and look if we're assigning.
        // This only works if we're parsing at a lower or equal precedence to assignment.
        if can_assign && self.match_and_advance(Token::Equal) {
            // We're in an assignment expression!
            // Parse the right-hand side:
            self.expression();
            self.emit_instruction(set_op).with_operand(arg);
        } else {
            // A reference to a variable.
            self.emit_instruction(get_op).with_operand(arg);
        }
    }

    /// Parse a declaration.
    fn declaration(&mut self) {
        if self.match_and_advance(Token::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.parser.panic_mode {
            self.parser.synchronize();
        }
    }

    /// Parse a statement.
    fn statement(&mut self) {
        if self.match_and_advance(Token::Print) {
            self.print_statement();
        } else if self.match_and_advance(Token::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    /// Parse an expression.
    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// Parse the declarations in a block. Assumes `{` has already been consumed.
    fn block(&mut self) {
        while !self.parser.check(Token::RightBrace) && !self.parser.check(Token::Eof) {
            self.declaration();
        }

        self.parser
            .consume(Token::RightBrace, "Expect '}' after block.");
    }

    /// Enter a new block.
    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Leave a block, popping every local it declared off the stack.
    fn end_scope(&mut self) {
        self.scope_depth -= 1;

        while matches!(self.locals.last(), Some(Local { depth: Some(depth), .. }) if *depth > self.scope_depth)
        {
            self.emit_instruction(OpCode::Pop);
            self.locals.pop();
        }
    }

    /// Parse a variable declaration. Assumes `var` has already been consumed
    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");

        if self.match_and_advance(Token::Equal) {
            self.expression();
        } else {
            self.emit_instruction(OpCode::Nil);
        }

        self.parser
            .consume(Token::Semicolon, "Expect ';' after variable declaration.");

        self.define_variable(global);
    }

    /// Parse an expression statement (e.g., assignments).
    fn expression_statement(&mut self) {
        self.expression();
        self.parser
            .consume(Token::Semicolon, "Expect ';' after expression.");
        // Statements have 0 stack effect, but expressions produce a thing on the stack, and we
        // need to get rid of it!
        self.emit_instruction(OpCode::Pop);
    }

    /// Parse a print statement. Assumes `print` has already been consumed.
    fn print_statement(&mut self) {
        self.expression();
        self.parser
            .consume(Token::Semicolon, "Expect ';' after value.");
        self.emit_instruction(OpCode::Print);
    }

    /// Appends [OpCode::Return] to current [Chunk].
    fn emit_return(&mut self) {
        self.emit_instruction(OpCode::Return);
    }

    /// Appends [OpCode::Constant] to current [Chunk], using the current value.
    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_instruction(OpCode::Constant)
            .with_operand(index);
    }

    /// Appends a new constant to the current [Chunk].
    ///
    /// # Error
    ///
    /// When the constant index is greater than 255 (and thus can no longer be represented as a
    /// u8), this signals a compiler error and returns `0u8`. The current [Chunk] can still be
    /// appended to, however, it is invalid, and should not be emitted as a valid program.
    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.current_chunk().add_constant(value);
        match u8::try_from(index) {
            Ok(index) => index,
            Err(_) => {
                self.parser.error("Too many constants in one chunk.");
                0
            }
        }
    }

    /// Writes an [OpCode] to the current [Chunk].
    /// Returns a [WrittenOpcode], with which you can write an operand.
    fn emit_instruction(&mut self, opcode: OpCode) -> WrittenOpcode<'_> {
        let line = self.line_number_of_prefix();
        self.current_chunk().write_opcode(opcode, line)
    }

    /// Interns the text and wraps it as a [Value].
    fn intern(&mut self, text: &str) -> Value {
        copy_string(self.gc, self.strings, text).into()
    }

    ///////////////////////////////////////// Aliases /////////////////////////////////////////////

    /// Returns the current [Chunk].
    #[inline(always)]
    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.compiling_chunk
    }

    /// Advance one token in scanner, such that:
    /// ```text
    /// (previous, current) = (current, scanner.next_token())
    /// ```
    #[inline(always)]
    fn advance(&mut self) {
        self.parser.advance()
    }

    /// Returns the line number of the prefix token, a.k.a., `self.parser.previous`.
    #[inline(always)]
    fn line_number_of_prefix(&self) -> usize {
        self.parser.previous.line()
    }

    /// Delegates to [Parser::match_and_advance]. Returns true if the token was matched.
    #[inline(always)]
    fn match_and_advance(&mut self, desired_token: Token) -> bool {
        self.parser.match_and_advance(desired_token)
    }

    /// Returns the rule of the prefix in the process of being parsed.
    #[inline(always)]
    fn rule_from_previous(&self) -> ParserRule {
        self.rules[self.previous_token()]
    }

    /// Returns the rule of the lookahead token.
    #[inline(always)]
    fn rule_from_current(&self) -> ParserRule {
        self.rules[self.parser.current.token()]
    }

    /// Return the token (type) of the previous value. This is useful in prefix parser functions.
    #[inline(always)]
    fn previous_token(&self) -> Token {
        self.parser.previous.token()
    }
}

////////////////////////////////////////// Parser rules ///////////////////////////////////////////

/// Makes defining [ParserRule]s a bit cleaner looking.
macro_rules! rule {
    ($prefix:expr, $infix:expr, $precedence:expr) => {
        ParserRule {
            prefix: $prefix,
            infix: $infix,
            precedence: $precedence,
        }
    };
}

/// Builds the Pratt parser table, indexed by [Token].
#[rustfmt::skip]
fn parser_rules() -> EnumMap<Token, ParserRule> {
    use Token::*;
    enum_map! {
        //                     Prefix          Infix         Precedence
        LeftParen    => rule!{ Some(grouping), None,         Precedence::None },
        Minus        => rule!{ Some(unary),    Some(binary), Precedence::Term },
        Plus         => rule!{ None,           Some(binary), Precedence::Term },
        Slash        => rule!{ None,           Some(binary), Precedence::Factor },
        Star         => rule!{ None,           Some(binary), Precedence::Factor },
        Bang         => rule!{ Some(unary),    None,         Precedence::None },
        BangEqual    => rule!{ None,           Some(binary), Precedence::Equality },
        EqualEqual   => rule!{ None,           Some(binary), Precedence::Equality },
        Greater      => rule!{ None,           Some(binary), Precedence::Comparison },
        GreaterEqual => rule!{ None,           Some(binary), Precedence::Comparison },
        Less         => rule!{ None,           Some(binary), Precedence::Comparison },
        LessEqual    => rule!{ None,           Some(binary), Precedence::Comparison },
        Identifier   => rule!{ Some(variable), None,         Precedence::None },
        StrLiteral   => rule!{ Some(string),   None,         Precedence::None },
        Number       => rule!{ Some(number),   None,         Precedence::None },
        False        => rule!{ Some(literal),  None,         Precedence::None },
        Nil          => rule!{ Some(literal),  None,         Precedence::None },
        True         => rule!{ Some(literal),  None,         Precedence::None },
        RightParen | LeftBrace | RightBrace | Comma | Dot | Semicolon | Equal | And | Class
        | Else | For | Fun | If | Or | Print | Return | Super | This | Var | While | Error
        | Eof
                     => rule!{ None,           None,         Precedence::None },
    }
}

/// Parse '(' as a prefix. Assumes '(' has been consumed.
fn grouping(compiler: &mut Compiler, _can_assign: bool) {
    debug_assert_eq!(Token::LeftParen, compiler.previous_token());
    compiler.expression();
    compiler
        .parser
        .consume(Token::RightParen, "Expect ')' after expression.");
}

/// Parse a number literal as a prefix. Assumes number has been consumed.
fn number(compiler: &mut Compiler, _can_assign: bool) {
    debug_assert_eq!(Token::Number, compiler.previous_token());
    match compiler.parser.previous.text().parse::<f64>() {
        Ok(value) => compiler.emit_constant(value.into()),
        // The scanner only produces digits with an optional fraction, so this cannot happen.
        Err(_) => compiler.parser.error("Invalid number literal."),
    }
}

/// Parse an unary operator as a prefix. Assumes the operator has been consumed.
fn unary(compiler: &mut Compiler, _can_assign: bool) {
    let operator = compiler.previous_token();

    // Compile the operand, so that it's placed on the stack.
    compiler.parse_precedence(Precedence::Unary);

    match operator {
        Token::Bang => compiler.emit_instruction(OpCode::Not),
        Token::Minus => compiler.emit_instruction(OpCode::Negate),
        _ => unreachable!("unary() is only the prefix rule of ! and -"),
    };
}

/// Parse a binary operator as an infix. Assumes the operator has been consumed.
fn binary(compiler: &mut Compiler, _can_assign: bool) {
    let operator = compiler.previous_token();
    let rule = compiler.rules[operator];

    // Parsing the right operand one level higher makes binary operators left-associative:
    // 1 + 2 + 3 is (1 + 2) + 3.
    compiler.parse_precedence(rule.higher_precedence());
    let opcode = match operator {
        Token::BangEqual => OpCode::NotEqual,
        Token::EqualEqual => OpCode::Equal,
        Token::Greater => OpCode::Greater,
        Token::GreaterEqual => OpCode::GreaterEqual,
        Token::Less => OpCode::Less,
        Token::LessEqual => OpCode::LessEqual,
        Token::Plus => OpCode::Add,
        Token::Minus => OpCode::Subtract,
        Token::Star => OpCode::Multiply,
        Token::Slash => OpCode::Divide,
        _ => unreachable!("binary() is only the infix rule of binary operators"),
    };
    compiler.emit_instruction(opcode);
}

/// Parse a keyword literal as a prefix. Assumes the keyword has been consumed.
fn literal(compiler: &mut Compiler, _can_assign: bool) {
    match compiler.previous_token() {
        Token::False => compiler.emit_instruction(OpCode::False),
        Token::Nil => compiler.emit_instruction(OpCode::Nil),
        Token::True => compiler.emit_instruction(OpCode::True),
        _ => unreachable!("literal() is only the prefix rule of false, nil and true"),
    };
}

/// Parse a string literal. Add it to the constant pool.
fn string(compiler: &mut Compiler, _can_assign: bool) {
    debug_assert_eq!(Token::StrLiteral, compiler.previous_token());

    // Access the string contents (without the quotes)
    let literal = compiler.parser.previous.text();
    debug_assert!(literal.len() >= 2);
    debug_assert!(literal.starts_with('"'));
    debug_assert!(literal.ends_with('"'));

    let contents = &literal[1..literal.len() - 1];
    let value = compiler.intern(contents);
    compiler.emit_constant(value);
}

/// Parse a variable. It can be either a variable access or assignment, which is why `can_assign`
/// is required by all callbacks!
fn variable(compiler: &mut Compiler, can_assign: bool) {
    compiler.named_variable(compiler.parser.previous, can_assign);
}

////////////////////////////////////////////// Tests //////////////////////////////////////////////

#[cfg(test)]
mod test {
    use super::*;
    use OpCode::*;

    /// Compiles the source, expecting success.
    fn compile_ok(source: &str) -> (Chunk, Gc, Table) {
        let mut gc = Gc::default();
        let mut strings = Table::default();
        let chunk = match compile(source, &mut gc, &mut strings) {
            Ok(chunk) => chunk,
            Err(error) => panic!("{source:?} failed to compile: {error:?}"),
        };
        (chunk, gc, strings)
    }

    /// Compiles the source, expecting failure, and returns the messages.
    fn compile_errors(source: &str) -> Vec<String> {
        let mut gc = Gc::default();
        let mut strings = Table::default();
        match compile(source, &mut gc, &mut strings) {
            Err(InterpretationError::Compile(errors)) => {
                errors.iter().map(ToString::to_string).collect()
            }
            other => panic!("{source:?} should not compile, got {other:?}"),
        }
    }

    /// Shorthand to write expected bytecode as opcodes and raw operands.
    macro_rules! bytecode {
        ($($byte:expr),* $(,)?) => {
            vec![$($byte as u8),*]
        };
    }

    #[test]
    fn precedence_confidence_check() {
        // High-level precedence (C-like)
        assert!(Precedence::Assignment < Precedence::Or);
        assert!(Precedence::Or < Precedence::And);
        assert!(Precedence::And < Precedence::Equality);
        assert!(Precedence::Equality < Precedence::Comparison);

        // PEDMAS
        // () has greater precedence than */
        assert!(Precedence::Call > Precedence::Factor);
        // */ has greater precedence than +-
        assert!(Precedence::Factor > Precedence::Term);

        // ``and should be one level of precedence higher than `or`
        assert_eq!(Precedence::And, Precedence::Or.higher_precedence());
        assert_eq!(Precedence::Factor, Precedence::Term.higher_precedence());
    }

    #[test]
    fn literals() {
        for (source, opcode) in [("true;", True), ("false;", False), ("nil;", Nil)] {
            let (chunk, _, _) = compile_ok(source);
            assert_eq!(bytecode![opcode, Pop, Return], chunk.code(), "{source}");
        }
    }

    #[test]
    fn addition() {
        let (chunk, _, _) = compile_ok("69 + 420;");
        assert_eq!(
            bytecode![Constant, 0, Constant, 1, Add, Pop, Return],
            chunk.code()
        );
        let constants: Vec<_> = chunk.constants().iter().cloned().collect();
        assert_eq!(vec![Value::Number(69.0), Value::Number(420.0)], constants);
        assert!(chunk.lines().iter().all(|&line| line == 1));
    }

    #[test]
    fn binary_operators_are_left_associative() {
        let (chunk, _, _) = compile_ok("1 + 2 + 3;");
        assert_eq!(
            bytecode![Constant, 0, Constant, 1, Add, Constant, 2, Add, Pop, Return],
            chunk.code()
        );

        let (chunk, _, _) = compile_ok("8 - 4 - 2;");
        assert_eq!(
            bytecode![Constant, 0, Constant, 1, Subtract, Constant, 2, Subtract, Pop, Return],
            chunk.code()
        );
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        let (chunk, _, _) = compile_ok("1 + 2 * 3;");
        assert_eq!(
            bytecode![Constant, 0, Constant, 1, Constant, 2, Multiply, Add, Pop, Return],
            chunk.code()
        );

        let (chunk, _, _) = compile_ok("(1 + 2) * 3;");
        assert_eq!(
            bytecode![Constant, 0, Constant, 1, Add, Constant, 2, Multiply, Pop, Return],
            chunk.code()
        );
    }

    #[test]
    fn unary_and_comparison() {
        let (chunk, _, _) = compile_ok("!true;");
        assert_eq!(bytecode![True, Not, Pop, Return], chunk.code());

        let (chunk, _, _) = compile_ok("-69;");
        assert_eq!(bytecode![Constant, 0, Negate, Pop, Return], chunk.code());

        let (chunk, _, _) = compile_ok("-1 < 2 == 3 >= 4;");
        assert_eq!(
            bytecode![
                Constant, 0, Negate, Constant, 1, Less, Constant, 2, Constant, 3, GreaterEqual,
                Equal, Pop, Return
            ],
            chunk.code()
        );

        let (chunk, _, _) = compile_ok("1 != 2; 1 <= 2; 1 > 2;");
        assert_eq!(
            bytecode![
                Constant, 0, Constant, 1, NotEqual, Pop,
                Constant, 2, Constant, 3, LessEqual, Pop,
                Constant, 4, Constant, 5, Greater, Pop,
                Return
            ],
            chunk.code()
        );
    }

    #[test]
    fn strings_are_interned() {
        let (chunk, gc, strings) = compile_ok("\"hello\" + \"hello\";");
        assert_eq!(
            bytecode![Constant, 0, Constant, 1, Add, Pop, Return],
            chunk.code()
        );
        // Two constants, but only one string object.
        assert_eq!(2, chunk.constants().len());
        assert_eq!(1, gc.n_objects());
        assert_eq!(1, strings.len());
        assert_eq!(Some("hello"), chunk.constant(0).and_then(Value::as_string).map(|s| s.as_str()));
    }

    #[test]
    fn global_variables() {
        let (chunk, _, _) = compile_ok("var x = 6.9; x; x = 1; var y;");
        assert_eq!(
            bytecode![
                Constant, 1, DefineGlobal, 0,
                GetGlobal, 2, Pop,
                Constant, 4, SetGlobal, 3, Pop,
                Nil, DefineGlobal, 5,
                Return
            ],
            chunk.code()
        );
        assert_eq!(Some(&Value::Number(6.9)), chunk.constant(1));
        assert_eq!("x", chunk.constant(0).map(ToString::to_string).unwrap());
        assert_eq!("y", chunk.constant(5).map(ToString::to_string).unwrap());
    }

    #[test]
    fn local_variables_live_on_the_stack() {
        let (chunk, _, _) = compile_ok("{ var x = 1; var y = x; y = 2; print y; }");
        assert_eq!(
            bytecode![
                Constant, 0,
                GetLocal, 0,
                Constant, 1, SetLocal, 1, Pop,
                GetLocal, 1, Print,
                Pop, Pop,
                Return
            ],
            chunk.code()
        );
    }

    #[test]
    fn shadowing_in_nested_scopes() {
        let (chunk, _, _) = compile_ok("{ var x = 1; { var x = 2; x; } x; }");
        assert_eq!(
            bytecode![
                Constant, 0,
                Constant, 1,
                // The inner x is slot 1...
                GetLocal, 1, Pop,
                // ...and is popped when its block ends.
                Pop,
                // The outer x is slot 0.
                GetLocal, 0, Pop,
                Pop,
                Return
            ],
            chunk.code()
        );
    }

    #[test]
    fn empty_nested_blocks() {
        let (chunk, _, _) = compile_ok("{ var x = 1; { var x = 2; } }");
        assert_eq!(
            bytecode![Constant, 0, Constant, 1, Pop, Pop, Return],
            chunk.code()
        );
    }

    #[test]
    fn locals_do_not_need_name_constants() {
        let (chunk, _, strings) = compile_ok("{ var local = 1; }");
        assert_eq!(1, chunk.constants().len());
        assert_eq!(0, strings.len());
    }

    #[test]
    fn multi_line_source_records_lines() {
        let (chunk, _, _) = compile_ok("1;\n\n2;");
        let expected: &[usize] = &[1, 1, 1, 3, 3, 3, 3];
        assert_eq!(expected, chunk.lines());
    }

    #[test]
    fn missing_expression() {
        assert_eq!(
            vec!["[line 1] Error at ';': Expect expression."],
            compile_errors("1 +;")
        );
        assert_eq!(
            vec!["[line 1] Error at end: Expect expression."],
            compile_errors("print")
        );
    }

    #[test]
    fn missing_semicolon() {
        assert_eq!(
            vec!["[line 2] Error at end: Expect ';' after value."],
            compile_errors("print 1\n")
        );
        assert_eq!(
            vec!["[line 1] Error at end: Expect ';' after variable declaration."],
            compile_errors("var x = 1")
        );
        assert_eq!(
            vec!["[line 1] Error at 'y': Expect ';' after expression."],
            compile_errors("x y;")
        );
    }

    #[test]
    fn lexical_errors_have_no_location() {
        assert_eq!(
            vec!["[line 1] Error: Unexpected character."],
            compile_errors("1 + @;")
        );
        assert_eq!(
            vec!["[line 2] Error: Unterminated string."],
            compile_errors("print \"oops\n")
        );
    }

    #[test]
    fn invalid_assignment_target() {
        assert_eq!(
            vec!["[line 1] Error at '=': Invalid assignment target."],
            compile_errors("var a; var b; var c; a + b = c;")
        );
        assert_eq!(
            vec!["[line 1] Error at '=': Invalid assignment target."],
            compile_errors("1 = 2;")
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let (chunk, _, _) = compile_ok("{ var a; var b; a = b = 3; }");
        assert_eq!(
            bytecode![
                Nil, Nil,
                Constant, 0, SetLocal, 1, SetLocal, 0, Pop,
                Pop, Pop,
                Return
            ],
            chunk.code()
        );
    }

    #[test]
    fn redeclaring_a_local() {
        assert_eq!(
            vec!["[line 1] Error at 'a': Already a variable with this name in this scope."],
            compile_errors("{ var a = 1; var a = 2; }")
        );
        // Globals may be redeclared.
        compile_ok("var a = 1; var a = 2;");
    }

    #[test]
    fn reading_local_in_own_initializer() {
        assert_eq!(
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."],
            compile_errors("{ var a = 1; { var a = a; } }")
        );
    }

    #[test]
    fn two_independent_errors_are_both_reported() {
        assert_eq!(
            vec![
                "[line 1] Error at ';': Expect expression.",
                "[line 2] Error at ';': Expect expression.",
            ],
            compile_errors("1 +;\n2 *;")
        );
    }

    #[test]
    fn synchronizes_on_statement_keywords() {
        // `print` starts a statement, so it compiles normally after the first error.
        assert_eq!(
            vec![
                "[line 1] Error at '2': Expect ';' after expression.",
                "[line 1] Error at ';': Expect variable name.",
            ],
            compile_errors("1 2 print 3; var;")
        );
    }

    #[test]
    fn too_many_constants() {
        let source: String = (0..257).map(|i| format!("{i};")).collect();
        assert_eq!(
            vec!["[line 1] Error at '256': Too many constants in one chunk."],
            compile_errors(&source)
        );

        let source: String = (0..256).map(|i| format!("{i};")).collect();
        compile_ok(&source);
    }

    #[test]
    fn too_many_locals() {
        let declarations: String = (0..257).map(|i| format!("var v{i};")).collect();
        assert_eq!(
            vec!["[line 1] Error at 'v256': Too many local variables in scope."],
            compile_errors(&format!("{{ {declarations} }}"))
        );

        let declarations: String = (0..256).map(|i| format!("var v{i};")).collect();
        compile_ok(&format!("{{ {declarations} }}"));
    }

    #[test]
    fn unclosed_block() {
        assert_eq!(
            vec!["[line 1] Error at end: Expect '}' after block."],
            compile_errors("{ var x = 1;")
        );
    }
}

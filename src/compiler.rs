//! Recursive-descent compiler for MilkDrop equations.
//!
//! Parses a token stream and emits bytecode directly — there is no AST.
//! Precedence is encoded in the grammar, one method per level, loosest
//! binding first:
//!
//! ```text
//! statement   := assignment
//! assignment  := IDENT '=' assignment | expression
//! expression  := logical_or
//! logical_or  := logical_and ('||' logical_and)*
//! logical_and := comparison  ('&&' comparison)*
//! comparison  := term (('=='|'!='|'<'|'>'|'<='|'>=') term)?
//! term        := factor (('+'|'-') factor)*
//! factor      := unary (('*'|'/'|'%') unary)*
//! unary       := ('-'|'+')? unary | primary
//! primary     := NUMBER | IDENT | IDENT '(' args ')' | '(' expression ')'
//! ```
//!
//! `comparison` consumes at most one operator, so `a < b < c` is rejected
//! rather than chained. This matches how preset authors actually write
//! equations and is load-bearing: presets exist that lean on it.

use crate::error::EvalError;
use crate::lexer::Lexer;
use crate::program::{Instruction, Program};
use crate::token::Token;

pub struct Compiler {
    tokens: Vec<Token>,
    pos: usize,
    program: Program,
}

impl Compiler {
    /// Compile a single statement into a fresh program.
    pub fn compile(source: &str) -> Result<Program, EvalError> {
        let mut compiler = Self::new();
        compiler.compile_statement(source)?;
        compiler.program.emit(Instruction::Halt);
        Ok(compiler.program)
    }

    /// Compile a multi-statement block into one shared program.
    ///
    /// The block is split on newlines, each line further split on `;`, and
    /// every non-empty trimmed fragment compiled as one statement in
    /// sequence. Instructions and the variable table accumulate across
    /// statements, so `q1 = 3; q1 + 1` resolves both `q1`s to one index.
    /// The first failing statement aborts the whole compile.
    pub fn compile_block(code: &str) -> Result<Program, EvalError> {
        let mut compiler = Self::new();
        for line in code.lines() {
            for fragment in line.split(';') {
                let statement = fragment.trim();
                if statement.is_empty() {
                    continue;
                }
                compiler.compile_statement(statement)?;
            }
        }
        compiler.program.emit(Instruction::Halt);
        Ok(compiler.program)
    }

    fn new() -> Self {
        Self {
            tokens: Vec::new(),
            pos: 0,
            program: Program::new(),
        }
    }

    fn compile_statement(&mut self, source: &str) -> Result<(), EvalError> {
        self.tokens = Lexer::new(source).tokenize()?;
        self.pos = 0;
        self.statement()?;
        if !self.is_at_end() {
            return Err(EvalError::parse(format!(
                "unexpected token after statement: {:?}",
                self.peek()
            )));
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<(), EvalError> {
        self.assignment()
    }

    /// An assignment only when an identifier is immediately followed by
    /// `=`; otherwise rewind the cursor and parse as a plain expression,
    /// so `x == 1` never turns into a store.
    ///
    /// The right-hand side recurses into `assignment`, making `=`
    /// right-associative: `a = b = 1` stores 1 into `b`, and the value the
    /// store pushes back is what lands in `a`.
    fn assignment(&mut self) -> Result<(), EvalError> {
        if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            self.advance();
            if self.matches(&Token::Assign) {
                self.assignment()?;
                let index = self.program.add_variable(&name);
                self.program.emit(Instruction::Store(index));
                return Ok(());
            }
            self.pos -= 1;
        }
        self.expression()
    }

    fn expression(&mut self) -> Result<(), EvalError> {
        self.logical_or()
    }

    fn logical_or(&mut self) -> Result<(), EvalError> {
        self.logical_and()?;
        while self.matches(&Token::PipePipe) {
            self.logical_and()?;
            self.program.emit(Instruction::Or);
        }
        Ok(())
    }

    fn logical_and(&mut self) -> Result<(), EvalError> {
        self.comparison()?;
        while self.matches(&Token::AmpAmp) {
            self.comparison()?;
            self.program.emit(Instruction::And);
        }
        Ok(())
    }

    /// Non-associative: at most one comparison operator is consumed.
    fn comparison(&mut self) -> Result<(), EvalError> {
        self.term()?;
        let op = match self.peek() {
            Token::EqEq => Some(Instruction::CmpEq),
            Token::BangEq => Some(Instruction::CmpNe),
            Token::Less => Some(Instruction::CmpLt),
            Token::Greater => Some(Instruction::CmpGt),
            Token::LessEq => Some(Instruction::CmpLe),
            Token::GreaterEq => Some(Instruction::CmpGe),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            self.term()?;
            self.program.emit(op);
        }
        Ok(())
    }

    fn term(&mut self) -> Result<(), EvalError> {
        self.factor()?;
        loop {
            if self.matches(&Token::Plus) {
                self.factor()?;
                self.program.emit(Instruction::Add);
            } else if self.matches(&Token::Minus) {
                self.factor()?;
                self.program.emit(Instruction::Subtract);
            } else {
                return Ok(());
            }
        }
    }

    fn factor(&mut self) -> Result<(), EvalError> {
        self.unary()?;
        loop {
            if self.matches(&Token::Star) {
                self.unary()?;
                self.program.emit(Instruction::Multiply);
            } else if self.matches(&Token::Slash) {
                self.unary()?;
                self.program.emit(Instruction::Divide);
            } else if self.matches(&Token::Percent) {
                self.unary()?;
                self.program.emit(Instruction::Modulo);
            } else {
                return Ok(());
            }
        }
    }

    fn unary(&mut self) -> Result<(), EvalError> {
        if self.matches(&Token::Minus) {
            self.unary()?;
            self.program.emit(Instruction::Negate);
            Ok(())
        } else if self.matches(&Token::Plus) {
            // Unary plus parses its operand and emits nothing.
            self.unary()
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<(), EvalError> {
        match self.peek().clone() {
            Token::Number(value) => {
                self.advance();
                self.program.emit(Instruction::Push(value));
                Ok(())
            }
            Token::Ident(name) => {
                self.advance();
                if self.matches(&Token::LParen) {
                    self.call(&name)
                } else {
                    let index = self.program.add_variable(&name);
                    self.program.emit(Instruction::Load(index));
                    Ok(())
                }
            }
            Token::LParen => {
                self.advance();
                self.expression()?;
                if !self.matches(&Token::RParen) {
                    return Err(EvalError::parse("expected ')' after expression"));
                }
                Ok(())
            }
            other => Err(EvalError::parse(format!(
                "expected expression, got {other:?}"
            ))),
        }
    }

    /// Parse a call's argument list (the `(` is already consumed) and emit
    /// the function's opcode. Arguments push left-to-right, so the opcode
    /// handler pops the last argument first.
    ///
    /// Arity is enforced here: a mismatched call would unbalance the
    /// operand stack and turn into a runtime underflow, so it is rejected
    /// at compile time instead.
    fn call(&mut self, name: &str) -> Result<(), EvalError> {
        let mut argc = 0usize;
        if !self.check(&Token::RParen) {
            loop {
                self.expression()?;
                argc += 1;
                if !self.matches(&Token::Comma) {
                    break;
                }
            }
        }
        if !self.matches(&Token::RParen) {
            return Err(EvalError::parse(format!(
                "expected ')' after arguments to {name}()"
            )));
        }

        let (instruction, arity) = match name {
            "sin" => (Instruction::Sin, 1),
            "cos" => (Instruction::Cos, 1),
            "tan" => (Instruction::Tan, 1),
            "asin" => (Instruction::Asin, 1),
            "acos" => (Instruction::Acos, 1),
            "atan" => (Instruction::Atan, 1),
            "atan2" => (Instruction::Atan2, 2),
            "sqrt" => (Instruction::Sqrt, 1),
            "abs" => (Instruction::Abs, 1),
            "sqr" => (Instruction::Sqr, 1),
            "pow" => (Instruction::Pow, 2),
            "exp" => (Instruction::Exp, 1),
            "log" => (Instruction::Log, 1),
            "log10" => (Instruction::Log10, 1),
            "min" => (Instruction::Min, 2),
            "max" => (Instruction::Max, 2),
            "sign" => (Instruction::Sign, 1),
            "rand" => (Instruction::Rand, 1),
            "if" => (Instruction::If, 3),
            "equal" => (Instruction::Equal, 2),
            "above" => (Instruction::Above, 2),
            "below" => (Instruction::Below, 2),
            _ => return Err(EvalError::parse(format!("unknown function: {name}"))),
        };

        if argc != arity {
            return Err(EvalError::parse(format!(
                "{name}() takes {arity} argument(s), got {argc}"
            )));
        }

        self.program.emit(instruction);
        Ok(())
    }

    // --- Cursor helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        *self.peek() == Token::End
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn matches(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_number_literal() {
        let program = Compiler::compile("42").unwrap();
        assert_eq!(
            program.instructions(),
            &[Instruction::Push(42.0), Instruction::Halt]
        );
    }

    #[test]
    fn compile_precedence_mul_before_add() {
        let program = Compiler::compile("2 + 3 * 4").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Push(2.0),
                Instruction::Push(3.0),
                Instruction::Push(4.0),
                Instruction::Multiply,
                Instruction::Add,
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn compile_parens_override_precedence() {
        let program = Compiler::compile("(2 + 3) * 4").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Push(2.0),
                Instruction::Push(3.0),
                Instruction::Add,
                Instruction::Push(4.0),
                Instruction::Multiply,
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn compile_assignment_emits_store() {
        let program = Compiler::compile("zoom = 1.5").unwrap();
        assert_eq!(
            program.instructions(),
            &[Instruction::Push(1.5), Instruction::Store(0), Instruction::Halt]
        );
        assert_eq!(program.variable_name(0), Some("zoom"));
    }

    #[test]
    fn compile_equality_is_not_assignment() {
        // One token of lookahead, then rewind: `x == 1` loads x.
        let program = Compiler::compile("x == 1").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Load(0),
                Instruction::Push(1.0),
                Instruction::CmpEq,
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn compile_variable_load() {
        let program = Compiler::compile("bass").unwrap();
        assert_eq!(
            program.instructions(),
            &[Instruction::Load(0), Instruction::Halt]
        );
        assert_eq!(program.variable_name(0), Some("bass"));
    }

    #[test]
    fn compile_shared_variable_index() {
        let program = Compiler::compile("zoom = zoom + 0.5").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Load(0),
                Instruction::Push(0.5),
                Instruction::Add,
                Instruction::Store(0),
                Instruction::Halt,
            ]
        );
        assert_eq!(program.variables(), &["zoom"]);
    }

    #[test]
    fn compile_unary_minus_emits_negate() {
        let program = Compiler::compile("-bass").unwrap();
        assert_eq!(
            program.instructions(),
            &[Instruction::Load(0), Instruction::Negate, Instruction::Halt]
        );
    }

    #[test]
    fn compile_unary_plus_is_noop() {
        let program = Compiler::compile("+5").unwrap();
        assert_eq!(
            program.instructions(),
            &[Instruction::Push(5.0), Instruction::Halt]
        );
    }

    #[test]
    fn compile_double_negation() {
        let program = Compiler::compile("--5").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Push(5.0),
                Instruction::Negate,
                Instruction::Negate,
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn compile_function_call() {
        let program = Compiler::compile("sin(time)").unwrap();
        assert_eq!(
            program.instructions(),
            &[Instruction::Load(0), Instruction::Sin, Instruction::Halt]
        );
    }

    #[test]
    fn compile_two_arg_call_pushes_left_to_right() {
        let program = Compiler::compile("pow(2, 10)").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Push(2.0),
                Instruction::Push(10.0),
                Instruction::Pow,
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn compile_if_call() {
        let program = Compiler::compile("if(bass, 1, 0)").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Load(0),
                Instruction::Push(1.0),
                Instruction::Push(0.0),
                Instruction::If,
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn compile_unknown_function_fails() {
        let err = Compiler::compile("frobnicate(1)").unwrap_err();
        assert!(err.message.contains("unknown function"));
    }

    #[test]
    fn compile_wrong_arity_fails() {
        assert!(Compiler::compile("sin(1, 2)").is_err());
        assert!(Compiler::compile("pow(2)").is_err());
        assert!(Compiler::compile("if(1, 2)").is_err());
        assert!(Compiler::compile("sin()").is_err());
    }

    #[test]
    fn compile_missing_rparen_fails() {
        assert!(Compiler::compile("(1 + 2").is_err());
        assert!(Compiler::compile("sin(1").is_err());
    }

    #[test]
    fn compile_comparison_does_not_chain() {
        assert!(Compiler::compile("1 < 2 < 3").is_err());
    }

    #[test]
    fn compile_single_comparison_ok() {
        assert!(Compiler::compile("1 < 2").is_ok());
        assert!(Compiler::compile("bass >= 0.5").is_ok());
    }

    #[test]
    fn compile_malformed_number_fails() {
        assert!(Compiler::compile("1.2.3").is_err());
    }

    #[test]
    fn compile_empty_statement_fails() {
        assert!(Compiler::compile("").is_err());
    }

    #[test]
    fn compile_logical_operators() {
        let program = Compiler::compile("1 && 0 || 1").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Push(1.0),
                Instruction::Push(0.0),
                Instruction::And,
                Instruction::Push(1.0),
                Instruction::Or,
                Instruction::Halt,
            ]
        );
    }

    #[test]
    fn compile_block_accumulates_statements() {
        let program = Compiler::compile_block("q1 = 3; q1 + 1").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Push(3.0),
                Instruction::Store(0),
                Instruction::Load(0),
                Instruction::Push(1.0),
                Instruction::Add,
                Instruction::Halt,
            ]
        );
        assert_eq!(program.variables(), &["q1"]);
    }

    #[test]
    fn compile_block_splits_newlines_and_semicolons() {
        let program =
            Compiler::compile_block("zoom = 1.0\nrot = 0.1; warp = 2.0\n\n").unwrap();
        assert_eq!(program.variables(), &["zoom", "rot", "warp"]);
        // Three stores, one halt.
        let stores = program
            .instructions()
            .iter()
            .filter(|i| matches!(i, Instruction::Store(_)))
            .count();
        assert_eq!(stores, 3);
    }

    #[test]
    fn compile_block_empty_fragments_skipped() {
        let program = Compiler::compile_block(";;  ;\n;").unwrap();
        assert_eq!(program.instructions(), &[Instruction::Halt]);
    }

    #[test]
    fn compile_block_fails_on_first_bad_statement() {
        assert!(Compiler::compile_block("zoom = 1.0; frobnicate(1); rot = 0.1").is_err());
    }

    #[test]
    fn compile_trailing_garbage_fails() {
        assert!(Compiler::compile("1 + 2 )").is_err());
    }

    #[test]
    fn compile_chained_assignment() {
        // Targets register after their right-hand sides, so `b` interns
        // before `a`.
        let program = Compiler::compile("a = b = 1").unwrap();
        assert_eq!(
            program.instructions(),
            &[
                Instruction::Push(1.0),
                Instruction::Store(0),
                Instruction::Store(1),
                Instruction::Halt,
            ]
        );
        assert_eq!(program.variables(), &["b", "a"]);
    }
}

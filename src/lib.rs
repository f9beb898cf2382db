//! milkdrop-eval — bytecode compiler and stack VM for MilkDrop preset
//! equations.
//!
//! Preset authors write per-frame equations such as
//! `zoom = zoom + 0.02*sin(time)` that couple audio levels, time and
//! animation state. This crate compiles each equation block once into a
//! flat bytecode [`Program`] and re-executes it every rendered frame
//! against a mutable variable context, with no hot-path allocation beyond
//! the evaluation stack.
//!
//! Pipeline: lexer → recursive-descent compiler → bytecode → VM. The
//! surrounding renderer owns the [`FrameContext`], writes audio levels into
//! it before each frame, and reads the transform/color fields back after.
//!
//! ```
//! use milkdrop_eval::{Evaluator, FrameContext};
//!
//! let mut eval = Evaluator::new(42);
//! eval.compile_block("zoom = 1.0 + 0.1 * sin(time); rot = rot + 0.01")
//!     .unwrap();
//!
//! let mut ctx = FrameContext::new();
//! ctx.time = 1.0;
//! eval.execute(&mut ctx).unwrap();
//! assert!(ctx.zoom > 1.0);
//! ```

pub mod compiler;
pub mod context;
pub mod error;
pub mod lexer;
pub mod program;
pub mod token;
pub mod vm;

pub use compiler::Compiler;
pub use context::{EvalContext, FrameContext};
pub use error::{ErrorKind, EvalError};
pub use lexer::Lexer;
pub use program::{Instruction, Program};
pub use token::Token;
pub use vm::Vm;

/// One compiled equation block and the VM that runs it.
///
/// The renderer keeps one `Evaluator` per preset code section (frame-init,
/// per-frame, per-pixel), compiles when the preset loads and executes once
/// per frame. Compile and execute must stay on one thread; nothing here
/// locks.
///
/// A failed compile leaves the evaluator cleared, and a cleared evaluator
/// executes as a no-op returning 0.0 — a preset with a broken equation
/// block keeps rendering with default state instead of taking the
/// visualizer down.
pub struct Evaluator {
    program: Program,
    vm: Vm,
    last_error: Option<String>,
}

impl Evaluator {
    /// Create an evaluator whose `rand()` stream is seeded for
    /// reproducible runs.
    pub fn new(seed: u64) -> Self {
        Self {
            program: Program::new(),
            vm: Vm::new(seed),
            last_error: None,
        }
    }

    /// Create an evaluator seeded from the OS for live use.
    pub fn from_entropy() -> Self {
        Self {
            program: Program::new(),
            vm: Vm::from_entropy(),
            last_error: None,
        }
    }

    /// Compile a single statement, replacing any previous program.
    pub fn compile(&mut self, source: &str) -> Result<(), EvalError> {
        self.install(Compiler::compile(source))
    }

    /// Compile a multi-statement block (split on newlines and `;`),
    /// replacing any previous program.
    pub fn compile_block(&mut self, code: &str) -> Result<(), EvalError> {
        self.install(Compiler::compile_block(code))
    }

    fn install(&mut self, compiled: Result<Program, EvalError>) -> Result<(), EvalError> {
        match compiled {
            Ok(program) => {
                self.program = program;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                self.program.clear();
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Run the compiled program against `ctx`, returning the last
    /// statement's value. A cleared evaluator returns 0.0.
    pub fn execute(&mut self, ctx: &mut dyn EvalContext) -> Result<f64, EvalError> {
        match self.vm.execute(&self.program, ctx) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Drop the compiled program and error state.
    pub fn clear(&mut self) {
        self.program.clear();
        self.last_error = None;
    }

    /// Message from the most recent failure, for preset-load diagnostics.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Read-only view of the compiled program.
    pub fn program(&self) -> &Program {
        &self.program
    }
}

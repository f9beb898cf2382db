//! Stack-based virtual machine for compiled equation programs.
//!
//! One `Vm` owns one operand stack and one seeded RNG. `execute` is
//! synchronous and non-reentrant: it clears the stack, runs the program's
//! instructions in order against the caller's context, and returns the top
//! of stack at `Halt` (or end of stream). The stack buffer is reused across
//! calls, so steady-state frames allocate nothing.
//!
//! Division and modulo by exactly 0.0 yield 0.0. That is the equation
//! language's saturating policy, not IEEE-754 — a preset that divides by a
//! silent audio band must keep animating instead of going NaN. `sqrt`,
//! `log` and `log10` take `abs` of their operand for the same reason.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::context::EvalContext;
use crate::error::EvalError;
use crate::program::{Instruction, Program};

pub struct Vm {
    stack: Vec<f64>,
    rng: ChaCha8Rng,
}

impl Vm {
    /// Create a VM with a deterministic RNG. Same seed, same program, same
    /// context — same results, which is what tests and replay need.
    pub fn new(seed: u64) -> Self {
        Self {
            stack: Vec::with_capacity(16),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create a VM seeded from the OS, for live rendering where `rand()`
    /// should differ run to run.
    pub fn from_entropy() -> Self {
        Self {
            stack: Vec::with_capacity(16),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Run `program` against `ctx` and return the last statement's value.
    ///
    /// Total for compiler-produced programs: the only failure modes are
    /// the defensive ones (underflow on corrupted bytecode, reserved
    /// opcodes), never ordinary arithmetic.
    pub fn execute(
        &mut self,
        program: &Program,
        ctx: &mut dyn EvalContext,
    ) -> Result<f64, EvalError> {
        self.stack.clear();

        for instruction in program.instructions() {
            match *instruction {
                Instruction::Push(value) => self.stack.push(value),

                Instruction::Load(index) => {
                    let name = variable_name(program, index)?;
                    let value = ctx.get(name);
                    self.stack.push(value);
                }

                Instruction::Store(index) => {
                    let value = self.pop()?;
                    let name = variable_name(program, index)?;
                    ctx.set(name, value);
                    // Pushed back so the statement (and chained stores)
                    // yield the stored value.
                    self.stack.push(value);
                }

                Instruction::Add => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(a + b);
                }
                Instruction::Subtract => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(a - b);
                }
                Instruction::Multiply => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(a * b);
                }
                Instruction::Divide => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(if b != 0.0 { a / b } else { 0.0 });
                }
                Instruction::Modulo => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(if b != 0.0 { a % b } else { 0.0 });
                }
                Instruction::Negate => {
                    let v = self.pop()?;
                    self.stack.push(-v);
                }

                Instruction::Sin => {
                    let v = self.pop()?;
                    self.stack.push(v.sin());
                }
                Instruction::Cos => {
                    let v = self.pop()?;
                    self.stack.push(v.cos());
                }
                Instruction::Tan => {
                    let v = self.pop()?;
                    self.stack.push(v.tan());
                }
                Instruction::Asin => {
                    let v = self.pop()?;
                    self.stack.push(v.asin());
                }
                Instruction::Acos => {
                    let v = self.pop()?;
                    self.stack.push(v.acos());
                }
                Instruction::Atan => {
                    let v = self.pop()?;
                    self.stack.push(v.atan());
                }
                Instruction::Atan2 => {
                    // Arguments push as (y, x); x is on top.
                    let x = self.pop()?;
                    let y = self.pop()?;
                    self.stack.push(y.atan2(x));
                }
                Instruction::Sqrt => {
                    let v = self.pop()?;
                    self.stack.push(v.abs().sqrt());
                }
                Instruction::Abs => {
                    let v = self.pop()?;
                    self.stack.push(v.abs());
                }
                Instruction::Sqr => {
                    let v = self.pop()?;
                    self.stack.push(v * v);
                }
                Instruction::Pow => {
                    let exponent = self.pop()?;
                    let base = self.pop()?;
                    self.stack.push(base.powf(exponent));
                }
                Instruction::Exp => {
                    let v = self.pop()?;
                    self.stack.push(v.exp());
                }
                Instruction::Log => {
                    let v = self.pop()?;
                    self.stack.push(v.abs().ln());
                }
                Instruction::Log10 => {
                    let v = self.pop()?;
                    self.stack.push(v.abs().log10());
                }

                Instruction::Min => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(a.min(b));
                }
                Instruction::Max => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(a.max(b));
                }
                Instruction::Sign => {
                    let v = self.pop()?;
                    self.stack.push(if v > 0.0 {
                        1.0
                    } else if v < 0.0 {
                        -1.0
                    } else {
                        0.0
                    });
                }
                Instruction::Rand => {
                    let max = self.pop()?;
                    let value = self.rng.gen::<f64>() * max;
                    self.stack.push(value);
                }
                Instruction::If => {
                    let false_value = self.pop()?;
                    let true_value = self.pop()?;
                    let condition = self.pop()?;
                    self.stack.push(if condition != 0.0 {
                        true_value
                    } else {
                        false_value
                    });
                }
                Instruction::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a == b));
                }
                Instruction::Above => {
                    let threshold = self.pop()?;
                    let value = self.pop()?;
                    self.stack.push(bool_value(value > threshold));
                }
                Instruction::Below => {
                    let threshold = self.pop()?;
                    let value = self.pop()?;
                    self.stack.push(bool_value(value < threshold));
                }

                Instruction::CmpEq => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a == b));
                }
                Instruction::CmpNe => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a != b));
                }
                Instruction::CmpLt => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a < b));
                }
                Instruction::CmpGt => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a > b));
                }
                Instruction::CmpLe => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a <= b));
                }
                Instruction::CmpGe => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a >= b));
                }

                // Both operands are fully evaluated before the opcode runs,
                // so there is no short-circuiting to implement.
                Instruction::And => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a != 0.0 && b != 0.0));
                }
                Instruction::Or => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.stack.push(bool_value(a != 0.0 || b != 0.0));
                }

                Instruction::Jump(_) | Instruction::JumpIfFalse(_) => {
                    return Err(EvalError::bad_program(
                        "reserved control-flow opcode reached",
                    ));
                }

                Instruction::Halt => return Ok(self.result()),
            }
        }

        // Instruction stream exhausted without Halt: same convention.
        Ok(self.result())
    }

    fn result(&self) -> f64 {
        self.stack.last().copied().unwrap_or(0.0)
    }

    fn pop(&mut self) -> Result<f64, EvalError> {
        self.stack.pop().ok_or_else(EvalError::stack_underflow)
    }
}

fn variable_name(program: &Program, index: usize) -> Result<&str, EvalError> {
    program
        .variable_name(index)
        .ok_or_else(|| EvalError::bad_program(format!("variable index {index} out of range")))
}

fn bool_value(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

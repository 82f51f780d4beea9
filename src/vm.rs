//! Stack-based bytecode virtual machine.
//!
//! A flat fetch-decode-execute loop over `Program::code`/`Program::blocks`.
//! `CALL` does not recurse through Rust's call stack: it pushes a new
//! [`Frame`] naming the block's code and the loop resumes fetching from
//! there, popping the frame again once the block runs off its end. This
//! keeps `QUIT` propagation (and everything else) a single flat loop —
//! `execute` just returns as soon as a `Quit` is dispatched, regardless
//! of how many frames are open.

use std::io::{BufRead, Write};

use rand::RngCore;

use crate::bytecode::{Instruction, Program};
use crate::error::{Error, Result};
use crate::operators;
use crate::value::{dump, order, strict_equals, to_bool, to_knight_string, to_number, Mode, Value};

/// Resource bound on runaway `WHILE`/`BLOCK`+`CALL` recursion. There is
/// no host call stack to overflow (frames live in `Vm::frames`, not in
/// Rust's stack), so this is the only thing that can stop an infinite
/// loop short of the process being killed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub max_instructions: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum CodeRef {
    Main,
    Block(usize),
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    code: CodeRef,
    ip: usize,
}

enum Flow {
    Continue,
    Quit(u8),
}

pub struct Vm<'p> {
    program: &'p Program,
    mode: Mode,
    limits: Limits,
    stack: Vec<Value>,
    variables: Vec<Value>,
    frames: Vec<Frame>,
    instruction_count: u64,
}

impl<'p> Vm<'p> {
    pub fn new(program: &'p Program, mode: Mode, limits: Limits) -> Self {
        Self {
            program,
            mode,
            limits,
            stack: Vec::new(),
            variables: vec![Value::Null; program.variable_count],
            frames: Vec::new(),
            instruction_count: 0,
        }
    }

    /// Runs `program` to completion. Returns `Ok(None)` if it ran off
    /// the end without calling `QUIT`, `Ok(Some(code))` if it did.
    pub fn execute(
        &mut self,
        output: &mut dyn Write,
        input: &mut dyn BufRead,
        rng: &mut dyn RngCore,
    ) -> Result<Option<u8>> {
        self.frames.clear();
        self.frames.push(Frame { code: CodeRef::Main, ip: 0 });

        loop {
            let frame_slot = self.frames.len() - 1;
            let Frame { code, ip } = self.frames[frame_slot];

            let instr = match code {
                CodeRef::Main => self.program.code.get(ip).copied(),
                CodeRef::Block(b) => self.program.blocks[b].get(ip).copied(),
            };

            let Some(instr) = instr else {
                self.frames.pop();
                if self.frames.is_empty() {
                    return Ok(None);
                }
                continue;
            };

            self.frames[frame_slot].ip += 1;

            self.instruction_count += 1;
            if let Some(limit) = self.limits.max_instructions {
                if self.instruction_count > limit {
                    return Err(Error::InstructionLimitExceeded(limit));
                }
            }

            match self.dispatch(instr, output, input, rng)? {
                Flow::Continue => {}
                Flow::Quit(code) => return Ok(Some(code)),
            }
        }
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(Error::StackUnderflow)
    }

    fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    fn dispatch(
        &mut self,
        instr: Instruction,
        output: &mut dyn Write,
        input: &mut dyn BufRead,
        rng: &mut dyn RngCore,
    ) -> Result<Flow> {
        match instr {
            Instruction::Nop => {}
            Instruction::True => self.push(Value::Bool(true)),
            Instruction::False => self.push(Value::Bool(false)),
            Instruction::Null => self.push(Value::Null),
            Instruction::EmptyList => self.push(Value::List(Vec::new())),

            Instruction::Constant(i) => {
                self.push(self.program.constants[i as usize].clone());
            }
            Instruction::Block(i) => self.push(Value::Block(i as usize)),

            Instruction::LoadVariable(slot) => {
                self.push(self.variables[slot as usize].clone());
            }
            Instruction::StoreVariable(slot) => {
                let top = self.stack.last().ok_or(Error::StackUnderflow)?.clone();
                self.variables[slot as usize] = top;
            }

            Instruction::Drop => {
                self.pop()?;
            }
            Instruction::Dupe => {
                let top = self.stack.last().ok_or(Error::StackUnderflow)?.clone();
                self.push(top);
            }

            Instruction::Jump(pc) => {
                self.jump_to(pc as usize);
            }
            Instruction::Cond(pc) => {
                let v = self.pop()?;
                if !to_bool(&v) {
                    self.jump_to(pc as usize);
                }
            }

            Instruction::Not => {
                let v = self.pop()?;
                self.push(Value::Bool(!to_bool(&v)));
            }
            Instruction::Negate => {
                let v = self.pop()?;
                let n = to_number(&v, self.mode)?;
                let negated = match self.mode {
                    Mode::Strict => n.checked_neg().ok_or(Error::Overflow)?,
                    Mode::Lenient => n.wrapping_neg(),
                };
                self.push(Value::Number(negated));
            }
            Instruction::Ascii => {
                let v = self.pop()?;
                let out = match &v {
                    Value::Number(n) => {
                        let byte = n.rem_euclid(256) as u8;
                        Value::String(vec![byte])
                    }
                    Value::String(s) if !s.is_empty() => Value::Number(s[0] as i64),
                    _ => return Err(Error::BadAscii(v.type_name())),
                };
                self.push(out);
            }
            Instruction::Box => {
                let v = self.pop()?;
                self.push(Value::List(vec![v]));
            }
            Instruction::Head => {
                let v = self.pop()?;
                let out = match &v {
                    Value::String(s) if !s.is_empty() => Value::String(vec![s[0]]),
                    Value::List(items) if !items.is_empty() => items[0].clone(),
                    _ => return Err(Error::BadHead(v.type_name())),
                };
                self.push(out);
            }
            Instruction::Tail => {
                let v = self.pop()?;
                let out = match &v {
                    Value::String(s) if !s.is_empty() => Value::String(s[1..].to_vec()),
                    Value::List(items) if !items.is_empty() => Value::List(items[1..].to_vec()),
                    _ => return Err(Error::BadTail(v.type_name())),
                };
                self.push(out);
            }
            Instruction::Length => {
                let v = self.pop()?;
                self.push(Value::Number(v.len()));
            }

            Instruction::Add => self.binary(|a, b, m| operators::add(a, b, m))?,
            Instruction::Sub => self.binary(|a, b, m| operators::sub(a, b, m))?,
            Instruction::Mult => self.binary(|a, b, m| operators::mult(a, b, m))?,
            Instruction::Div => self.binary(|a, b, m| operators::div(a, b, m))?,
            Instruction::Mod => self.binary(|a, b, m| operators::rem(a, b, m))?,
            Instruction::Exp => self.binary(|a, b, m| operators::exp(a, b, m))?,

            Instruction::Less => {
                let b = self.pop()?;
                let a = self.pop()?;
                let ord = order(&a, &b, self.mode)?;
                self.push(Value::Bool(ord == std::cmp::Ordering::Less));
            }
            Instruction::Greater => {
                let b = self.pop()?;
                let a = self.pop()?;
                let ord = order(&a, &b, self.mode)?;
                self.push(Value::Bool(ord == std::cmp::Ordering::Greater));
            }
            Instruction::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(strict_equals(&a, &b)));
            }

            Instruction::Prompt => {
                let mut line = Vec::new();
                let n = input.read_until(b'\n', &mut line).map_err(Error::Io)?;
                if n == 0 {
                    self.push(Value::Null);
                } else {
                    if line.last() == Some(&b'\n') {
                        line.pop();
                    }
                    while line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    self.push(Value::String(line));
                }
            }
            Instruction::Random => {
                let n = (rng.next_u64() & (i64::MAX as u64)) as i64;
                self.push(Value::Number(n));
            }

            Instruction::Output => {
                let v = self.pop()?;
                let s = to_knight_string(&v, self.mode)?;
                if s.last() == Some(&b'\\') {
                    output.write_all(&s[..s.len() - 1]).map_err(Error::Io)?;
                } else {
                    output.write_all(&s).map_err(Error::Io)?;
                    output.write_all(b"\n").map_err(Error::Io)?;
                }
                output.flush().map_err(Error::Io)?;
                self.push(Value::Null);
            }
            Instruction::Dump => {
                let v = self.stack.last().ok_or(Error::StackUnderflow)?;
                let text = dump(v);
                output.write_all(&text).map_err(Error::Io)?;
                output.flush().map_err(Error::Io)?;
            }
            Instruction::Quit => {
                let v = self.pop()?;
                let n = to_number(&v, self.mode)?;
                let code = n.rem_euclid(256) as u8;
                return Ok(Flow::Quit(code));
            }

            Instruction::Call => {
                let v = self.pop()?;
                let Value::Block(idx) = v else {
                    return Err(Error::NotCallable(v.type_name()));
                };
                self.frames.push(Frame { code: CodeRef::Block(idx), ip: 0 });
            }

            Instruction::Get => {
                let l = self.pop()?;
                let i = self.pop()?;
                let a = self.pop()?;
                let result = self.get_slice(&a, &i, &l)?;
                self.push(result);
            }
            Instruction::Set => {
                let v = self.pop()?;
                let l = self.pop()?;
                let i = self.pop()?;
                let a = self.pop()?;
                let result = self.set_slice(&a, &i, &l, &v)?;
                self.push(result);
            }

            Instruction::Invalid => match self.mode {
                Mode::Strict => return Err(Error::Invalid),
                Mode::Lenient => self.push(Value::Null),
            },
        }
        Ok(Flow::Continue)
    }

    fn jump_to(&mut self, target: usize) {
        let last = self.frames.last_mut().expect("a jump always executes inside a frame");
        last.ip = target;
    }

    fn binary(&mut self, f: impl Fn(&Value, &Value, Mode) -> Result<Value>) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = f(&a, &b, self.mode)?;
        self.push(result);
        Ok(())
    }

    fn bounds(&self, i: &Value, l: &Value) -> Result<(usize, usize)> {
        let i = to_number(i, self.mode)?;
        let l = to_number(l, self.mode)?;
        if i < 0 || l < 0 {
            return Err(Error::BadGet("negative index or length"));
        }
        Ok((i as usize, l as usize))
    }

    fn get_slice(&self, a: &Value, i: &Value, l: &Value) -> Result<Value> {
        let (i, l) = self.bounds(i, l)?;
        match a {
            Value::String(s) => {
                let end = i.checked_add(l).ok_or(Error::BadGet("slice out of range"))?;
                let slice = s.get(i..end).ok_or(Error::BadGet("slice out of range"))?;
                Ok(Value::String(slice.to_vec()))
            }
            Value::List(items) => {
                let end = i.checked_add(l).ok_or(Error::BadGet("slice out of range"))?;
                let slice = items.get(i..end).ok_or(Error::BadGet("slice out of range"))?;
                Ok(Value::List(slice.to_vec()))
            }
            _ => Err(Error::BadGet(a.type_name())),
        }
    }

    fn set_slice(&self, a: &Value, i: &Value, l: &Value, v: &Value) -> Result<Value> {
        let (i, l) = self.bounds(i, l)?;
        match a {
            Value::String(s) => {
                let end = i.checked_add(l).ok_or(Error::BadSet("slice out of range"))?;
                if end > s.len() {
                    return Err(Error::BadSet("slice out of range"));
                }
                let replacement = to_knight_string(v, self.mode)?;
                let mut result = Vec::with_capacity(s.len() - l + replacement.len());
                result.extend_from_slice(&s[..i]);
                result.extend(replacement);
                result.extend_from_slice(&s[end..]);
                Ok(Value::String(result))
            }
            Value::List(items) => {
                let end = i.checked_add(l).ok_or(Error::BadSet("slice out of range"))?;
                if end > items.len() {
                    return Err(Error::BadSet("slice out of range"));
                }
                let replacement = crate::value::to_list(v, self.mode)?;
                let mut result = Vec::with_capacity(items.len() - l + replacement.len());
                result.extend_from_slice(&items[..i]);
                result.extend(replacement);
                result.extend_from_slice(&items[end..]);
                Ok(Value::List(result))
            }
            _ => Err(Error::BadSet(a.type_name())),
        }
    }
}

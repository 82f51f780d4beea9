//! Bytecode emitter: lowers the flat AST into linear bytecode.
//!
//! Eager operators lower in post-order (emit operands, then the
//! opcode). Short-circuit (`&`/`|`), conditional (`I`), and looping
//! (`W`) forms are open-coded jump templates instead. `BLOCK` bodies
//! compile into a fresh, self-contained sub-program whose constant and
//! block indices are then relocated into the enclosing program's pools
//! — see [`Emitter::compile_block`].

use crate::analyzer::Analysis;
use crate::ast::{Ast, NodeKind};
use crate::bytecode::{Instruction, Program};
use crate::diagnostic::Diagnostic;
use crate::error::{Error, Result};
use crate::value::Value;

pub fn emit(ast: &Ast, analysis: &Analysis, source: &str) -> Result<Program> {
    let mut emitter = Emitter { ast, analysis, source, code: Vec::new(), constants: Vec::new(), blocks: Vec::new() };
    if !ast.kinds.is_empty() {
        emitter.emit_node(0)?;
    } else {
        emitter.emit(Instruction::Null);
    }
    Ok(Program {
        code: emitter.code,
        blocks: emitter.blocks,
        constants: emitter.constants,
        variable_count: analysis.count as usize,
    })
}

struct Emitter<'a> {
    ast: &'a Ast,
    analysis: &'a Analysis,
    source: &'a str,
    code: Vec<Instruction>,
    constants: Vec<Value>,
    blocks: Vec<Vec<Instruction>>,
}

impl<'a> Emitter<'a> {
    fn emit(&mut self, instr: Instruction) -> usize {
        let idx = self.code.len();
        self.code.push(instr);
        idx
    }

    fn offset(&self) -> u32 {
        self.code.len() as u32
    }

    fn patch_jump(&mut self, idx: usize, target: u32) {
        match &mut self.code[idx] {
            Instruction::Jump(t) | Instruction::Cond(t) => *t = target,
            _ => unreachable!("patch_jump called on a non-jump instruction"),
        }
    }

    fn children(&self, idx: u32) -> Vec<u32> {
        self.ast.children(idx).to_vec()
    }

    fn slot_of(&self, identifier_idx: u32) -> u32 {
        *self
            .analysis
            .node_slot
            .get(&identifier_idx)
            .expect("every Identifier node has a slot assigned by the analyzer")
    }

    fn emit_node(&mut self, idx: u32) -> Result<()> {
        match self.ast.kinds[idx as usize] {
            NodeKind::IntegerLiteral => {
                let text = self.ast.text(idx, self.source);
                let n: i64 = text.parse().map_err(|_| {
                    let span = self.ast.span(idx);
                    let diag = Diagnostic::new(format!("integer literal `{text}` does not fit a 64-bit word"))
                        .with_source(self.source.to_string())
                        .with_label(span, "overflows here");
                    Error::LiteralOverflow(diag)
                })?;
                let const_idx = self.intern(Value::Number(n));
                self.emit(Instruction::Constant(const_idx));
            }
            NodeKind::StringLiteral => {
                let text = self.ast.text(idx, self.source).as_bytes().to_vec();
                let const_idx = self.intern(Value::String(text));
                self.emit(Instruction::Constant(const_idx));
            }
            NodeKind::Identifier => {
                let slot = self.slot_of(idx);
                self.emit(Instruction::LoadVariable(slot));
            }

            NodeKind::EmptyList => {
                self.emit(Instruction::EmptyList);
            }
            NodeKind::True => {
                self.emit(Instruction::True);
            }
            NodeKind::False => {
                self.emit(Instruction::False);
            }
            NodeKind::Null => {
                self.emit(Instruction::Null);
            }
            NodeKind::Prompt => {
                self.emit(Instruction::Prompt);
            }
            NodeKind::Random => {
                self.emit(Instruction::Random);
            }

            NodeKind::Identity => {
                let child = self.children(idx)[0];
                self.emit_node(child)?;
            }
            NodeKind::Not => self.emit_unary(idx, Instruction::Not)?,
            NodeKind::Negate => self.emit_unary(idx, Instruction::Negate)?,
            NodeKind::BoxOp => self.emit_unary(idx, Instruction::Box)?,
            NodeKind::Head => self.emit_unary(idx, Instruction::Head)?,
            NodeKind::Tail => self.emit_unary(idx, Instruction::Tail)?,
            NodeKind::Ascii => self.emit_unary(idx, Instruction::Ascii)?,
            NodeKind::CallOp => self.emit_unary(idx, Instruction::Call)?,
            NodeKind::DumpOp => self.emit_unary(idx, Instruction::Dump)?,
            NodeKind::LengthOp => self.emit_unary(idx, Instruction::Length)?,
            NodeKind::QuitOp => self.emit_unary(idx, Instruction::Quit)?,

            NodeKind::OutputOp => {
                let child = self.children(idx)[0];
                // `O` applied directly to a bare identifier is a stray
                // construct in Knight source with no agreed meaning;
                // emit the `Invalid` opcode instead of a normal
                // load+output and let the VM's mode decide how to treat it.
                if self.ast.kinds[child as usize] == NodeKind::Identifier {
                    self.emit(Instruction::Invalid);
                } else {
                    self.emit_node(child)?;
                    self.emit(Instruction::Output);
                }
            }

            NodeKind::BlockExpr => {
                let body = self.children(idx)[0];
                let block_idx = self.compile_block(body)?;
                self.emit(Instruction::Block(block_idx));
            }

            NodeKind::Add => self.emit_binary(idx, Instruction::Add)?,
            NodeKind::Sub => self.emit_binary(idx, Instruction::Sub)?,
            NodeKind::Mult => self.emit_binary(idx, Instruction::Mult)?,
            NodeKind::Div => self.emit_binary(idx, Instruction::Div)?,
            NodeKind::Mod => self.emit_binary(idx, Instruction::Mod)?,
            NodeKind::Exp => self.emit_binary(idx, Instruction::Exp)?,
            NodeKind::Less => self.emit_binary(idx, Instruction::Less)?,
            NodeKind::Greater => self.emit_binary(idx, Instruction::Greater)?,
            NodeKind::Equal => self.emit_binary(idx, Instruction::Equal)?,

            NodeKind::Then => {
                let [a, b] = self.binary_children(idx);
                self.emit_node(a)?;
                self.emit(Instruction::Drop);
                self.emit_node(b)?;
            }

            NodeKind::Assign => {
                let [target, expr] = self.binary_children(idx);
                if self.ast.kinds[target as usize] != NodeKind::Identifier {
                    let span = self.ast.span(target);
                    let diag = Diagnostic::new("the left side of `=` must be an identifier")
                        .with_source(self.source.to_string())
                        .with_label(span, "not an identifier");
                    return Err(Error::InvalidStoreDestination(diag));
                }
                self.emit_node(expr)?;
                let slot = self.slot_of(target);
                self.emit(Instruction::StoreVariable(slot));
            }

            NodeKind::And => {
                let [a, b] = self.binary_children(idx);
                self.emit_node(a)?;
                self.emit(Instruction::Dupe);
                let cond = self.emit(Instruction::Cond(0));
                self.emit(Instruction::Drop);
                self.emit_node(b)?;
                let target = self.offset();
                self.patch_jump(cond, target);
            }

            NodeKind::Or => {
                let [a, b] = self.binary_children(idx);
                self.emit_node(a)?;
                self.emit(Instruction::Dupe);
                self.emit(Instruction::Not);
                let cond = self.emit(Instruction::Cond(0));
                self.emit(Instruction::Drop);
                self.emit_node(b)?;
                let target = self.offset();
                self.patch_jump(cond, target);
            }

            NodeKind::While => {
                let [cond_node, body] = self.binary_children(idx);
                let loop_start = self.offset();
                self.emit_node(cond_node)?;
                let cond_jump = self.emit(Instruction::Cond(0));
                self.emit_node(body)?;
                self.emit(Instruction::Drop);
                self.emit(Instruction::Jump(loop_start));
                let after = self.offset();
                self.patch_jump(cond_jump, after);
                self.emit(Instruction::Null);
            }

            NodeKind::If => {
                let children = self.children(idx);
                let (cond_node, tb, fb) = (children[0], children[1], children[2]);
                self.emit_node(cond_node)?;
                let to_false = self.emit(Instruction::Cond(0));
                self.emit_node(tb)?;
                let skip_false = self.emit(Instruction::Jump(0));
                let false_start = self.offset();
                self.patch_jump(to_false, false_start);
                self.emit_node(fb)?;
                let after = self.offset();
                self.patch_jump(skip_false, after);
            }

            NodeKind::Get => {
                let children = self.children(idx);
                for &child in &children {
                    self.emit_node(child)?;
                }
                self.emit(Instruction::Get);
            }

            NodeKind::Set => {
                let children = self.children(idx);
                for &child in &children {
                    self.emit_node(child)?;
                }
                self.emit(Instruction::Set);
            }
        }
        Ok(())
    }

    fn binary_children(&self, idx: u32) -> [u32; 2] {
        let children = self.children(idx);
        [children[0], children[1]]
    }

    fn emit_unary(&mut self, idx: u32, instr: Instruction) -> Result<()> {
        let child = self.children(idx)[0];
        self.emit_node(child)?;
        self.emit(instr);
        Ok(())
    }

    fn emit_binary(&mut self, idx: u32, instr: Instruction) -> Result<()> {
        let [a, b] = self.binary_children(idx);
        self.emit_node(a)?;
        self.emit_node(b)?;
        self.emit(instr);
        Ok(())
    }

    fn intern(&mut self, value: Value) -> u32 {
        let idx = self.constants.len() as u32;
        self.constants.push(value);
        idx
    }

    /// Compiles `body` into a fresh, self-contained sub-program, then
    /// relocates its constant/block references into this emitter's
    /// pools and stores its code as a new blocks-table entry.
    fn compile_block(&mut self, body: u32) -> Result<u32> {
        let mut inner = Emitter {
            ast: self.ast,
            analysis: self.analysis,
            source: self.source,
            code: Vec::new(),
            constants: Vec::new(),
            blocks: Vec::new(),
        };
        inner.emit_node(body)?;

        let const_offset = self.constants.len() as u32;
        let block_offset = self.blocks.len() as u32;
        self.constants.extend(inner.constants);

        for blk in inner.blocks {
            let relocated = relocate(blk, const_offset, block_offset);
            self.blocks.push(relocated);
        }

        let relocated_body = relocate(inner.code, const_offset, block_offset);
        let block_idx = self.blocks.len() as u32;
        self.blocks.push(relocated_body);
        Ok(block_idx)
    }
}

fn relocate(code: Vec<Instruction>, const_offset: u32, block_offset: u32) -> Vec<Instruction> {
    code.into_iter()
        .map(|instr| match instr {
            Instruction::Constant(i) => Instruction::Constant(i + const_offset),
            Instruction::Block(i) => Instruction::Block(i + block_offset),
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::parser::Parser;

    fn compile(source: &str) -> Program {
        let ast = Parser::parse(source).unwrap();
        let analysis = analyze(&ast, source);
        emit(&ast, &analysis, source).unwrap()
    }

    #[test]
    fn literal_pushes_constant() {
        let program = compile("5");
        assert_eq!(program.code, vec![Instruction::Constant(0)]);
        assert_eq!(program.constants, vec![Value::Number(5)]);
    }

    #[test]
    fn assignment_stores_and_leaves_value_on_stack() {
        let program = compile("= a 3");
        assert_eq!(program.code, vec![Instruction::Constant(0), Instruction::StoreVariable(0)]);
    }

    #[test]
    fn assignment_to_non_identifier_is_an_error() {
        let ast = Parser::parse("= 1 2").unwrap();
        let analysis = analyze(&ast, "= 1 2");
        assert!(matches!(emit(&ast, &analysis, "= 1 2"), Err(Error::InvalidStoreDestination(_))));
    }

    #[test]
    fn assignment_to_compound_target_points_the_diagnostic_at_the_subexpression() {
        // The invalid target here is the whole `+ 1 2`, not just the `=`
        // node's own tag byte: the diagnostic must underline it, not
        // byte 0 of the program.
        let source = "= (+ 1 2) 3";
        let ast = Parser::parse(source).unwrap();
        let analysis = analyze(&ast, source);
        let Err(Error::InvalidStoreDestination(diag)) = emit(&ast, &analysis, source) else {
            panic!("expected InvalidStoreDestination");
        };
        let label = &diag.labels[0];
        assert_eq!(&source[label.span.start..label.span.end], "+ 1 2");
    }

    #[test]
    fn and_short_circuits_with_dupe_cond_drop_pattern() {
        let program = compile("& a b");
        use Instruction::*;
        assert_eq!(
            program.code,
            vec![LoadVariable(0), Dupe, Cond(5), Drop, LoadVariable(1)]
        );
    }

    #[test]
    fn or_inserts_not_before_cond() {
        let program = compile("| a b");
        use Instruction::*;
        assert_eq!(
            program.code,
            vec![LoadVariable(0), Dupe, Not, Cond(6), Drop, LoadVariable(1)]
        );
    }

    #[test]
    fn while_jumps_back_to_condition_and_yields_null() {
        let program = compile("W a b");
        use Instruction::*;
        assert_eq!(
            program.code,
            vec![LoadVariable(0), Cond(5), LoadVariable(1), Drop, Jump(0), Null]
        );
    }

    #[test]
    fn if_emits_two_branches_with_a_skip_jump() {
        let program = compile("I a b c");
        use Instruction::*;
        assert_eq!(
            program.code,
            vec![LoadVariable(0), Cond(4), LoadVariable(1), Jump(5), LoadVariable(2)]
        );
    }

    #[test]
    fn output_of_bare_identifier_emits_invalid() {
        let program = compile("O a");
        assert_eq!(program.code, vec![Instruction::Invalid]);
    }

    #[test]
    fn output_of_expression_emits_normally() {
        let program = compile("O 1");
        assert_eq!(program.code, vec![Instruction::Constant(0), Instruction::Output]);
    }

    #[test]
    fn block_compiles_into_blocks_table_not_inline() {
        let program = compile("B + 1 2");
        assert_eq!(program.code, vec![Instruction::Block(0)]);
        assert_eq!(program.blocks.len(), 1);
        assert_eq!(
            program.blocks[0],
            vec![Instruction::Constant(0), Instruction::Constant(1), Instruction::Add]
        );
    }

    #[test]
    fn nested_block_indices_are_relocated() {
        // Outer BLOCK contains an inner BLOCK; the inner body's own
        // constant must not collide with the outer body's constant, and
        // the inner block ends up earlier in the table than its parent
        // because it finishes compiling (and gets merged in) first.
        let program = compile("B ; 1 B 2");
        assert_eq!(program.code, vec![Instruction::Block(1)]);
        assert_eq!(program.blocks.len(), 2);
        assert_eq!(program.blocks[0], vec![Instruction::Constant(1)]);
        assert_eq!(
            program.blocks[1],
            vec![Instruction::Constant(0), Instruction::Drop, Instruction::Block(0)]
        );
        assert_eq!(program.constants, vec![Value::Number(1), Value::Number(2)]);
    }
}

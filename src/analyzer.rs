//! Variable resolution: assigns each distinct identifier a dense slot.
//!
//! Walks the AST depth-first in evaluation order and hands out slots on
//! first sight of a name, whether that occurrence loads the variable or
//! is the target of an assignment — `=` treats its first operand as an
//! ordinary identifier node like any other.

use std::collections::HashMap;

use crate::ast::{Ast, NodeKind};

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Name → slot, for diagnostics and tooling.
    pub variables: HashMap<String, u32>,
    /// Total number of distinct identifiers (the VM's `variable_count`).
    pub count: u32,
    /// Node index → slot, for every `Identifier` node in the tree.
    pub node_slot: HashMap<u32, u32>,
}

pub fn analyze(ast: &Ast, source: &str) -> Analysis {
    let mut analysis = Analysis::default();
    if !ast.kinds.is_empty() {
        visit(ast, 0, source, &mut analysis);
    }
    analysis
}

fn visit(ast: &Ast, idx: u32, source: &str, analysis: &mut Analysis) {
    if ast.kinds[idx as usize] == NodeKind::Identifier {
        let name = ast.text(idx, source);
        let slot = match analysis.variables.get(name) {
            Some(&slot) => slot,
            None => {
                let slot = analysis.count;
                analysis.variables.insert(name.to_string(), slot);
                analysis.count += 1;
                slot
            }
        };
        analysis.node_slot.insert(idx, slot);
        return;
    }

    for &child in ast.children(idx) {
        visit(ast, child, source, analysis);
    }
}

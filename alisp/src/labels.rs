//! The linker: resolves symbolic jump targets to absolute indices.

use std::collections::HashMap;

use acpu::{Instr, Target};

/// First pass records and strips every label; the second pass rewrites
/// symbolic targets it knows about. A target naming a label that was never
/// attached stays symbolic, which the machine reports as a fatal error —
/// reaching one means the code generator is broken.
pub(crate) fn link(mut code: Vec<Instr>) -> Vec<Instr> {
    let mut labels: HashMap<String, usize> = HashMap::new();
    for (index, instr) in code.iter_mut().enumerate() {
        if let Some(label) = instr.label.take() {
            labels.insert(label, index);
        }
    }
    for instr in &mut code {
        if let Some(Target::Label(label)) = &instr.target {
            if let Some(&index) = labels.get(label) {
                instr.target = Some(Target::Index(index));
            }
        }
    }
    code
}

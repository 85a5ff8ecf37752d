//! Static-initializer merging.
//!
//! The merged unit has exactly one static initializer, so every chain
//! member's `<clinit>` body is concatenated in chain order. An early return
//! inside a fragment must not terminate the merged initializer: each
//! fragment's `Return` becomes a jump to the fragment's end label, so later
//! fragments still execute. One terminal `Return` closes the merged body.
//! Operand-stack and local-slot requirements take the maximum across
//! fragments.

use graft_ir::{CodeBody, Instruction};

/// Concatenate initializer fragments behind an optional synthesized head
/// (the enumeration extension's regenerated constant-table construction).
pub(crate) fn merge_fragments(
    head: Vec<Instruction>,
    head_stack: u16,
    fragments: &[CodeBody],
) -> CodeBody {
    let mut max_stack = head_stack;
    let mut max_locals = 0u16;
    let mut code = head;

    for fragment in fragments {
        max_stack = max_stack.max(fragment.max_stack);
        max_locals = max_locals.max(fragment.max_locals);

        let offset = code.len() as u32;
        let end = offset + fragment.code.len() as u32;
        for inst in &fragment.code {
            code.push(match inst {
                Instruction::Return => Instruction::Jump(end),
                Instruction::Jump(t) => Instruction::Jump(t + offset),
                Instruction::Branch(t) => Instruction::Branch(t + offset),
                other => other.clone(),
            });
        }
    }

    code.push(Instruction::Return);
    CodeBody {
        max_stack,
        max_locals,
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_ir::MemberRef;
    use pretty_assertions::assert_eq;

    fn put(owner: &str, name: &str) -> Instruction {
        Instruction::PutStatic(MemberRef::new(owner, name))
    }

    #[test]
    fn test_fragments_concatenate_and_all_execute() {
        let first = CodeBody::new(
            1,
            0,
            vec![
                Instruction::ConstSmall(1),
                put("ex.Base", "A"),
                Instruction::Return,
            ],
        );
        let second = CodeBody::new(
            2,
            1,
            vec![
                Instruction::ConstSmall(2),
                put("ex.Base", "B"),
                Instruction::Return,
            ],
        );

        let merged = merge_fragments(Vec::new(), 0, &[first, second]);

        // First fragment's return jumps to its end (the second fragment's
        // start), so the second fragment still runs.
        assert_eq!(merged.code[2], Instruction::Jump(3));
        assert_eq!(merged.code[5], Instruction::Jump(6));
        assert_eq!(merged.code[6], Instruction::Return);
        assert_eq!(merged.max_stack, 2);
        assert_eq!(merged.max_locals, 1);
    }

    #[test]
    fn test_intra_fragment_jumps_are_rebased() {
        let first = CodeBody::new(1, 0, vec![Instruction::Return]);
        let second = CodeBody::new(
            1,
            0,
            vec![
                Instruction::ConstSmall(0),
                Instruction::Branch(3),
                put("ex.Base", "A"),
                Instruction::Return,
            ],
        );

        let merged = merge_fragments(Vec::new(), 0, &[first, second]);
        // The branch target 3 inside the second fragment shifts by one.
        assert_eq!(merged.code[2], Instruction::Branch(4));
    }

    #[test]
    fn test_head_precedes_fragments() {
        let head = vec![Instruction::ConstSmall(9), put("ex.Base", "H")];
        let fragment = CodeBody::new(1, 0, vec![Instruction::Return]);

        let merged = merge_fragments(head, 4, &[fragment]);
        assert_eq!(merged.code[0], Instruction::ConstSmall(9));
        assert_eq!(merged.code[2], Instruction::Jump(3));
        assert_eq!(merged.max_stack, 4);
    }
}

use super::*;
use crate::compiler::mir::{MirInst, MirType, MirValue};

fn make_test_function() -> MirFunction {
    // Create a simple function:
    // bb0: br %arg0, bb1, bb2
    // bb1: %1 = add %arg1, 1; jmp bb3
    // bb2: %2 = sub %arg1, 1; jmp bb3
    // bb3: %3 = phi i64 [bb1: %1], [bb2: %2]; ret %3

    let mut func = MirFunction::new("diamond", MirType::I64);
    let cond = func.add_param("cond", MirType::I1);
    let x = func.add_param("x", MirType::I64);

    let bb0 = func.alloc_block();
    let bb1 = func.alloc_block();
    let bb2 = func.alloc_block();
    let bb3 = func.alloc_block();

    // bb0
    func.set_terminator(
        bb0,
        MirInst::Branch {
            cond,
            if_true: bb1,
            if_false: bb2,
        },
    );

    // bb1
    let inc = func.push(
        bb1,
        MirInst::BinOp {
            op: crate::compiler::mir::BinOpKind::Add,
            lhs: x,
            rhs: MirValue::Const(1),
        },
    );
    func.set_terminator(bb1, MirInst::Jump { target: bb3 });

    // bb2
    let dec = func.push(
        bb2,
        MirInst::BinOp {
            op: crate::compiler::mir::BinOpKind::Sub,
            lhs: x,
            rhs: MirValue::Const(1),
        },
    );
    func.set_terminator(bb2, MirInst::Jump { target: bb3 });

    // bb3
    let phi = func.push(
        bb3,
        MirInst::Phi {
            ty: MirType::I64,
            incoming: vec![(bb1, inc.into()), (bb2, dec.into())],
        },
    );
    func.set_terminator(
        bb3,
        MirInst::Return {
            val: Some(phi.into()),
        },
    );

    func
}

#[test]
fn test_cfg_construction() {
    let func = make_test_function();
    let cfg = CFG::build(&func);

    // Check successors
    assert_eq!(cfg.successors.get(&BlockId(0)).unwrap().len(), 2);
    assert_eq!(cfg.successors.get(&BlockId(1)).unwrap(), &vec![BlockId(3)]);
    assert_eq!(cfg.successors.get(&BlockId(2)).unwrap(), &vec![BlockId(3)]);
    assert!(cfg.successors.get(&BlockId(3)).unwrap().is_empty());

    // Check predecessors
    assert!(cfg.predecessors_of(BlockId(0)).is_empty());
    assert_eq!(cfg.predecessors_of(BlockId(3)).len(), 2);
}

#[test]
fn test_dominators() {
    let func = make_test_function();
    let cfg = CFG::build(&func);

    // bb0 dominates everything
    assert!(cfg.dominates(BlockId(0), BlockId(0)));
    assert!(cfg.dominates(BlockId(0), BlockId(1)));
    assert!(cfg.dominates(BlockId(0), BlockId(2)));
    assert!(cfg.dominates(BlockId(0), BlockId(3)));

    // bb1 and bb2 don't dominate bb3 (both paths lead to bb3)
    assert!(!cfg.dominates(BlockId(1), BlockId(3)));
    assert!(!cfg.dominates(BlockId(2), BlockId(3)));
}

#[test]
fn test_rpo_starts_at_entry() {
    let func = make_test_function();
    let cfg = CFG::build(&func);

    assert_eq!(cfg.rpo.first(), Some(&BlockId(0)));
    assert_eq!(cfg.rpo.last(), Some(&BlockId(3)));
    assert_eq!(cfg.post_order.len(), 4);
    assert_eq!(cfg.reachable_blocks().len(), 4);
}

#[test]
fn test_unreachable_block_not_in_rpo() {
    let mut func = make_test_function();
    let orphan = func.alloc_block();
    func.set_terminator(orphan, MirInst::Return { val: None });

    let cfg = CFG::build(&func);
    assert!(!cfg.reachable_blocks().contains(&orphan));
    assert!(!cfg.dominates(BlockId(0), orphan));
}

#[test]
fn test_inst_dominance() {
    let func = make_test_function();
    let cfg = CFG::build(&func);

    let inc = func.block(BlockId(1)).instructions[0];
    let dec = func.block(BlockId(2)).instructions[0];
    let phi = func.block(BlockId(3)).instructions[0];
    let ret = func.block(BlockId(3)).terminator;

    assert!(cfg.inst_dominates(&func, phi, ret));
    assert!(!cfg.inst_dominates(&func, ret, phi));
    assert!(!cfg.inst_dominates(&func, inc, phi));
    assert!(!cfg.inst_dominates(&func, inc, dec));
    assert!(cfg.inst_dominates(&func, func.block(BlockId(0)).terminator, dec));
}

#[test]
fn test_loop_back_edge() {
    // bb0: jmp bb1
    // bb1: br %arg0, bb1, bb2
    // bb2: ret void
    let mut func = MirFunction::new("loop", MirType::Void);
    let cond = func.add_param("cond", MirType::I1);
    let bb0 = func.alloc_block();
    let bb1 = func.alloc_block();
    let bb2 = func.alloc_block();
    func.set_terminator(bb0, MirInst::Jump { target: bb1 });
    func.set_terminator(
        bb1,
        MirInst::Branch {
            cond,
            if_true: bb1,
            if_false: bb2,
        },
    );
    func.set_terminator(bb2, MirInst::Return { val: None });

    let cfg = CFG::build(&func);
    assert_eq!(cfg.predecessors_of(bb1), &[bb0, bb1]);
    assert!(cfg.dominates(bb1, bb2));
    assert!(!cfg.dominates(bb2, bb1));
}

use super::*;
use crate::compiler::mir::MirType;

fn make_diamond() -> MirFunction {
    // bb0: br %arg0, bb1, bb2
    // bb1: jmp bb3
    // bb2: jmp bb3
    // bb3: %0 = phi i64 [bb1: 1], [bb2: 2]; ret %0
    let mut func = MirFunction::new("diamond", MirType::I64);
    let cond = func.add_param("cond", MirType::I1);
    let bb0 = func.alloc_block();
    let bb1 = func.alloc_block();
    let bb2 = func.alloc_block();
    let bb3 = func.alloc_block();
    func.set_terminator(
        bb0,
        MirInst::Branch {
            cond,
            if_true: bb1,
            if_false: bb2,
        },
    );
    func.set_terminator(bb1, MirInst::Jump { target: bb3 });
    func.set_terminator(bb2, MirInst::Jump { target: bb3 });
    let phi = func.push(
        bb3,
        MirInst::Phi {
            ty: MirType::I64,
            incoming: vec![(bb1, MirValue::Const(1)), (bb2, MirValue::Const(2))],
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
fn test_valid_function_passes() {
    let func = make_diamond();
    assert_eq!(verify_function(&func), Ok(()));
}

#[test]
fn test_placeholder_terminator() {
    let mut func = make_diamond();
    let orphan = func.alloc_block();
    assert_eq!(
        verify_function(&func),
        Err(VerifyError::MissingTerminator(orphan))
    );
}

#[test]
fn test_non_terminator_at_block_end() {
    let mut func = make_diamond();
    let bb1 = BlockId(1);
    let copy = func.alloc_inst(MirInst::Copy {
        src: MirValue::Const(0),
    });
    func.block_mut(bb1).terminator = copy;
    assert!(matches!(
        verify_function(&func),
        Err(VerifyError::NotATerminator { block, .. }) if block == bb1
    ));
}

#[test]
fn test_terminator_in_body() {
    let mut func = make_diamond();
    func.push(BlockId(1), MirInst::Jump { target: BlockId(3) });
    assert!(matches!(
        verify_function(&func),
        Err(VerifyError::TerminatorInBody { .. })
    ));
}

#[test]
fn test_unknown_branch_target() {
    let mut func = make_diamond();
    func.set_terminator(BlockId(2), MirInst::Jump { target: BlockId(42) });
    assert!(matches!(
        verify_function(&func),
        Err(VerifyError::UnknownBlock { target: BlockId(42), .. })
    ));
}

#[test]
fn test_duplicate_placement() {
    let mut func = make_diamond();
    let phi = func.block(BlockId(3)).instructions[0];
    func.block_mut(BlockId(1)).instructions.push(phi);
    assert_eq!(
        verify_function(&func),
        Err(VerifyError::DuplicatePlacement(phi))
    );
}

#[test]
fn test_dangling_operand() {
    let mut func = make_diamond();
    let floating = func.alloc_inst(MirInst::Alloca {
        ty: MirType::array(MirType::I8, 4),
    });
    let store = func.push(
        BlockId(1),
        MirInst::Store {
            ptr: floating.into(),
            val: MirValue::Const(0),
        },
    );
    assert_eq!(
        verify_function(&func),
        Err(VerifyError::DanglingOperand {
            inst: store,
            operand: floating,
        })
    );
}

#[test]
fn test_unknown_param() {
    let mut func = make_diamond();
    func.push(BlockId(2), MirInst::Copy { src: MirValue::Param(3) });
    assert!(matches!(
        verify_function(&func),
        Err(VerifyError::UnknownParam { index: 3, count: 1, .. })
    ));
}

#[test]
fn test_phi_after_non_phi() {
    let mut func = make_diamond();
    let bb3 = BlockId(3);
    let copy = func.alloc_inst(MirInst::Copy {
        src: MirValue::Const(7),
    });
    func.block_mut(bb3).instructions.insert(0, copy);
    assert!(matches!(
        verify_function(&func),
        Err(VerifyError::MisplacedPhi { block, .. }) if block == bb3
    ));
}

#[test]
fn test_phi_predecessor_mismatch() {
    let mut func = make_diamond();
    let phi = func.block(BlockId(3)).instructions[0];
    if let MirInst::Phi { incoming, .. } = func.inst_mut(phi) {
        incoming.pop();
    }
    let err = verify_function(&func).unwrap_err();
    assert_eq!(
        err,
        VerifyError::PhiPredecessorMismatch {
            block: BlockId(3),
            inst: phi,
            listed: vec![BlockId(1)],
            expected: vec![BlockId(1), BlockId(2)],
        }
    );
    assert!(err.to_string().contains("predecessors are"));
}

use super::*;

impl CFG {
    pub(super) fn compute_post_order(&mut self, func: &MirFunction) {
        if !func.has_block(func.entry) {
            return;
        }

        // Iterative DFS: deep CFGs must not exhaust the native stack
        let mut visited = HashSet::new();
        let mut post_order = Vec::new();
        let mut stack: Vec<(BlockId, usize)> = vec![(func.entry, 0)];
        visited.insert(func.entry);

        while let Some((block_id, next_succ)) = stack.pop() {
            let succs = self.successors.get(&block_id).cloned().unwrap_or_default();
            if let Some(&succ) = succs.get(next_succ) {
                stack.push((block_id, next_succ + 1));
                if func.has_block(succ) && visited.insert(succ) {
                    stack.push((succ, 0));
                }
            } else {
                post_order.push(block_id);
            }
        }

        self.post_order = post_order.clone();
        self.rpo = post_order.into_iter().rev().collect();
    }
}

pub(super) fn compute_idom(
    entry: BlockId,
    predecessors: &HashMap<BlockId, Vec<BlockId>>,
    rpo: &[BlockId],
) -> HashMap<BlockId, BlockId> {
    let rpo_index: HashMap<BlockId, usize> = rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();

    let mut doms: HashMap<BlockId, Option<BlockId>> = HashMap::new();
    for &block in rpo {
        doms.insert(block, None);
    }
    doms.insert(entry, Some(entry));

    let mut changed = true;
    while changed {
        changed = false;

        for &block_id in rpo {
            if block_id == entry {
                continue;
            }

            let preds = predecessors.get(&block_id).cloned().unwrap_or_default();
            let mut new_idom = None;

            for &pred in &preds {
                if doms.get(&pred).and_then(|d| *d).is_some() {
                    new_idom = Some(pred);
                    break;
                }
            }

            if let Some(mut idom) = new_idom {
                for &pred in &preds {
                    if pred == idom {
                        continue;
                    }
                    if doms.get(&pred).and_then(|d| *d).is_some() {
                        idom = intersect(pred, idom, &doms, &rpo_index);
                    }
                }

                if doms.get(&block_id).and_then(|d| *d) != Some(idom) {
                    doms.insert(block_id, Some(idom));
                    changed = true;
                }
            }
        }
    }

    let mut idom = HashMap::new();
    for (block_id, dom) in doms {
        if let Some(parent) = dom
            && block_id != parent
        {
            idom.insert(block_id, parent);
        }
    }
    idom
}

fn intersect(
    b1: BlockId,
    b2: BlockId,
    doms: &HashMap<BlockId, Option<BlockId>>,
    rpo_index: &HashMap<BlockId, usize>,
) -> BlockId {
    let get_idx = |b: BlockId| rpo_index.get(&b).copied().unwrap_or(usize::MAX);

    let mut finger1 = b1;
    let mut finger2 = b2;

    while finger1 != finger2 {
        while get_idx(finger1) > get_idx(finger2) {
            match doms.get(&finger1).and_then(|d| *d) {
                Some(dom) if dom != finger1 => finger1 = dom,
                _ => return finger2,
            }
        }
        while get_idx(finger2) > get_idx(finger1) {
            match doms.get(&finger2).and_then(|d| *d) {
                Some(dom) if dom != finger2 => finger2 = dom,
                _ => return finger1,
            }
        }
    }
    finger1
}

pub(super) fn dominates_in_idom(a: BlockId, b: BlockId, idom: &HashMap<BlockId, BlockId>) -> bool {
    if a == b {
        return true;
    }
    let mut current = b;
    while let Some(&dom) = idom.get(&current) {
        if dom == a {
            return true;
        }
        if dom == current {
            break;
        }
        current = dom;
    }
    false
}

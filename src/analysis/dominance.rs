//! Dominance and post-dominance over the blocks of a function.
//!
//! A block `d` **dominates** `n` if every path from the entry to `n` passes
//! through `d`; it **post-dominates** `n` if every path from `n` to a function
//! exit passes through `d`. Post-dominance is computed on the reversed CFG with a
//! virtual exit node joining every block that ends in `return`, `throw` or
//! `unreachable`.
//!
//! # Algorithm
//!
//! Immediate dominators are computed with the iterative intersection scheme of
//! Cooper, Harvey and Kennedy over a reverse post-order of the (possibly reversed)
//! graph. Blocks are mapped to dense indices in layout order, so the result does
//! not depend on arena slot assignment.

use std::collections::HashMap;

use crate::pil::{BlockId, Function, InstId};

/// Dominator (or post-dominator) tree of one function.
#[derive(Debug, Clone)]
pub struct DominanceInfo {
    blocks: Vec<BlockId>,
    index: HashMap<BlockId, usize>,
    /// Immediate dominator per dense node; the root maps to itself and unreachable
    /// nodes to `None`. For post-dominance the root is the virtual exit `blocks.len()`.
    idom: Vec<Option<usize>>,
    root: usize,
    post: bool,
}

impl DominanceInfo {
    /// Computes the dominator tree of `func`.
    #[must_use]
    pub fn compute(func: &Function) -> Self {
        let (blocks, index, succs) = dense_cfg(func);
        let n = blocks.len();
        let mut preds = vec![Vec::new(); n];
        for (from, targets) in succs.iter().enumerate() {
            for &to in targets {
                preds[to].push(from);
            }
        }

        let idom = if n == 0 {
            Vec::new()
        } else {
            compute_idoms(0, &succs, &preds)
        };
        Self {
            blocks,
            index,
            idom,
            root: 0,
            post: false,
        }
    }

    /// Computes the post-dominator tree of `func`.
    #[must_use]
    pub fn compute_post(func: &Function) -> Self {
        let (blocks, index, succs) = dense_cfg(func);
        let n = blocks.len();
        let exit = n;

        // Reversed graph: an edge a -> b of the CFG becomes b -> a.
        let mut rsuccs = vec![Vec::new(); n + 1];
        let mut rpreds = vec![Vec::new(); n + 1];
        for (from, targets) in succs.iter().enumerate() {
            if targets.is_empty() {
                rsuccs[exit].push(from);
                rpreds[from].push(exit);
            }
            for &to in targets {
                rsuccs[to].push(from);
                rpreds[from].push(to);
            }
        }

        let idom = compute_idoms(exit, &rsuccs, &rpreds);
        Self {
            blocks,
            index,
            idom,
            root: exit,
            post: true,
        }
    }

    /// Returns `true` for a post-dominator tree.
    #[must_use]
    pub const fn is_post_dominance(&self) -> bool {
        self.post
    }

    /// Returns `true` if `block` is reachable from the root of the tree.
    #[must_use]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.node(block)
            .is_some_and(|node| self.idom[node].is_some())
    }

    fn node(&self, block: BlockId) -> Option<usize> {
        self.index.get(&block).copied()
    }

    /// The immediate (post-)dominator of `block`.
    ///
    /// `None` for the entry block, for blocks whose only post-dominator is the
    /// virtual exit, and for unreachable blocks.
    #[must_use]
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        let node = self.node(block)?;
        let parent = self.idom[node]?;
        if parent == node || parent == self.root && self.post {
            None
        } else {
            self.blocks.get(parent).copied()
        }
    }

    /// Returns `true` if `a` (post-)dominates `b`. A block dominates itself.
    /// Unreachable blocks are dominated by nothing but themselves.
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let (Some(a), Some(mut current)) = (self.node(a), self.node(b)) else {
            return false;
        };
        while let Some(parent) = self.idom[current] {
            if parent == current {
                return false;
            }
            if parent == a {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Returns `true` if `a` (post-)dominates `b` and `a != b`.
    #[must_use]
    pub fn properly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns `true` if instruction `a` (post-)dominates instruction `b`.
    #[must_use]
    pub fn inst_dominates(&self, func: &Function, a: InstId, b: InstId) -> bool {
        let block_a = func.parent_block(a);
        let block_b = func.parent_block(b);
        if block_a != block_b {
            return self.properly_dominates(block_a, block_b);
        }
        let insts = func.block(block_a).insts();
        let pos_a = insts.iter().position(|&i| i == a);
        let pos_b = insts.iter().position(|&i| i == b);
        match (pos_a, pos_b) {
            (Some(pa), Some(pb)) if self.post => pa >= pb,
            (Some(pa), Some(pb)) => pa <= pb,
            _ => false,
        }
    }

    /// Depth of `block` in the tree; the root has depth 0.
    #[must_use]
    pub fn depth(&self, block: BlockId) -> Option<usize> {
        let mut current = self.node(block)?;
        let mut depth = 0;
        loop {
            let parent = self.idom[current]?;
            if parent == current {
                return Some(depth);
            }
            depth += 1;
            current = parent;
        }
    }

    /// Blocks immediately (post-)dominated by `block`, in layout order.
    #[must_use]
    pub fn children(&self, block: BlockId) -> Vec<BlockId> {
        let Some(node) = self.node(block) else {
            return Vec::new();
        };
        self.blocks
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != node && self.idom[i] == Some(node))
            .map(|(_, &b)| b)
            .collect()
    }
}

type DenseCfg = (Vec<BlockId>, HashMap<BlockId, usize>, Vec<Vec<usize>>);

fn dense_cfg(func: &Function) -> DenseCfg {
    let blocks: Vec<BlockId> = func.layout().to_vec();
    let index: HashMap<BlockId, usize> = blocks
        .iter()
        .enumerate()
        .map(|(i, &block)| (block, i))
        .collect();
    let succs = blocks
        .iter()
        .map(|&block| {
            let mut targets: Vec<usize> = Vec::new();
            for succ in func.successors(block) {
                if let Some(&target) = index.get(&succ) {
                    if !targets.contains(&target) {
                        targets.push(target);
                    }
                }
            }
            targets
        })
        .collect();
    (blocks, index, succs)
}

fn compute_idoms(root: usize, succs: &[Vec<usize>], preds: &[Vec<usize>]) -> Vec<Option<usize>> {
    let n = succs.len();

    // Post-order numbering by iterative DFS.
    let mut postorder = Vec::with_capacity(n);
    let mut po_number = vec![usize::MAX; n];
    let mut visited = vec![false; n];
    let mut stack = vec![(root, 0usize)];
    visited[root] = true;
    while let Some((node, next_child)) = stack.pop() {
        if let Some(&child) = succs[node].get(next_child) {
            stack.push((node, next_child + 1));
            if !visited[child] {
                visited[child] = true;
                stack.push((child, 0));
            }
        } else {
            po_number[node] = postorder.len();
            postorder.push(node);
        }
    }

    let mut idom: Vec<Option<usize>> = vec![None; n];
    idom[root] = Some(root);

    let intersect = |idom: &[Option<usize>], mut a: usize, mut b: usize| -> usize {
        while a != b {
            while po_number[a] < po_number[b] {
                a = idom[a].unwrap_or(root);
            }
            while po_number[b] < po_number[a] {
                b = idom[b].unwrap_or(root);
            }
        }
        a
    };

    let mut changed = true;
    while changed {
        changed = false;
        for &node in postorder.iter().rev() {
            if node == root {
                continue;
            }
            let mut new_idom: Option<usize> = None;
            for &pred in &preds[node] {
                if idom[pred].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, pred, current),
                });
            }
            if new_idom.is_some() && idom[node] != new_idom {
                idom[node] = new_idom;
                changed = true;
            }
        }
    }
    idom
}

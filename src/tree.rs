//! Dependency-tree matching.
//!
//! Instead of walking left and right, the search grows a frontier of tree-adjacent token
//! ids (parent and children of everything matched so far). Any unused subword may be
//! tried against any unused frontier node, and a wildcard slot absorbs every node of its
//! reachable neighbourhood that satisfies the same feature requirement.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::conllu::DepToken;
use crate::features::{match_any, wildcard_subset, LemmaFeatureMap};
use crate::models::{Entry, Matching, Subword};

/// A sentence whose token ids or head references do not form a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("token at position {position} has id {id}, expected {}", .position + 1)]
    IdMismatch { position: usize, id: usize },
    #[error("token {id} has head {head} outside the sentence")]
    HeadOutOfRange { id: usize, head: usize },
    #[error("sentence has no root")]
    NoRoot,
    #[error("sentence has several roots: {0:?}")]
    MultipleRoots(Vec<usize>),
    #[error("token {0} is not reachable from the root")]
    Cycle(usize),
}

/// Validated dependency tree over 1-based token ids.
#[derive(Debug, Clone, Default)]
pub struct DepTree {
    /// `heads[id - 1]`, 0 for the root
    heads: Vec<usize>,
    /// `children[id - 1]`, ascending
    children: Vec<Vec<usize>>,
    root: usize,
}

impl DepTree {
    /// Build from `(id, head)` pairs in sentence order.
    pub fn from_heads<I>(nodes: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut heads = Vec::new();
        for (position, (id, head)) in nodes.into_iter().enumerate() {
            if id != position + 1 {
                return Err(TreeError::IdMismatch { position, id });
            }
            heads.push(head);
        }
        if heads.is_empty() {
            return Ok(DepTree::default());
        }

        let len = heads.len();
        let mut children = vec![Vec::new(); len];
        let mut roots = Vec::new();
        for (idx, &head) in heads.iter().enumerate() {
            let id = idx + 1;
            if head > len {
                return Err(TreeError::HeadOutOfRange { id, head });
            }
            if head == 0 {
                roots.push(id);
            } else {
                children[head - 1].push(id);
            }
        }
        let root = match roots.as_slice() {
            [] => return Err(TreeError::NoRoot),
            [root] => *root,
            _ => return Err(TreeError::MultipleRoots(roots)),
        };

        let tree = DepTree {
            heads,
            children,
            root,
        };
        let mut reached = vec![false; len];
        for id in tree.preorder() {
            reached[id - 1] = true;
        }
        if let Some(idx) = reached.iter().position(|r| !r) {
            return Err(TreeError::Cycle(idx + 1));
        }
        Ok(tree)
    }

    pub fn from_tokens(tokens: &[DepToken]) -> Result<Self, TreeError> {
        Self::from_heads(tokens.iter().map(|t| (t.id, t.head)))
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn root(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.root)
    }

    /// Governor of `id`, `None` for the root or an unknown id.
    pub fn head(&self, id: usize) -> Option<usize> {
        match self.heads.get(id.checked_sub(1)?) {
            Some(&0) | None => None,
            Some(&head) => Some(head),
        }
    }

    pub fn children(&self, id: usize) -> &[usize] {
        id.checked_sub(1)
            .and_then(|idx| self.children.get(idx))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ids in pre-order from the root. Nodes on a head cycle are never visited.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.len());
        if self.is_empty() {
            return order;
        }
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    /// `frontier` plus the parent and children of `id`.
    pub fn expand_node(&self, id: usize, frontier: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut grown = frontier.clone();
        grown.extend(self.head(id));
        grown.extend(self.children(id).iter().copied());
        grown
    }
}

/// Search state of one branch. Every branch owns its sets.
#[derive(Debug, Clone)]
struct Branch {
    frontier: BTreeSet<usize>,
    used_ids: BTreeSet<usize>,
    used_subwords: BTreeSet<usize>,
    matching: Matching,
}

/// Absorb every node reachable from `frontier` that satisfies the wildcard requirement of
/// `matcher`, growing the frontier after each absorption. Returns the absorbed ids.
fn expand_wildcard(
    tree: &DepTree,
    features: &[LemmaFeatureMap],
    matcher: &LemmaFeatureMap,
    mut frontier: BTreeSet<usize>,
    used_ids: &mut BTreeSet<usize>,
) -> (Vec<usize>, BTreeSet<usize>) {
    let mut absorbed = Vec::new();
    loop {
        let pending: Vec<usize> = frontier.difference(used_ids).copied().collect();
        let mut changed = false;
        for id in pending {
            let Some(token) = features.get(id - 1) else {
                continue;
            };
            if !wildcard_subset(matcher, token) {
                continue;
            }
            changed = true;
            frontier = tree.expand_node(id, &frontier);
            used_ids.insert(id);
            absorbed.push(id);
        }
        if !changed {
            break;
        }
    }
    (absorbed, frontier)
}

/// Every complete assignment of `subwords` reachable from `start`.
fn select_dep_step(
    tree: &DepTree,
    features: &[LemmaFeatureMap],
    subwords: &[Subword],
    start: Branch,
    extend_wildcards: bool,
) -> BTreeSet<Matching> {
    let mut results = BTreeSet::new();
    let mut stack = vec![start];

    while let Some(branch) = stack.pop() {
        if branch.used_subwords.len() == subwords.len() {
            results.insert(branch.matching);
            continue;
        }

        for &id in branch.frontier.difference(&branch.used_ids) {
            let Some(token) = features.get(id - 1) else {
                continue;
            };
            for (subword_idx, subword) in subwords.iter().enumerate() {
                if branch.used_subwords.contains(&subword_idx) {
                    continue;
                }
                let Some(kind) = match_any(&subword.features, token) else {
                    continue;
                };

                let mut frontier = tree.expand_node(id, &branch.frontier);
                let mut used_ids = branch.used_ids.clone();
                used_ids.insert(id);
                let mut matching = branch.matching.with(subword_idx, id - 1);

                if kind.is_wildcard() && extend_wildcards {
                    let neighbours = tree.expand_node(id, &BTreeSet::new());
                    let (absorbed, reached) = expand_wildcard(
                        tree,
                        features,
                        &subword.features,
                        neighbours,
                        &mut used_ids,
                    );
                    frontier.extend(reached);
                    for extra in absorbed {
                        matching.insert(subword_idx, extra - 1);
                    }
                }

                let mut used_subwords = branch.used_subwords.clone();
                used_subwords.insert(subword_idx);
                stack.push(Branch {
                    frontier,
                    used_ids,
                    used_subwords,
                    matching,
                });
            }
        }
    }

    results
}

/// Matchings of `entry` over `tree` with the key subword fixed at sentence position
/// `anchor` (token id `anchor + 1`). Positions in the result are 0-based.
pub fn match_tree_anchor(
    entry: &Entry,
    anchor: usize,
    tree: &DepTree,
    features: &[LemmaFeatureMap],
    extend_wildcards: bool,
) -> BTreeSet<Matching> {
    if entry.key_idx >= entry.subwords.len() || anchor >= tree.len() {
        return BTreeSet::new();
    }
    let anchor_id = anchor + 1;
    let start = Branch {
        frontier: tree.expand_node(anchor_id, &BTreeSet::new()),
        used_ids: BTreeSet::from([anchor_id]),
        used_subwords: BTreeSet::from([entry.key_idx]),
        matching: Matching::single(entry.key_idx, anchor),
    };
    select_dep_step(tree, features, &entry.subwords, start, extend_wildcards)
}

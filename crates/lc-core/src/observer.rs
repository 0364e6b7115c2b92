//! Initial sweep and change-detection
//!
//! The sweep visits every element below a container in depth-first pre-order.
//! Afterwards, mutation batches feed changed and added elements back through
//! the same check. The dispatcher's own writes come back as attribute records;
//! re-checking them is a no-op once the address reached its fixed point, so the
//! record stream dries up by itself.

use std::ops::AddAssign;
use std::time::Instant;

use log::{info, warn};

use crate::classify::is_rewrite_candidate;
use crate::dom::{DocumentTree, MutationRecord, NodeId, ObserveOptions, Tree};
use crate::rewrite::Rewriter;
use crate::ADDRESS_ATTRIBUTE;

/// Tag of the containers that get observed and swept.
pub const CONTAINER_TAG: &str = "body";

/// Observer registration used for every container.
pub fn observe_options() -> ObserveOptions {
    ObserveOptions::SUBTREE | ObserveOptions::CHILD_LIST | ObserveOptions::ATTRIBUTES
}

/// Counters for one sweep or batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// Nodes passed to the classifier
    pub visited: usize,
    /// Elements whose address changed
    pub rewritten: usize,
    /// Elements whose rewrite attempt failed
    pub failed: usize,
}

impl AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.visited += other.visited;
        self.rewritten += other.rewritten;
        self.failed += other.failed;
    }
}

/// Drives the rewriter over a document.
#[derive(Debug, Clone)]
pub struct LinkCleaner<'t> {
    rewriter: Rewriter<'t>,
}

impl<'t> LinkCleaner<'t> {
    pub fn new(rewriter: Rewriter<'t>) -> Self {
        Self { rewriter }
    }

    #[inline]
    pub fn rewriter(&self) -> &Rewriter<'t> {
        &self.rewriter
    }

    /// Classify one node and rewrite it if it is a candidate.
    ///
    /// Failures are logged and counted; they never abort the caller.
    pub fn check_element<D: DocumentTree>(&self, doc: &mut D, node: &D::Node, stats: &mut Stats) {
        stats.visited += 1;
        if !is_rewrite_candidate(doc, node) {
            return;
        }

        match self.rewriter.rewrite_if_matched(doc, node) {
            Ok(rewrite) if rewrite.is_rewritten() => stats.rewritten += 1,
            Ok(_) => {}
            Err(e) => {
                stats.failed += 1;
                warn!("skipping element: {}", e);
            }
        }
    }

    /// Check `root` and every element below it, depth-first pre-order.
    pub fn sweep<D: DocumentTree>(&self, doc: &mut D, root: &D::Node) -> Stats {
        let mut stats = Stats::default();
        let mut stack = vec![root.clone()];

        while let Some(node) = stack.pop() {
            self.check_element(doc, &node, &mut stats);
            let mut children = doc.children(&node);
            children.reverse();
            stack.extend(children);
        }

        stats
    }

    /// Process one notification batch, in order.
    ///
    /// Attribute records re-check their target. Child-list records sweep every
    /// added node; removed nodes are ignored.
    pub fn process_records<D: DocumentTree>(
        &self,
        doc: &mut D,
        records: &[MutationRecord<D::Node>],
    ) -> Stats {
        let mut stats = Stats::default();

        for record in records {
            match record {
                MutationRecord::Attributes { target, name } => {
                    if name.eq_ignore_ascii_case(ADDRESS_ATTRIBUTE) {
                        self.check_element(doc, target, &mut stats);
                    }
                }
                MutationRecord::ChildList { added, .. } => {
                    for node in added {
                        stats += self.sweep(doc, node);
                    }
                }
            }
        }

        stats
    }

    /// Observe every `<body>` of an in-memory tree, then sweep them.
    pub fn start(&self, tree: &mut Tree) -> Stats {
        let started = Instant::now();
        let containers = tree.elements_by_tag_name(CONTAINER_TAG);

        for &container in &containers {
            tree.observe(container, observe_options(), Some(&[ADDRESS_ATTRIBUTE]));
        }

        let mut stats = Stats::default();
        for container in &containers {
            stats += self.sweep(tree, container);
        }

        info!(
            "initial sweep finished in {:.1}ms ({} visited, {} rewritten, {} failed)",
            started.elapsed().as_secs_f64() * 1000.0,
            stats.visited,
            stats.rewritten,
            stats.failed,
        );
        stats
    }

    /// Deliver queued batches until the tree has no pending records.
    pub fn drain(&self, tree: &mut Tree) -> Stats {
        let mut total = Stats::default();

        loop {
            let batch = tree.take_records();
            if batch.is_empty() {
                return total;
            }

            let started = Instant::now();
            let stats = self.process_records(tree, &batch);
            info!(
                "mutation batch of {} records finished in {:.1}ms",
                batch.len(),
                started.elapsed().as_secs_f64() * 1000.0,
            );
            total += stats;
        }
    }

    /// Sweep a single container of an in-memory tree without observing it.
    pub fn sweep_node(&self, tree: &mut Tree, root: NodeId) -> Stats {
        self.sweep(tree, &root)
    }
}

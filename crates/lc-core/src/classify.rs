//! Rewrite candidate filter

use crate::dom::DocumentTree;
use crate::ADDRESS_ATTRIBUTE;

/// A node is a candidate when it is a link, map area or image carrying a
/// non-empty address attribute. Containers are not candidates themselves;
/// callers still descend into them.
pub fn is_rewrite_candidate<D: DocumentTree>(doc: &D, node: &D::Node) -> bool {
    doc.kind(node).carries_address()
        && doc
            .attribute(node, ADDRESS_ATTRIBUTE)
            .is_some_and(|href| !href.is_empty())
}

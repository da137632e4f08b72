use tree_sitter::Node;

/// What the walker does after visiting a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Visit the node's children next
    Descend,
    /// The node was captured; leave its subtree alone
    Skip,
}

/// Pre-order, source-ordered walk over named nodes using an explicit stack.
///
/// Anonymous tokens are never handed to `visit`; they have no named children.
pub fn walk<'t, F>(root: Node<'t>, mut visit: F)
where
    F: FnMut(Node<'t>) -> Visit,
{
    let mut stack = vec![root];
    let mut children = Vec::new();

    while let Some(node) = stack.pop() {
        if !node.is_named() {
            continue;
        }
        if visit(node) == Visit::Skip {
            continue;
        }

        let mut cursor = node.walk();
        children.clear();
        children.extend(node.named_children(&mut cursor));
        stack.extend(children.drain(..).rev());
    }
}

/// Walk parents from `node` (exclusive) to the root.
pub fn ancestors<'t>(node: Node<'t>) -> impl Iterator<Item = Node<'t>> {
    std::iter::successors(node.parent(), |n| n.parent())
}

// Intrusive circular doubly-linked lists over a fixed index arena.
//
// Every node lives in one boxed slice allocated up front. A node that is not
// part of any list points at itself, which is also how an empty list looks
// when the node is used as a sentinel. Links are u32 indices, not pointers,
// so nodes can be spliced in O(1) without any allocation.

/// Index of a node inside a [`Links`] arena.
pub type LinkIndex = u32;

#[derive(Debug, Clone, Copy)]
struct Link {
    prev: LinkIndex,
    next: LinkIndex,
}

/// Fixed-size arena of list nodes.
#[derive(Debug)]
pub struct Links {
    nodes: Box<[Link]>,
}

impl Links {
    /// Create `len` self-linked nodes.
    pub fn new(len: usize) -> Self {
        debug_assert!(len <= LinkIndex::MAX as usize, "link arena too large");
        let nodes = (0..len as LinkIndex)
            .map(|i| Link { prev: i, next: i })
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn next(&self, node: LinkIndex) -> LinkIndex {
        self.nodes[node as usize].next
    }

    #[inline]
    pub fn prev(&self, node: LinkIndex) -> LinkIndex {
        self.nodes[node as usize].prev
    }

    /// True when `node` is spliced into some list (with at least one other node).
    #[inline]
    pub fn is_linked(&self, node: LinkIndex) -> bool {
        self.nodes[node as usize].next != node
    }

    /// True when the list headed by `sentinel` has no members.
    #[inline]
    pub fn is_list_empty(&self, sentinel: LinkIndex) -> bool {
        !self.is_linked(sentinel)
    }

    /// Splice `node` immediately before `at`.
    ///
    /// Inserting before a sentinel appends to the tail of its list.
    /// `node` must not currently be linked anywhere.
    pub fn insert_before(&mut self, at: LinkIndex, node: LinkIndex) {
        debug_assert_ne!(at, node);
        debug_assert!(!self.is_linked(node), "node {node} is already linked");
        let prev = self.nodes[at as usize].prev;
        self.nodes[node as usize] = Link { prev, next: at };
        self.nodes[prev as usize].next = node;
        self.nodes[at as usize].prev = node;
    }

    /// Splice `node` out of its list and make it self-linked again.
    ///
    /// Removing an already self-linked node is a no-op.
    pub fn remove(&mut self, node: LinkIndex) {
        let Link { prev, next } = self.nodes[node as usize];
        self.nodes[prev as usize].next = next;
        self.nodes[next as usize].prev = prev;
        self.nodes[node as usize] = Link { prev: node, next: node };
    }

    /// Detach and return the first member of the list headed by `sentinel`.
    pub fn pop_front(&mut self, sentinel: LinkIndex) -> Option<LinkIndex> {
        let first = self.next(sentinel);
        if first == sentinel {
            return None;
        }
        self.remove(first);
        Some(first)
    }

    /// Iterate the members of the list headed by `sentinel`, front to back.
    ///
    /// The iterator borrows the arena, so the list cannot change while it runs.
    /// Passes that mutate lists while walking them keep their own cursor.
    pub fn iter(&self, sentinel: LinkIndex) -> Iter<'_> {
        Iter {
            links: self,
            sentinel,
            cursor: self.next(sentinel),
        }
    }
}

pub struct Iter<'a> {
    links: &'a Links,
    sentinel: LinkIndex,
    cursor: LinkIndex,
}

impl Iterator for Iter<'_> {
    type Item = LinkIndex;

    fn next(&mut self) -> Option<LinkIndex> {
        if self.cursor == self.sentinel {
            return None;
        }
        let current = self.cursor;
        self.cursor = self.links.next(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(links: &Links, sentinel: LinkIndex) -> Vec<LinkIndex> {
        links.iter(sentinel).collect()
    }

    #[test]
    fn new_nodes_are_self_linked() {
        let links = Links::new(4);
        for i in 0..4 {
            assert_eq!(links.next(i), i);
            assert_eq!(links.prev(i), i);
            assert!(!links.is_linked(i));
        }
    }

    #[test]
    fn insert_before_sentinel_appends() {
        let mut links = Links::new(4);
        let head = 3;
        links.insert_before(head, 0);
        links.insert_before(head, 1);
        links.insert_before(head, 2);
        assert_eq!(collect(&links, head), vec![0, 1, 2]);
        assert_eq!(links.prev(head), 2);
    }

    #[test]
    fn insert_before_member_splices_in_place() {
        let mut links = Links::new(4);
        let head = 3;
        links.insert_before(head, 0);
        links.insert_before(head, 2);
        links.insert_before(2, 1);
        assert_eq!(collect(&links, head), vec![0, 1, 2]);
    }

    #[test]
    fn remove_unlinks_and_resets() {
        let mut links = Links::new(4);
        let head = 3;
        for i in 0..3 {
            links.insert_before(head, i);
        }
        links.remove(1);
        assert_eq!(collect(&links, head), vec![0, 2]);
        assert!(!links.is_linked(1));
        assert_eq!(links.next(0), 2);
        assert_eq!(links.prev(2), 0);

        // Already detached.
        links.remove(1);
        assert_eq!(collect(&links, head), vec![0, 2]);
    }

    #[test]
    fn pop_front_drains_in_order() {
        let mut links = Links::new(3);
        let head = 2;
        links.insert_before(head, 0);
        links.insert_before(head, 1);
        assert_eq!(links.pop_front(head), Some(0));
        assert_eq!(links.pop_front(head), Some(1));
        assert_eq!(links.pop_front(head), None);
        assert!(links.is_list_empty(head));
    }

    #[test]
    fn node_moves_between_lists() {
        let mut links = Links::new(4);
        let (a, b) = (2, 3);
        links.insert_before(a, 0);
        links.insert_before(a, 1);
        links.remove(0);
        links.insert_before(b, 0);
        assert_eq!(collect(&links, a), vec![1]);
        assert_eq!(collect(&links, b), vec![0]);
    }
}

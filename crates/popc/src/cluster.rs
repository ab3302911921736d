//! A cluster: a membership list of record indices plus, for every attribute,
//! the number of members that have it set.
//!
//! Membership is a doubly linked list whose nodes live in a slot arena, so a
//! member can be unlinked in O(1) at a cursor while the list is being walked.
//! Attribute counts are maintained by the caller, separately from membership,
//! because a move needs the counts from before the move to score it.

#[derive(Debug, Clone, Copy)]
struct Node {
    instance: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Position in a cluster's membership list. `Cursor::end()` is one past the last member.
///
/// A cursor stays valid across additions and across removal of any member other
/// than the one it points at; use the cursor returned by
/// [`Cluster::remove_instance_at`] to keep walking after a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(Option<usize>);

impl Cursor {
    pub fn end() -> Self {
        Cursor(None)
    }

    pub fn is_end(self) -> bool {
        self.0.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    attribute_counts: Vec<usize>,
}

impl Cluster {
    pub fn new(num_attributes: usize) -> Self {
        Cluster {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            attribute_counts: vec![0; num_attributes],
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn num_attributes(&self) -> usize {
        self.attribute_counts.len()
    }

    /// Append `instance` to the membership. Attribute counts are left untouched.
    pub fn add_instance(&mut self, instance: usize) {
        let node = Node {
            instance,
            prev: self.tail,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
    }

    /// Unlink the member at `cursor` and return the cursor of the member after it.
    ///
    /// Panics when `cursor` is the end cursor.
    pub fn remove_instance_at(&mut self, cursor: Cursor) -> Cursor {
        let slot = cursor.0.expect("cannot remove at the end cursor");
        let Node { prev, next, .. } = self.nodes[slot];

        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }

        self.free.push(slot);
        self.len -= 1;
        Cursor(next)
    }

    #[inline]
    pub fn begin(&self) -> Cursor {
        Cursor(self.head)
    }

    /// Record index at `cursor`, `None` at the end.
    #[inline]
    pub fn get(&self, cursor: Cursor) -> Option<usize> {
        cursor.0.map(|slot| self.nodes[slot].instance)
    }

    #[inline]
    pub fn advance(&self, cursor: Cursor) -> Cursor {
        Cursor(cursor.0.and_then(|slot| self.nodes[slot].next))
    }

    #[inline]
    pub fn increment_attribute_count(&mut self, attribute: usize) {
        self.attribute_counts[attribute] += 1;
    }

    #[inline]
    pub fn decrement_attribute_count(&mut self, attribute: usize) {
        let count = &mut self.attribute_counts[attribute];
        assert!(*count > 0, "attribute {attribute} count is already zero");
        *count -= 1;
    }

    #[inline]
    pub fn attribute_count(&self, attribute: usize) -> usize {
        self.attribute_counts[attribute]
    }

    pub fn iter(&self) -> Members<'_> {
        Members {
            cluster: self,
            cursor: self.begin(),
        }
    }
}

impl<'a> IntoIterator for &'a Cluster {
    type Item = usize;
    type IntoIter = Members<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a cluster's members in insertion order.
#[derive(Debug, Clone)]
pub struct Members<'a> {
    cluster: &'a Cluster,
    cursor: Cursor,
}

impl Iterator for Members<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let instance = self.cluster.get(self.cursor)?;
        self.cursor = self.cluster.advance(self.cursor);
        Some(instance)
    }
}

//! Binary min-heap over [`Node`] keyed by f-cost, backing the A* open set.
use crate::grid_box::GridBox;
use crate::node::Node;

/// The open set for one search.
///
/// Heap order is by `f_cost`. Every reorder writes the moved node's
/// `heap_index` back through the search node arena, which keeps
/// [`NodeHeap::contains`] and [`NodeHeap::update_item`] O(1) lookups.
pub(crate) struct NodeHeap {
    items: Vec<Node>,
}

impl NodeHeap {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        NodeHeap {
            items: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn add(&mut self, mut item: Node, boxes: &[GridBox], nodes: &mut [Node]) {
        item.heap_index = self.items.len();
        boxes[item.box_index as usize].update_node(nodes, item);
        self.items.push(item);
        self.heapify_up(self.items.len() - 1, boxes, nodes);
    }

    /// Pops the node with the smallest f-cost. The heap must not be empty.
    pub(crate) fn remove_first(&mut self, boxes: &[GridBox], nodes: &mut [Node]) -> Node {
        let min = self.items[0];
        let last_index = self.items.len() - 1;
        let mut last = self.items[last_index];
        self.items.truncate(last_index);
        if !self.items.is_empty() {
            last.heap_index = 0;
            boxes[last.box_index as usize].update_node(nodes, last);
            self.items[0] = last;
            self.heapify_down(0, boxes, nodes);
        }
        min
    }

    /// Whether the cell addressed by `node` is currently in the open set.
    /// Relies on `node.heap_index` being current, which holds for any node
    /// read back from the search arena.
    pub(crate) fn contains(&self, node: &Node) -> bool {
        self.items
            .get(node.heap_index)
            .is_some_and(|held| held.same_cell(node))
    }

    /// Decrease-key: replaces the stored node with a cheaper copy and lets it
    /// float up.
    pub(crate) fn update_item(&mut self, node: Node, boxes: &[GridBox], nodes: &mut [Node]) {
        let index = node.heap_index;
        self.items[index] = node;
        self.heapify_up(index, boxes, nodes);
    }

    fn heapify_up(&mut self, mut index: usize, boxes: &[GridBox], nodes: &mut [Node]) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.items[index].f_cost() > self.items[parent].f_cost() {
                break;
            }
            self.swap(parent, index, boxes, nodes);
            index = parent;
        }
    }

    fn heapify_down(&mut self, mut index: usize, boxes: &[GridBox], nodes: &mut [Node]) {
        while index * 2 + 1 < self.items.len() {
            let mut child = index * 2 + 1;
            let right = index * 2 + 2;

            if right < self.items.len() && self.items[right].f_cost() < self.items[child].f_cost() {
                child = right;
            }

            if self.items[index].f_cost() < self.items[child].f_cost() {
                break;
            }

            self.swap(index, child, boxes, nodes);
            index = child;
        }
    }

    fn swap(&mut self, a: usize, b: usize, boxes: &[GridBox], nodes: &mut [Node]) {
        let mut node_a = self.items[a];
        let mut node_b = self.items[b];
        node_a.heap_index = b;
        node_b.heap_index = a;
        boxes[node_a.box_index as usize].update_node(nodes, node_a);
        boxes[node_b.box_index as usize].update_node(nodes, node_b);
        self.items[a] = node_b;
        self.items[b] = node_a;
    }
}

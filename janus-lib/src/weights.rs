// BSD 2-Clause License
//
// Copyright (c) 2019, 2020 Alasdair Armstrong
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
// notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
// notice, this list of conditions and the following disclaimer in the
// documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Weighted selection structures used by the searchers. [DiscretePdf]
//! is a red-black tree ordered by key whose nodes additionally carry
//! the total weight of their subtree, so an element can be picked with
//! probability proportional to its weight in time proportional to the
//! tree depth. [WeightedQueue] is the integer-weight variant with FIFO
//! order inside a weight bucket.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;

const NIL: usize = usize::MAX;

struct Node<T> {
    key: T,
    weight: f64,
    sum: f64,
    left: usize,
    right: usize,
    parent: usize,
    red: bool,
}

pub struct DiscretePdf<T> {
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    root: usize,
}

impl<T: Ord + Clone> DiscretePdf<T> {
    pub fn new() -> Self {
        DiscretePdf { nodes: Vec::new(), free: Vec::new(), root: NIL }
    }

    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    pub fn contains(&self, key: &T) -> bool {
        self.lookup(key).is_some()
    }

    pub fn get_weight(&self, key: &T) -> f64 {
        let n = self.lookup(key).expect("get_weight: item not in tree");
        self.nodes[n].weight
    }

    pub fn total_weight(&self) -> f64 {
        if self.root == NIL {
            0.0
        } else {
            self.nodes[self.root].sum
        }
    }

    pub fn insert(&mut self, key: T, weight: f64) {
        let mut p = NIL;
        let mut n = self.root;

        while n != NIL {
            if !self.left_is_black(n) && !self.right_is_black(n) {
                self.split(n)
            }

            p = n;
            match key.cmp(&self.nodes[n].key) {
                Ordering::Equal => panic!("insert: item already in tree"),
                Ordering::Less => n = self.nodes[n].left,
                Ordering::Greater => n = self.nodes[n].right,
            }
        }

        let less = p != NIL && key < self.nodes[p].key;
        let new = self.alloc(Node { key, weight, sum: 0.0, left: NIL, right: NIL, parent: p, red: false });

        if p == NIL {
            self.root = new
        } else {
            if less {
                self.nodes[p].left = new
            } else {
                self.nodes[p].right = new
            }
            self.split(new)
        }

        self.propagate_sums_up(new)
    }

    pub fn remove(&mut self, key: &T) {
        let mut n = self.lookup(key).expect("remove: item not in tree");

        if self.nodes[n].left != NIL {
            // Replace with the maximum of the left subtree, then
            // unlink that node instead
            let mut left_max = self.nodes[n].left;
            while self.nodes[left_max].right != NIL {
                left_max = self.nodes[left_max].right
            }
            self.nodes[n].key = self.nodes[left_max].key.clone();
            self.nodes[n].weight = self.nodes[left_max].weight;
            n = left_max
        }

        // n now has at most one child
        let child = if self.nodes[n].left != NIL { self.nodes[n].left } else { self.nodes[n].right };
        let parent = self.nodes[n].parent;
        self.replace_child(parent, n, child);

        if child != NIL {
            self.nodes[child].parent = parent;
            if !self.nodes[n].red {
                self.lengthen(child)
            }
        }

        let mut up = self.nodes[n].parent;
        while up != NIL {
            self.set_sum(up);
            up = self.nodes[up].parent
        }

        self.free.push(n)
    }

    pub fn update(&mut self, key: &T, weight: f64) {
        let n = self.lookup(key).expect("update: item not in tree");
        self.nodes[n].weight = weight;
        self.propagate_sums_up(n)
    }

    /// Pick an element according to its weight. `p` must be in [0,1).
    /// The element returned is the one whose cumulative weight prefix
    /// crosses `p` times the total weight, ties breaking towards
    /// smaller keys.
    pub fn choose(&self, p: f64) -> &T {
        assert!((0.0..1.0).contains(&p), "choose: argument outside valid range");
        assert!(self.root != NIL, "choose: called on empty tree");

        let mut w = self.nodes[self.root].sum * p;
        let mut n = self.root;

        loop {
            let left = self.nodes[n].left;
            if left != NIL {
                let left_sum = self.nodes[left].sum;
                if w < left_sum {
                    n = left;
                    continue;
                }
                w -= left_sum
            }
            if w < self.nodes[n].weight || self.nodes[n].right == NIL {
                break;
            }
            w -= self.nodes[n].weight;
            n = self.nodes[n].right
        }

        &self.nodes[n].key
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn lookup(&self, key: &T) -> Option<usize> {
        let mut n = self.root;
        while n != NIL {
            match key.cmp(&self.nodes[n].key) {
                Ordering::Equal => return Some(n),
                Ordering::Less => n = self.nodes[n].left,
                Ordering::Greater => n = self.nodes[n].right,
            }
        }
        None
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if parent == NIL {
            self.root = new
        } else if self.nodes[parent].left == old {
            self.nodes[parent].left = new
        } else {
            self.nodes[parent].right = new
        }
    }

    fn is_black(&self, n: usize) -> bool {
        n == NIL || !self.nodes[n].red
    }

    fn left_is_black(&self, n: usize) -> bool {
        self.is_black(self.nodes[n].left)
    }

    fn right_is_black(&self, n: usize) -> bool {
        self.is_black(self.nodes[n].right)
    }

    fn sibling(&self, n: usize) -> usize {
        let p = self.nodes[n].parent;
        if self.nodes[p].left == n {
            self.nodes[p].right
        } else {
            self.nodes[p].left
        }
    }

    fn set_sum(&mut self, n: usize) {
        let mut sum = self.nodes[n].weight;
        let (left, right) = (self.nodes[n].left, self.nodes[n].right);
        if left != NIL {
            sum += self.nodes[left].sum
        }
        if right != NIL {
            sum += self.nodes[right].sum
        }
        self.nodes[n].sum = sum
    }

    fn propagate_sums_up(&mut self, mut n: usize) {
        while n != NIL {
            self.set_sum(n);
            n = self.nodes[n].parent
        }
    }

    fn split(&mut self, n: usize) {
        let left = self.nodes[n].left;
        if left != NIL {
            self.nodes[left].red = false
        }
        let right = self.nodes[n].right;
        if right != NIL {
            self.nodes[right].red = false
        }

        let mut p = self.nodes[n].parent;
        if p != NIL {
            self.nodes[n].red = true;

            if !self.is_black(p) {
                let pp = self.nodes[p].parent;
                self.nodes[pp].red = true;

                let same_direction = (n == self.nodes[p].left && p == self.nodes[pp].left)
                    || (n == self.nodes[p].right && p == self.nodes[pp].right);
                if !same_direction {
                    self.rotate(n);
                    p = n
                }

                self.rotate(p);
                self.nodes[p].red = false
            }
        }
    }

    fn rotate(&mut self, n: usize) {
        let p = self.nodes[n].parent;
        let pp = self.nodes[p].parent;

        self.nodes[n].parent = pp;
        self.nodes[p].parent = n;

        if n == self.nodes[p].left {
            let moved = self.nodes[n].right;
            self.nodes[p].left = moved;
            self.nodes[n].right = p;
            if moved != NIL {
                self.nodes[moved].parent = p
            }
        } else {
            let moved = self.nodes[n].left;
            self.nodes[p].right = moved;
            self.nodes[n].left = p;
            if moved != NIL {
                self.nodes[moved].parent = p
            }
        }

        self.set_sum(p);
        self.set_sum(n);

        if pp == NIL {
            self.root = n
        } else if p == self.nodes[pp].left {
            self.nodes[pp].left = n
        } else {
            self.nodes[pp].right = n
        }
    }

    fn lengthen(&mut self, n: usize) {
        if !self.is_black(n) {
            self.nodes[n].red = false
        } else if self.nodes[n].parent != NIL {
            let parent = self.nodes[n].parent;
            let mut sibling = self.sibling(n);

            if sibling != NIL && !self.is_black(sibling) {
                self.nodes[parent].red = true;
                self.nodes[sibling].red = false;

                // The new sibling after the rotation must be black
                self.rotate(sibling);
                sibling = self.sibling(n)
            }

            if sibling == NIL {
                self.lengthen(parent)
            } else if self.left_is_black(sibling) && self.right_is_black(sibling) {
                if self.is_black(parent) {
                    self.nodes[sibling].red = true;
                    self.lengthen(parent)
                } else {
                    self.nodes[sibling].red = true;
                    self.nodes[parent].red = false
                }
            } else {
                if n == self.nodes[parent].left && self.right_is_black(sibling) {
                    // sibling's left child must be red
                    let inner = self.nodes[sibling].left;
                    self.rotate(inner);
                    self.nodes[sibling].red = true;
                    let up = self.nodes[sibling].parent;
                    self.nodes[up].red = false;
                    sibling = up
                } else if n == self.nodes[parent].right && self.left_is_black(sibling) {
                    // sibling's right child must be red
                    let inner = self.nodes[sibling].right;
                    self.rotate(inner);
                    self.nodes[sibling].red = true;
                    let up = self.nodes[sibling].parent;
                    self.nodes[up].red = false;
                    sibling = up
                }

                // sibling is black, and sibling's far child is red
                self.rotate(sibling);
                let parent = self.nodes[n].parent;
                if !self.is_black(parent) {
                    self.nodes[sibling].red = true
                }
                let left = self.nodes[sibling].left;
                if left != NIL {
                    self.nodes[left].red = false
                }
                let right = self.nodes[sibling].right;
                if right != NIL {
                    self.nodes[right].red = false
                }
            }
        }
    }
}

impl<T: Ord + Clone> Default for DiscretePdf<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer weights, FIFO within a bucket. `choose(p)` returns the head
/// of the least bucket whose weight is at least `p`, or the head of
/// the greatest bucket when `p` exceeds every weight.
pub struct WeightedQueue<T> {
    weight_to_queue: BTreeMap<u32, VecDeque<T>>,
    value_to_weight: HashMap<T, u32, ahash::RandomState>,
}

impl<T: Hash + Eq + Clone> WeightedQueue<T> {
    pub fn new() -> Self {
        WeightedQueue { weight_to_queue: BTreeMap::new(), value_to_weight: HashMap::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.value_to_weight.is_empty()
    }

    pub fn len(&self) -> usize {
        self.value_to_weight.len()
    }

    pub fn insert(&mut self, item: T, weight: u32) {
        assert!(!self.value_to_weight.contains_key(&item), "insert: item already in queue");
        self.value_to_weight.insert(item.clone(), weight);
        self.weight_to_queue.entry(weight).or_insert_with(VecDeque::new).push_back(item)
    }

    pub fn remove(&mut self, item: &T) {
        let weight = self.value_to_weight.remove(item).expect("remove: item not in queue");
        let queue = self.weight_to_queue.get_mut(&weight).unwrap();
        let at = queue.iter().position(|other| other == item).unwrap();
        queue.remove(at);
        if queue.is_empty() {
            self.weight_to_queue.remove(&weight);
        }
    }

    pub fn update(&mut self, item: &T, weight: u32) {
        let old_weight = *self.value_to_weight.get(item).expect("update: item not in queue");
        if old_weight != weight {
            self.remove(item);
            self.insert(item.clone(), weight)
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.value_to_weight.contains_key(item)
    }

    pub fn try_get_weight(&self, item: &T) -> Option<u32> {
        self.value_to_weight.get(item).copied()
    }

    pub fn min_weight(&self) -> u32 {
        self.weight_to_queue.keys().next().copied().unwrap_or(0)
    }

    pub fn max_weight(&self) -> u32 {
        self.weight_to_queue.keys().next_back().copied().unwrap_or(0)
    }

    pub fn choose(&self, p: u32) -> &T {
        assert!(!self.weight_to_queue.is_empty(), "choose: called on empty queue");
        if p >= self.max_weight() {
            let (_, queue) = self.weight_to_queue.iter().next_back().unwrap();
            return queue.front().unwrap();
        }
        for (weight, queue) in self.weight_to_queue.iter() {
            if p <= *weight {
                return queue.front().unwrap();
            }
        }
        unreachable!()
    }
}

impl<T: Hash + Eq + Clone> Default for WeightedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_sum(pdf: &DiscretePdf<char>, keys: &[(char, f64)]) -> f64 {
        keys.iter().filter(|(k, _)| pdf.contains(k)).map(|(_, w)| w).sum()
    }

    #[test]
    fn test_discrete_pdf_scenario() {
        let mut pdf = DiscretePdf::new();
        pdf.insert('a', 1.0);
        pdf.insert('b', 3.0);
        pdf.insert('c', 0.0001);
        assert_eq!(*pdf.choose(0.24), 'a');
        assert_eq!(*pdf.choose(0.25), 'b');
        assert_eq!(*pdf.choose(0.9999), 'b');
        pdf.remove(&'b');
        assert_eq!(pdf.get_weight(&'a'), 1.0);
    }

    #[test]
    fn test_choose_zero_smallest() {
        let mut pdf = DiscretePdf::new();
        pdf.insert('m', 2.0);
        pdf.insert('a', 1.0);
        pdf.insert('z', 4.0);
        assert_eq!(*pdf.choose(0.0), 'a')
    }

    #[test]
    fn test_sum_invariant() {
        let keys: Vec<(char, f64)> = vec![
            ('a', 1.5),
            ('b', 0.25),
            ('c', 3.0),
            ('d', 0.75),
            ('e', 2.0),
            ('f', 0.5),
            ('g', 1.0),
            ('h', 4.0),
        ];
        let mut pdf = DiscretePdf::new();
        for (k, w) in &keys {
            pdf.insert(*k, *w);
            assert!((pdf.total_weight() - live_sum(&pdf, &keys)).abs() < 1e-9)
        }
        for k in ['c', 'a', 'h', 'e'].iter() {
            pdf.remove(k);
            let expected: f64 = keys.iter().filter(|(key, _)| pdf.contains(key)).map(|(_, w)| w).sum();
            assert!((pdf.total_weight() - expected).abs() < 1e-9)
        }
        pdf.update(&'b', 10.0);
        assert!((pdf.total_weight() - (10.0 + 0.75 + 0.5 + 1.0)).abs() < 1e-9)
    }

    #[test]
    fn test_choose_positive_weight() {
        let mut pdf = DiscretePdf::new();
        pdf.insert(1u32, 0.5);
        pdf.insert(2u32, 0.0);
        pdf.insert(3u32, 0.5);
        for i in 0..100 {
            let p = i as f64 / 100.0;
            let chosen = *pdf.choose(p);
            assert!(pdf.get_weight(&chosen) > 0.0)
        }
    }

    #[test]
    #[should_panic]
    fn test_insert_duplicate() {
        let mut pdf = DiscretePdf::new();
        pdf.insert('a', 1.0);
        pdf.insert('a', 2.0);
    }

    #[test]
    #[should_panic]
    fn test_choose_empty() {
        let pdf: DiscretePdf<char> = DiscretePdf::new();
        pdf.choose(0.5);
    }

    #[test]
    fn test_weighted_queue_fifo() {
        let mut queue = WeightedQueue::new();
        queue.insert("first", 2);
        queue.insert("second", 2);
        queue.insert("light", 1);
        queue.insert("heavy", 5);
        assert_eq!(*queue.choose(0), "light");
        assert_eq!(*queue.choose(2), "first");
        // Past the maximum weight the greatest bucket answers
        assert_eq!(*queue.choose(100), "heavy");
        queue.remove(&"first");
        assert_eq!(*queue.choose(2), "second");
        queue.update(&"light", 7);
        assert_eq!(queue.max_weight(), 7);
        // The least bucket at or above the probe answers
        assert_eq!(*queue.choose(6), "light")
    }
}

//! Binary prefix trie over address bits.
//!
//! Backs every containment lookup in the crate: the store's `range` index
//! (CIDR block -> decision ids) and the network tables of the origin
//! resolver (CIDR block -> country / AS number).
//!
//! Each node sits at a prefix length; values are attached to the node for
//! their block. A lookup walks the candidate address from the most
//! significant bit and collects values on every node it passes, so all
//! containing blocks are found in `O(address bits)`.

use ipnet::IpNet;
use std::marker::PhantomData;
use std::net::IpAddr;

/// Fixed-width address key.
pub trait AddressBits: Copy {
    const BITS: u8;

    /// The bit at `index`, counting from the most significant bit.
    fn bit(self, index: u8) -> usize;
}

impl AddressBits for u32 {
    const BITS: u8 = 32;

    #[inline]
    fn bit(self, index: u8) -> usize {
        ((self >> (31 - index)) & 1) as usize
    }
}

impl AddressBits for u128 {
    const BITS: u8 = 128;

    #[inline]
    fn bit(self, index: u8) -> usize {
        ((self >> (127 - index)) & 1) as usize
    }
}

#[derive(Debug)]
struct Node<V> {
    children: [Option<Box<Node<V>>>; 2],
    values: Vec<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self {
            children: [None, None],
            values: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.iter().all(Option::is_none)
    }
}

/// Prefix trie for one address family.
#[derive(Debug)]
pub struct PrefixTrie<K, V> {
    root: Node<V>,
    len: usize,
    _key: PhantomData<K>,
}

impl<K: AddressBits, V: PartialEq> PrefixTrie<K, V> {
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            len: 0,
            _key: PhantomData,
        }
    }

    /// Attach `value` to the block `prefix/prefix_len`.
    ///
    /// Returns `false` if the same value is already attached to that block.
    pub fn insert(&mut self, prefix: K, prefix_len: u8, value: V) -> bool {
        let mut node = &mut self.root;
        for depth in 0..prefix_len.min(K::BITS) {
            node = &mut **node.children[prefix.bit(depth)]
                .get_or_insert_with(|| Box::new(Node::new()));
        }
        if node.values.contains(&value) {
            return false;
        }
        node.values.push(value);
        self.len += 1;
        true
    }

    /// Detach `value` from the block, pruning branches left empty.
    pub fn remove(&mut self, prefix: K, prefix_len: u8, value: &V) -> bool {
        let removed = Self::remove_at(&mut self.root, prefix, 0, prefix_len.min(K::BITS), value);
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn remove_at(node: &mut Node<V>, prefix: K, depth: u8, prefix_len: u8, value: &V) -> bool {
        if depth == prefix_len {
            let before = node.values.len();
            node.values.retain(|v| v != value);
            return node.values.len() != before;
        }

        let bit = prefix.bit(depth);
        let Some(child) = node.children[bit].as_mut() else {
            return false;
        };
        let removed = Self::remove_at(child, prefix, depth + 1, prefix_len, value);
        if removed && child.is_empty() {
            node.children[bit] = None;
        }
        removed
    }

    /// Values attached to exactly `prefix/prefix_len`.
    pub fn exact(&self, prefix: K, prefix_len: u8) -> &[V] {
        let mut node = &self.root;
        for depth in 0..prefix_len.min(K::BITS) {
            match &node.children[prefix.bit(depth)] {
                Some(child) => node = &**child,
                None => return &[],
            }
        }
        &node.values
    }

    /// Values of every block containing `addr`, most specific block first.
    pub fn matches(&self, addr: K) -> Vec<&V> {
        let mut found: Vec<&V> = self.root.values.iter().collect();
        let mut node = &self.root;
        for depth in 0..K::BITS {
            match &node.children[addr.bit(depth)] {
                Some(child) => {
                    node = &**child;
                    found.extend(node.values.iter());
                }
                None => break,
            }
        }
        found.reverse();
        found
    }

    /// Number of attached values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<K: AddressBits, V: PartialEq> Default for PrefixTrie<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A pair of tries covering both address families.
///
/// IPv4 and IPv6 live in separate tries, so a block of one family never
/// matches an address of the other.
#[derive(Debug)]
pub struct NetworkTrie<V> {
    v4: PrefixTrie<u32, V>,
    v6: PrefixTrie<u128, V>,
}

impl<V: PartialEq> NetworkTrie<V> {
    pub fn new() -> Self {
        Self {
            v4: PrefixTrie::new(),
            v6: PrefixTrie::new(),
        }
    }

    pub fn insert(&mut self, net: IpNet, value: V) -> bool {
        match net.trunc() {
            IpNet::V4(n) => self.v4.insert(u32::from(n.network()), n.prefix_len(), value),
            IpNet::V6(n) => self.v6.insert(u128::from(n.network()), n.prefix_len(), value),
        }
    }

    pub fn remove(&mut self, net: &IpNet, value: &V) -> bool {
        match net.trunc() {
            IpNet::V4(n) => self.v4.remove(u32::from(n.network()), n.prefix_len(), value),
            IpNet::V6(n) => self.v6.remove(u128::from(n.network()), n.prefix_len(), value),
        }
    }

    pub fn exact(&self, net: &IpNet) -> &[V] {
        match net.trunc() {
            IpNet::V4(n) => self.v4.exact(u32::from(n.network()), n.prefix_len()),
            IpNet::V6(n) => self.v6.exact(u128::from(n.network()), n.prefix_len()),
        }
    }

    /// Values of every block containing `addr`, most specific first.
    pub fn matches(&self, addr: IpAddr) -> Vec<&V> {
        match addr {
            IpAddr::V4(a) => self.v4.matches(u32::from(a)),
            IpAddr::V6(a) => self.v6.matches(u128::from(a)),
        }
    }

    /// Value of the most specific block containing `addr`.
    pub fn longest_match(&self, addr: IpAddr) -> Option<&V> {
        self.matches(addr).into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: PartialEq> Default for NetworkTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

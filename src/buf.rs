/*! Scatter-gather buffer chains.

A *buffer chain* is a singly-linked list of [`BufNode`]s, each naming one
contiguous region of caller-owned memory. A [`BufRef`] denotes a logical byte
range inside such a chain: it starts `offset` bytes into its first node and
runs for `tot_len` bytes, spanning zero or more successor nodes.

Operations on a `BufRef` never modify the nodes themselves; they only produce
new references into the same chain. The bytes are held as slices of
[`Cell<u8>`] so that overlapping references may read and write the same
storage from safe code; [`as_cells`] converts a caller's exclusive buffer into
that form.

Except where noted otherwise, operations require the reference to be *valid*:
the first node is present, `offset` points no further than the end of the
first node (pointing exactly to the end is permitted), and the chain holds at
least `tot_len` bytes past the offset. Violations are programmer errors and
are caught by assertions; a `BufRef` has no recoverable failure modes.
*/

use core::cell::Cell;
use core::cmp::min;
use core::fmt;

/// Convert exclusive access to a byte buffer into a shared cell slice.
///
/// This is how driver or application storage enters a buffer chain.
pub fn as_cells(buf: &mut [u8]) -> &[Cell<u8>] {
    Cell::from_mut(buf).as_slice_of_cells()
}

/// Node in a chain of memory buffers.
///
/// Holds the buffer data and the next node, if any. Nodes are created by
/// whoever owns the storage (typically a driver's receive ring or a send-side
/// scratch buffer) and are immutable once linked; chains are acyclic.
#[derive(Clone, Copy)]
pub struct BufNode<'a> {
    data: &'a [Cell<u8>],
    next: Option<&'a BufNode<'a>>,
}

impl<'a> BufNode<'a> {
    /// Create a node over `data`, continued by `next`.
    pub const fn new(data: &'a [Cell<u8>], next: Option<&'a BufNode<'a>>) -> BufNode<'a> {
        BufNode { data, next }
    }

    /// Length of this node's buffer.
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The buffer data.
    pub const fn data(&self) -> &'a [Cell<u8>] {
        self.data
    }

    /// The next node in the chain, if any.
    pub const fn next(&self) -> Option<&'a BufNode<'a>> {
        self.next
    }
}

impl fmt::Debug for BufNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BufNode")
            .field("len", &self.data.len())
            .field("chained", &self.next.is_some())
            .finish()
    }
}

/// Reference to a possibly discontiguous range of memory in a buffer chain.
///
/// `BufRef` is `Copy`; deriving sub-ranges or consuming bytes never affects
/// other references into the same chain.
#[derive(Clone, Copy)]
pub struct BufRef<'a> {
    node: Option<&'a BufNode<'a>>,
    offset: usize,
    tot_len: usize,
}

impl fmt::Debug for BufRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BufRef")
            .field("offset", &self.offset)
            .field("tot_len", &self.tot_len)
            .finish()
    }
}

impl<'a> BufRef<'a> {
    /// Create a reference covering `tot_len` bytes starting `offset` bytes
    /// into `node`.
    pub fn new(node: &'a BufNode<'a>, offset: usize, tot_len: usize) -> BufRef<'a> {
        let buf = BufRef {
            node: Some(node),
            offset,
            tot_len,
        };
        debug_assert!(buf.is_valid());
        buf
    }

    /// A reference to no bytes at all.
    pub const fn empty() -> BufRef<'static> {
        BufRef {
            node: None,
            offset: 0,
            tot_len: 0,
        }
    }

    /// Whether the chain actually holds the range this reference denotes.
    pub fn is_valid(&self) -> bool {
        let node = match self.node {
            Some(node) => node,
            None => return self.tot_len == 0,
        };
        if self.offset > node.len() {
            return false;
        }
        let mut avail = node.len() - self.offset;
        let mut next = node.next();
        while avail < self.tot_len {
            match next {
                Some(node) => {
                    avail += node.len();
                    next = node.next();
                }
                None => return false,
            }
        }
        true
    }

    fn head(&self) -> &'a BufNode<'a> {
        match self.node {
            Some(node) => node,
            None => panic!("buf: reference has no node"),
        }
    }

    /// The first node of the range, if any.
    pub const fn node(&self) -> Option<&'a BufNode<'a>> {
        self.node
    }

    /// Byte offset into the first node.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Total length of the range.
    pub const fn total_len(&self) -> usize {
        self.tot_len
    }

    /// The first contiguous chunk of the range.
    pub fn chunk(&self) -> &'a [Cell<u8>] {
        let node = self.head();
        &node.data()[self.offset..self.offset + self.chunk_len()]
    }

    /// Length of the first contiguous chunk: `min(tot_len, node.len - offset)`.
    pub fn chunk_len(&self) -> usize {
        let node = self.head();
        debug_assert!(self.offset <= node.len());
        min(self.tot_len, node.len() - self.offset)
    }

    /// Consume the current chunk and move to the next buffer in the range.
    ///
    /// Returns whether any data remains after the adjustment.
    pub fn next_chunk(&mut self) -> bool {
        let node = self.head();
        debug_assert!(self.offset <= node.len());
        self.tot_len -= min(self.tot_len, node.len() - self.offset);
        self.node = node.next();
        self.offset = 0;
        let more = self.tot_len > 0;
        debug_assert!(!more || self.node.is_some());
        more
    }

    /// Try to extend the range backward in the first buffer.
    ///
    /// Returns `None` if fewer than `amount` bytes precede the range in the
    /// first buffer. The extended prefix is not otherwise checked; the caller
    /// guarantees those bytes exist.
    pub fn reveal_header(&self, amount: usize) -> Option<BufRef<'a>> {
        if amount > self.offset {
            return None;
        }
        Some(BufRef {
            node: self.node,
            offset: self.offset - amount,
            tot_len: self.tot_len + amount,
        })
    }

    /// Extend the range backward in the first buffer, which must have room.
    pub fn reveal_header_must(&self, amount: usize) -> BufRef<'a> {
        assert!(amount <= self.offset);
        BufRef {
            node: self.node,
            offset: self.offset - amount,
            tot_len: self.tot_len + amount,
        }
    }

    /// Return the range without its first `amount` bytes, which must lie
    /// within the first chunk.
    pub fn hide_header(&self, amount: usize) -> BufRef<'a> {
        let node = self.head();
        assert!(self.offset <= node.len());
        assert!(amount <= node.len() - self.offset);
        assert!(amount <= self.tot_len);
        BufRef {
            node: self.node,
            offset: self.offset + amount,
            tot_len: self.tot_len - amount,
        }
    }

    /// Check that at least `amount` bytes are available in the first chunk
    /// alone.
    pub fn has_header(&self, amount: usize) -> bool {
        let node = self.head();
        debug_assert!(self.offset <= node.len());
        self.tot_len >= amount && node.len() - self.offset >= amount
    }

    /// Collapse the head of the range into a standalone node with the offset
    /// applied.
    pub fn to_node(&self) -> BufNode<'a> {
        let node = self.head();
        debug_assert!(self.offset <= node.len());
        BufNode {
            data: &node.data()[self.offset..],
            next: node.next(),
        }
    }

    /// Materialize a node covering the first `header_len` bytes of this range
    /// plus everything before them in the first buffer, continued by `cont`.
    ///
    /// Unlike [`to_node`](Self::to_node) the offset is *not* applied, so a
    /// reference built over the result (`BufRef::new(&node, self.offset(),
    /// total_len)`) can later be extended leftward with
    /// [`reveal_header`](Self::reveal_header) up to the original offset. The
    /// returned node must be kept alive for as long as any reference built
    /// over it; the borrow checker enforces this.
    pub fn sub_header_node(&self, header_len: usize, cont: Option<&'a BufNode<'a>>) -> BufNode<'a> {
        let node = self.head();
        assert!(self.offset <= node.len());
        assert!(header_len <= node.len() - self.offset);
        BufNode {
            data: &node.data()[..self.offset + header_len],
            next: cont,
        }
    }

    /// Consume `amount` bytes from the front of the range while processing
    /// them with `f`, which is called once per nonempty contiguous chunk.
    ///
    /// Advances to subsequent buffers *eagerly*: when consumption ends exactly
    /// at the end of a buffer that has a successor, the reference moves to the
    /// successor with offset zero. For ring-buffer chains this keeps the
    /// offset strictly below the buffer size, so the chain self-wraps.
    pub fn process_bytes<F>(&mut self, mut amount: usize, mut f: F)
    where
        F: FnMut(&'a [Cell<u8>]),
    {
        assert!(self.node.is_some());
        assert!(amount <= self.tot_len);

        loop {
            let node = self.head();
            debug_assert!(self.offset <= node.len());
            let rem_in_buf = node.len() - self.offset;

            if rem_in_buf > 0 {
                if amount == 0 {
                    return;
                }

                let take = min(rem_in_buf, amount);
                f(&node.data()[self.offset..self.offset + take]);

                self.tot_len -= take;

                if take < rem_in_buf || node.next().is_none() {
                    self.offset += take;
                    debug_assert_eq!(amount, take);
                    return;
                }

                amount -= take;
            } else if node.next().is_none() {
                debug_assert_eq!(amount, 0);
                return;
            }

            self.node = node.next();
            self.offset = 0;
        }
    }

    /// Consume `amount` bytes from the front of the range.
    pub fn skip_bytes(&mut self, amount: usize) {
        self.process_bytes(amount, |_| {});
    }

    /// Consume `dst.len()` bytes from the front of the range, copying them
    /// into `dst`.
    pub fn take_bytes(&mut self, dst: &mut [u8]) {
        let mut pos = 0;
        self.process_bytes(dst.len(), |chunk| {
            for (dst_byte, cell) in dst[pos..pos + chunk.len()].iter_mut().zip(chunk) {
                *dst_byte = cell.get();
            }
            pos += chunk.len();
        });
    }

    /// Consume `src.len()` bytes from the front of the range, filling the
    /// consumed part with bytes from `src`.
    pub fn give_bytes(&mut self, src: &[u8]) {
        let mut pos = 0;
        self.process_bytes(src.len(), |chunk| {
            for (cell, src_byte) in chunk.iter().zip(&src[pos..pos + chunk.len()]) {
                cell.set(*src_byte);
            }
            pos += chunk.len();
        });
    }

    /// Consume `src.total_len()` bytes from the front of the range, filling
    /// the consumed part with the bytes of another range.
    pub fn give_buf(&mut self, mut src: BufRef<'a>) {
        let amount = src.total_len();
        assert!(amount <= self.tot_len);
        self.process_bytes(amount, |chunk| {
            let mut pos = 0;
            src.process_bytes(chunk.len(), |src_chunk| {
                for (cell, src_cell) in chunk[pos..pos + src_chunk.len()].iter().zip(src_chunk) {
                    cell.set(src_cell.get());
                }
                pos += src_chunk.len();
            });
        });
    }

    /// Consume and return the leading byte of the range, which must not be
    /// empty.
    pub fn take_byte(&mut self) -> u8 {
        assert!(self.tot_len > 0);
        let mut byte = 0;
        self.process_bytes(1, |chunk| byte = chunk[0].get());
        byte
    }

    /// A prefix of this range with the same head and offset.
    ///
    /// The head node is allowed to be absent.
    pub fn sub_to(&self, new_tot_len: usize) -> BufRef<'a> {
        assert!(new_tot_len <= self.tot_len);
        BufRef {
            node: self.node,
            offset: self.offset,
            tot_len: new_tot_len,
        }
    }

    /// The sub-range of length `len` starting `offset` bytes into this range.
    pub fn sub_from_to(&self, offset: usize, len: usize) -> BufRef<'a> {
        let mut buf = *self;
        buf.skip_bytes(offset);
        buf.sub_to(len)
    }
}

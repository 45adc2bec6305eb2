/// A forward/backward cursor over a [`StoreReader`](crate::StoreReader)'s
/// fully-loaded sorted entries.
///
/// Forward-only in spirit (single position, no snapshot isolation beyond
/// "the reader's entries never change"), grounded in the donor's
/// `MergeIterator`'s pull-based advance shape, specialized here to a single
/// already-sorted source instead of an N-way merge.
pub struct Cursor<'a> {
    entries: &'a [(Vec<u8>, Vec<u8>)],
    pos: Option<usize>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(entries: &'a [(Vec<u8>, Vec<u8>)]) -> Self {
        Self { entries, pos: None }
    }

    fn at(&self, i: usize) -> (&'a [u8], &'a [u8]) {
        let (k, v) = &self.entries[i];
        (k.as_slice(), v.as_slice())
    }

    /// Positions at the first entry, if any.
    pub fn first(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        if self.entries.is_empty() {
            self.pos = None;
            return None;
        }
        self.pos = Some(0);
        Some(self.at(0))
    }

    /// Positions at the last entry, if any.
    pub fn last(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        if self.entries.is_empty() {
            self.pos = None;
            return None;
        }
        let i = self.entries.len() - 1;
        self.pos = Some(i);
        Some(self.at(i))
    }

    /// Advances to the next entry. Unpositioned cursors advance to the
    /// first entry, matching the donor's "next on a fresh iterator starts
    /// the walk" convention.
    pub fn next(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        let next_pos = match self.pos {
            None => 0,
            Some(i) => i + 1,
        };
        if next_pos >= self.entries.len() {
            self.pos = None;
            return None;
        }
        self.pos = Some(next_pos);
        Some(self.at(next_pos))
    }

    /// Moves to the previous entry. Unpositioned cursors move to the last
    /// entry.
    pub fn prev(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        let prev_pos = match self.pos {
            None => self.entries.len().checked_sub(1)?,
            Some(0) => {
                self.pos = None;
                return None;
            }
            Some(i) => i - 1,
        };
        self.pos = Some(prev_pos);
        Some(self.at(prev_pos))
    }

    /// Positions at the first entry whose key is `>= key` (lower bound).
    /// Returns `None`, clearing position, if every key is smaller.
    pub fn seek(&mut self, key: &[u8]) -> Option<(&'a [u8], &'a [u8])> {
        let idx = self
            .entries
            .partition_point(|(k, _)| k.as_slice() < key);
        if idx >= self.entries.len() {
            self.pos = None;
            return None;
        }
        self.pos = Some(idx);
        Some(self.at(idx))
    }

    /// The cursor's current position, if any.
    pub fn current(&self) -> Option<(&'a [u8], &'a [u8])> {
        self.pos.map(|i| self.at(i))
    }
}

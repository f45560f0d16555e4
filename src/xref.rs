use std::collections::BTreeMap;

/// One row of the cross-reference table, keyed by object number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Part of the free list (generation 65535 in the classical table, or
    /// type 0 in a stream); `next` is the next free object number.
    Free { next: u32, gen: u16 },
    /// A free-list entry whose chain is broken/unusable — still "free",
    /// but not something to hand out on re-use.
    UnusableFree,
    /// A live object at a known byte offset.
    Normal { offset: u32, generation: u16 },
    /// An object packed inside an object stream.
    Compressed { container: u32, index: u16 },
}

/// The merged view of a document's cross-reference table(s), after
/// following every `/Prev` link.
#[derive(Debug, Clone, Default)]
pub struct Xref {
    pub size: u32,
    pub entries: BTreeMap<u32, XrefEntry>,
    /// Set by the classical-table parser when a subsection's first object
    /// number is non-zero (§4.D.4). `None` for xref streams, which always
    /// carry an explicit `/Index`.
    pub zero_index_candidate: Option<u32>,
}

impl Xref {
    pub fn new(size: u32) -> Self {
        Xref {
            size,
            entries: BTreeMap::new(),
            zero_index_candidate: None,
        }
    }

    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    pub fn insert(&mut self, id: u32, entry: XrefEntry) {
        self.entries.insert(id, entry);
    }

    pub fn max_id(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    /// Merge an earlier revision's table into this one. Per §4.D.3, the
    /// first occurrence of an object id wins, so `self` (the
    /// tail-most/most-recent table already accumulated) keeps its entries
    /// and only gains ids it did not already have.
    pub fn merge(&mut self, prev: Xref) {
        for (id, entry) in prev.entries {
            self.entries.entry(id).or_insert(entry);
        }
        if prev.size > self.size {
            self.size = prev.size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_first_occurrence() {
        let mut newer = Xref::new(3);
        newer.insert(1, XrefEntry::Normal { offset: 100, generation: 0 });
        let mut older = Xref::new(3);
        older.insert(1, XrefEntry::Normal { offset: 10, generation: 0 });
        older.insert(2, XrefEntry::Normal { offset: 20, generation: 0 });

        newer.merge(older);
        assert_eq!(newer.get(1), Some(&XrefEntry::Normal { offset: 100, generation: 0 }));
        assert_eq!(newer.get(2), Some(&XrefEntry::Normal { offset: 20, generation: 0 }));
    }

    #[test]
    fn max_id_is_highest_known_object_number() {
        let mut xref = Xref::new(1);
        xref.insert(7, XrefEntry::Normal { offset: 1, generation: 0 });
        assert_eq!(xref.max_id(), 7);
    }
}

use crate::{
    error::{IndexError, Result},
    ItemId,
};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::debug;

/// The number of item identifiers a single page holds.
pub const PAGE_CAPACITY: usize = 1023;

/// The link value of a page with no successor.
const TERMINAL: u32 = u32::MAX;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPage")]
/// A fixed-capacity run of item identifiers, linked to the next page of its bucket by position.
pub struct Page {
    count: u32,
    link: u32,
    #[serde_as(as = "[_; PAGE_CAPACITY]")]
    items: [ItemId; PAGE_CAPACITY],
}

#[serde_as]
#[derive(Deserialize)]
struct RawPage {
    count: u32,
    link: u32,
    #[serde_as(as = "[_; PAGE_CAPACITY]")]
    items: [ItemId; PAGE_CAPACITY],
}

impl TryFrom<RawPage> for Page {
    type Error = IndexError;

    fn try_from(raw: RawPage) -> Result<Self> {
        if raw.count as usize > PAGE_CAPACITY {
            return Err(IndexError::Corrupt(format!(
                "page holds {} items, more than its capacity of {PAGE_CAPACITY}",
                raw.count
            )));
        }
        Ok(Self {
            count: raw.count,
            link: raw.link,
            items: raw.items,
        })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            count: 0,
            link: TERMINAL,
            items: [0; PAGE_CAPACITY],
        }
    }
}

impl Page {
    /// The identifiers stored on this page, in insertion order.
    pub fn items(&self) -> &[ItemId] {
        &self.items[..self.count as usize]
    }

    /// The number of identifiers stored on this page.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether this page holds no identifiers.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether this page has no room left.
    pub fn is_full(&self) -> bool {
        self.len() == PAGE_CAPACITY
    }

    /// The position of the next page in the chain, if any.
    pub fn next(&self) -> Option<usize> {
        match self.link {
            TERMINAL => None,
            link => Some(link as usize),
        }
    }

    fn link_to(&mut self, position: usize) {
        self.link = position as u32;
    }

    fn push(&mut self, item: ItemId) {
        assert!(!self.is_full(), "cannot add to a full page");
        self.items[self.count as usize] = item;
        self.count += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStorage")]
/// An append-only arena of pages.
///
/// Pages refer to one another by their position in the arena rather than by address, so the arena may grow, be copied, or be serialised without invalidating any chain.
/// Pages are never freed.
///
/// Deserialising checks that every link points at an allocated page, that no page has two predecessors, and that no chain loops.
pub struct Storage {
    pages: Vec<Page>,
}

#[derive(Deserialize)]
struct RawStorage {
    pages: Vec<Page>,
}

impl TryFrom<RawStorage> for Storage {
    type Error = IndexError;

    fn try_from(raw: RawStorage) -> Result<Self> {
        let pages = raw.pages;
        if pages.len() >= TERMINAL as usize {
            return Err(IndexError::Corrupt(format!(
                "{} pages cannot be addressed",
                pages.len()
            )));
        }

        let mut has_predecessor = vec![false; pages.len()];
        for (position, page) in pages.iter().enumerate() {
            let Some(next) = page.next() else {
                continue;
            };
            if next >= pages.len() {
                return Err(IndexError::Corrupt(format!(
                    "page {position} links to page {next}, but only {} pages exist",
                    pages.len()
                )));
            }
            if std::mem::replace(&mut has_predecessor[next], true) {
                return Err(IndexError::Corrupt(format!(
                    "page {next} is linked from more than one page"
                )));
            }
        }

        // With at most one predecessor per page, every chain either starts at a page
        // without one or is a loop.
        let mut reached = vec![false; pages.len()];
        for head in (0..pages.len()).filter(|p| !has_predecessor[*p]) {
            let mut position = Some(head);
            while let Some(p) = position {
                reached[p] = true;
                position = pages[p].next();
            }
        }
        if let Some(position) = reached.iter().position(|r| !r) {
            return Err(IndexError::Corrupt(format!(
                "page {position} is part of a loop"
            )));
        }

        Ok(Self { pages })
    }
}

impl Storage {
    /// Append an empty, unlinked page.
    ///
    /// # Returns
    ///
    /// The position of the new page.
    pub fn allocate_page(&mut self) -> Result<usize> {
        let position = self.pages.len();
        if position >= TERMINAL as usize {
            return Err(IndexError::Exhausted { pages: position });
        }
        self.pages
            .try_reserve(1)
            .map_err(|_| IndexError::Exhausted { pages: position })?;
        self.pages.push(Page::default());
        debug!(page = position, "allocated page");
        Ok(position)
    }

    /// Add an item to the end of a chain of pages.
    ///
    /// The chain is walked from `start` to its tail. If the tail is full, a new page is allocated and linked after it.
    ///
    /// # Arguments
    ///
    /// * `item` - The identifier to store.
    ///
    /// * `start` - The position of a page in the chain, usually its head.
    ///
    /// # Returns
    ///
    /// The position of the page now holding `item`.
    ///
    /// # Panics
    ///
    /// If no page has been allocated at `start`.
    pub fn add(&mut self, item: ItemId, start: usize) -> Result<usize> {
        let mut tail = start;
        for (position, _) in self.pages(start) {
            tail = position;
        }

        if self.pages[tail].is_full() {
            let next = self.allocate_page()?;
            self.pages[tail].link_to(next);
            tail = next;
        }

        self.pages[tail].push(item);
        Ok(tail)
    }

    /// The page at `position`.
    ///
    /// # Panics
    ///
    /// If no page has been allocated at `position`.
    pub fn page(&self, position: usize) -> &Page {
        &self.pages[position]
    }

    /// The number of pages allocated.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no pages have been allocated.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Iterate over a chain of pages.
    ///
    /// # Arguments
    ///
    /// * `head` - The position of the first page to visit.
    ///
    /// # Returns
    ///
    /// An iterator of each page in the chain and its position, ending after the page with no successor.
    pub fn pages(&self, head: usize) -> PageIter<'_> {
        PageIter {
            storage: self,
            next: Some(head),
        }
    }
}

/// A forward-only walk along a chain of pages.
pub struct PageIter<'a> {
    storage: &'a Storage,
    next: Option<usize>,
}

impl<'a> Iterator for PageIter<'a> {
    type Item = (usize, &'a Page);

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.next?;
        let page = self.storage.page(position);
        self.next = page.next();
        Some((position, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_is_empty_and_terminal() {
        let mut storage = Storage::default();
        let head = storage.allocate_page().unwrap();
        assert_eq!(head, 0);
        let page = storage.page(head);
        assert!(page.is_empty());
        assert_eq!(page.next(), None);
        assert_eq!(storage.pages(head).count(), 1);
    }

    #[test]
    fn fills_a_page_before_linking() {
        let mut storage = Storage::default();
        let head = storage.allocate_page().unwrap();
        for i in 0..PAGE_CAPACITY as u64 {
            assert_eq!(storage.add(i, head).unwrap(), head);
        }
        assert!(storage.page(head).is_full());
        assert_eq!(storage.len(), 1);

        let second = storage.add(PAGE_CAPACITY as u64, head).unwrap();
        assert_ne!(second, head);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.page(head).next(), Some(second));
        assert_eq!(storage.page(second).items(), &[PAGE_CAPACITY as u64]);
    }

    #[test]
    fn chains_are_independent() {
        let mut storage = Storage::default();
        let a = storage.allocate_page().unwrap();
        let b = storage.allocate_page().unwrap();
        for i in 0..(PAGE_CAPACITY as u64 + 5) {
            storage.add(i, a).unwrap();
            if i % 2 == 0 {
                storage.add(i, b).unwrap();
            }
        }

        let a_pages: Vec<usize> = storage.pages(a).map(|(p, _)| p).collect();
        let b_pages: Vec<usize> = storage.pages(b).map(|(p, _)| p).collect();
        assert_eq!(a_pages, vec![a, 2]);
        assert_eq!(b_pages, vec![b]);

        let a_items: Vec<ItemId> = storage
            .pages(a)
            .flat_map(|(_, page)| page.items().iter().copied())
            .collect();
        assert_eq!(a_items, (0..(PAGE_CAPACITY as u64 + 5)).collect::<Vec<_>>());
        assert_eq!(storage.page(b).len(), (PAGE_CAPACITY + 5).div_ceil(2));
    }

    #[test]
    fn adding_from_the_middle_of_a_chain_reaches_the_tail() {
        let mut storage = Storage::default();
        let head = storage.allocate_page().unwrap();
        for i in 0..(2 * PAGE_CAPACITY as u64 + 1) {
            storage.add(i, head).unwrap();
        }
        let middle = storage.page(head).next().unwrap();
        let tail = storage.add(99, middle).unwrap();
        assert_eq!(storage.pages(head).last().map(|(p, _)| p), Some(tail));
        assert_eq!(storage.page(tail).items(), &[2 * PAGE_CAPACITY as u64, 99]);
    }

    fn decode(storage: &Storage) -> std::result::Result<Storage, bincode::error::DecodeError> {
        let config = bincode::config::standard();
        let bytes = bincode::serde::encode_to_vec(storage, config).unwrap();
        bincode::serde::decode_from_slice(&bytes, config).map(|(s, _)| s)
    }

    #[test]
    fn decoding_keeps_valid_chains() {
        let mut storage = Storage::default();
        let a = storage.allocate_page().unwrap();
        let b = storage.allocate_page().unwrap();
        for i in 0..(PAGE_CAPACITY as u64 + 3) {
            storage.add(i, a).unwrap();
        }
        storage.add(7, b).unwrap();
        assert_eq!(decode(&storage).unwrap(), storage);
    }

    #[test]
    fn decoding_rejects_overfull_page() {
        let mut storage = Storage::default();
        storage.allocate_page().unwrap();
        storage.pages[0].count = 2000;
        assert!(decode(&storage).is_err());
    }

    #[test]
    fn decoding_rejects_dangling_link() {
        let mut storage = Storage::default();
        let head = storage.allocate_page().unwrap();
        storage.add(1, head).unwrap();
        storage.pages[head].link_to(7);
        assert!(decode(&storage).is_err());
    }

    #[test]
    fn decoding_rejects_shared_and_looping_chains() {
        let mut shared = Storage::default();
        for _ in 0..3 {
            shared.allocate_page().unwrap();
        }
        shared.pages[0].link_to(2);
        shared.pages[1].link_to(2);
        assert!(decode(&shared).is_err());

        let mut looping = Storage::default();
        for _ in 0..3 {
            looping.allocate_page().unwrap();
        }
        looping.pages[1].link_to(2);
        looping.pages[2].link_to(1);
        assert!(decode(&looping).is_err());

        let mut self_loop = Storage::default();
        self_loop.allocate_page().unwrap();
        self_loop.pages[0].link_to(0);
        assert!(decode(&self_loop).is_err());
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn adding_to_an_unallocated_page_panics() {
        let mut storage = Storage::default();
        storage.allocate_page().unwrap();
        let _ = storage.add(1, 5);
    }
}

// ============================================================================
// Book Registry
// One lock per symbol; the map itself is only write-locked to add a book
// ============================================================================

use crate::domain::OrderBook;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A symbol's in-memory book plus whether it still has to be (re)loaded from
/// the store before it can be trusted.
///
/// Books start stale. The engine loads a stale book the first time it takes
/// the lock, so a symbol first seen after a restart still starts from what
/// the store holds.
#[derive(Debug)]
pub struct SymbolBook {
    book: OrderBook,
    stale: bool,
}

impl SymbolBook {
    fn new(symbol: &str) -> Self {
        Self {
            book: OrderBook::new(symbol),
            stale: true,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Force a reload from the store on the next operation
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Install a book freshly rebuilt from the store
    pub fn replace(&mut self, book: OrderBook) {
        self.book = book;
        self.stale = false;
    }
}

impl Deref for SymbolBook {
    type Target = OrderBook;

    fn deref(&self) -> &OrderBook {
        &self.book
    }
}

impl DerefMut for SymbolBook {
    fn deref_mut(&mut self) -> &mut OrderBook {
        &mut self.book
    }
}

/// Shared handle to a symbol's book. Holding its mutex serializes every
/// operation on that symbol.
pub type BookHandle = Arc<Mutex<SymbolBook>>;

#[derive(Default)]
pub struct BookRegistry {
    books: RwLock<HashMap<String, BookHandle>>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<BookHandle> {
        self.books.read().get(symbol).cloned()
    }

    /// Fetch the book for `symbol`, creating a stale one on first use.
    /// Concurrent first calls for the same symbol get the same handle.
    pub fn get_or_create(&self, symbol: &str) -> BookHandle {
        if let Some(book) = self.get(symbol) {
            return book;
        }

        let mut books = self.books.write();
        Arc::clone(
            books
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SymbolBook::new(symbol)))),
        )
    }

    /// Symbols with a book, sorted
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.books.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_or_create_is_stable() {
        let registry = BookRegistry::new();
        assert!(registry.get("BTCUSD").is_none());

        let first = registry.get_or_create("BTCUSD");
        let second = registry.get_or_create("BTCUSD");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().symbol(), "BTCUSD");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_new_books_start_stale() {
        let registry = BookRegistry::new();
        let handle = registry.get_or_create("BTCUSD");
        let mut slot = handle.lock();
        assert!(slot.is_stale());

        slot.replace(OrderBook::new("BTCUSD"));
        assert!(!slot.is_stale());

        slot.mark_stale();
        assert!(slot.is_stale());
    }

    #[test]
    fn test_concurrent_creation_yields_one_book() {
        let registry = Arc::new(BookRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get_or_create("ETHUSD"))
            })
            .collect();

        let books: Vec<BookHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(books.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.symbols(), vec!["ETHUSD".to_string()]);
    }
}

//! Interned strings for names and descriptions.
//!
//! Every name or description is held in two forms: the raw text with its
//! color codes and the color-stripped form used for matching and width math.
//! Both live in the interner pool, so repeated names across thousands of
//! objects share one allocation.

use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Interner {
    pool: HashSet<Arc<str>>,
}

impl Interner {
    pub fn intern(&mut self, text: &str) -> Arc<str> {
        if let Some(found) = self.pool.get(text) {
            return found.clone();
        }
        let entry: Arc<str> = Arc::from(text);
        self.pool.insert(entry.clone());
        entry
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

/// A piece of user-authored text in raw and color-stripped form.
#[derive(Debug, Clone)]
pub struct StyledText {
    pub raw: Arc<str>,
    pub plain: Arc<str>,
}

impl StyledText {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn plain(&self) -> &str {
        &self.plain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_allocations() {
        let mut interner = Interner::default();
        let a = interner.intern("a rusty sword");
        let b = interner.intern("a rusty sword");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);

        let c = interner.intern("an iron sword");
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(interner.len(), 2);
    }
}

//! String interning for identifiers and string literals.
//!
//! Mirrors the teacher's `intern` module: strings are stored once in a
//! dense vector and referenced everywhere else by a small `StringId`,
//! avoiding clones of identifier text through every layer of the analyzer
//! and IR.

use ahash::AHashMap;

/// Index into the [`StringTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interns identifiers and string-literal content by value.
///
/// Populated during declaration processing (§4.3) and kept alive for the
/// lifetime of the compiled unit; `StringLiteral`s (§3.3) are backed by
/// entries in this table and their reference count is kept alive for the
/// lifetime of the program per spec.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: Vec<String>,
    index: AHashMap<String, StringId>,
}

impl StringTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning the existing id if already present.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("string table overflow"));
        self.strings.push(s.to_owned());
        self.index.insert(s.to_owned(), id);
        id
    }

    #[must_use]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::StringTable;

    #[test]
    fn interning_is_by_content() {
        let mut t = StringTable::new();
        let a = t.intern("foo");
        let b = t.intern("bar");
        let c = t.intern("foo");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(t.resolve(a), "foo");
        assert_eq!(t.resolve(b), "bar");
    }
}

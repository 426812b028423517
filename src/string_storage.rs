use std::collections::HashMap;

/// Handle to a pooled string; valid for the lifetime of its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(usize);

impl StringId {
    /// Position of the string in pool order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Append-only, de-duplicating string pool.
///
/// Backs both the lexer's identifier/literal text and the program's
/// string-literal pool. Entries never move, so a `StringId` stays valid
/// for as long as the pool lives.
#[derive(Debug, Clone, Default)]
pub struct StringStorage {
    strings: Vec<String>,
    lookup: HashMap<String, StringId>,
}

impl StringStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool `s`, returning the existing handle when it is already present
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }

        let id = StringId(self.strings.len());
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), id);
        id
    }

    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.0]
    }

    pub fn find(&self, s: &str) -> Option<StringId> {
        self.lookup.get(s).copied()
    }

    /// Pooled strings in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (StringId, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(idx, s)| (StringId(idx), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

//! Case-insensitive identifier interning.
//!
//! HLASM names — variable symbols, macro names, keyword parameters, sequence
//! symbols — compare without regard to case. Names are uppercased once at
//! the boundary and interned; everything downstream compares [`Ident`]
//! handles by identity instead of re-uppercasing strings on every lookup.
//! Interned names live for the whole analysis run and are never freed
//! individually.

use std::collections::HashMap;
use std::fmt;

/// A stable handle for an interned, uppercased name.
///
/// Equality and ordering are by identity: two handles are equal exactly when
/// they were interned from the same (case-folded) spelling in the same
/// [`IdentTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ident(u32);

impl Ident {
    /// The raw table index. Exposed for dense side tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The identifier table for one analysis run.
#[derive(Debug, Default)]
pub struct IdentTable {
    names: Vec<String>,
    lookup: HashMap<String, Ident>,
}

impl IdentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, case-insensitively. Returns the existing handle if the
    /// uppercased spelling was seen before.
    pub fn intern(&mut self, name: &str) -> Ident {
        let upper = name.to_uppercase();
        if let Some(&id) = self.lookup.get(&upper) {
            return id;
        }
        let id = Ident(self.names.len() as u32);
        self.names.push(upper.clone());
        self.lookup.insert(upper, id);
        id
    }

    /// Look up a name without interning it. Returns `None` if the name has
    /// never been interned.
    pub fn get(&self, name: &str) -> Option<Ident> {
        self.lookup.get(&name.to_uppercase()).copied()
    }

    /// The canonical (uppercased) spelling of a handle.
    pub fn resolve(&self, id: Ident) -> &str {
        &self.names[id.index()]
    }

    /// Number of distinct names interned.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

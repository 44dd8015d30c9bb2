//! # Opaque identifiers for managers, categories and tasks.
//!
//! A [`Key`] is either a **name** (any string) or a **symbol**: a
//! process-unique identifier carrying a description, which never compares
//! equal to any name or to another symbol.
//!
//! ```rust
//! use catvisor::Key;
//!
//! let a = Key::symbol("session");
//! let b = Key::symbol("session");
//! assert_ne!(a, b);
//! assert_ne!(a, Key::from("Symbol(session)"));
//! assert_eq!(a.to_string(), "Symbol(session)");
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter backing [`Key::symbol`].
static SYMBOL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Comparable identifier used for manager ids, categories and task ids.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Plain string identifier.
    Name(Arc<str>),
    /// Unique identifier; `id` is drawn from a process-wide counter.
    Symbol {
        /// Unique id.
        id: u64,
        /// Description used for display only.
        description: Arc<str>,
    },
}

impl Key {
    /// Creates a name key.
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Key::Name(name.into())
    }

    /// Creates a fresh symbol; every call returns a distinct key.
    pub fn symbol(description: impl Into<Arc<str>>) -> Self {
        Key::Symbol {
            id: SYMBOL_SEQ.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    /// Returns `true` for an empty name, which the supervisor treats as "missing".
    ///
    /// Symbols are never empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Key::Name(name) if name.is_empty())
    }

    /// Returns the name, or `None` for symbols.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(name) => Some(name),
            Key::Symbol { .. } => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) if name.is_empty() => f.write_str("undefined"),
            Key::Name(name) => f.write_str(name),
            Key::Symbol { description, .. } => write!(f, "Symbol({description})"),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{name:?}"),
            Key::Symbol { id, description } => write!(f, "Symbol({description})#{id}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Name(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Name(value.into())
    }
}

impl From<Arc<str>> for Key {
    fn from(value: Arc<str>) -> Self {
        Key::Name(value)
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_compare_by_value() {
        assert_eq!(Key::from("a"), Key::name(String::from("a")));
        assert_ne!(Key::from("a"), Key::from("b"));
    }

    #[test]
    fn empty_name_is_missing() {
        assert!(Key::from("").is_empty());
        assert!(!Key::from("x").is_empty());
        assert!(!Key::symbol("").is_empty());
        assert_eq!(Key::from("").to_string(), "undefined");
    }

    #[test]
    fn symbols_are_unique() {
        let a = Key::symbol("s");
        assert_eq!(a.clone(), a);
        assert_ne!(a, Key::symbol("s"));
        assert_eq!(a.as_name(), None);
    }
}

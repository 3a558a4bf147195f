//! Collision-free naming.
//!
//! A [`NameReconciler`] holds the set of names already taken in one run.
//! [`reconcile`](NameReconciler::reconcile) returns the desired name when it
//! is free, otherwise the first free `"{desired}_{n}"` for `n = 1, 2, 3, ...`,
//! and reserves the result so later candidates in the same run see it.
//!
//! The set is a local copy taken at the start of a run. It does not protect
//! against other writers creating datasets in the same workspace meanwhile.

use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct NameReconciler {
    taken: HashSet<String>,
    fold_case: bool,
}

impl NameReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciler that treats names differing only in ASCII case as equal.
    /// Used for file names, which collide on case-insensitive filesystems.
    pub fn ignore_case() -> Self {
        Self {
            taken: HashSet::new(),
            fold_case: true,
        }
    }

    /// Reconciler seeded with names that already exist.
    pub fn with_existing<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut reconciler = Self::new();
        for name in names {
            reconciler.reserve(name.as_ref());
        }
        reconciler
    }

    fn key(&self, name: &str) -> String {
        if self.fold_case {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Marks `name` as taken. Returns false if it already was.
    pub fn reserve(&mut self, name: &str) -> bool {
        let key = self.key(name);
        self.taken.insert(key)
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(&self.key(name))
    }

    /// Number of reserved names
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }

    /// Returns a name unique within this reconciler and reserves it.
    pub fn reconcile(&mut self, desired: &str) -> String {
        if self.reserve(desired) {
            return desired.to_string();
        }
        let mut n: u64 = 1;
        loop {
            let candidate = format!("{desired}_{n}");
            if self.reserve(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

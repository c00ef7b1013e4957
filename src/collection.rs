use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

pub trait Keyed {
    type Key: PartialEq + fmt::Display;

    fn key(&self) -> &Self::Key;
}

pub trait Patchable {
    type Patch;

    fn patched(&self, patch: Self::Patch) -> Self;
}

/// Edits share untouched elements with the previous value, and an edit that
/// matches nothing returns the same list, so `ptr_eq` reports "unchanged".
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection<T>(Arc<Vec<Arc<T>>>);

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self(Arc::new(Vec::new()))
    }
}

impl<T: fmt::Debug> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for Collection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.iter().eq(other.iter())
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().map(Arc::new).collect()))
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.0.iter().map(|entry| &**entry)
    }

    pub fn first(&self) -> Option<&T> {
        self.0.first().map(|entry| &**entry)
    }

    pub fn shared(&self, index: usize) -> Option<&Arc<T>> {
        self.0.get(index)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn with_entries(entries: Vec<Arc<T>>) -> Self {
        Self(Arc::new(entries))
    }
}

impl<T: Keyed> Collection<T> {
    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        T::Key: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.0.iter().position(|entry| key_matches(entry.key(), key))
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        T::Key: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entry(key).map(|entry| &**entry)
    }

    pub fn entry<Q>(&self, key: &Q) -> Option<&Arc<T>>
    where
        T::Key: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.position(key).map(|index| &self.0[index])
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.position(key).is_some()
    }

    pub fn insert(&self, item: T) -> AppResult<Self> {
        if self.0.iter().any(|entry| entry.key() == item.key()) {
            return Err(AppError::Validation(format!("duplicate id {}", item.key())));
        }
        let mut entries = Vec::with_capacity(self.0.len() + 1);
        entries.extend(self.0.iter().cloned());
        entries.push(Arc::new(item));
        Ok(Self::with_entries(entries))
    }

    pub fn update<Q, F>(&self, key: &Q, f: F) -> Self
    where
        T::Key: Borrow<Q>,
        Q: PartialEq + ?Sized,
        F: FnOnce(&T) -> T,
    {
        match self.try_update(key, |current| Ok(f(current))) {
            Ok(updated) => updated,
            Err(_) => self.clone(),
        }
    }

    pub fn try_update<Q, F>(&self, key: &Q, f: F) -> AppResult<Self>
    where
        T::Key: Borrow<Q>,
        Q: PartialEq + ?Sized,
        F: FnOnce(&T) -> AppResult<T>,
    {
        let Some(index) = self.position(key) else {
            return Ok(self.clone());
        };
        let updated = f(&*self.0[index])?;
        let mut entries = self.0.as_ref().clone();
        entries[index] = Arc::new(updated);
        Ok(Self::with_entries(entries))
    }

    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        T::Key: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        if !self.contains(key) {
            return self.clone();
        }
        let entries = self
            .0
            .iter()
            .filter(|entry| !key_matches(entry.key(), key))
            .cloned()
            .collect();
        Self::with_entries(entries)
    }

    pub fn upsert(&self, item: T) -> Self {
        match self.position(item.key()) {
            Some(index) => {
                let mut entries = self.0.as_ref().clone();
                entries[index] = Arc::new(item);
                Self::with_entries(entries)
            }
            None => {
                let mut entries = self.0.as_ref().clone();
                entries.push(Arc::new(item));
                Self::with_entries(entries)
            }
        }
    }
}

fn key_matches<K, Q>(candidate: &K, key: &Q) -> bool
where
    K: Borrow<Q>,
    Q: PartialEq + ?Sized,
{
    <K as Borrow<Q>>::borrow(candidate) == key
}

impl<T: Keyed + Patchable> Collection<T> {
    pub fn replace<Q>(&self, key: &Q, patch: T::Patch) -> Self
    where
        T::Key: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.update(key, |current| current.patched(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::{Collection, Keyed, Patchable};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        label: String,
    }

    impl Keyed for Row {
        type Key = String;

        fn key(&self) -> &String {
            &self.id
        }
    }

    impl Patchable for Row {
        type Patch = Option<String>;

        fn patched(&self, patch: Option<String>) -> Self {
            Self {
                id: self.id.clone(),
                label: patch.unwrap_or_else(|| self.label.clone()),
            }
        }
    }

    fn row(id: &str, label: &str) -> Row {
        Row {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    fn sample() -> Collection<Row> {
        vec![row("a", "alpha"), row("b", "beta"), row("c", "gamma")].into()
    }

    #[test]
    fn insert_appends_and_rejects_duplicate_ids() {
        let rows = sample();
        let grown = rows.insert(row("d", "delta")).expect("insert");
        assert_eq!(grown.len(), 4);
        assert_eq!(grown.iter().last().map(|r| r.id.as_str()), Some("d"));
        assert!(rows.insert(row("b", "again")).is_err());
    }

    #[test]
    fn insert_then_remove_restores_original_order() {
        let rows = sample();
        let restored = rows.insert(row("z", "zeta")).expect("insert").remove("z");
        assert_eq!(restored, rows);
        let ids: Vec<&str> = restored.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn replace_shares_untouched_elements() {
        let rows = sample();
        let edited = rows.replace("b", Some("BETA".to_string()));
        assert!(!edited.ptr_eq(&rows));
        assert_eq!(edited.get("b").map(|r| r.label.as_str()), Some("BETA"));
        assert!(Arc::ptr_eq(rows.entry("a").expect("a"), edited.entry("a").expect("a")));
        assert!(Arc::ptr_eq(rows.entry("c").expect("c"), edited.entry("c").expect("c")));
        assert!(!Arc::ptr_eq(rows.entry("b").expect("b"), edited.entry("b").expect("b")));
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let rows = sample();
        assert!(rows.replace("missing", Some("x".to_string())).ptr_eq(&rows));
        assert!(rows.remove("missing").ptr_eq(&rows));
    }

    #[test]
    fn upsert_replaces_in_place_or_appends() {
        let rows = sample();
        let replaced = rows.upsert(row("a", "ALPHA"));
        assert_eq!(replaced.first().map(|r| r.label.as_str()), Some("ALPHA"));
        assert_eq!(replaced.len(), 3);
        let appended = rows.upsert(row("e", "epsilon"));
        assert_eq!(appended.len(), 4);
    }

    #[test]
    fn serializes_as_plain_array() {
        let rows: Collection<u32> = vec![1, 2, 3].into();
        assert_eq!(serde_json::to_string(&rows).expect("json"), "[1,2,3]");
        let parsed: Collection<u32> = serde_json::from_str("[4,5]").expect("parse");
        assert_eq!(parsed.iter().copied().collect::<Vec<_>>(), vec![4, 5]);
    }
}

//! Per-request scratch space.
//!
//! Middlewares put values in, handlers take them out. Keys are one flat,
//! case-sensitive namespace shared by every producer and consumer of a
//! request; pick prefixes (`"auth.user"`) if you need separation.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

type Value = Box<dyn Any + Send + Sync>;

/// Typed key-value store, allocated empty for every request.
#[derive(Default)]
pub struct ContextStore {
    values: HashMap<String, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Returns the value under `key` if one is present and has type `T`.
    ///
    /// `None` means absent (or stored with another type); a stored zero
    /// value comes back as `Some`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key)?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key)?.downcast_mut()
    }

    /// Whether anything is stored under `key`, regardless of its type.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Removes and returns the value under `key` if it has type `T`.
    ///
    /// A value of another type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key)?.is::<T>() {
            return None;
        }
        let boxed = self.values.remove(key)?;
        boxed.downcast().ok().map(|b: Box<T>| *b)
    }

    /// Binds the value under `key` to `T`, falling back to `T::default()`.
    ///
    /// The fallback applies when the key is absent, when the stored value has
    /// another type, **and** when the stored value equals `T::default()`.
    /// A legitimately stored `0` or `""` is therefore indistinguishable from
    /// "absent" here; use [`get`](Self::get) when that distinction matters.
    pub fn bind<T>(&self, key: &str) -> T
    where
        T: Any + Clone + Default + PartialEq,
    {
        match self.get::<T>(key) {
            Some(value) if *value != T::default() => value.clone(),
            _ => T::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

use std::{
    collections::{btree_map, BTreeMap},
    env,
};

use tracing::debug;

pub const HOME: &str = "HOME";
pub const PATH: &str = "PATH";
pub const COMSPEC: &str = "COMSPEC";

/// A snapshot of process environment variables.
///
/// Everything downstream reads and writes this value instead of the live
/// process environment, and child processes receive exactly its contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Captures the current process environment, skipping variables that
    /// are not valid Unicode.
    pub fn capture() -> Self {
        let vars = env::vars_os()
            .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    debug!(key = ?key, "skipping non-unicode environment variable");
                    None
                }
            })
            .collect();
        Self { vars }
    }

    /// Looks up `key`, falling back to an ASCII case-insensitive match
    /// (Windows spells `PATH` as `Path`).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.resolve_key(key)
            .and_then(|key| self.vars.get(key))
            .map(String::as_str)
    }

    /// Like [`Environment::get`], but treats an empty value as unset.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|it| !it.is_empty())
    }

    /// Sets `key`, overwriting a case-insensitive match if one exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let key = self.resolve_key(&key).map_or(key, str::to_owned);
        self.vars.insert(key, value.into());
    }

    /// Overlays `other` onto `self`; keys in `other` win.
    pub fn overlay(&mut self, other: Environment) {
        for (key, value) in other.vars {
            self.set(key, value);
        }
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn resolve_key(&self, key: &str) -> Option<&str> {
        if let Some((key, _)) = self.vars.get_key_value(key) {
            return Some(key);
        }
        self.vars
            .keys()
            .find(|it| it.eq_ignore_ascii_case(key))
            .map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut env = Environment::default();
        for (key, value) in iter {
            env.set(key, value);
        }
        env
    }
}

impl<'a> IntoIterator for &'a Environment {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

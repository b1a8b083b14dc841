//! Attribute key remapping tables.

use serde::Deserialize;
use std::collections::HashMap;

/// What a remapping table says about one attribute key.
#[derive(Debug, PartialEq, Eq)]
pub enum Conversion<'a> {
    /// Store the value under another key.
    Rename(&'a str),
    /// Mapped to an empty name: drop the attribute.
    Discard,
}

/// Maps incoming attribute keys to the key a sink should use instead.
///
/// An empty target removes the attribute altogether.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct KeyConversions(HashMap<String, String>);

impl KeyConversions {
    pub fn get(&self, key: &str) -> Option<Conversion<'_>> {
        self.0.get(key).map(|target| match target.as_str() {
            "" => Conversion::Discard,
            target => Conversion::Rename(target),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for KeyConversions {
    fn from(pairs: [(&str, &str); N]) -> Self {
        KeyConversions(
            pairs
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        )
    }
}

use std::iter::FromIterator;
use std::ops::Index;
use std::slice;

/// A single URL parameter, consisting of a key and a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Param {
    pub key: String,
    pub value: String,
}

/// The parameters bound by a dynamic route, in declaration order.
///
/// A matched request carries its `Params` in the request extensions.
/// ```rust
/// # use routemark::Params;
/// let mut params = Params::default();
/// params.push("post", "42");
/// params.push("comment", "7");
///
/// assert_eq!(params.get("post"), Some("42"));
/// assert_eq!(params[1].key, "comment");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn with_capacity(capacity: usize) -> Self {
        Params(Vec::with_capacity(capacity))
    }

    /// Returns the value of the first parameter named `name`.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.0
            .iter()
            .find(|param| param.key == name)
            .map(|param| param.value.as_str())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(Param {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Param> {
        self.0.iter()
    }
}

impl Index<usize> for Params {
    type Output = Param;

    fn index(&self, i: usize) -> &Param {
        &self.0[i]
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::default();
        for (key, value) in iter {
            params.push(key, value);
        }
        params
    }
}

//! Ordered, case-insensitive, multi-valued header collection

/// HTTP headers
///
/// Names compare case-insensitively but keep the casing they were first
/// inserted with. Insertion order of names is preserved, and each name maps
/// to one or more values.
///
/// Headers read from a response are converted lossily: bytes that are not
/// valid UTF-8 become U+FFFD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Create an empty header collection
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// All values stored under `name`
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.position(name)
            .map(|index| self.entries[index].1.as_slice())
    }

    /// First value stored under `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Whether a header with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Replace every value of `name` with `value`
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1 = vec![value],
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Add `value` to the values of `name`
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Remove `name`, returning its values
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name)
            .map(|index| self.entries.remove(index).1)
    }

    /// Iterate over names and their values in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no headers
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge these headers over `defaults`
    ///
    /// Every name in `self` is kept with all its values. A default is only
    /// added when no header of the same name (ignoring case) is present.
    pub fn merged_over(&self, defaults: &Headers) -> Headers {
        let mut merged = self.clone();
        for (name, values) in defaults.iter() {
            if !merged.contains(name) {
                merged.entries.push((name.to_string(), values.to_vec()));
            }
        }
        merged
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K, V> Extend<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.append(name, value);
        }
    }
}

/// Values that are not valid UTF-8 are converted lossily
impl From<&reqwest::header::HeaderMap> for Headers {
    fn from(map: &reqwest::header::HeaderMap) -> Self {
        let mut headers = Headers::new();
        for (name, value) in map {
            headers.append(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        headers
    }
}

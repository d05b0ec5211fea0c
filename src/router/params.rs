//! Route parameters extracted by the router's match step.

/// Named path parameters (e.g. `:id`) for one matched request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathParams {
    inner: Vec<(String, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Value of the named parameter, if the pattern declared it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_get() {
        let mut params = PathParams::new();
        assert!(params.is_empty());
        params.push("id", "42");
        params.push("section", "notes");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("section"), Some("notes"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.iter().map(|(n, _)| n).collect::<Vec<_>>(), ["id", "section"]);
    }
}

use ahash::AHashSet as HashSet;

/// Routes that never require session validation.
///
/// Membership is exact string equality; `/login` does not exclude
/// `/login/reset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExclusionSet(HashSet<String>);

// === impl ExclusionSet ===

impl ExclusionSet {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(routes.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    /// Returns `true` if the route was not already excluded.
    pub fn insert(&mut self, route: &str) -> bool {
        if self.0.contains(route) {
            return false;
        }
        self.0.insert(route.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new([crate::LOGIN_ROUTE])
    }
}

impl std::str::FromStr for ExclusionSet {
    type Err = std::convert::Infallible;

    /// Parses a comma-separated list, ignoring blank entries.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(
            s.split(',').map(str::trim).filter(|r| !r.is_empty()),
        ))
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

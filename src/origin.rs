use std::collections::HashSet;
use url::{Origin, Url};

/// The allow-list of origins whose requests get digest handling. Origins are compared in
/// their normalized form, so `http://Example.com:80` and `http://example.com` are the same.
#[derive(Debug, Clone, Default)]
pub struct OriginGate {
    origins: HashSet<Origin>,
}

impl OriginGate {
    pub fn new(origins: impl IntoIterator<Item = Origin>) -> Self {
        Self {
            origins: origins.into_iter().filter(Origin::is_tuple).collect(),
        }
    }

    /// Returns the origin of `url` if it is on the allow-list.
    pub fn admit(&self, url: &Url) -> Option<Origin> {
        let origin = url.origin();
        self.origins.contains(&origin).then_some(origin)
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

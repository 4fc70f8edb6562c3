use std::{collections::BTreeMap, ops::Deref};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// Appends `other`, keeping existing values when keys collide.
    #[must_use]
    pub fn append_reverse(mut self, other: impl Into<BTreeMap<String, String>>) -> Self {
        for (key, value) in other.into() {
            self.0.entry(key).or_insert(value);
        }
        self
    }
}

impl Deref for Labels {
    type Target = BTreeMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Labels> for BTreeMap<String, String> {
    fn from(value: Labels) -> Self {
        value.0
    }
}

impl From<BTreeMap<String, String>> for Labels {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}

impl From<&Labels> for BTreeMap<String, String> {
    fn from(value: &Labels) -> Self {
        value.0.clone()
    }
}

use std::{
    fmt::{Display, Formatter, Result},
    ops::Deref,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectNamespace(String);

impl Deref for ObjectNamespace {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ObjectNamespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ObjectNamespace {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&ObjectNamespace> for String {
    fn from(value: &ObjectNamespace) -> Self {
        value.0.clone()
    }
}

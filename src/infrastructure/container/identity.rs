//! 资源标识

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// 容器中资源槽位的唯一名称
///
/// 内部使用 `Arc<str>`，克隆开销很小，可以在容器、类型索引和错误信息之间自由传递。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Arc<str>);

impl Identity {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:?})", &*self.0)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&Identity> for Identity {
    fn from(id: &Identity) -> Self {
        id.clone()
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_identity_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Identity::from("db"), 1);

        assert_eq!(map.get("db"), Some(&1));
        assert_eq!(Identity::from(String::from("db")), Identity::new("db"));
    }

    #[test]
    fn test_identity_display() {
        let id = Identity::from("logger");
        assert_eq!(id.to_string(), "logger");
        assert_eq!(format!("{:?}", id), "Identity(\"logger\")");
    }
}

//! Extended attribute value types.

use serde::{Deserialize, Serialize};

/// A named attribute and its value, as read from a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtAttribute {
    pub key: String,
    pub value: Vec<u8>,
}

impl ExtAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The value as UTF-8, if it is valid UTF-8.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Write modifier for `setxattr`.
///
/// The discriminants match `CEPH_XATTR_CREATE` / `CEPH_XATTR_REPLACE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XattrFlags {
    /// Create or replace.
    Upsert,
    /// Fail with `EEXIST` if the attribute exists.
    Create,
    /// Fail with `ENOATTR` if the attribute does not exist.
    Replace,
}

impl XattrFlags {
    /// Flag word for `ceph_setxattr`.
    pub const fn as_raw(self) -> i32 {
        match self {
            XattrFlags::Upsert => 0,
            XattrFlags::Create => 1,
            XattrFlags::Replace => 2,
        }
    }
}

/// Split a `listxattr` buffer of NUL-terminated names.
///
/// Empty segments are skipped; names that are not valid UTF-8 are decoded
/// lossily.
pub fn parse_name_list(buf: &[u8]) -> Vec<String> {
    buf.split(|b| *b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_str() {
        let attr = ExtAttribute::new("user.label", "v1");
        assert_eq!(attr.value_str(), Some("v1"));

        let binary = ExtAttribute::new("user.blob", vec![0xff, 0xfe]);
        assert_eq!(binary.value_str(), None);
    }

    #[test]
    fn test_flag_values() {
        assert_eq!(XattrFlags::Upsert.as_raw(), 0);
        assert_eq!(XattrFlags::Create.as_raw(), 1);
        assert_eq!(XattrFlags::Replace.as_raw(), 2);
    }

    #[test]
    fn test_parse_name_list() {
        assert!(parse_name_list(b"").is_empty());
        assert_eq!(parse_name_list(b"user.a\0"), vec!["user.a"]);
        assert_eq!(
            parse_name_list(b"user.a\0user.bb\0ceph.dir.layout\0"),
            vec!["user.a", "user.bb", "ceph.dir.layout"]
        );
    }

    #[test]
    fn test_parse_name_list_unterminated_tail() {
        assert_eq!(parse_name_list(b"user.a\0user.b"), vec!["user.a", "user.b"]);
    }
}

//! Lexical path resolution against a tracked working directory.
//!
//! Paths inside a mounted filesystem are always `/`-separated and rooted at
//! the mount root, independent of the host platform, so this operates on
//! strings rather than `std::path`.

/// Normalize an absolute path, resolving `.` and `..` without filesystem
/// access. `..` at the root stays at the root.
pub fn normalize(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            c => components.push(c),
        }
    }
    if components.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for c in components {
        out.push('/');
        out.push_str(c);
    }
    out
}

/// Resolve `path` against `cwd`. Absolute paths ignore `cwd`.
pub fn resolve(cwd: &str, path: &str) -> String {
    if path.starts_with('/') {
        normalize(path)
    } else {
        normalize(&format!("{}/{}", cwd, path))
    }
}

/// Parent directory of a normalized absolute path.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/b/../c/./d"), "/a/c/d");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("//a//b/"), "/a/b");
        assert_eq!(normalize("/../.."), "/");
    }

    #[test]
    fn test_resolve_absolute() {
        assert_eq!(resolve("/base", "/absolute"), "/absolute");
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve("/base", "relative"), "/base/relative");
        assert_eq!(resolve("/base/dir", "../x"), "/base/x");
        assert_eq!(resolve("/", "."), "/");
        assert_eq!(resolve("/test", ""), "/test");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/a/b"), "/a");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/"), "/");
    }
}

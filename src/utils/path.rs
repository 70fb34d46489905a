//! Path splitting and the working-directory rewrite rule.

/// Split a path at its last `/` into `(prefix, last)`.
///
/// An empty prefix means the path has no directory part and resolves against
/// the current directory; a prefix of `"/"` means the entry lives in root.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        None => ("", path),
        Some(0) => ("/", &path[1..]),
        Some(index) => (&path[..index], &path[index + 1..]),
    }
}

/// Rewrite the current path for a single `cd` step.
///
/// An absolute component replaces the path outright, `.` keeps it, `..` drops
/// the last component (staying at `/` when already there), and anything else
/// is appended.
pub fn rewrite_path(current: &str, component: &str) -> String {
    if component.starts_with('/') {
        return component.to_string();
    }

    let mut parts: Vec<&str> = current.split('/').filter(|p| !p.is_empty()).collect();
    match component {
        "." => {}
        ".." => {
            parts.pop();
        }
        name => parts.push(name),
    }

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Join a directory path and a child name with a single `/`.
pub fn compose_path(base: &str, child: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{child}")
    } else {
        format!("{base}/{child}")
    }
}

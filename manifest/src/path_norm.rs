use crate::error::Error;

/// Normalizes a manifest-relative path: accepts `\` and `/` as separators,
/// drops empty and `.` segments, and rejects any `..` segment outright.
/// The returned string always uses `/` and is what both the signer and the
/// verifier hash under, regardless of which separator convention produced
/// the manifest.
pub fn normalize_rel_path(raw: &str) -> Result<String, Error> {
    let mut segments = Vec::new();

    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(Error::UnsafePath(raw.to_string())),
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(Error::UnsafePath(raw.to_string()));
    }

    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_forward_slashes() {
        assert_eq!(normalize_rel_path("a/b/c.txt").unwrap(), "a/b/c.txt");
    }

    #[test]
    fn accepts_backslashes() {
        assert_eq!(normalize_rel_path("a\\b\\c.txt").unwrap(), "a/b/c.txt");
    }

    #[test]
    fn drops_empty_and_dot_segments() {
        assert_eq!(normalize_rel_path("./a//b/./c.txt").unwrap(), "a/b/c.txt");
    }

    #[test]
    fn rejects_parent_segment() {
        assert!(matches!(normalize_rel_path("a/../b"), Err(Error::UnsafePath(_))));
        assert!(matches!(normalize_rel_path("../a"), Err(Error::UnsafePath(_))));
    }

    #[test]
    fn rejects_empty_path() {
        assert!(matches!(normalize_rel_path(""), Err(Error::UnsafePath(_))));
        assert!(matches!(normalize_rel_path("./."), Err(Error::UnsafePath(_))));
    }
}

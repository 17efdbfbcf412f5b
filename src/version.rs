use std::cmp::Ordering;
use std::path::Path;

use log::debug;

const FALLBACK_VERSION: &str = "0.0.0.0";
const VERSION_FILENAME: &str = "version.txt";

/// Reads the four-part version installed in a slot. Tries `version.txt` at
/// the slot root first, then falls back to the `version` field of the
/// slot's own (unverified) manifest, then to "0.0.0.0" if neither is
/// present or parsable.
pub fn local_version(slot_dir: &Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(slot_dir.join(VERSION_FILENAME)) {
        let candidate = contents.trim();
        if parse_components(candidate).is_some() {
            return candidate.to_string();
        }
    }

    if let Ok(parsed) = manifest::parse(&slot_dir.join("manifest.json")) {
        if parse_components(&parsed.version).is_some() {
            return parsed.version;
        }
    }

    debug!("no readable version marker under {}, treating as {FALLBACK_VERSION}", slot_dir.display());
    FALLBACK_VERSION.to_string()
}

fn parse_components(version: &str) -> Option<[u64; 4]> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 4 {
        return None;
    }

    let mut components = [0u64; 4];
    for (i, component) in components.iter_mut().enumerate() {
        *component = parts[i].parse().ok()?;
    }
    Some(components)
}

/// `local` is up-to-date relative to `remote` iff `local >= remote`
/// componentwise, most significant component first. Either string failing
/// to parse as four dot-separated integers is treated as "not up-to-date",
/// to force an update attempt rather than silently trusting a malformed
/// version.
pub fn is_up_to_date(local: &str, remote: &str) -> bool {
    let (Some(local), Some(remote)) = (parse_components(local), parse_components(remote)) else {
        return false;
    };

    for i in 0..4 {
        match local[i].cmp(&remote[i]) {
            Ordering::Greater => return true,
            Ordering::Less => return false,
            Ordering::Equal => continue,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_version_txt_when_present() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(VERSION_FILENAME), "1.2.3.4\n").unwrap();
        assert_eq!(local_version(dir.path()), "1.2.3.4");
    }

    #[test]
    fn falls_back_to_zero_when_nothing_readable() {
        let dir = tempdir().unwrap();
        assert_eq!(local_version(dir.path()), FALLBACK_VERSION);
    }

    #[test]
    fn falls_back_to_zero_when_version_txt_is_garbage() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(VERSION_FILENAME), "not-a-version").unwrap();
        assert_eq!(local_version(dir.path()), FALLBACK_VERSION);
    }

    #[test]
    fn equal_versions_are_up_to_date() {
        assert!(is_up_to_date("1.2.3.4", "1.2.3.4"));
    }

    #[test]
    fn greater_local_is_up_to_date() {
        assert!(is_up_to_date("2.0.0.0", "1.9.9.9"));
    }

    #[test]
    fn lesser_local_is_not_up_to_date() {
        assert!(!is_up_to_date("1.0.0.0", "1.0.0.1"));
    }

    #[test]
    fn comparison_is_exactly_one_directional_for_distinct_versions() {
        let v1 = "1.2.3.4";
        let v2 = "1.2.3.5";
        assert_ne!(is_up_to_date(v1, v2), is_up_to_date(v2, v1));
    }

    #[test]
    fn malformed_version_is_never_up_to_date() {
        assert!(!is_up_to_date("1.2.3", "1.0.0.0"));
        assert!(!is_up_to_date("1.0.0.0", "not-a-version"));
    }

    #[test]
    fn first_component_short_circuits() {
        assert!(is_up_to_date("9.0.0.0", "1.999.999.999"));
        assert!(!is_up_to_date("1.999.999.999", "9.0.0.0"));
    }
}

//! Set element hashing and self-link comparison helpers.

use sha2::{Digest, Sha256};

use super::value::Value;

/// Computes a stable set element code from arbitrary text.
#[must_use]
pub fn hash_code(input: &str) -> u32 {
    let digest = Sha256::digest(input.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Hashes a string element by its content.
#[must_use]
pub fn hash_string(value: &Value) -> u32 {
    hash_code(&value.canonical())
}

/// Hashes a self-link element by its project-relative path, so a full URL
/// and its `projects/...` suffix land on the same code.
#[must_use]
pub fn hash_self_link(value: &Value) -> u32 {
    let raw = value.as_str().unwrap_or_default();
    hash_code(relative_path(raw))
}

/// Hashes a block element over all of its non-zero fields.
#[must_use]
pub fn hash_block(value: &Value) -> u32 {
    hash_code(&value.canonical())
}

/// Returns the `projects/...` suffix of a resource URL, or the input when
/// it has none.
#[must_use]
pub fn relative_path(link: &str) -> &str {
    link.find("projects/").map_or(link, |idx| &link[idx..])
}

/// Returns the last path segment of a resource URL.
#[must_use]
pub fn resource_name(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

/// Diff suppressor treating two self-links as equal when their relative
/// paths match.
#[must_use]
pub fn compare_self_link_relative_paths(_key: &str, old: &str, new: &str) -> bool {
    relative_path(old) == relative_path(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path("https://www.googleapis.com/compute/v1/projects/p/global/instanceTemplates/t1"),
            "projects/p/global/instanceTemplates/t1"
        );
        assert_eq!(relative_path("t1"), "t1");
    }

    #[test]
    fn test_self_link_hash_matches_relative_form() {
        let full = Value::from(
            "https://www.googleapis.com/compute/beta/projects/p/regions/us-central1/targetPools/pool",
        );
        let short = Value::from("projects/p/regions/us-central1/targetPools/pool");
        assert_eq!(hash_self_link(&full), hash_self_link(&short));
        assert_ne!(hash_string(&full), hash_string(&short));
    }

    #[test]
    fn test_compare_relative_paths() {
        assert!(compare_self_link_relative_paths(
            "instance_template",
            "https://www.googleapis.com/compute/v1/projects/p/global/instanceTemplates/t1",
            "projects/p/global/instanceTemplates/t1",
        ));
        assert!(!compare_self_link_relative_paths(
            "instance_template",
            "projects/p/global/instanceTemplates/t1",
            "projects/p/global/instanceTemplates/t2",
        ));
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(
            resource_name("https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-c"),
            "us-central1-c"
        );
        assert_eq!(resource_name("us-central1-c"), "us-central1-c");
    }

    #[test]
    fn test_hash_code_is_stable() {
        assert_eq!(hash_code("alpha"), hash_code("alpha"));
        assert_ne!(hash_code("alpha"), hash_code("beta"));
    }
}

//! Compile-time build information.

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// `cultivation <version> (<date>, <commit>)`, with the profile appended
/// for anything but release builds.
pub fn version_line() -> String {
    let line = format!(
        "cultivation {} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        BUILD_DATE,
        BUILD_COMMIT
    );
    if BUILD_PROFILE == "release" {
        line
    } else {
        format!("{} [{}]", line, BUILD_PROFILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_not_empty() {
        assert!(!BUILD_COMMIT.is_empty());
        assert!(!BUILD_DATE.is_empty());
    }

    #[test]
    fn test_build_commit_format() {
        // Should be 7 chars or "unknown"
        assert!(BUILD_COMMIT == "unknown" || BUILD_COMMIT.len() == 7);
    }

    #[test]
    fn test_version_line_mentions_commit() {
        assert!(version_line().starts_with("cultivation "));
        assert!(version_line().contains(BUILD_COMMIT));
    }

    #[test]
    fn test_version_line_marks_non_release_builds() {
        assert!(!BUILD_PROFILE.is_empty());
        assert_eq!(
            version_line().ends_with(&format!("[{}]", BUILD_PROFILE)),
            BUILD_PROFILE != "release"
        );
    }
}

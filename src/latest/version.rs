//! Firmware version numbers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\.([0-9]+)(?:\.([0-9]+))?").expect("Invalid version pattern regex")
});

/// A `major.minor.patch` version, ordered component-wise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub [u64; 3]);

impl Version {
    /// Extracts the first version number found anywhere in `s`.
    ///
    /// A missing patch component reads as 0. Returns `None` when `s` has no
    /// version or a component overflows.
    pub fn extract(s: &str) -> Option<Self> {
        let caps = VERSION_PATTERN.captures(s)?;
        let mut parts = [0u64; 3];
        for (i, part) in parts.iter_mut().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                *part = m.as_str().parse().ok()?;
            }
        }
        Some(Self(parts))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0, 0, 0]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0[0], self.0[1], self.0[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_upgrade_url() {
        let v = Version::extract(
            "https://kbdownload1-a.akamaihd.net/firmwares/kobo7/Mar2020/kobo-update-4.20.14601.zip",
        );
        assert_eq!(v, Some(Version([4, 20, 14601])));
    }

    #[test]
    fn test_extract_two_components() {
        assert_eq!(Version::extract("v3.19"), Some(Version([3, 19, 0])));
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(Version::extract("no version here"), None);
        assert_eq!(Version::extract(""), None);
    }

    #[test]
    fn test_extract_with_surrounding_text() {
        let cases = [
            ("", Version::default()),
            ("1", Version::default()),
            ("1.2", Version([1, 2, 0])),
            ("1.2.3", Version([1, 2, 3])),
            ("1.2.3.4", Version([1, 2, 3])),
        ];
        for (input, expected) in cases {
            for prefix in ["", "asd", "."] {
                for suffix in ["", "asd", ".", ".a123"] {
                    let s = format!("{}{}{}", prefix, input, suffix);
                    assert_eq!(Version::extract(&s).unwrap_or_default(), expected, "input {:?}", s);
                }
            }
        }
    }

    #[test]
    fn test_ordering() {
        assert!(Version([4, 20, 14601]) > Version([4, 19, 99999]));
        assert!(Version([4, 20, 14601]) > Version([4, 20, 14600]));
        assert!(Version([5, 0, 0]) > Version([4, 99, 99]));
        assert!(Version::default() < Version([0, 0, 1]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Version([4, 20, 14601]).to_string(), "4.20.14601");
        assert!(Version::default().is_zero());
    }
}

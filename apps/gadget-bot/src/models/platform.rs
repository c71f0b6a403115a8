use std::fmt;
use std::str::FromStr;

use crate::error::InvalidRequest;

/// Client operating systems a profile can be delivered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Ios,
    Android,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Windows,
        Platform::MacOs,
        Platform::Linux,
        Platform::Ios,
        Platform::Android,
    ];

    /// Identifier used in callback data.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "MacOS",
            Platform::Linux => "Linux",
            Platform::Ios => "iOS",
            Platform::Android => "Android",
        }
    }

    /// Mobile clients import profiles by scanning, so they also get the scan payload.
    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Ios | Platform::Android)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = InvalidRequest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| InvalidRequest::UnsupportedPlatform(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!("IOS".parse::<Platform>().unwrap(), Platform::Ios);
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn unknown_platform_is_rejected() {
        assert_eq!(
            "symbian".parse::<Platform>(),
            Err(InvalidRequest::UnsupportedPlatform("symbian".into()))
        );
    }

    #[test]
    fn only_phones_are_mobile() {
        let mobile: Vec<_> = Platform::ALL.into_iter().filter(Platform::is_mobile).collect();
        assert_eq!(mobile, vec![Platform::Ios, Platform::Android]);
    }
}

//! Usage: Identity providers accepted by the sign-in screen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInProvider {
    Google,
    Apple,
    Line,
}

impl SignInProvider {
    pub const ALL: [SignInProvider; 3] = [Self::Google, Self::Apple, Self::Line];

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Apple => "apple",
            Self::Line => "line",
        }
    }

    /// Provider id understood by the Identity Toolkit `signInWithIdp` endpoint.
    pub fn identity_toolkit_id(self) -> &'static str {
        match self {
            Self::Google => "google.com",
            Self::Apple => "apple.com",
            Self::Line => "oidc.line",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Apple => "Apple",
            Self::Line => "LINE",
        }
    }
}

impl fmt::Display for SignInProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for SignInProvider {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "apple" => Ok(Self::Apple),
            "line" => Ok(Self::Line),
            other => Err(format!(
                "SEC_INVALID_INPUT: unsupported provider `{other}` (expected google|apple|line)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_from_str() {
        for provider in SignInProvider::ALL {
            assert_eq!(provider.as_key().parse::<SignInProvider>(), Ok(provider));
        }
        assert_eq!(" LINE ".parse::<SignInProvider>(), Ok(SignInProvider::Line));
        assert!("github".parse::<SignInProvider>().is_err());
    }

    #[test]
    fn serde_uses_snake_case_keys() {
        let json = serde_json::to_string(&SignInProvider::Line).unwrap();
        assert_eq!(json, "\"line\"");
    }
}

use std::{fmt, str::FromStr};

use crate::error::ParseError;

/// Delivery medium for a notification
///
/// Serialized as the upper-case name (`EMAIL`); parsing accepts either the
/// name or the lower-case code in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Email,
    Sms,
    Console,
}

impl Channel {
    pub const ALL: [Self; 3] = [Self::Email, Self::Sms, Self::Console];

    /// Stable lower-case code, as used in configuration
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Console => "console",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Sms => "SMS",
            Self::Console => "CONSOLE",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Sms => "SMS",
            Self::Console => "Console",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|channel| channel.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseError::UnknownChannel(s.to_string()))
    }
}

impl serde::Serialize for Channel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for Channel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("email".parse::<Channel>().unwrap(), Channel::Email);
        assert_eq!("EMAIL".parse::<Channel>().unwrap(), Channel::Email);
        assert_eq!("Sms".parse::<Channel>().unwrap(), Channel::Sms);
        assert_eq!(" console ".parse::<Channel>().unwrap(), Channel::Console);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "pigeon".parse::<Channel>().unwrap_err();
        assert_eq!(err, ParseError::UnknownChannel("pigeon".to_string()));
    }

    #[test]
    fn test_serde_uses_upper_case_name() {
        assert_eq!(serde_json::to_string(&Channel::Sms).unwrap(), "\"SMS\"");
        let parsed: Channel = serde_json::from_str("\"console\"").unwrap();
        assert_eq!(parsed, Channel::Console);
    }
}

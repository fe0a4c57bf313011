use std::convert::Infallible;
use std::str::FromStr;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::Error;

/// A locally forced state layered over a feature's default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OverrideState {
    /// No override; the feature's default state applies.
    #[default]
    Default = 0,
    Disabled = 1,
    Enabled = 2,
}

impl OverrideState {
    pub const ALL: [OverrideState; 3] = [
        OverrideState::Default,
        OverrideState::Disabled,
        OverrideState::Enabled,
    ];

    /// The stable string form used for persistence.
    pub fn description(self) -> &'static str {
        match self {
            OverrideState::Default => "Default",
            OverrideState::Disabled => "OFF",
            OverrideState::Enabled => "ON",
        }
    }

    /// Decode a persisted string. Anything unrecognized is `Default`.
    pub fn from_description(value: &str) -> Self {
        match value {
            "ON" => OverrideState::Enabled,
            "OFF" => OverrideState::Disabled,
            _ => OverrideState::Default,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_overridden(self) -> bool {
        self != OverrideState::Default
    }
}

impl std::fmt::Display for OverrideState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

impl FromStr for OverrideState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_description(s))
    }
}

impl From<&str> for OverrideState {
    fn from(value: &str) -> Self {
        Self::from_description(value)
    }
}

impl TryFrom<u8> for OverrideState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OverrideState::Default),
            1 => Ok(OverrideState::Disabled),
            2 => Ok(OverrideState::Enabled),
            other => Err(Error::InvalidOverrideState(other)),
        }
    }
}

impl Serialize for OverrideState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.description())
    }
}

impl<'de> Deserialize<'de> for OverrideState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_description(&s))
    }
}

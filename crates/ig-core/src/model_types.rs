use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::Error;

/// Image models accepted by the generation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageModel {
    #[serde(rename = "kling-v1")]
    KlingV1,
    #[serde(rename = "kling-v1-5")]
    KlingV1_5,
    #[serde(rename = "kling-v2")]
    KlingV2,
}

impl ImageModel {
    /// Model ID for API communication
    pub fn id(&self) -> &'static str {
        match self {
            Self::KlingV1 => "kling-v1",
            Self::KlingV1_5 => "kling-v1-5",
            Self::KlingV2 => "kling-v2",
        }
    }

    /// All available models
    pub fn all() -> [ImageModel; 3] {
        [Self::KlingV1, Self::KlingV1_5, Self::KlingV2]
    }
}

impl Default for ImageModel {
    fn default() -> Self {
        Self::KlingV1
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ImageModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown image model: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "3:2")]
    Landscape3x2,
    #[serde(rename = "2:3")]
    Portrait2x3,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape16x9 => "16:9",
            Self::Portrait9x16 => "9:16",
            Self::Square => "1:1",
            Self::Landscape4x3 => "4:3",
            Self::Portrait3x4 => "3:4",
            Self::Landscape3x2 => "3:2",
            Self::Portrait2x3 => "2:3",
        }
    }

    pub fn all() -> [AspectRatio; 7] {
        [
            Self::Landscape16x9,
            Self::Portrait9x16,
            Self::Square,
            Self::Landscape4x3,
            Self::Portrait3x4,
            Self::Landscape3x2,
            Self::Portrait2x3,
        ]
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::Landscape16x9
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::InvalidRequest(format!("unsupported aspect ratio: {s}")))
    }
}

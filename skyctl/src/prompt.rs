//! Prompt construction from the closed sky and enhancement option sets.
//!
//! [`build`] is pure: the same selections always produce the same prompt.

use std::{fmt, str::FromStr};

use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::Error;

/// Closing clause appended to every prompt
pub const CLOSING_CLAUSE: &str = "professional real estate photography";

const SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkyPreset {
    StandardBlue,
    BlueWithClouds,
    GoldenHour,
    Twilight,
}

impl SkyPreset {
    pub const ALL: [SkyPreset; 4] = [
        SkyPreset::StandardBlue,
        SkyPreset::BlueWithClouds,
        SkyPreset::GoldenHour,
        SkyPreset::Twilight,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SkyPreset::StandardBlue => "standard-blue",
            SkyPreset::BlueWithClouds => "blue-with-clouds",
            SkyPreset::GoldenHour => "golden-hour",
            SkyPreset::Twilight => "twilight",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SkyPreset::StandardBlue => "Standard Blue",
            SkyPreset::BlueWithClouds => "Blue with Clouds",
            SkyPreset::GoldenHour => "Golden Hour",
            SkyPreset::Twilight => "Twilight",
        }
    }

    pub fn prompt_text(&self) -> &'static str {
        match self {
            SkyPreset::StandardBlue => "Clear blue sky, perfect sunny day, professional real estate photography",
            SkyPreset::BlueWithClouds => "Blue sky with pleasant white clouds, natural daylight, professional real estate photography",
            SkyPreset::GoldenHour => "Golden hour warm sunset sky, luxury real estate photography, warm tones",
            SkyPreset::Twilight => "Twilight blue hour sky, warm interior lights glowing, luxury real estate photography",
        }
    }
}

impl FromStr for SkyPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.key() == s)
            .ok_or_else(|| Error::InvalidOption {
                kind: "sky",
                key: s.to_string(),
            })
    }
}

impl fmt::Display for SkyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Enhancement {
    RemoveBins,
    RemoveCars,
    RemovePowerlines,
    GreenGrass,
    RemoveClutter,
}

impl Enhancement {
    pub const ALL: [Enhancement; 5] = [
        Enhancement::RemoveBins,
        Enhancement::RemoveCars,
        Enhancement::RemovePowerlines,
        Enhancement::GreenGrass,
        Enhancement::RemoveClutter,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Enhancement::RemoveBins => "remove-bins",
            Enhancement::RemoveCars => "remove-cars",
            Enhancement::RemovePowerlines => "remove-powerlines",
            Enhancement::GreenGrass => "green-grass",
            Enhancement::RemoveClutter => "remove-clutter",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Enhancement::RemoveBins => "Remove bins",
            Enhancement::RemoveCars => "Remove cars",
            Enhancement::RemovePowerlines => "Remove powerlines",
            Enhancement::GreenGrass => "Green up grass",
            Enhancement::RemoveClutter => "Remove general clutter",
        }
    }

    pub fn prompt_text(&self) -> &'static str {
        match self {
            Enhancement::RemoveBins => "remove all trash bins, recycling bins, and waste containers",
            Enhancement::RemoveCars => "remove all cars, vehicles, and trucks from driveway and street",
            Enhancement::RemovePowerlines => "remove all power lines, telephone wires, and utility cables",
            Enhancement::GreenGrass => "make lawn lush green, healthy grass, remove brown patches",
            Enhancement::RemoveClutter => "remove general clutter, debris, toys, tools, and miscellaneous items",
        }
    }
}

impl FromStr for Enhancement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|enhancement| enhancement.key() == s)
            .ok_or_else(|| Error::InvalidOption {
                kind: "enhancement",
                key: s.to_string(),
            })
    }
}

/// Parse selection keys in order, rejecting the first unknown one
pub fn parse_enhancements<S: AsRef<str>>(keys: &[S]) -> Result<Vec<Enhancement>, Error> {
    keys.iter().map(|key| key.as_ref().parse()).collect()
}

/// Assemble the generation prompt.
///
/// Segments, joined with `", "`: the sky text, each enhancement's text in selection order,
/// the trimmed free text when non-empty, then [`CLOSING_CLAUSE`].
pub fn build(sky: SkyPreset, enhancements: &[Enhancement], free_text: &str) -> String {
    let mut segments: Vec<&str> = Vec::with_capacity(enhancements.len() + 3);
    segments.push(sky.prompt_text());
    segments.extend(enhancements.iter().map(|e| -> &str { e.prompt_text() }));

    let free_text = free_text.trim();
    if !free_text.is_empty() {
        segments.push(free_text);
    }

    segments.push(CLOSING_CLAUSE);
    segments.join(SEPARATOR)
}

/// One selectable option as listed by `GET /options`
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionEntry {
    pub key: String,
    pub display_name: String,
    pub prompt: String,
}

/// Every sky preset and enhancement, in presentation order
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionCatalogue {
    pub skies: Vec<OptionEntry>,
    pub enhancements: Vec<OptionEntry>,
}

pub fn catalogue() -> OptionCatalogue {
    OptionCatalogue {
        skies: SkyPreset::ALL
            .iter()
            .map(|sky| OptionEntry {
                key: sky.key().to_string(),
                display_name: sky.display_name().to_string(),
                prompt: sky.prompt_text().to_string(),
            })
            .collect(),
        enhancements: Enhancement::ALL
            .iter()
            .map(|enhancement| OptionEntry {
                key: enhancement.key().to_string(),
                display_name: enhancement.display_name().to_string(),
                prompt: enhancement.prompt_text().to_string(),
            })
            .collect(),
    }
}

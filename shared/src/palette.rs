use serde::{Deserialize, Serialize};
use std::fmt;

/// RGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#RRGGBB`, upper case.
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    #[must_use]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

pub const PLATELETS_COLOR: Color = Color::rgb(0xFF, 0xD7, 0x00);
pub const RBC_COLOR: Color = Color::rgb(0xFF, 0x6B, 0x6B);
pub const WBC_COLOR: Color = Color::rgb(0x4E, 0xCD, 0xC4);

/// Shared color for every class outside [`KnownClass`].
pub const FALLBACK_COLOR: Color = Color::rgb(0x88, 0x88, 0x88);

/// The classes the aggregator recognizes by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KnownClass {
    Platelets,
    #[serde(rename = "RBC")]
    Rbc,
    #[serde(rename = "WBC")]
    Wbc,
}

impl KnownClass {
    /// Display order used by breakdowns and the legend.
    pub const ALL: [Self; 3] = [Self::Platelets, Self::Rbc, Self::Wbc];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Platelets => "Platelets",
            Self::Rbc => "RBC",
            Self::Wbc => "WBC",
        }
    }

    /// Exact, case-sensitive match against the detector's label.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.name() == name)
    }

    #[must_use]
    pub const fn color(self) -> Color {
        match self {
            Self::Platelets => PLATELETS_COLOR,
            Self::Rbc => RBC_COLOR,
            Self::Wbc => WBC_COLOR,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Platelets => 0,
            Self::Rbc => 1,
            Self::Wbc => 2,
        }
    }
}

impl fmt::Display for KnownClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[must_use]
pub fn color_for(class_name: &str) -> Color {
    KnownClass::from_name(class_name).map_or(FALLBACK_COLOR, KnownClass::color)
}

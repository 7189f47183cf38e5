use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happened on the road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    Roadkill,
    NearMiss,
}

impl IncidentCategory {
    pub const ALL: [IncidentCategory; 2] = [IncidentCategory::Roadkill, IncidentCategory::NearMiss];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentCategory::Roadkill => "roadkill",
            IncidentCategory::NearMiss => "near_miss",
        }
    }

    /// Button label in the capture form.
    pub fn label(&self) -> &'static str {
        match self {
            IncidentCategory::Roadkill => "Roadkill",
            IncidentCategory::NearMiss => "Near Miss",
        }
    }
}

impl fmt::Display for IncidentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "roadkill" => Ok(Self::Roadkill),
            "near_miss" | "nearmiss" => Ok(Self::NearMiss),
            _ => Err(format!("Unknown incident category: {}", s)),
        }
    }
}

/// Entries of the manual animal type picker.
///
/// The draft stores the selection as a plain string because auto-population
/// writes the classifier's raw label, which rarely matches a catalog key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimalType {
    Deer,
    SmallMammal,
    Bird,
    Reptile,
    Other,
}

impl AnimalType {
    pub const CATALOG: [AnimalType; 5] = [
        AnimalType::Deer,
        AnimalType::SmallMammal,
        AnimalType::Bird,
        AnimalType::Reptile,
        AnimalType::Other,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AnimalType::Deer => "deer",
            AnimalType::SmallMammal => "small_mammal",
            AnimalType::Bird => "bird",
            AnimalType::Reptile => "reptile",
            AnimalType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnimalType::Deer => "Deer / Large Mammal",
            AnimalType::SmallMammal => "Small Mammal (Raccoon, etc)",
            AnimalType::Bird => "Bird",
            AnimalType::Reptile => "Reptile",
            AnimalType::Other => "Other",
        }
    }

    /// Look up a catalog entry by key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::CATALOG.iter().copied().find(|t| t.key() == key)
    }
}

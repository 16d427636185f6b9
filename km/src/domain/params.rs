//! Design parameters and additive patches

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Kitchen layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    #[serde(rename = "I")]
    Linear,
    L,
    U,
    G,
    #[serde(rename = "parallel")]
    Parallel,
}

impl Shape {
    pub const ALL: [Shape; 5] = [Shape::Linear, Shape::L, Shape::U, Shape::G, Shape::Parallel];

    /// Parse a shape code or alias, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        debug!(%s, "Shape::parse: called");
        match s.trim().to_lowercase().as_str() {
            "i" | "line" | "linear" | "lineal" => Some(Shape::Linear),
            "l" => Some(Shape::L),
            "u" => Some(Shape::U),
            "g" => Some(Shape::G),
            "parallel" | "galley" | "paralela" => Some(Shape::Parallel),
            _ => {
                debug!(%s, "Shape::parse: unknown shape");
                None
            }
        }
    }

    /// Canonical code
    pub fn code(&self) -> &'static str {
        match self {
            Shape::Linear => "I",
            Shape::L => "L",
            Shape::U => "U",
            Shape::G => "G",
            Shape::Parallel => "parallel",
        }
    }

    /// Spanish display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Shape::Linear => "lineal",
            Shape::L => "en L",
            Shape::U => "en U",
            Shape::G => "en G",
            Shape::Parallel => "paralela",
        }
    }

    /// Layout phrase for image descriptions
    pub fn description(&self) -> &'static str {
        match self {
            Shape::Linear => "single wall linear",
            Shape::L => "L-shaped corner",
            Shape::U => "U-shaped three-wall",
            Shape::G => "G-shaped with peninsula",
            Shape::Parallel => "galley parallel walls",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Design style; unrecognised names are kept as free text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Style {
    Modern,
    Classic,
    Rustic,
    Minimalist,
    Industrial,
    Scandinavian,
    Contemporary,
    Other(String),
}

impl Style {
    /// Parse a style name; empty input yields `None`
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.to_lowercase().as_str() {
            "modern" | "moderno" => Style::Modern,
            "classic" | "clásico" | "clasico" => Style::Classic,
            "rustic" | "rústico" | "rustico" => Style::Rustic,
            "minimalist" | "minimalista" => Style::Minimalist,
            "industrial" => Style::Industrial,
            "scandinavian" | "escandinavo" => Style::Scandinavian,
            "contemporary" | "contemporáneo" | "contemporaneo" => Style::Contemporary,
            _ => Style::Other(trimmed.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Style::Modern => "modern",
            Style::Classic => "classic",
            Style::Rustic => "rustic",
            Style::Minimalist => "minimalist",
            Style::Industrial => "industrial",
            Style::Scandinavian => "scandinavian",
            Style::Contemporary => "contemporary",
            Style::Other(s) => s,
        }
    }

    /// Atmosphere phrase for image descriptions
    pub fn atmosphere(&self) -> &'static str {
        match self {
            Style::Modern => "clean lines, minimalist hardware, integrated appliances",
            Style::Classic => "ornate moldings, traditional hardware, warm wood tones",
            Style::Rustic => "natural wood, farmhouse sink, open shelving, vintage elements",
            Style::Minimalist => "handleless cabinets, hidden appliances, monochromatic palette",
            Style::Industrial => "exposed brick, metal accents, concrete elements, pendant lights",
            Style::Scandinavian => "light wood, white walls, natural light, simple forms",
            Style::Contemporary => "mixed materials, statement lighting, current trends",
            Style::Other(_) => "modern aesthetics",
        }
    }
}

impl From<String> for Style {
    fn from(s: String) -> Self {
        Style::parse(&s).unwrap_or(Style::Other(s))
    }
}

impl From<Style> for String {
    fn from(style: Style) -> Self {
        style.as_str().to_string()
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Budget tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    Low,
    #[default]
    Medium,
    High,
    Premium,
}

impl Budget {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "bajo" => Some(Budget::Low),
            "medium" | "medio" => Some(Budget::Medium),
            "high" | "alto" => Some(Budget::High),
            "premium" => Some(Budget::Premium),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Budget::Low => "low",
            Budget::Medium => "medium",
            Budget::High => "high",
            Budget::Premium => "premium",
        }
    }

    /// Approximate investment band
    pub fn cost_range(&self) -> &'static str {
        match self {
            Budget::Low => "$15,000 - $25,000 MXN",
            Budget::Medium => "$25,000 - $45,000 MXN",
            Budget::High => "$45,000 - $80,000 MXN",
            Budget::Premium => "$80,000 - $150,000+ MXN",
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const DEFAULT_CABINETS: &str = "lacquered MDF";
pub const DEFAULT_COUNTERTOP: &str = "quartz";
pub const DEFAULT_BACKSPLASH: &str = "ceramic tiles";
pub const DEFAULT_COLORS: [&str; 2] = ["white", "gray"];

/// Material choices, each optional until the user names it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Materials {
    pub cabinets: Option<String>,
    pub countertop: Option<String>,
    pub backsplash: Option<String>,
}

impl Materials {
    pub fn is_empty(&self) -> bool {
        self.cabinets.is_none() && self.countertop.is_none() && self.backsplash.is_none()
    }

    /// Materials with defaults filled in for missing keys
    pub fn resolved(&self) -> ResolvedMaterials {
        ResolvedMaterials {
            cabinets: self.cabinets.clone().unwrap_or_else(|| DEFAULT_CABINETS.to_string()),
            countertop: self.countertop.clone().unwrap_or_else(|| DEFAULT_COUNTERTOP.to_string()),
            backsplash: self.backsplash.clone().unwrap_or_else(|| DEFAULT_BACKSPLASH.to_string()),
        }
    }
}

/// Fully specified materials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMaterials {
    pub cabinets: String,
    pub countertop: String,
    pub backsplash: String,
}

impl Default for ResolvedMaterials {
    fn default() -> Self {
        Materials::default().resolved()
    }
}

/// Accumulated design intent for one conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignParameters {
    /// Available length in meters, always positive when set
    pub linear_meters: Option<f64>,
    pub shape: Option<Shape>,
    pub style: Option<Style>,
    pub materials: Materials,
    pub colors: Vec<String>,
    pub budget: Option<Budget>,
    pub special_requirements: Option<String>,
}

impl DesignParameters {
    /// Merge newly extracted values
    ///
    /// Only present values overwrite; absent and null fields leave the known
    /// value untouched. Materials merge key by key.
    pub fn merge(&mut self, patch: &ParameterPatch) {
        debug!(?patch, "DesignParameters::merge: called");
        patch.linear_meters.apply_to(&mut self.linear_meters);
        patch.shape.apply_to(&mut self.shape);
        patch.style.apply_to(&mut self.style);
        patch.materials.cabinets.apply_to(&mut self.materials.cabinets);
        patch.materials.countertop.apply_to(&mut self.materials.countertop);
        patch.materials.backsplash.apply_to(&mut self.materials.backsplash);
        patch.budget.apply_to(&mut self.budget);
        patch.special_requirements.apply_to(&mut self.special_requirements);
        if let FieldUpdate::Set(colors) = &patch.colors {
            self.colors = colors.clone();
        }
    }

    /// Parameters with defaults substituted, as used to render a design
    pub fn resolve(&self, default_linear_meters: f64) -> ResolvedParameters {
        ResolvedParameters {
            linear_meters: self.linear_meters.unwrap_or(default_linear_meters),
            shape: self.shape.unwrap_or(Shape::L),
            style: self.style.clone().unwrap_or(Style::Modern),
            materials: self.materials.resolved(),
            colors: if self.colors.is_empty() {
                DEFAULT_COLORS.iter().map(|c| c.to_string()).collect()
            } else {
                self.colors.clone()
            },
            budget: self.budget.unwrap_or_default(),
            special_requirements: self.special_requirements.clone(),
        }
    }
}

/// Design parameters with every default applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    pub linear_meters: f64,
    pub shape: Shape,
    pub style: Style,
    pub materials: ResolvedMaterials,
    pub colors: Vec<String>,
    pub budget: Budget,
    pub special_requirements: Option<String>,
}

/// One field of a patch
///
/// `Absent` (key missing) and `Null` (explicit null) both mean "no change";
/// they are kept apart so decoding stays faithful to what the model sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldUpdate<T> {
    #[default]
    Absent,
    Null,
    Set(T),
}

impl<T: Clone> FieldUpdate<T> {
    /// Overwrite `target` only when a value is present
    pub fn apply_to(&self, target: &mut Option<T>) {
        if let FieldUpdate::Set(v) = self {
            *target = Some(v.clone());
        }
    }

    /// Map a present value, demoting rejected values to `Null`
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Option<U>) -> FieldUpdate<U> {
        match self {
            FieldUpdate::Absent => FieldUpdate::Absent,
            FieldUpdate::Null => FieldUpdate::Null,
            FieldUpdate::Set(v) => match f(v) {
                Some(u) => FieldUpdate::Set(u),
                None => FieldUpdate::Null,
            },
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Null,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Missing keys never reach here; `#[serde(default)]` yields Absent
        Option::<T>::deserialize(deserializer).map(FieldUpdate::from)
    }
}

/// Material keys of a patch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialsPatch {
    pub cabinets: FieldUpdate<String>,
    pub countertop: FieldUpdate<String>,
    pub backsplash: FieldUpdate<String>,
}

/// Values extracted from one utterance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterPatch {
    pub linear_meters: FieldUpdate<f64>,
    pub shape: FieldUpdate<Shape>,
    pub style: FieldUpdate<Style>,
    pub materials: MaterialsPatch,
    pub colors: FieldUpdate<Vec<String>>,
    pub budget: FieldUpdate<Budget>,
    pub special_requirements: FieldUpdate<String>,
}

//! Technical specification
//!
//! Deterministic module layout for a run of cabinetry, rendered through the
//! `tech-specs` template.

use serde::Serialize;
use tracing::debug;

use crate::domain::{Budget, ResolvedMaterials, Shape};
use crate::prompts::PromptLoader;

pub const SINK_CM: u32 = 90;
pub const COOKTOP_CM: u32 = 60;
pub const FRIDGE_CM: u32 = 60;
pub const STORAGE_WIDE_CM: u32 = 60;
pub const STORAGE_NARROW_CM: u32 = 40;

pub const BASE_HEIGHT_CM: u32 = 85;
pub const WALL_HEIGHT_CM: u32 = 80;
pub const DEPTH_CM: u32 = 60;
pub const HARDWARE: &str = "Cierre suave, bisagras de 110°";

pub const APPLIANCES: [&str; 6] = [
    "Campana extractora",
    "Estufa/Parrilla 4 quemadores",
    "Horno empotrable (opcional)",
    "Refrigerador",
    "Microondas empotrable (opcional)",
    "Lavavajillas (opcional)",
];

/// Meters as shown to users: integral values keep one decimal
pub fn format_meters(meters: f64) -> String {
    if meters.fract() == 0.0 {
        format!("{:.1}", meters)
    } else {
        format!("{}", meters)
    }
}

/// Modules packed into a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleLayout {
    pub sink: bool,
    pub cooktop: bool,
    pub fridge: bool,
    pub storage_60: u32,
    pub storage_40: u32,
}

impl ModuleLayout {
    /// Greedy packing: sink, cooktop, fridge, then wide and narrow storage
    ///
    /// Works in whole centimeters so repeated calls agree exactly. Partial
    /// centimeters are dropped, never rounded up, so the layout always fits.
    pub fn pack(linear_meters: f64) -> Self {
        debug!(linear_meters, "ModuleLayout::pack: called");
        let mut remaining = if linear_meters.is_finite() && linear_meters > 0.0 {
            // epsilon absorbs float noise such as 0.29 * 100 = 28.999...
            (linear_meters * 100.0 + 1e-6).floor() as u32
        } else {
            0
        };

        let mut take = |width: u32| {
            if remaining >= width {
                remaining -= width;
                true
            } else {
                false
            }
        };

        let sink = take(SINK_CM);
        let cooktop = take(COOKTOP_CM);
        let fridge = take(FRIDGE_CM);

        let storage_60 = remaining / STORAGE_WIDE_CM;
        remaining -= storage_60 * STORAGE_WIDE_CM;
        let storage_40 = remaining / STORAGE_NARROW_CM;

        Self {
            sink,
            cooktop,
            fridge,
            storage_60,
            storage_40,
        }
    }

    /// Total centimeters used
    pub fn used_cm(&self) -> u32 {
        let fixed = [(self.sink, SINK_CM), (self.cooktop, COOKTOP_CM), (self.fridge, FRIDGE_CM)]
            .iter()
            .filter(|(present, _)| *present)
            .map(|(_, cm)| cm)
            .sum::<u32>();
        fixed + self.storage_60 * STORAGE_WIDE_CM + self.storage_40 * STORAGE_NARROW_CM
    }

    /// Bullet lines, one per module type present
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.sink {
            lines.push(format!("1x Módulo fregadero ({}cm)", SINK_CM));
        }
        if self.cooktop {
            lines.push(format!("1x Módulo estufa/parrilla ({}cm)", COOKTOP_CM));
        }
        if self.fridge {
            lines.push(format!("1x Módulo refrigerador ({}cm)", FRIDGE_CM));
        }
        if self.storage_60 > 0 {
            lines.push(format!("{}x Módulo almacenamiento ({}cm)", self.storage_60, STORAGE_WIDE_CM));
        }
        if self.storage_40 > 0 {
            lines.push(format!("{}x Módulo almacenamiento ({}cm)", self.storage_40, STORAGE_NARROW_CM));
        }
        lines
    }
}

#[derive(Serialize)]
struct SpecsContext<'a> {
    linear_meters: String,
    shape: &'a str,
    base_height_cm: u32,
    wall_height_cm: u32,
    depth_cm: u32,
    cabinets: &'a str,
    countertop: &'a str,
    backsplash: &'a str,
    hardware: &'a str,
    modules: String,
    appliances: String,
    cost_range: &'a str,
}

fn bullets<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the specification document
pub fn technical_specs(
    prompts: &PromptLoader,
    linear_meters: f64,
    shape: Shape,
    materials: &ResolvedMaterials,
    budget: Option<Budget>,
) -> eyre::Result<String> {
    debug!(linear_meters, %shape, ?budget, "technical_specs: called");
    let layout = ModuleLayout::pack(linear_meters);

    prompts.render(
        "tech-specs",
        &SpecsContext {
            linear_meters: format_meters(linear_meters),
            shape: shape.code(),
            base_height_cm: BASE_HEIGHT_CM,
            wall_height_cm: WALL_HEIGHT_CM,
            depth_cm: DEPTH_CM,
            cabinets: &materials.cabinets,
            countertop: &materials.countertop,
            backsplash: &materials.backsplash,
            hardware: HARDWARE,
            modules: bullets(&layout.lines()),
            appliances: bullets(&APPLIANCES),
            cost_range: budget.unwrap_or_default().cost_range(),
        },
    )
}

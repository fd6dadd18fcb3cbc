//! Palette-based color assignment for chart points

use crate::ChartDataPoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_PALETTE: &str = "indigo";

const PALETTES: &[(&str, [&str; 6])] = &[
    ("indigo", ["#6366f1", "#8b5cf6", "#a855f7", "#d946ef", "#ec4899", "#f43f5e"]),
    ("ocean", ["#0ea5e9", "#06b6d4", "#14b8a6", "#10b981", "#22c55e", "#84cc16"]),
    ("sunset", ["#f97316", "#fb923c", "#fbbf24", "#facc15", "#a3e635", "#4ade80"]),
    ("berry", ["#e11d48", "#db2777", "#c026d3", "#9333ea", "#7c3aed", "#6366f1"]),
    ("earth", ["#78716c", "#a8a29e", "#d6d3d1", "#fbbf24", "#f59e0b", "#d97706"]),
    ("mono", ["#1f2937", "#374151", "#4b5563", "#6b7280", "#9ca3af", "#d1d5db"]),
    ("rainbow", ["#ef4444", "#f97316", "#eab308", "#22c55e", "#3b82f6", "#8b5cf6"]),
    ("pastel", ["#fda4af", "#fdba74", "#fde047", "#86efac", "#7dd3fc", "#c4b5fd"]),
];

/// Colors of a named palette
pub fn palette(name: &str) -> Option<Vec<String>> {
    PALETTES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
        .map(|(_, colors)| colors.iter().map(|c| c.to_string()).collect())
}

pub fn palette_names() -> impl Iterator<Item = &'static str> {
    PALETTES.iter().map(|(n, _)| *n)
}

fn default_palette() -> Vec<String> {
    palette(DEFAULT_PALETTE).unwrap_or_default()
}

/// A chart point with its resolved display color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColoredPoint {
    pub name: String,
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorScheme {
    pub palette: Vec<String>,
    /// Per-category overrides, checked before the palette
    #[serde(default)]
    pub category_colors: HashMap<String, String>,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            category_colors: HashMap::new(),
        }
    }
}

impl ColorScheme {
    /// Named palette, or the default one for unknown names
    pub fn named(name: &str) -> Self {
        Self {
            palette: palette(name).unwrap_or_else(default_palette),
            category_colors: HashMap::new(),
        }
    }

    /// Caller-supplied palette; blank entries are dropped
    pub fn custom<I, S>(colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            palette: colors
                .into_iter()
                .map(|c| c.as_ref().trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            category_colors: HashMap::new(),
        }
    }

    pub fn with_category_colors(mut self, category_colors: HashMap<String, String>) -> Self {
        self.category_colors = category_colors;
        self
    }

    /// Color for the point at `index` named `name`
    pub fn color_for(&self, name: &str, index: usize) -> String {
        if let Some(color) = self.category_colors.get(name) {
            return color.clone();
        }

        if self.palette.is_empty() {
            let fallback = default_palette();
            return fallback[index % fallback.len()].clone();
        }
        self.palette[index % self.palette.len()].clone()
    }

    pub fn resolve(&self, points: &[ChartDataPoint]) -> Vec<ColoredPoint> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| ColoredPoint {
                name: p.name.clone(),
                value: p.value,
                color: self.color_for(&p.name, i),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> Vec<ChartDataPoint> {
        (0..n)
            .map(|i| ChartDataPoint::new(format!("c{}", i), i as f64))
            .collect()
    }

    #[test]
    fn test_palette_wraps() {
        let scheme = ColorScheme::custom(["#111", "#222"]);
        let colored = scheme.resolve(&points(3));
        assert_eq!(colored[0].color, "#111");
        assert_eq!(colored[1].color, "#222");
        assert_eq!(colored[2].color, "#111");
    }

    #[test]
    fn test_category_override_wins() {
        let mut overrides = HashMap::new();
        overrides.insert("c1".to_string(), "#abcdef".to_string());
        let scheme = ColorScheme::named("ocean").with_category_colors(overrides);

        let colored = scheme.resolve(&points(3));
        assert_eq!(colored[0].color, "#0ea5e9");
        assert_eq!(colored[1].color, "#abcdef");
        assert_eq!(colored[2].color, "#14b8a6");
    }

    #[test]
    fn test_deterministic() {
        let scheme = ColorScheme::named("sunset");
        assert_eq!(scheme.resolve(&points(8)), scheme.resolve(&points(8)));
    }

    #[test]
    fn test_empty_and_unknown_palettes_fall_back() {
        let empty = ColorScheme::custom(Vec::<String>::new());
        assert_eq!(empty.color_for("x", 0), "#6366f1");

        let unknown = ColorScheme::named("neon");
        assert_eq!(unknown.palette, palette("indigo").unwrap());
    }
}

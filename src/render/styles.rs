//! Built-in overlay styles for the bottom score bar.

use serde::Serialize;

/// Visual parameters of one bottom-bar design.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OverlayStyle {
    pub id: &'static str,
    pub name: &'static str,
    /// Height of the bar in pixels (1080p canvas).
    pub bottom_height: u32,
    pub background_color: &'static str,
    pub accent_color: &'static str,
    pub description: &'static str,
}

/// Single `drawtext` line without the filter graph.
pub const SIMPLE_STYLE: &str = "simple";

pub const DEFAULT_STYLE: &str = "custom";

pub const STYLES: &[OverlayStyle] = &[
    OverlayStyle {
        id: "custom",
        name: "Custom Style",
        bottom_height: 120,
        background_color: "0x000000",
        accent_color: "0x16213e@0.8",
        description: "Modern IPL-style with dark theme and team colors",
    },
    OverlayStyle {
        id: "ipl_modern",
        name: "IPL Modern Style",
        bottom_height: 120,
        background_color: "0x1a1a2e@0.9",
        accent_color: "0x16213e@0.8",
        description: "Modern IPL-style with dark theme and team colors",
    },
    OverlayStyle {
        id: "broadcast_classic",
        name: "Broadcast Classic",
        bottom_height: 100,
        background_color: "0x000000@0.8",
        accent_color: "0x333333@0.9",
        description: "Traditional TV broadcast look",
    },
    OverlayStyle {
        id: "minimal_clean",
        name: "Minimal Clean",
        bottom_height: 80,
        background_color: "0xffffff@0.9",
        accent_color: "0xe0e0e0@0.8",
        description: "Clean, modern minimal design",
    },
    OverlayStyle {
        id: "ipl_premium",
        name: "IPL Premium",
        bottom_height: 140,
        background_color: "0x0f0f23@0.95",
        accent_color: "0x6c5ce7@0.9",
        description: "Premium design with gradients and animations",
    },
    OverlayStyle {
        id: "world_cup",
        name: "World Cup",
        bottom_height: 110,
        background_color: "0x2d3436@0.9",
        accent_color: "0x00b894@0.8",
        description: "World Cup tournament style",
    },
];

/// Looks up a built-in style by id.
pub fn find_style(id: &str) -> Option<&'static OverlayStyle> {
    STYLES.iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_style_exists() {
        assert!(find_style(DEFAULT_STYLE).is_some());
        assert!(find_style("neon").is_none());
    }

    #[test]
    fn ids_are_unique() {
        for (i, a) in STYLES.iter().enumerate() {
            assert!(STYLES[i + 1..].iter().all(|b| b.id != a.id), "{}", a.id);
        }
    }
}

//! Consistent terminal colors for node keys
//!
//! Each key maps to a hue between cyan and magenta. Reds and greens are left
//! to the failed/done markers.

use colored::Color;

const HUE_START: f32 = 180.0;
const HUE_SPAN: f32 = 140.0;

/// FNV-1a, so a key keeps its color across runs and platforms
fn fnv1a(key: &str) -> u32 {
    key.bytes()
        .fold(0x811c_9dc5u32, |hash, b| (hash ^ u32::from(b)).wrapping_mul(0x0100_0193))
}

fn hue_for(key: &str) -> f32 {
    HUE_START + (fnv1a(key) % HUE_SPAN as u32) as f32
}

/// Get a consistent color for a node key
pub fn node_color(key: &str) -> Color {
    let (r, g, b) = hsv_to_rgb(hue_for(key), 0.6, 0.95);
    Color::TrueColor { r, g, b }
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> (u8, u8, u8) {
    let chroma = value * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f32| ((c + m) * 255.0).round() as u8;
    (channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_color_is_stable() {
        assert_eq!(node_color("extract"), node_color("extract"));
    }

    #[test]
    fn test_node_color_varies_between_keys() {
        let keys = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let first = node_color(keys[0]);
        assert!(keys.iter().any(|k| node_color(k) != first));
    }

    #[test]
    fn test_hues_stay_clear_of_red_and_green() {
        for key in ["extract", "load", "bar", "foo", "test", "toto", ""] {
            let hue = hue_for(key);
            assert!((HUE_START..HUE_START + HUE_SPAN).contains(&hue), "{} -> {}", key, hue);
        }
    }

    #[test]
    fn test_hsv_primary_hues() {
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), (0, 0, 255));
        assert_eq!(hsv_to_rgb(180.0, 1.0, 1.0), (0, 255, 255));
        assert_eq!(hsv_to_rgb(300.0, 1.0, 1.0), (255, 0, 255));
    }
}

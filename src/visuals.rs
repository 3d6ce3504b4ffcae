//! Colours and palettes for scene and plot rendering.
//!
//! Visual configuration is kept apart from the model: evaluators publish
//! numbers (a temperature, an intensity), renderers turn them into colour
//! through a [`Palette`].
//!
//! # Usage
//!
//! ```ignore
//! let warm = Palette::Fire.sample(0.8);
//! let glow = Color::from_rgb8(255, 140, 0).with_alpha(0.5);
//! ```

use serde::{Deserialize, Serialize};

fn default_alpha() -> f32 {
    1.0
}

/// Straight-alpha RGBA colour, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "default_alpha")]
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const GRID: Color = Color::rgba(1.0, 1.0, 1.0, 0.12);
    pub const AXIS: Color = Color::rgb(0.62, 0.65, 0.70);
    pub const TEXT: Color = Color::rgb(0.85, 0.87, 0.90);
    pub const BACKGROUND: Color = Color::rgb(0.06, 0.07, 0.09);
    pub const RED: Color = Color::rgb(0.94, 0.27, 0.27);
    pub const GREEN: Color = Color::rgb(0.20, 0.78, 0.35);
    pub const BLUE: Color = Color::rgb(0.23, 0.51, 0.96);
    pub const AMBER: Color = Color::rgb(0.96, 0.62, 0.04);
    pub const CYAN: Color = Color::rgb(0.02, 0.71, 0.83);

    /// Opaque colour from float channels.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Colour with explicit alpha.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque colour from 8-bit channels.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Same colour with a different alpha.
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a: a.clamp(0.0, 1.0), ..self }
    }

    /// Multiply alpha, used for dimming stale frames.
    pub fn faded(self, factor: f32) -> Self {
        self.with_alpha(self.a * factor)
    }

    /// Linear interpolation between two colours.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Channels as 8-bit values (straight alpha).
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// CSS `rgba(...)` string, handy for hosts with string-typed styles.
    pub fn to_css(self) -> String {
        let [r, g, b, _] = self.to_rgba8();
        format!("rgba({}, {}, {}, {:.3})", r, g, b, self.a.clamp(0.0, 1.0))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Pre-defined colour ramps.
///
/// Sampled with a normalized value, e.g. a colour temperature mapped into
/// `0..1` by the scene renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Palette {
    /// Perceptually uniform purple to yellow.
    #[default]
    Viridis,

    /// Black through red, orange, yellow, white.
    Fire,

    /// White through light blue to deep blue.
    Ice,

    /// Blue for cold through white to red for hot.
    Thermal,

    /// Deep blue to cyan.
    Ocean,

    /// Black to white.
    Grayscale,
}

impl Palette {
    /// Colour stops for this palette (5 colours, evenly spaced).
    pub fn colors(&self) -> [Color; 5] {
        match self {
            Palette::Viridis => [
                Color::rgb(0.267, 0.004, 0.329), // Dark purple
                Color::rgb(0.282, 0.140, 0.458), // Purple
                Color::rgb(0.127, 0.566, 0.551), // Teal
                Color::rgb(0.369, 0.789, 0.383), // Green
                Color::rgb(0.993, 0.906, 0.144), // Yellow
            ],
            Palette::Fire => [
                Color::rgb(0.1, 0.0, 0.0),
                Color::rgb(0.5, 0.0, 0.0),
                Color::rgb(1.0, 0.3, 0.0),
                Color::rgb(1.0, 0.7, 0.0),
                Color::rgb(1.0, 1.0, 0.8),
            ],
            Palette::Ice => [
                Color::rgb(1.0, 1.0, 1.0),
                Color::rgb(0.8, 0.9, 1.0),
                Color::rgb(0.4, 0.7, 1.0),
                Color::rgb(0.1, 0.4, 0.8),
                Color::rgb(0.0, 0.1, 0.4),
            ],
            Palette::Thermal => [
                Color::rgb(0.15, 0.35, 0.95),
                Color::rgb(0.45, 0.70, 1.0),
                Color::rgb(0.95, 0.95, 0.95),
                Color::rgb(1.0, 0.60, 0.35),
                Color::rgb(0.90, 0.15, 0.10),
            ],
            Palette::Ocean => [
                Color::rgb(0.0, 0.05, 0.15),
                Color::rgb(0.0, 0.2, 0.4),
                Color::rgb(0.0, 0.4, 0.6),
                Color::rgb(0.2, 0.6, 0.8),
                Color::rgb(0.6, 0.9, 1.0),
            ],
            Palette::Grayscale => [
                Color::rgb(0.0, 0.0, 0.0),
                Color::rgb(0.25, 0.25, 0.25),
                Color::rgb(0.5, 0.5, 0.5),
                Color::rgb(0.75, 0.75, 0.75),
                Color::rgb(1.0, 1.0, 1.0),
            ],
        }
    }

    /// Sample the ramp at `t` (clamped to `0..=1`).
    pub fn sample(&self, t: f32) -> Color {
        let stops = self.colors();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (stops.len() - 1) as f32;
        let i = (scaled.floor() as usize).min(stops.len() - 2);
        stops[i].lerp(stops[i + 1], scaled - i as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_endpoints() {
        let stops = Palette::Fire.colors();
        assert_eq!(Palette::Fire.sample(0.0), stops[0]);
        assert_eq!(Palette::Fire.sample(1.0), stops[4]);
    }

    #[test]
    fn test_palette_clamps_out_of_range() {
        assert_eq!(Palette::Ice.sample(-3.0), Palette::Ice.sample(0.0));
        assert_eq!(Palette::Ice.sample(f32::NAN), Palette::Ice.sample(0.0));
    }

    #[test]
    fn test_rgba8_roundtrip() {
        let c = Color::from_rgb8(255, 128, 0);
        assert_eq!(c.to_rgba8(), [255, 128, 0, 255]);
    }

    #[test]
    fn test_color_deserializes_without_alpha() {
        let c: Color = serde_json::from_str(r#"{"r":1.0,"g":0.5,"b":0.0}"#).unwrap();
        assert_eq!(c.a, 1.0);
    }
}

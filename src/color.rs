//! Color values used throughout the lighting core.
//!
//! Controllers and effects work in HSV ([`HsvColor`]); hardware sinks receive
//! RGB ([`Rgb`]) plus a separate brightness. The HSV → RGB conversion itself is
//! delegated to `palette`.
//!
//! ## Rust concepts
//! - `Copy` value types: a color is copied on every assignment, so two
//!   consumers can never alias and mutate the same color
//! - `const fn` constructors for compile-time theme constants

use palette::{FromColor, Hsv, Srgb};

// ── HSV ────────────────────────────────────────────────────────────

/// An HSV color: hue in degrees `[0, 360)`, saturation and value in `[0, 100]`.
///
/// Fields are public and may hold out-of-range values (the facade setters do
/// not clamp). [`HsvColor::normalized`] brings a color back into range and is
/// applied at the hardware boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HsvColor {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl HsvColor {
    pub const fn new(hue: f64, saturation: f64, value: f64) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    /// Wrap the hue into `[0, 360)` and clamp saturation/value into `[0, 100]`.
    /// Non-finite channels become 0.
    pub fn normalized(self) -> Self {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            hue: finite(self.hue).rem_euclid(360.0),
            saturation: finite(self.saturation).clamp(0.0, 100.0),
            value: finite(self.value).clamp(0.0, 100.0),
        }
    }

    /// Same hue and saturation, value replaced.
    pub fn with_value(self, value: f64) -> Self {
        Self { value, ..self }
    }

    /// Same hue and saturation, value multiplied by `factor`.
    pub fn dimmed(self, factor: f64) -> Self {
        self.with_value(self.value * factor)
    }

    /// Scale the value by a brightness percentage (`value * percent / 100`).
    pub fn scaled(self, percent: f64) -> Self {
        self.dimmed(percent / 100.0)
    }

    /// Per-channel linear interpolation. `t = 0` yields `self`, `t = 1` yields `other`.
    ///
    /// The hue is interpolated directly, not along the shorter arc, so a fade
    /// from 350° to 10° sweeps through 180°.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Self {
            hue: mix(self.hue, other.hue),
            saturation: mix(self.saturation, other.saturation),
            value: mix(self.value, other.value),
        }
    }

    /// Full RGB conversion, value included.
    pub fn to_rgb(self) -> Rgb {
        let c = self.normalized();
        convert(c.hue, c.saturation, c.value)
    }

    /// RGB of this color at full value; pair with `value` as the brightness.
    pub fn chroma(self) -> Rgb {
        let c = self.normalized();
        convert(c.hue, c.saturation, 100.0)
    }
}

fn convert(hue: f64, saturation: f64, value: f64) -> Rgb {
    let hsv = Hsv::new(hue as f32, (saturation / 100.0) as f32, (value / 100.0) as f32);
    let rgb: Srgb<u8> = Srgb::<f32>::from_color(hsv).into_format();
    Rgb::new(rgb.red, rgb.green, rgb.blue)
}

// ── Theme ──────────────────────────────────────────────────────────

/// Named colors shared by the controllers.
pub mod theme {
    use super::HsvColor;

    pub const BLACK: HsvColor = HsvColor::new(0.0, 0.0, 0.0);
    pub const WHITE: HsvColor = HsvColor::new(0.0, 0.0, 100.0);
    pub const RED: HsvColor = HsvColor::new(0.0, 100.0, 100.0);
    pub const YELLOW: HsvColor = HsvColor::new(60.0, 100.0, 100.0);
    pub const GREEN: HsvColor = HsvColor::new(120.0, 100.0, 100.0);
    pub const CYAN: HsvColor = HsvColor::new(180.0, 100.0, 100.0);
    pub const PURPLE: HsvColor = HsvColor::new(280.0, 100.0, 100.0);
    /// Brand blue used by the button ring and head slots.
    pub const BRAND: HsvColor = HsvColor::new(200.0, 100.0, 100.0);
}

// ── RGB ────────────────────────────────────────────────────────────

/// 8-bit RGB color handed to hardware sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(theme::RED, Rgb::new(255, 0, 0))]
    #[case(theme::YELLOW, Rgb::new(255, 255, 0))]
    #[case(theme::GREEN, Rgb::new(0, 255, 0))]
    #[case(theme::CYAN, Rgb::new(0, 255, 255))]
    #[case(theme::WHITE, Rgb::new(255, 255, 255))]
    #[case(theme::BLACK, Rgb::new(0, 0, 0))]
    fn theme_colors_convert(#[case] hsv: HsvColor, #[case] expected: Rgb) {
        assert_eq!(hsv.to_rgb(), expected);
    }

    #[test]
    fn chroma_ignores_value() {
        let dim_red = HsvColor::new(0.0, 100.0, 10.0);
        assert_eq!(dim_red.chroma(), Rgb::new(255, 0, 0));
    }

    #[rstest]
    #[case(HsvColor::new(370.0, 50.0, 50.0), HsvColor::new(10.0, 50.0, 50.0))]
    #[case(HsvColor::new(-30.0, 50.0, 50.0), HsvColor::new(330.0, 50.0, 50.0))]
    #[case(HsvColor::new(90.0, 150.0, -5.0), HsvColor::new(90.0, 100.0, 0.0))]
    #[case(HsvColor::new(f64::NAN, 20.0, f64::INFINITY), HsvColor::new(0.0, 20.0, 0.0))]
    fn normalized_wraps_hue_and_clamps(#[case] input: HsvColor, #[case] expected: HsvColor) {
        assert_eq!(input.normalized(), expected);
    }

    #[test]
    fn lerp_endpoints() {
        let a = HsvColor::new(10.0, 20.0, 30.0);
        let b = HsvColor::new(110.0, 60.0, 90.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), HsvColor::new(60.0, 40.0, 60.0));
    }

    #[test]
    fn lerp_takes_the_long_way_around_the_hue_circle() {
        let a = HsvColor::new(350.0, 100.0, 100.0);
        let b = HsvColor::new(10.0, 100.0, 100.0);
        assert_eq!(a.lerp(b, 0.5).hue, 180.0);
    }

    #[test]
    fn scaled_and_dimmed() {
        let c = HsvColor::new(0.0, 100.0, 80.0);
        assert_eq!(c.scaled(50.0).value, 40.0);
        assert!((c.dimmed(0.3).value - 24.0).abs() < 1e-9);
    }

    #[test]
    fn copies_do_not_alias() {
        let mut theme_copy = theme::BRAND;
        theme_copy.hue = 10.0;
        assert_eq!(theme_copy.hue, 10.0);
        assert_eq!(theme::BRAND.hue, 200.0);
    }

    #[test]
    fn apply_brightness_50_halves() {
        assert_eq!(Rgb::new(200, 100, 50).apply_brightness(50), Rgb::new(100, 50, 25));
    }

    #[test]
    fn apply_brightness_0_is_black() {
        assert_eq!(Rgb::new(255, 255, 255).apply_brightness(0), Rgb::new(0, 0, 0));
    }
}

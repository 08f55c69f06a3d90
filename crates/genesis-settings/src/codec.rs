//! String codecs for typed discrete options.
//!
//! Every discrete setting stores its options as string keys. Typed helpers
//! (bool, numbers, enums, colors, 2D vectors) encode to and decode from that
//! canonical string form, so equality between a stored value and an option
//! is always a string comparison after a round-trip.

use serde::{Deserialize, Serialize};

/// Canonical string encoding of an option value.
pub trait OptionCodec: Sized {
    /// Encode to the canonical option key.
    fn encode(&self) -> String;

    /// Decode an option key. Returns `None` for malformed input.
    fn decode(value: &str) -> Option<Self>;
}

impl OptionCodec for bool {
    fn encode(&self) -> String {
        if *self { "true" } else { "false" }.to_string()
    }

    fn decode(value: &str) -> Option<Self> {
        match value.trim() {
            "true" | "True" | "1" => Some(true),
            "false" | "False" | "0" => Some(false),
            _ => None,
        }
    }
}

impl OptionCodec for String {
    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(value: &str) -> Option<Self> {
        Some(value.to_string())
    }
}

macro_rules! impl_numeric_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl OptionCodec for $ty {
                fn encode(&self) -> String {
                    self.to_string()
                }

                fn decode(value: &str) -> Option<Self> {
                    value.trim().parse().ok()
                }
            }
        )*
    };
}

impl_numeric_codec!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

/// Implement [`OptionCodec`] for a fieldless enum, keyed by variant name.
///
/// ```
/// use genesis_settings::codec::OptionCodec;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Quality { Low, High }
/// genesis_settings::impl_enum_codec!(Quality { Low, High });
///
/// assert_eq!(Quality::High.encode(), "High");
/// assert_eq!(Quality::decode("Low"), Some(Quality::Low));
/// ```
#[macro_export]
macro_rules! impl_enum_codec {
    ($ty:ident { $($variant:ident),* $(,)? }) => {
        impl $crate::codec::OptionCodec for $ty {
            fn encode(&self) -> String {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
                .to_string()
            }

            fn decode(value: &str) -> Option<Self> {
                match value.trim() {
                    $(stringify!($variant) => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

/// Linear-space RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearColor {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl LinearColor {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a color from linear components.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Display form used for color options: `#RRGGBB` in sRGB space.
    #[must_use]
    pub fn to_srgb_hex(&self) -> String {
        format!(
            "#{:02X}{:02X}{:02X}",
            linear_to_srgb_byte(self.r),
            linear_to_srgb_byte(self.g),
            linear_to_srgb_byte(self.b)
        )
    }
}

fn linear_to_srgb_byte(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let s = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0).round().clamp(0.0, 255.0) as u8
}

impl OptionCodec for LinearColor {
    fn encode(&self) -> String {
        format!(
            "(R={:.6},G={:.6},B={:.6},A={:.6})",
            self.r, self.g, self.b, self.a
        )
    }

    fn decode(value: &str) -> Option<Self> {
        let inner = value.trim().strip_prefix('(')?.strip_suffix(')')?;
        let mut color = Self::BLACK;
        for part in inner.split(',') {
            let (key, number) = part.split_once('=')?;
            let number: f32 = number.trim().parse().ok()?;
            match key.trim() {
                "R" => color.r = number,
                "G" => color.g = number,
                "B" => color.b = number,
                "A" => color.a = number,
                _ => return None,
            }
        }
        Some(color)
    }
}

/// 2D vector option (resolutions, safe zones, ...).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
}

impl Vector2 {
    /// Create a vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl OptionCodec for Vector2 {
    fn encode(&self) -> String {
        format!("X={} Y={}", self.x, self.y)
    }

    fn decode(value: &str) -> Option<Self> {
        let mut parts = value.split_whitespace();
        let x = parts.next()?.strip_prefix("X=")?.parse().ok()?;
        let y = parts.next()?.strip_prefix("Y=")?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_codec() {
        assert_eq!(true.encode(), "true");
        assert_eq!(false.encode(), "false");
        assert_eq!(bool::decode("true"), Some(true));
        assert_eq!(bool::decode(" false "), Some(false));
        assert_eq!(bool::decode("maybe"), None);
    }

    #[test]
    fn test_numeric_codec() {
        assert_eq!(60_u32.encode(), "60");
        assert_eq!(1.0_f64.encode(), "1");
        assert_eq!(0.5_f32.encode(), "0.5");
        assert_eq!(i32::decode("-3"), Some(-3));
        assert_eq!(u8::decode("300"), None);
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Pacing {
        Locked,
        Unlocked,
    }
    crate::impl_enum_codec!(Pacing { Locked, Unlocked });

    #[test]
    fn test_enum_codec() {
        assert_eq!(Pacing::Unlocked.encode(), "Unlocked");
        assert_eq!(Pacing::decode(" Locked"), Some(Pacing::Locked));
        assert_eq!(Pacing::decode("locked"), None);
    }

    #[test]
    fn test_color_hex_is_srgb() {
        assert_eq!(LinearColor::WHITE.to_srgb_hex(), "#FFFFFF");
        assert_eq!(LinearColor::BLACK.to_srgb_hex(), "#000000");
        // Linear 0.5 is brighter than 0x80 in sRGB.
        assert_eq!(LinearColor::new(0.5, 0.0, 0.0, 1.0).to_srgb_hex(), "#BC0000");
    }

    #[test]
    fn test_color_codec() {
        let color = LinearColor::new(1.0, 0.25, 0.0, 1.0);
        let encoded = color.encode();
        assert_eq!(encoded, "(R=1.000000,G=0.250000,B=0.000000,A=1.000000)");
        assert_eq!(LinearColor::decode(&encoded), Some(color));
        assert_eq!(LinearColor::decode("R=1"), None);
    }

    #[test]
    fn test_vector2_codec() {
        let v = Vector2::new(1920.0, 1080.0);
        assert_eq!(v.encode(), "X=1920 Y=1080");
        assert_eq!(Vector2::decode("X=1920 Y=1080"), Some(v));
        assert_eq!(Vector2::decode("X=1920"), None);
    }
}

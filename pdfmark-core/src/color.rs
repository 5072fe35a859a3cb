//! Conversions between hex strings, 0-255 RGB and the 0-1 RGB triples PDF
//! stores in an annotation's `/C` entry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ColorSpec", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb`, `rrggbb`, `#rgb` or `rgb`.
    pub fn from_hex(input: &str) -> Result<Self, CoreError> {
        let digits = input.trim().trim_start_matches('#');
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_owned(),
            _ => return Err(CoreError::InvalidColor(input.to_owned())),
        };
        let value = u32::from_str_radix(&expanded, 16)
            .map_err(|_| CoreError::InvalidColor(input.to_owned()))?;
        Ok(Self {
            r: ((value >> 16) & 0xff) as u8,
            g: ((value >> 8) & 0xff) as u8,
            b: (value & 0xff) as u8,
        })
    }

    pub fn from_unit(unit: [f64; 3]) -> Self {
        Self {
            r: unit_to_byte(unit[0]),
            g: unit_to_byte(unit[1]),
            b: unit_to_byte(unit[2]),
        }
    }

    /// Accepts either a 0-255 or a 0-1 triple. Anything above 1 means the
    /// caller used the byte scale.
    pub fn from_components(values: [f64; 3]) -> Self {
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        if max > 1.0 {
            Self {
                r: values[0].round().clamp(0.0, 255.0) as u8,
                g: values[1].round().clamp(0.0, 255.0) as u8,
                b: values[2].round().clamp(0.0, 255.0) as u8,
            }
        } else {
            Self::from_unit(values)
        }
    }

    /// 0-1 floats rounded to three decimals, enough to keep every byte value
    /// distinct while keeping the written PDF readable.
    pub fn to_unit(self) -> [f64; 3] {
        [
            byte_to_unit(self.r),
            byte_to_unit(self.g),
            byte_to_unit(self.b),
        ]
    }

    /// `#rrggbb`, with an alpha byte appended when `opacity` is positive.
    pub fn to_hex(self, opacity: Option<f64>) -> String {
        let mut hex = format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b);
        if let Some(opacity) = opacity.filter(|o| *o > 0.0) {
            let alpha = (255.0 * opacity.clamp(0.0, 1.0)).round() as u8;
            hex.push_str(&format!("{alpha:02x}"));
        }
        hex
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex(None))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex(None)
    }
}

fn unit_to_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn byte_to_unit(value: u8) -> f64 {
    (f64::from(value) / 255.0 * 1000.0).round() / 1000.0
}

/// Every color representation accepted in configuration files.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Hex(String),
    Triple([f64; 3]),
    Named { r: f64, g: f64, b: f64 },
}

impl TryFrom<ColorSpec> for Rgb {
    type Error = CoreError;

    fn try_from(spec: ColorSpec) -> Result<Self, Self::Error> {
        match spec {
            ColorSpec::Hex(hex) => Rgb::from_hex(&hex),
            ColorSpec::Triple(values) => Ok(Rgb::from_components(values)),
            ColorSpec::Named { r, g, b } => Ok(Rgb::from_components([r, g, b])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(Rgb::from_hex("#ff8000").unwrap(), Rgb::new(255, 128, 0));
        assert_eq!(Rgb::from_hex("0f0").unwrap(), Rgb::new(0, 255, 0));
        assert!(Rgb::from_hex("#12345").is_err());
        assert!(Rgb::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn component_scale_is_inferred() {
        assert_eq!(
            Rgb::from_components([255.0, 250.0, 0.0]),
            Rgb::new(255, 250, 0)
        );
        assert_eq!(Rgb::from_components([1.0, 0.5, 0.0]), Rgb::new(255, 128, 0));
    }

    #[test]
    fn unit_values_round_to_three_decimals() {
        let unit = Rgb::new(255, 250, 0).to_unit();
        assert_eq!(unit, [1.0, 0.98, 0.0]);
        assert_eq!(Rgb::from_unit(unit), Rgb::new(255, 250, 0));
    }

    #[test]
    fn hex_appends_alpha_only_for_positive_opacity() {
        let color = Rgb::new(255, 255, 0);
        assert_eq!(color.to_hex(None), "#ffff00");
        assert_eq!(color.to_hex(Some(0.0)), "#ffff00");
        assert_eq!(color.to_hex(Some(0.5)), "#ffff0080");
        assert_eq!(color.to_hex(Some(1.0)), "#ffff00ff");
    }

    #[test]
    fn deserializes_every_spec_shape() {
        #[derive(Deserialize)]
        struct Holder {
            a: Rgb,
            b: Rgb,
            c: Rgb,
        }
        let holder: Holder = toml::from_str(
            "a = \"#00ff00\"\nb = [1.0, 0.0, 0.0]\nc = { r = 0, g = 0, b = 255 }\n",
        )
        .unwrap();
        assert_eq!(holder.a, Rgb::new(0, 255, 0));
        assert_eq!(holder.b, Rgb::new(255, 0, 0));
        assert_eq!(holder.c, Rgb::new(0, 0, 255));
    }
}

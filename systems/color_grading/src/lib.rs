#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Colour grading applied to cloud particles before they are presented.
//!
//! Each particle starts from its cloud's base colour and is lightened toward
//! white per channel by how far it sits from the cloud mean on the matching
//! axis, measured in standard deviations and capped at [`Z_MAX`].

use fermata_core::{FrameResult, Vec3, STDEV_EPSILON};
use serde::{Deserialize, Serialize};

/// Largest z-score that still changes the graded colour.
pub const Z_MAX: f32 = 1.5;

/// Opaque RGB colour with channels in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel intensity.
    pub red: f32,
    /// Green channel intensity.
    pub green: f32,
    /// Blue channel intensity.
    pub blue: f32,
}

impl Color {
    /// Creates a colour from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Creates a colour from hue, saturation and lightness, each in `0.0..=1.0`.
    ///
    /// Hue wraps around, so `1.0` is the same as `0.0`.
    #[must_use]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let hue = hue.rem_euclid(1.0);
        let saturation = saturation.clamp(0.0, 1.0);
        let lightness = lightness.clamp(0.0, 1.0);

        if saturation == 0.0 {
            return Self::new(lightness, lightness, lightness);
        }

        let upper = if lightness <= 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - lightness * saturation
        };
        let lower = 2.0 * lightness - upper;

        Self {
            red: hue_to_channel(lower, upper, hue + 1.0 / 3.0),
            green: hue_to_channel(lower, upper, hue),
            blue: hue_to_channel(lower, upper, hue - 1.0 / 3.0),
        }
    }

    /// Channels as an `[r, g, b]` vector.
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }

    /// Lightens each channel toward white by its own amount in `0.0..=1.0`.
    #[must_use]
    pub fn lighten_per_channel(self, amounts: Vec3) -> Self {
        let amounts = amounts.clamp(Vec3::ZERO, Vec3::ONE);
        Self {
            red: lighten_channel(self.red, amounts.x),
            green: lighten_channel(self.green, amounts.y),
            blue: lighten_channel(self.blue, amounts.z),
        }
    }
}

fn hue_to_channel(lower: f32, upper: f32, hue: f32) -> f32 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        lower + (upper - lower) * 6.0 * hue
    } else if hue < 0.5 {
        upper
    } else if hue < 2.0 / 3.0 {
        lower + (upper - lower) * 6.0 * (2.0 / 3.0 - hue)
    } else {
        lower
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

/// Absolute z-score of `value`, capped at [`Z_MAX`].
///
/// Deviations below [`STDEV_EPSILON`] are treated as the floor itself.
#[must_use]
pub fn z_score(value: f32, mean: f32, stdev: f32) -> f32 {
    ((value - mean) / stdev.max(STDEV_EPSILON)).abs().min(Z_MAX)
}

/// Per-axis capped z-scores of one position.
#[must_use]
pub fn z_scores(position: Vec3, means: Vec3, stdevs: Vec3) -> Vec3 {
    Vec3::new(
        z_score(position.x, means.x, stdevs.x),
        z_score(position.y, means.y, stdevs.y),
        z_score(position.z, means.z, stdevs.z),
    )
}

/// Grades one particle: channel = linear map of its z-score from `[0, Z_MAX]` onto `[base, 1]`.
#[must_use]
pub fn grade(position: Vec3, means: Vec3, stdevs: Vec3, base: Color) -> Color {
    base.lighten_per_channel(z_scores(position, means, stdevs) / Z_MAX)
}

/// Grades every particle of `frame`, replacing the contents of `out`.
pub fn grade_frame(frame: &FrameResult, base: Color, out: &mut Vec<Color>) {
    out.clear();
    out.extend(
        frame
            .positions
            .iter()
            .map(|position| grade(*position, frame.means, frame.stdevs, base)),
    );
}

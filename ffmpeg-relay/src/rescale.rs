//! Conversion of timestamps between rational time bases.
//!
//! All arithmetic is carried out on 128-bit intermediates so that
//! `value * num * den` never wraps; results that do not fit back into an
//! `i64` saturate at the nearest bound.

use ffmpeg_next::Rational;

/// Sub-second resolution of the internal high-resolution clock (microseconds).
pub const TIME_BASE: i64 = 1_000_000;

/// [`TIME_BASE`] expressed as a time base.
pub const TIME_BASE_Q: Rational = Rational(1, TIME_BASE as i32);

/// Timestamp value meaning "no timing information" (FFmpeg's `AV_NOPTS_VALUE`).
pub const NOPTS_VALUE: i64 = i64::MIN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rounding {
    /// Round toward zero.
    Zero,
    /// Round away from zero.
    Inf,
    /// Round toward negative infinity.
    Down,
    /// Round toward positive infinity.
    Up,
    /// Round to nearest, ties away from zero.
    NearInf,
}

impl Rounding {
    /// Same rounding, but `i64::MIN` / `i64::MAX` inputs pass through untouched.
    pub const fn pass_min_max(self) -> RoundingPolicy {
        RoundingPolicy {
            rounding: self,
            pass_min_max: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundingPolicy {
    pub rounding: Rounding,
    pub pass_min_max: bool,
}

impl From<Rounding> for RoundingPolicy {
    fn from(rounding: Rounding) -> Self {
        Self {
            rounding,
            pass_min_max: false,
        }
    }
}

/// Policy applied to PTS/DTS when relaying packets.
pub const TIMESTAMP_ROUNDING: RoundingPolicy = Rounding::NearInf.pass_min_max();

/// Rescale `value` from `from` units to `to` units: `value * from / to`.
///
/// Invalid time bases (non-positive denominators, non-positive target
/// numerator, negative source numerator) leave the value unchanged.
pub fn rescale_rnd(
    value: i64,
    from: Rational,
    to: Rational,
    policy: impl Into<RoundingPolicy>,
) -> i64 {
    let policy = policy.into();
    if policy.pass_min_max && (value == i64::MIN || value == i64::MAX) {
        return value;
    }

    let (from_num, from_den) = (from.numerator() as i128, from.denominator() as i128);
    let (to_num, to_den) = (to.numerator() as i128, to.denominator() as i128);
    if from_den <= 0 || to_den <= 0 || to_num <= 0 || from_num < 0 {
        log::warn!("rescale with invalid time base {} -> {}", from, to);
        return value;
    }

    let num = value as i128 * from_num * to_den;
    let den = from_den * to_num;
    let scaled = div_round(num, den, policy.rounding);
    scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Round-to-nearest rescale without sentinel handling, used for durations.
pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
    rescale_rnd(value, from, to, Rounding::NearInf)
}

// den is always positive here.
fn div_round(num: i128, den: i128, rounding: Rounding) -> i128 {
    let quotient = num / den;
    let remainder = num % den;
    if remainder == 0 {
        return quotient;
    }
    let away = if num < 0 { quotient - 1 } else { quotient + 1 };
    match rounding {
        Rounding::Zero => quotient,
        Rounding::Inf => away,
        Rounding::Down => {
            if num < 0 {
                away
            } else {
                quotient
            }
        }
        Rounding::Up => {
            if num < 0 {
                quotient
            } else {
                away
            }
        }
        Rounding::NearInf => {
            if 2 * remainder.abs() >= den {
                away
            } else {
                quotient
            }
        }
    }
}

use fixed::types::I32F32;

/// A layout length in document user units (millimetres unless configured
/// otherwise). Values are quantized to 1/1000 of a unit so the same input
/// always lays out identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Length(I32F32);

impl Length {
    pub const ZERO: Length = Length(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Length {
        if !value.is_finite() {
            return Length::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Length::from_milli_i64(milli)
    }

    pub fn from_i32(value: i32) -> Length {
        Length::from_milli_i64((value as i64) * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Length {
        Length::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Length {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Length(I32F32::from_bits(bits))
    }

    pub fn max(self, other: Length) -> Length {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Length) -> Length {
        if self <= other { self } else { other }
    }

    pub fn is_positive(self) -> bool {
        self > Length::ZERO
    }

    /// Half of this length, rounded to the nearest milli-unit.
    pub fn half(self) -> Length {
        self / 2
    }
}

impl std::fmt::Display for Length {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_milli(self.to_milli_i64()))
    }
}

/// Formats a milli-unit value with at most three decimals and no trailing zeros.
pub(crate) fn format_milli(milli: i64) -> String {
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.unsigned_abs();
    let whole = abs / 1000;
    let frac = abs % 1000;
    if frac == 0 {
        return format!("{sign}{whole}");
    }
    let mut s = format!("{sign}{whole}.{frac:03}");
    while s.ends_with('0') {
        s.pop();
    }
    s
}

impl std::ops::Add for Length {
    type Output = Length;
    fn add(self, rhs: Length) -> Length {
        Length::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::AddAssign for Length {
    fn add_assign(&mut self, rhs: Length) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Length {
    type Output = Length;
    fn sub(self, rhs: Length) -> Length {
        Length::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::SubAssign for Length {
    fn sub_assign(&mut self, rhs: Length) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<i32> for Length {
    type Output = Length;
    fn mul(self, rhs: i32) -> Length {
        let milli = self.to_milli_i64() as i128;
        Length::from_milli_i128(milli.saturating_mul(rhs as i128))
    }
}

impl std::ops::Mul<f32> for Length {
    type Output = Length;
    fn mul(self, rhs: f32) -> Length {
        if !rhs.is_finite() {
            return Length::ZERO;
        }
        Length::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Div<i32> for Length {
    type Output = Length;
    fn div(self, rhs: i32) -> Length {
        if rhs == 0 {
            return Length::ZERO;
        }
        let milli = self.to_milli_i64() as i128;
        Length::from_milli_i128(div_round_i128(milli, rhs as i128))
    }
}

fn div_round_i128(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let den_abs = den.abs();
    if num >= 0 {
        (num + (den_abs / 2)) / den
    } else {
        -(((-num) + (den_abs / 2)) / den)
    }
}

impl std::ops::Neg for Length {
    type Output = Length;
    fn neg(self) -> Length {
        Length::from_milli_i128(-(self.to_milli_i64() as i128))
    }
}

impl std::iter::Sum for Length {
    fn sum<I: Iterator<Item = Length>>(iter: I) -> Length {
        iter.fold(Length::ZERO, |acc, v| acc + v)
    }
}

impl<'a> std::iter::Sum<&'a Length> for Length {
    fn sum<I: Iterator<Item = &'a Length>>(iter: I) -> Length {
        iter.fold(Length::ZERO, |acc, v| acc + *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Length,
    pub height: Length,
}

impl Size {
    /// A4 portrait in millimetres.
    pub fn a4_mm() -> Self {
        Self {
            width: Length::from_f32(210.0),
            height: Length::from_f32(297.0),
        }
    }

    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: Length::from_f32(width),
            height: Length::from_f32(height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Length,
    pub y: Length,
    pub width: Length,
    pub height: Length,
}

impl Rect {
    pub fn new(x: Length, y: Length, width: Length, height: Length) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> Length {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Margins {
    pub fn all(value: f32) -> Self {
        let v = Length::from_f32(value);
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top: Length::from_f32(top),
            right: Length::from_f32(right),
            bottom: Length::from_f32(bottom),
            left: Length::from_f32(left),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}

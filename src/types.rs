use fixed::types::I32F32;

/// A length in PDF points, stored as fixed-point so layout is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli(milli)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt::from_milli(value as i64 * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        ((scaled + adj) / denom).clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    fn from_milli(milli: i64) -> Pt {
        let milli = milli as i128;
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        Pt(I32F32::from_bits(
            bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
        ))
    }

    pub fn max(self, other: Pt) -> Pt {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Pt) -> Pt {
        if self <= other { self } else { other }
    }

    /// `self * num / denom`, rounded to the nearest thousandth of a point.
    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        if denom == 0 {
            return Pt::ZERO;
        }
        let milli = self.to_milli() as i128 * num as i128;
        let denom = denom as i128;
        let half = denom.abs() / 2;
        let value = if milli >= 0 {
            (milli + half) / denom
        } else {
            -((-milli + half) / denom)
        };
        Pt::from_milli(value.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli(self.to_milli().saturating_add(rhs.to_milli()))
    }
}

impl std::ops::AddAssign for Pt {
    fn add_assign(&mut self, rhs: Pt) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli(self.to_milli().saturating_sub(rhs.to_milli()))
    }
}

impl std::ops::SubAssign for Pt {
    fn sub_assign(&mut self, rhs: Pt) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        Pt::from_milli(self.to_milli().saturating_mul(rhs as i64))
    }
}

impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        if !rhs.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt::from_milli(-self.to_milli())
    }
}

impl std::iter::Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        iter.fold(Pt::ZERO, |acc, v| acc + v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }

    pub fn from_mm(width_mm: f32, height_mm: f32) -> Self {
        Self::new(width_mm * 72.0 / 25.4, height_mm * 72.0 / 25.4)
    }

    pub fn from_inches(width_in: f32, height_in: f32) -> Self {
        Self::new(width_in * 72.0, height_in * 72.0)
    }

    pub fn landscape(self) -> Self {
        if self.width < self.height {
            Self {
                width: self.height,
                height: self.width,
            }
        } else {
            self
        }
    }
}

/// An axis-aligned rectangle. Whether `y` is measured from the top or the
/// bottom of the page depends on the caller; layout code works top-down,
/// page-region geometry uses PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= Pt::ZERO || self.height <= Pt::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

impl Margins {
    pub fn zero() -> Self {
        Self {
            top: Pt::ZERO,
            right: Pt::ZERO,
            bottom: Pt::ZERO,
            left: Pt::ZERO,
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

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pt_arithmetic_is_milli_exact() {
        let a = Pt::from_f32(0.1);
        let b = Pt::from_f32(0.2);
        assert_eq!((a + b).to_milli(), 300);
        assert_eq!((b - a).to_milli(), 100);
        assert_eq!(Pt::from_i32(10).mul_ratio(1, 3).to_milli(), 3333);
    }

    #[test]
    fn landscape_swaps_only_portrait_sizes() {
        let a4 = Size::from_mm(210.0, 297.0);
        let wide = a4.landscape();
        assert!(wide.width > wide.height);
        assert_eq!(wide.landscape(), wide);
    }
}

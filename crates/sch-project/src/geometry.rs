//! Fixed-point geometry primitives.
//!
//! Coordinates are stored in integer nanometers and angles in integer
//! microdegrees so that values survive serialize/parse round-trips exactly
//! and comparisons never depend on floating-point noise. Millimeters and
//! degrees are only used at the API boundary.

use std::ops::{Add, AddAssign, Neg, Sub};

use serde::{Deserialize, Serialize};

const NM_PER_MM: f64 = 1_000_000.0;
const MICRODEG_PER_DEG: f64 = 1_000_000.0;

/// A 2D point in nanometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Construct from millimeter coordinates, rounded to the nearest nanometer.
    pub fn from_mm(x: f64, y: f64) -> Self {
        Self {
            x: (x * NM_PER_MM).round() as i64,
            y: (y * NM_PER_MM).round() as i64,
        }
    }

    pub fn x_mm(&self) -> f64 {
        self.x as f64 / NM_PER_MM
    }

    pub fn y_mm(&self) -> f64 {
        self.y as f64 / NM_PER_MM
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// A rotation angle in microdegrees, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Angle(i64);

impl Angle {
    pub fn from_microdeg(microdeg: i64) -> Self {
        Self(microdeg)
    }

    /// Construct from degrees, rounded to the nearest microdegree.
    pub fn from_deg(deg: f64) -> Self {
        Self((deg * MICRODEG_PER_DEG).round() as i64)
    }

    pub fn microdeg(&self) -> i64 {
        self.0
    }

    pub fn deg(&self) -> f64 {
        self.0 as f64 / MICRODEG_PER_DEG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_round_trip_is_exact() {
        let p = Point::from_mm(1.27, -0.3);
        assert_eq!(p, Point::new(1_270_000, -300_000));
        assert_eq!(Point::from_mm(p.x_mm(), p.y_mm()), p);
    }

    #[test]
    fn point_offset() {
        let p = Point::new(100, 200) + Point::new(-50, 25);
        assert_eq!(p, Point::new(50, 225));
    }

    #[test]
    fn angle_deg_round_trip() {
        let a = Angle::from_deg(90.0);
        assert_eq!(a.microdeg(), 90_000_000);
        assert_eq!(Angle::from_deg(a.deg()), a);
    }
}

//! Geometry primitives.
//!
//! Pure functions over points and axis-aligned bounds. Nothing here mutates its
//! input, and everything assumes finite coordinates: callers reject or default
//! NaN/infinite values before calling in (see [`Point::is_finite`]).
//!
//! The relative/absolute transforms model the render layer's content box: a child
//! rendered inside a group is offset from the group's absolute origin plus a fixed
//! inset. With an inset of zero they reduce to vector subtraction and addition.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A 2D point in world (absolute) or parent-relative space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The origin.
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// True when both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// True when both coordinates differ by at most `tolerance`.
    pub fn approx_eq(&self, other: &Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }

    /// Returns `Some(self)` when finite.
    pub fn finite(self) -> Option<Point> {
        self.is_finite().then_some(self)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Creates bounds from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates bounds from a top-left origin and extents.
    pub fn from_origin(origin: Point, width: f64, height: f64) -> Self {
        Self::new(origin.x, origin.y, origin.x + width, origin.y + height)
    }

    /// Top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        center(self.origin(), self.width(), self.height())
    }

    /// Inclusive point test.
    pub fn contains_point(&self, point: Point) -> bool {
        rect_contains(point, self)
    }

    /// True when `other` lies entirely inside these bounds.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Area of the intersection with `other`; zero when disjoint.
    pub fn intersection_area(&self, other: &Bounds) -> f64 {
        let w = self.max_x.min(other.max_x) - self.min_x.max(other.min_x);
        let h = self.max_y.min(other.max_y) - self.min_y.max(other.min_y);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Same extents moved by a delta.
    pub fn translated(&self, delta: Point) -> Bounds {
        Bounds::new(
            self.min_x + delta.x,
            self.min_y + delta.y,
            self.max_x + delta.x,
            self.max_y + delta.y,
        )
    }
}

/// Anything with world-space bounds.
pub trait Spatial {
    fn bounds(&self) -> Bounds;
}

impl Spatial for Bounds {
    fn bounds(&self) -> Bounds {
        *self
    }
}

impl<T: Spatial> Spatial for &T {
    fn bounds(&self) -> Bounds {
        (**self).bounds()
    }
}

/// Box top-left plus half extents.
pub fn center(origin: Point, width: f64, height: f64) -> Point {
    Point::new(origin.x + width / 2.0, origin.y + height / 2.0)
}

/// Inclusive bounds test.
pub fn rect_contains(point: Point, rect: &Bounds) -> bool {
    point.x >= rect.min_x && point.x <= rect.max_x && point.y >= rect.min_y && point.y <= rect.max_y
}

/// Fraction of `inner`'s area lying within `outer`, in `[0, 1]`.
///
/// A zero-area `inner` yields 0.
pub fn overlap_fraction(inner: &Bounds, outer: &Bounds) -> f64 {
    let area = inner.area();
    if area <= 0.0 {
        return 0.0;
    }
    (inner.intersection_area(outer) / area).min(1.0)
}

/// True when at least half of `inner`'s area lies within `outer`.
pub fn is_more_than_half_inside(inner: &Bounds, outer: &Bounds) -> bool {
    overlap_fraction(inner, outer) >= 0.5
}

/// Minimum-area candidate. Ties go to the earliest candidate.
pub fn smallest_containing<T: Spatial>(candidates: &[T]) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for candidate in candidates {
        let area = candidate.bounds().area();
        match best {
            Some((_, best_area)) if area >= best_area => {}
            _ => best = Some((candidate, area)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Converts a world position into the parent's content-box space.
pub fn to_relative(absolute_child: Point, absolute_parent: Point, border_inset: f64) -> Point {
    Point::new(
        absolute_child.x - absolute_parent.x - border_inset,
        absolute_child.y - absolute_parent.y - border_inset,
    )
}

/// Inverse of [`to_relative`].
pub fn to_absolute(relative_child: Point, absolute_parent: Point, border_inset: f64) -> Point {
    Point::new(
        relative_child.x + absolute_parent.x + border_inset,
        relative_child.y + absolute_parent.y + border_inset,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let c = center(Point::new(100.0, 100.0), 300.0, 200.0);
        assert_eq!(c, Point::new(250.0, 200.0));
    }

    #[test]
    fn test_rect_contains_is_inclusive() {
        let rect = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect_contains(Point::new(0.0, 0.0), &rect));
        assert!(rect_contains(Point::new(10.0, 10.0), &rect));
        assert!(!rect_contains(Point::new(10.1, 5.0), &rect));
    }

    #[test]
    fn test_overlap_fraction() {
        let inner = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let outer = Bounds::new(5.0, 0.0, 100.0, 100.0);
        assert!((overlap_fraction(&inner, &outer) - 0.5).abs() < 1e-9);
        assert!(is_more_than_half_inside(&inner, &outer));

        let outer = Bounds::new(6.0, 0.0, 100.0, 100.0);
        assert!(!is_more_than_half_inside(&inner, &outer));
    }

    #[test]
    fn test_zero_area_box_is_never_inside() {
        let inner = Bounds::new(5.0, 5.0, 5.0, 5.0);
        let outer = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(overlap_fraction(&inner, &outer), 0.0);
    }

    #[test]
    fn test_smallest_containing_ties_keep_first() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::new(5.0, 5.0, 15.0, 15.0);
        let c = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let candidates = [c, a, b];
        assert_eq!(smallest_containing(&candidates), Some(&a));
        assert_eq!(smallest_containing::<Bounds>(&[]), None);
    }

    #[test]
    fn test_relative_with_inset() {
        let parent = Point::new(100.0, 100.0);
        let rel = to_relative(Point::new(150.0, 160.0), parent, 2.0);
        assert_eq!(rel, Point::new(48.0, 58.0));
        assert_eq!(to_absolute(rel, parent, 2.0), Point::new(150.0, 160.0));
    }
}

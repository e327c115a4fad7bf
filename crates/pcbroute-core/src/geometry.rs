use serde::{Deserialize, Serialize};

/// Position of a point relative to a directed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    OnTheLeft,
    OnTheRight,
    Collinear,
}

/// A 2D point in board coordinates (integer database units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn translate(&self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Exact orientation of this point relative to the line from `from` to `to`.
    pub fn side_of(&self, from: &Point, to: &Point) -> Side {
        let dx1 = i128::from(to.x - from.x);
        let dy1 = i128::from(to.y - from.y);
        let dx2 = i128::from(self.x - from.x);
        let dy2 = i128::from(self.y - from.y);
        let det = dx1 * dy2 - dy1 * dx2;
        if det > 0 {
            Side::OnTheLeft
        } else if det < 0 {
            Side::OnTheRight
        } else {
            Side::Collinear
        }
    }

    /// Returns true if this point lies strictly inside the circle through
    /// `a`, `b` and `c`, in any orientation. Always false for collinear `a`, `b`, `c`.
    ///
    /// Exact for coordinates up to 2^28 in absolute value.
    pub fn inside_circle(&self, a: &Point, b: &Point, c: &Point) -> bool {
        let orientation = match c.side_of(a, b) {
            Side::OnTheLeft => 1,
            Side::OnTheRight => -1,
            Side::Collinear => return false,
        };
        let [(adx, ady), (bdx, bdy), (cdx, cdy)] =
            [a, b, c].map(|p| (i128::from(p.x - self.x), i128::from(p.y - self.y)));
        let det = (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
            - (bdx * bdx + bdy * bdy) * (adx * cdy - cdx * ady)
            + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady);
        det.signum() == orientation
    }

    pub fn to_float(&self) -> FloatPoint {
        FloatPoint::new(self.x as f64, self.y as f64)
    }
}

/// A point with floating-point coordinates, used where exact arithmetic is not needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatPoint {
    pub x: f64,
    pub y: f64,
}

impl FloatPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_square(&self, other: &FloatPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// An axis-aligned box with integer bounds (closed on all sides).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntBox {
    pub ll: Point,
    pub ur: Point,
}

impl IntBox {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self {
            ll: Point::new(x1.min(x2), y1.min(y2)),
            ur: Point::new(x1.max(x2), y1.max(y2)),
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut result = IntBox {
            ll: *first,
            ur: *first,
        };
        for p in &points[1..] {
            result.ll.x = result.ll.x.min(p.x);
            result.ll.y = result.ll.y.min(p.y);
            result.ur.x = result.ur.x.max(p.x);
            result.ur.y = result.ur.y.max(p.y);
        }
        Some(result)
    }

    pub fn width(&self) -> i64 {
        self.ur.x - self.ll.x
    }

    pub fn height(&self) -> i64 {
        self.ur.y - self.ll.y
    }

    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    pub fn center(&self) -> Point {
        Point::new((self.ll.x + self.ur.x) / 2, (self.ll.y + self.ur.y) / 2)
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.ll,
            Point::new(self.ur.x, self.ll.y),
            self.ur,
            Point::new(self.ll.x, self.ur.y),
        ]
    }

    pub fn union(&self, other: &IntBox) -> Self {
        Self {
            ll: Point::new(self.ll.x.min(other.ll.x), self.ll.y.min(other.ll.y)),
            ur: Point::new(self.ur.x.max(other.ur.x), self.ur.y.max(other.ur.y)),
        }
    }

    pub fn intersects(&self, other: &IntBox) -> bool {
        self.ll.x <= other.ur.x
            && self.ur.x >= other.ll.x
            && self.ll.y <= other.ur.y
            && self.ur.y >= other.ll.y
    }

    pub fn contains(&self, other: &IntBox) -> bool {
        self.ll.x <= other.ll.x
            && self.ll.y <= other.ll.y
            && self.ur.x >= other.ur.x
            && self.ur.y >= other.ur.y
    }

    pub fn to_octagon(&self) -> IntOctagon {
        IntOctagon {
            lx: self.ll.x,
            ly: self.ll.y,
            rx: self.ur.x,
            uy: self.ur.y,
            min_sum: self.ll.x + self.ll.y,
            max_sum: self.ur.x + self.ur.y,
            min_diff: self.ll.x - self.ur.y,
            max_diff: self.ur.x - self.ll.y,
        }
    }
}

/// A convex octagon bounded in the four directions 0, 45, 90 and 135 degrees.
///
/// `min_sum`/`max_sum` bound `x + y`, `min_diff`/`max_diff` bound `x - y`.
/// Octagons built through [`IntOctagon::from_points`] and [`IntOctagon::union`]
/// are tight: every bound is attained by the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntOctagon {
    pub lx: i64,
    pub ly: i64,
    pub rx: i64,
    pub uy: i64,
    pub min_sum: i64,
    pub max_sum: i64,
    pub min_diff: i64,
    pub max_diff: i64,
}

impl IntOctagon {
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut result = IntOctagon {
            lx: first.x,
            ly: first.y,
            rx: first.x,
            uy: first.y,
            min_sum: first.x + first.y,
            max_sum: first.x + first.y,
            min_diff: first.x - first.y,
            max_diff: first.x - first.y,
        };
        for p in &points[1..] {
            result.lx = result.lx.min(p.x);
            result.ly = result.ly.min(p.y);
            result.rx = result.rx.max(p.x);
            result.uy = result.uy.max(p.y);
            result.min_sum = result.min_sum.min(p.x + p.y);
            result.max_sum = result.max_sum.max(p.x + p.y);
            result.min_diff = result.min_diff.min(p.x - p.y);
            result.max_diff = result.max_diff.max(p.x - p.y);
        }
        Some(result)
    }

    pub fn bounding_box(&self) -> IntBox {
        IntBox::new(self.lx, self.ly, self.rx, self.uy)
    }

    /// Area of the box minus the four diagonal corner cuts.
    pub fn area(&self) -> f64 {
        let cut = |c: i64| {
            let c = c.max(0) as f64;
            c * c / 2.0
        };
        let box_area = (self.rx - self.lx) as f64 * (self.uy - self.ly) as f64;
        box_area
            - cut(self.min_sum - (self.lx + self.ly))
            - cut((self.rx + self.uy) - self.max_sum)
            - cut(self.min_diff - (self.lx - self.uy))
            - cut((self.rx - self.ly) - self.max_diff)
    }

    pub fn union(&self, other: &IntOctagon) -> Self {
        Self {
            lx: self.lx.min(other.lx),
            ly: self.ly.min(other.ly),
            rx: self.rx.max(other.rx),
            uy: self.uy.max(other.uy),
            min_sum: self.min_sum.min(other.min_sum),
            max_sum: self.max_sum.max(other.max_sum),
            min_diff: self.min_diff.min(other.min_diff),
            max_diff: self.max_diff.max(other.max_diff),
        }
    }

    /// Both octagons share their edge directions, so overlapping projections on
    /// the four axes are sufficient for an intersection.
    pub fn intersects(&self, other: &IntOctagon) -> bool {
        self.lx <= other.rx
            && self.rx >= other.lx
            && self.ly <= other.uy
            && self.uy >= other.ly
            && self.min_sum <= other.max_sum
            && self.max_sum >= other.min_sum
            && self.min_diff <= other.max_diff
            && self.max_diff >= other.min_diff
    }

    pub fn contains(&self, other: &IntOctagon) -> bool {
        self.lx <= other.lx
            && self.ly <= other.ly
            && self.rx >= other.rx
            && self.uy >= other.uy
            && self.min_sum <= other.min_sum
            && self.max_sum >= other.max_sum
            && self.min_diff <= other.min_diff
            && self.max_diff >= other.max_diff
    }
}

/// The fixed direction family used to compute bounding shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundingDirections {
    /// Horizontal and vertical directions: bounding shapes are boxes.
    Orthogonal,
    /// Horizontal, vertical and diagonal directions: bounding shapes are octagons.
    #[default]
    Octilinear,
}

/// A bounding shape produced under a [`BoundingDirections`] family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundingShape {
    Box(IntBox),
    Octagon(IntOctagon),
}

impl BoundingShape {
    fn to_octagon(&self) -> IntOctagon {
        match self {
            BoundingShape::Box(b) => b.to_octagon(),
            BoundingShape::Octagon(o) => *o,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            BoundingShape::Box(b) => b.area(),
            BoundingShape::Octagon(o) => o.area(),
        }
    }

    pub fn union(&self, other: &BoundingShape) -> Self {
        match (self, other) {
            (BoundingShape::Box(a), BoundingShape::Box(b)) => BoundingShape::Box(a.union(b)),
            _ => BoundingShape::Octagon(self.to_octagon().union(&other.to_octagon())),
        }
    }

    pub fn intersects(&self, other: &BoundingShape) -> bool {
        match (self, other) {
            (BoundingShape::Box(a), BoundingShape::Box(b)) => a.intersects(b),
            _ => self.to_octagon().intersects(&other.to_octagon()),
        }
    }

    pub fn contains(&self, other: &BoundingShape) -> bool {
        match (self, other) {
            (BoundingShape::Box(a), BoundingShape::Box(b)) => a.contains(b),
            _ => self.to_octagon().contains(&other.to_octagon()),
        }
    }

    pub fn bounding_box(&self) -> IntBox {
        match self {
            BoundingShape::Box(b) => *b,
            BoundingShape::Octagon(o) => o.bounding_box(),
        }
    }
}

/// A convex tile shape given by its corners in counter-clockwise order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileShape {
    pub corners: Vec<Point>,
}

impl TileShape {
    pub fn new(corners: Vec<Point>) -> Self {
        Self { corners }
    }

    pub fn from_box(b: IntBox) -> Self {
        Self::new(b.corners().to_vec())
    }

    /// The octagonal shape of a straight trace from `from` to `to` with the given half width.
    pub fn trace(from: Point, to: Point, half_width: i64) -> Self {
        let hw = half_width.max(0);
        let corners = [from, to]
            .iter()
            .flat_map(|p| IntBox::new(p.x - hw, p.y - hw, p.x + hw, p.y + hw).corners())
            .collect();
        Self::new(corners)
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }

    pub fn translate(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.corners.iter().map(|p| p.translate(dx, dy)).collect())
    }

    /// Smallest bounding shape in the given direction family, or `None` for an empty shape.
    pub fn bounding_shape(&self, directions: BoundingDirections) -> Option<BoundingShape> {
        match directions {
            BoundingDirections::Orthogonal => {
                IntBox::from_points(&self.corners).map(BoundingShape::Box)
            }
            BoundingDirections::Octilinear => {
                IntOctagon::from_points(&self.corners).map(BoundingShape::Octagon)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_of() {
        let a = Point::new(0, 0);
        let b = Point::new(10, 0);
        assert_eq!(Point::new(5, 3).side_of(&a, &b), Side::OnTheLeft);
        assert_eq!(Point::new(5, -3).side_of(&a, &b), Side::OnTheRight);
        assert_eq!(Point::new(20, 0).side_of(&a, &b), Side::Collinear);
    }

    #[test]
    fn test_inside_circle() {
        let a = Point::new(0, 0);
        let b = Point::new(10, 0);
        let c = Point::new(0, 10);
        assert!(Point::new(5, 5).inside_circle(&a, &b, &c));
        assert!(Point::new(5, 5).inside_circle(&a, &c, &b));
        assert!(!Point::new(20, 20).inside_circle(&a, &b, &c));
        // cocircular point is not strictly inside
        assert!(!Point::new(10, 10).inside_circle(&a, &b, &c));
        assert!(!Point::new(1, 0).inside_circle(&a, &b, &Point::new(20, 0)));
    }

    #[test]
    fn test_box_union_and_area() {
        let a = IntBox::new(0, 0, 10, 10);
        let b = IntBox::new(5, 5, 20, 15);
        let u = a.union(&b);
        assert_eq!(u, IntBox::new(0, 0, 20, 15));
        assert!((u.area() - 300.0).abs() < 1e-10);
        assert!(u.contains(&a));
        assert!(!a.contains(&u));
    }

    #[test]
    fn test_octagon_area() {
        let square = IntOctagon::from_points(&IntBox::new(0, 0, 10, 10).corners()).unwrap();
        assert!((square.area() - 100.0).abs() < 1e-10);

        let diagonal = IntOctagon::from_points(&[Point::new(0, 0), Point::new(10, 10)]).unwrap();
        assert!(diagonal.area().abs() < 1e-10);

        let diamond = IntOctagon::from_points(&[
            Point::new(10, 0),
            Point::new(20, 10),
            Point::new(10, 20),
            Point::new(0, 10),
        ])
        .unwrap();
        assert!((diamond.area() - 200.0).abs() < 1e-10);
    }

    #[test]
    fn test_octagon_intersection_uses_diagonals() {
        let a = IntOctagon::from_points(&[Point::new(0, 0), Point::new(10, 10)]).unwrap();
        let b = IntOctagon::from_points(&[Point::new(9, 0), Point::new(10, 1)]).unwrap();
        // the boxes overlap, but b lies below the diagonal segment a
        assert!(a.bounding_box().intersects(&b.bounding_box()));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_bounding_shape_of_empty_tile() {
        let empty = TileShape::new(Vec::new());
        assert!(empty.bounding_shape(BoundingDirections::Octilinear).is_none());
        assert!(empty.bounding_shape(BoundingDirections::Orthogonal).is_none());
    }

    #[test]
    fn test_mixed_union_is_octagon() {
        let a = BoundingShape::Box(IntBox::new(0, 0, 4, 4));
        let b = BoundingShape::Octagon(IntOctagon::from_points(&[Point::new(10, 10)]).unwrap());
        let u = a.union(&b);
        assert!(matches!(u, BoundingShape::Octagon(_)));
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }
}

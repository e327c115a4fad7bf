//! Incremental Delaunay triangulation of the corners of board objects.
//!
//! The corners are inserted in a shuffled but reproducible order into a
//! triangulation that starts from one big sentinel triangle. A directed
//! acyclic graph of all triangles ever created locates the leaf triangle
//! containing each new corner. After a split the affected edges are
//! legalized by recursive edge flips.
//!
//! The result is used for rats nests: the edges connect nearest neighbours
//! among the corners, see [`PlanarDelaunayTriangulation::get_edge_lines`].

use std::collections::BTreeSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::TriangulationError;
use crate::geometry::{Point, Side};

/// Coordinate of the sentinel triangle corners.
pub const SENTINEL_COORDINATE: i64 = 1 << 26;

/// Largest absolute corner coordinate strictly enclosed by the sentinel triangle.
pub const COORDINATE_LIMIT: i64 = SENTINEL_COORDINATE / 4;

/// Seed used by [`PlanarDelaunayTriangulation::new`].
pub const DEFAULT_SEED: u64 = 99;

/// Objects whose corners can be triangulated.
pub trait TriangulationStorable {
    fn triangulation_corners(&self) -> Vec<Point>;
}

macro_rules! define_index {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        struct $name(u32);

        impl $name {
            #[inline(always)]
            fn new(id: usize) -> Self {
                Self(id as u32)
            }
            #[inline(always)]
            fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_index!(CornerId);
// Edge ids grow monotonically and order edges in result sets.
define_index!(EdgeId);
define_index!(TriangleId);

/// A line of the triangulation result.
#[derive(Debug)]
pub struct ResultEdge<'a, T> {
    pub start_point: Point,
    pub start_object: &'a T,
    pub end_point: Point,
    pub end_object: &'a T,
}

impl<T> ResultEdge<'_, T> {
    pub fn length_square(&self) -> f64 {
        self.start_point.to_float().distance_square(&self.end_point.to_float())
    }
}

impl<T> Clone for ResultEdge<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ResultEdge<'_, T> {}

#[derive(Debug, Clone, Copy)]
struct Corner {
    point: Point,
    /// Index of the owning input object; `None` for the sentinel corners.
    object: Option<usize>,
}

#[derive(Debug, Clone)]
struct Edge {
    start: CornerId,
    end: CornerId,
    left: Option<TriangleId>,
    right: Option<TriangleId>,
}

/// Parents of a triangle in the search graph.
///
/// Triangles created by an edge flip replace two triangles and so have two
/// parents. Leaf enumeration descends only through `primary` to visit every
/// node exactly once.
#[derive(Debug, Clone, Copy)]
struct Parents {
    primary: Option<TriangleId>,
    secondary: Option<TriangleId>,
}

#[derive(Debug, Clone)]
struct Triangle {
    /// Counter-clockwise around the border.
    edges: [EdgeId; 3],
    children: Vec<TriangleId>,
    parents: Parents,
    /// Whether this triangle is on the left of each edge. Fixed when the
    /// triangle enters the search graph, because the neighbour links of the
    /// edges point only to leaf triangles afterwards.
    on_left: Option<[bool; 3]>,
}

impl Triangle {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

pub struct PlanarDelaunayTriangulation<'a, T> {
    objects: &'a [T],
    corners: Vec<Corner>,
    edges: Vec<Edge>,
    triangles: Vec<Triangle>,
    anchor: TriangleId,
    /// Edges between equal corners of different objects.
    degenerate_edges: Vec<(CornerId, CornerId)>,
}

impl<T> fmt::Debug for PlanarDelaunayTriangulation<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanarDelaunayTriangulation")
            .field("objects", &self.objects.len())
            .field("corners", &self.corners.len())
            .field("edges", &self.edges.len())
            .field("triangles", &self.triangles.len())
            .field("degenerate_edges", &self.degenerate_edges.len())
            .finish()
    }
}

impl<'a, T: TriangulationStorable> PlanarDelaunayTriangulation<'a, T> {
    /// Triangulates the corners of `objects`, shuffled with [`DEFAULT_SEED`].
    pub fn new(objects: &'a [T]) -> Result<Self, TriangulationError> {
        let mut rng = StdRng::seed_from_u64(DEFAULT_SEED);
        Self::with_rng(objects, &mut rng)
    }

    /// Triangulates the corners of `objects`, shuffled with `rng`.
    pub fn with_rng<R: Rng + ?Sized>(objects: &'a [T], rng: &mut R) -> Result<Self, TriangulationError> {
        let mut input = Vec::new();
        for (index, object) in objects.iter().enumerate() {
            for point in object.triangulation_corners() {
                if point.x.abs() > COORDINATE_LIMIT || point.y.abs() > COORDINATE_LIMIT {
                    return Err(TriangulationError::CornerOutOfRange {
                        x: point.x,
                        y: point.y,
                        limit: COORDINATE_LIMIT,
                    });
                }
                input.push(Corner {
                    point,
                    object: Some(index),
                });
            }
        }
        input.shuffle(rng);

        let mut result = Self {
            objects,
            corners: Vec::with_capacity(input.len() + 3),
            edges: Vec::with_capacity(3 * input.len() + 3),
            triangles: Vec::new(),
            anchor: TriangleId::new(0),
            degenerate_edges: Vec::new(),
        };

        // A big triangle containing all input corners to start with.
        let s = SENTINEL_COORDINATE;
        let sentinel = [Point::new(s, 0), Point::new(0, s), Point::new(-s, -s)].map(|point| {
            result.add_corner(Corner {
                point,
                object: None,
            })
        });
        let sentinel_edges = [
            result.new_edge(sentinel[0], sentinel[1]),
            result.new_edge(sentinel[1], sentinel[2]),
            result.new_edge(sentinel[2], sentinel[0]),
        ];
        let start_triangle = result.new_triangle(sentinel_edges, None);
        for edge in sentinel_edges {
            result.edge_mut(edge).left = Some(start_triangle);
        }
        result.init_on_left(start_triangle);
        result.anchor = start_triangle;

        for corner in input {
            let corner = result.add_corner(corner);
            let triangle = result.position_locate(corner);
            result.split(triangle, corner);
        }
        log::debug!(
            "Triangulated {} corners of {} objects into {} triangles",
            result.corners.len() - 3,
            objects.len(),
            result.triangles.len()
        );
        Ok(result)
    }

    /// All lines of the triangulation between object corners.
    ///
    /// Degenerate edges between equal corners of different objects come first,
    /// followed by the triangulation edges in creation order. Edges touching a
    /// sentinel corner are left out.
    pub fn get_edge_lines(&self) -> Vec<ResultEdge<'a, T>> {
        let mut result = Vec::new();
        for &(start, end) in &self.degenerate_edges {
            if let Some(edge) = self.result_edge(start, end) {
                result.push(edge);
            }
        }
        for edge in self.leaf_edges() {
            let edge = self.edge(edge);
            if let Some(line) = self.result_edge(edge.start, edge.end) {
                result.push(line);
            }
        }
        result
    }

    fn result_edge(&self, start: CornerId, end: CornerId) -> Option<ResultEdge<'a, T>> {
        let start = self.corner(start);
        let end = self.corner(end);
        let objects = self.objects;
        Some(ResultEdge {
            start_point: start.point,
            start_object: &objects[start.object?],
            end_point: end.point,
            end_object: &objects[end.object?],
        })
    }
}

impl<T> PlanarDelaunayTriangulation<'_, T> {
    /// Number of input corners, without the sentinel corners.
    pub fn corner_count(&self) -> usize {
        self.corners.len() - 3
    }

    pub fn degenerate_edge_count(&self) -> usize {
        self.degenerate_edges.len()
    }

    /// Number of current edges failing the Delaunay criterion. Zero after a
    /// successful construction.
    pub fn illegal_edge_count(&self) -> usize {
        self.live_edges()
            .into_iter()
            .filter(|edge| !self.is_legal(*edge))
            .count()
    }

    /// Checks the consistency of the edges and triangles of the triangulation.
    /// Used for debugging.
    pub fn validate(&self) -> bool {
        let mut result = true;
        let mut stack = vec![self.anchor];
        while let Some(curr) = stack.pop() {
            let triangle = self.triangle(curr);
            if !triangle.is_leaf() {
                stack.extend(self.primary_children(curr));
                continue;
            }
            let mut prev_edge = triangle.edges[2];
            for &curr_edge in &triangle.edges {
                if !self.validate_edge(curr_edge) {
                    result = false;
                }
                let prev = self.edge(prev_edge);
                let prev_end = if prev.left == Some(curr) {
                    prev.end
                } else {
                    prev.start
                };
                let edge = self.edge(curr_edge);
                let curr_start = if edge.left == Some(curr) {
                    edge.start
                } else if edge.right == Some(curr) {
                    edge.end
                } else {
                    log::error!("Triangle {curr:?} is not a neighbour of its edge {curr_edge:?}");
                    return false;
                };
                if curr_start != prev_end {
                    log::error!("Corners of triangle {curr:?} are inconsistent");
                    result = false;
                }
                prev_edge = curr_edge;
            }
        }
        if result {
            log::debug!("Delaunay triangulation check passed");
        } else {
            log::warn!("Delaunay triangulation check has detected problems");
        }
        result
    }

    fn validate_edge(&self, id: EdgeId) -> bool {
        let edge = self.edge(id);
        let bounding = self.corner(edge.start).object.is_none() || self.corner(edge.end).object.is_none();
        let mut result = true;
        for (side, neighbour) in [("left", edge.left), ("right", edge.right)] {
            match neighbour {
                None if !bounding => {
                    log::error!("Edge {id:?}: {side} triangle may be missing only on the sentinel border");
                    result = false;
                }
                None => {}
                Some(triangle) => {
                    if !self.triangle(triangle).edges.contains(&id) {
                        log::error!("Edge {id:?}: {side} triangle does not contain this edge");
                        result = false;
                    }
                }
            }
        }
        result
    }

    // ── Insertion ────────────────────────────────────────────────────

    /// Finds the leaf triangle containing `corner`. Not unique if the corner lies on an edge.
    fn position_locate(&self, corner: CornerId) -> TriangleId {
        let mut curr = self.anchor;
        loop {
            let triangle = self.triangle(curr);
            if triangle.is_leaf() {
                return curr;
            }
            match triangle
                .children
                .iter()
                .copied()
                .find(|child| self.contains(*child, corner))
            {
                Some(child) => curr = child,
                None => panic!(
                    "triangulation: no child of {curr:?} contains {:?}",
                    self.corner(corner).point
                ),
            }
        }
    }

    /// Splits `triangle` into 3 triangles at `corner` if the corner lies in its
    /// interior. If the corner lies on an edge, the triangle and its neighbour
    /// at that edge are split into 2 triangles each.
    fn split(&mut self, triangle: TriangleId, corner: CornerId) {
        let point = self.corner(corner).point;
        let mut containing_edge: Option<EdgeId> = None;
        for i in 0..3 {
            let curr_edge = self.triangle(triangle).edges[i];
            let edge = self.edge(curr_edge);
            let (from, to) = if edge.left == Some(triangle) {
                (edge.start, edge.end)
            } else {
                (edge.end, edge.start)
            };
            match point.side_of(&self.corner(from).point, &self.corner(to).point) {
                Side::OnTheRight => panic!("triangulation: {point:?} lies outside of its located triangle {triangle:?}"),
                Side::OnTheLeft => {}
                Side::Collinear => {
                    let Some(other_edge) = containing_edge else {
                        containing_edge = Some(curr_edge);
                        continue;
                    };
                    // the corner equals a corner of this triangle
                    let common = self
                        .common_corner(curr_edge, other_edge)
                        .expect("triangulation: adjacent triangle edges share a corner");
                    if self.corner(corner).object != self.corner(common).object {
                        self.degenerate_edges.push((corner, common));
                    }
                    return;
                }
            }
        }

        match containing_edge {
            None => {
                let new_triangles = self.split_at_inner_point(triangle, corner);
                for child in new_triangles {
                    self.attach(child, triangle);
                }
                let edges = self.triangle(triangle).edges;
                for edge in edges {
                    self.legalize_edge(corner, edge);
                }
            }
            Some(containing_edge) => {
                let neighbour = self
                    .other_neighbour(containing_edge, triangle)
                    .expect("triangulation: an edge containing an input corner has two neighbours");
                let new_triangles = self.split_at_border_point(triangle, neighbour, containing_edge, corner);
                // The first 2 new triangles divide the triangle, the last 2 the neighbour.
                self.attach(new_triangles[0], triangle);
                self.attach(new_triangles[1], triangle);
                self.attach(new_triangles[2], neighbour);
                self.attach(new_triangles[3], neighbour);
                for outer in [triangle, neighbour] {
                    let edges = self.triangle(outer).edges;
                    for edge in edges {
                        if edge != containing_edge {
                            self.legalize_edge(corner, edge);
                        }
                    }
                }
            }
        }
    }

    /// Splits a triangle into 3 by connecting its corners to the interior `corner`.
    fn split_at_inner_point(&mut self, triangle: TriangleId, corner: CornerId) -> [TriangleId; 3] {
        let [c0, c1, c2] = [0, 1, 2].map(|i| self.corner_of(triangle, i));
        let [e0, e1, e2] = self.triangle(triangle).edges;

        let c1_to_corner = self.new_edge(c1, corner);
        let corner_to_c0 = self.new_edge(corner, c0);
        let c2_to_corner = self.new_edge(c2, corner);

        let t0 = self.new_triangle([e0, c1_to_corner, corner_to_c0], Some(triangle));
        let t1 = self.new_triangle([e1, c2_to_corner, c1_to_corner], Some(triangle));
        let t2 = self.new_triangle([e2, corner_to_c0, c2_to_corner], Some(triangle));

        self.replace_neighbour(e0, triangle, t0);
        self.replace_neighbour(e1, triangle, t1);
        self.replace_neighbour(e2, triangle, t2);

        self.set_neighbours(c1_to_corner, t0, t1);
        self.set_neighbours(c2_to_corner, t1, t2);
        self.set_neighbours(corner_to_c0, t0, t2);
        [t0, t1, t2]
    }

    /// Splits `triangle` and `neighbour` into 2 triangles each at `corner`,
    /// which lies inside their common edge `touching`.
    fn split_at_border_point(
        &mut self,
        triangle: TriangleId,
        neighbour: TriangleId,
        touching: EdgeId,
        corner: CornerId,
    ) -> [TriangleId; 4] {
        let this_index = self.edge_index(triangle, touching);
        let neighbour_index = self.edge_index(neighbour, touching);
        let touching_edge = self.edge(touching).clone();

        // The 2 halves of the triangle lie on the left of the new common edges.
        let (first_common, second_common) = if touching_edge.left == Some(triangle) {
            (
                self.new_edge(touching_edge.start, corner),
                self.new_edge(corner, touching_edge.end),
            )
        } else {
            (
                self.new_edge(touching_edge.end, corner),
                self.new_edge(corner, touching_edge.start),
            )
        };

        // first half of the triangle
        let prev_edge = self.triangle(triangle).edges[(this_index + 2) % 3];
        let prev = self.edge(prev_edge).clone();
        let this_splitting = if prev.left == Some(triangle) {
            self.new_edge(corner, prev.start)
        } else {
            self.new_edge(corner, prev.end)
        };
        let t0 = self.new_triangle([prev_edge, first_common, this_splitting], Some(triangle));
        self.replace_neighbour(prev_edge, triangle, t0);
        self.edge_mut(first_common).left = Some(t0);
        self.edge_mut(this_splitting).left = Some(t0);

        // second half of the triangle
        let next_edge = self.triangle(triangle).edges[(this_index + 1) % 3];
        let t1 = self.new_triangle([this_splitting, second_common, next_edge], Some(triangle));
        self.edge_mut(this_splitting).right = Some(t1);
        self.edge_mut(second_common).left = Some(t1);
        self.replace_neighbour(next_edge, triangle, t1);

        // first half of the neighbour
        let next_edge = self.triangle(neighbour).edges[(neighbour_index + 1) % 3];
        let next = self.edge(next_edge).clone();
        let neighbour_splitting = if next.left == Some(neighbour) {
            self.new_edge(next.end, corner)
        } else {
            self.new_edge(next.start, corner)
        };
        let t2 = self.new_triangle([neighbour_splitting, first_common, next_edge], Some(neighbour));
        self.edge_mut(neighbour_splitting).left = Some(t2);
        self.edge_mut(first_common).right = Some(t2);
        self.replace_neighbour(next_edge, neighbour, t2);

        // second half of the neighbour
        let prev_edge = self.triangle(neighbour).edges[(neighbour_index + 2) % 3];
        let t3 = self.new_triangle([prev_edge, second_common, neighbour_splitting], Some(neighbour));
        self.replace_neighbour(prev_edge, neighbour, t3);
        self.edge_mut(second_common).right = Some(t3);
        self.edge_mut(neighbour_splitting).right = Some(t3);

        [t0, t1, t2, t3]
    }

    /// Flips `edge` if it violates the Delaunay criterion, and recursively
    /// checks the other edges of the triangle not containing `corner`, the
    /// corner inserted last.
    fn legalize_edge(&mut self, corner: CornerId, edge: EdgeId) {
        if self.is_legal(edge) {
            return;
        }
        let Edge { left, right, .. } = *self.edge(edge);
        let (Some(left), Some(right)) = (left, right) else {
            return;
        };
        let triangle_to_change = if self.opposite_corner(left, edge) == corner {
            right
        } else if self.opposite_corner(right, edge) == corner {
            left
        } else {
            log::error!("Triangulation: neither neighbour of edge {edge:?} contains the inserted corner");
            debug_assert!(false, "edge {edge:?} is not adjacent to the inserted corner");
            return;
        };

        let (new_left, new_right) = self.flip(edge, left, right);
        self.attach(new_left, left);
        self.attach(new_right, left);
        self.attach(new_left, right);
        self.attach(new_right, right);

        let edges = self.triangle(triangle_to_change).edges;
        for curr_edge in edges {
            if curr_edge != edge {
                self.legalize_edge(corner, curr_edge);
            }
        }
    }

    /// An edge is legal if the opposite corner of its right triangle is not
    /// inside the circle through its end points and the opposite corner of its
    /// left triangle.
    fn is_legal(&self, edge: EdgeId) -> bool {
        let Edge {
            start,
            end,
            left,
            right,
        } = *self.edge(edge);
        let (Some(left), Some(right)) = (left, right) else {
            return true;
        };
        let left_opposite = self.corner(self.opposite_corner(left, edge)).point;
        let right_opposite = self.corner(self.opposite_corner(right, edge)).point;
        !right_opposite.inside_circle(&self.corner(start).point, &left_opposite, &self.corner(end).point)
    }

    /// Replaces `edge` by the edge between the opposite corners of its two
    /// triangles. Returns the new left and right triangle of the flipped edge.
    fn flip(&mut self, edge: EdgeId, left: TriangleId, right: TriangleId) -> (TriangleId, TriangleId) {
        // The start corner of the old edge ends up on the left of the flipped edge.
        let flipped = self.new_edge(self.opposite_corner(right, edge), self.opposite_corner(left, edge));

        let left_index = self.edge_index(left, edge);
        let right_index = self.edge_index(right, edge);
        let left_edges = self.triangle(left).edges;
        let right_edges = self.triangle(right).edges;
        let left_prev = left_edges[(left_index + 2) % 3];
        let left_next = left_edges[(left_index + 1) % 3];
        let right_prev = right_edges[(right_index + 2) % 3];
        let right_next = right_edges[(right_index + 1) % 3];

        let new_left = self.new_triangle([flipped, left_prev, right_next], Some(left));
        self.edge_mut(flipped).left = Some(new_left);
        self.replace_neighbour(left_prev, left, new_left);
        self.replace_neighbour(right_next, right, new_left);

        let new_right = self.new_triangle([flipped, right_prev, left_next], Some(left));
        self.edge_mut(flipped).right = Some(new_right);
        self.replace_neighbour(right_prev, right, new_right);
        self.replace_neighbour(left_next, left, new_right);

        (new_left, new_right)
    }

    // ── Search graph ─────────────────────────────────────────────────

    /// Makes `child` a child of `parent` in the search graph.
    fn attach(&mut self, child: TriangleId, parent: TriangleId) {
        self.init_on_left(child);
        let parents = &mut self.triangles[child.index()].parents;
        if parents.primary != Some(parent) {
            debug_assert!(parents.secondary.is_none(), "a triangle has at most 2 parents");
            parents.secondary = Some(parent);
        }
        self.triangles[parent.index()].children.push(child);
    }

    fn init_on_left(&mut self, triangle: TriangleId) {
        if self.triangle(triangle).on_left.is_some() {
            return;
        }
        let edges = self.triangle(triangle).edges;
        let on_left = edges.map(|edge| self.edge(edge).left == Some(triangle));
        self.triangles[triangle.index()].on_left = Some(on_left);
    }

    /// Checks if `corner` is inside or on the border of `triangle`.
    ///
    /// Uses the orientation recorded when the triangle entered the search
    /// graph, so it works for inner nodes as well.
    fn contains(&self, triangle: TriangleId, corner: CornerId) -> bool {
        let triangle = self.triangle(triangle);
        let Some(on_left) = triangle.on_left else {
            debug_assert!(false, "triangle in the search graph without orientation");
            return false;
        };
        let point = self.corner(corner).point;
        triangle.edges.iter().zip(on_left).all(|(edge, on_left)| {
            let edge = self.edge(*edge);
            let side = point.side_of(&self.corner(edge.start).point, &self.corner(edge.end).point);
            if on_left {
                side != Side::OnTheRight
            } else {
                side != Side::OnTheLeft
            }
        })
    }

    fn primary_children(&self, triangle: TriangleId) -> impl Iterator<Item = TriangleId> + '_ {
        self.triangle(triangle)
            .children
            .iter()
            .copied()
            .filter(move |child| self.triangle(*child).parents.primary == Some(triangle))
    }

    fn leaf_triangles(&self) -> Vec<TriangleId> {
        let mut result = Vec::new();
        let mut stack = vec![self.anchor];
        while let Some(curr) = stack.pop() {
            if self.triangle(curr).is_leaf() {
                result.push(curr);
            } else {
                stack.extend(self.primary_children(curr));
            }
        }
        result
    }

    fn live_edges(&self) -> BTreeSet<EdgeId> {
        self.leaf_triangles()
            .into_iter()
            .flat_map(|triangle| self.triangle(triangle).edges)
            .collect()
    }

    /// Edges of the leaf triangles without sentinel corners.
    fn leaf_edges(&self) -> BTreeSet<EdgeId> {
        self.live_edges()
            .into_iter()
            .filter(|edge| {
                let edge = self.edge(*edge);
                self.corner(edge.start).object.is_some() && self.corner(edge.end).object.is_some()
            })
            .collect()
    }

    // ── Element access ───────────────────────────────────────────────

    fn add_corner(&mut self, corner: Corner) -> CornerId {
        self.corners.push(corner);
        CornerId::new(self.corners.len() - 1)
    }

    fn new_edge(&mut self, start: CornerId, end: CornerId) -> EdgeId {
        self.edges.push(Edge {
            start,
            end,
            left: None,
            right: None,
        });
        EdgeId::new(self.edges.len() - 1)
    }

    fn new_triangle(&mut self, edges: [EdgeId; 3], primary_parent: Option<TriangleId>) -> TriangleId {
        self.triangles.push(Triangle {
            edges,
            children: Vec::new(),
            parents: Parents {
                primary: primary_parent,
                secondary: None,
            },
            on_left: None,
        });
        TriangleId::new(self.triangles.len() - 1)
    }

    fn corner(&self, id: CornerId) -> &Corner {
        &self.corners[id.index()]
    }

    fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.index()]
    }

    fn triangle(&self, id: TriangleId) -> &Triangle {
        &self.triangles[id.index()]
    }

    fn set_neighbours(&mut self, edge: EdgeId, left: TriangleId, right: TriangleId) {
        let edge = self.edge_mut(edge);
        edge.left = Some(left);
        edge.right = Some(right);
    }

    fn replace_neighbour(&mut self, edge: EdgeId, old: TriangleId, new: TriangleId) {
        let edge = self.edge_mut(edge);
        if edge.left == Some(old) {
            edge.left = Some(new);
        } else {
            debug_assert_eq!(edge.right, Some(old), "edge is not adjacent to the replaced triangle");
            edge.right = Some(new);
        }
    }

    fn other_neighbour(&self, edge: EdgeId, triangle: TriangleId) -> Option<TriangleId> {
        let edge = self.edge(edge);
        if edge.left == Some(triangle) {
            edge.right
        } else if edge.right == Some(triangle) {
            edge.left
        } else {
            log::error!("Triangulation: {triangle:?} is not a neighbour of the edge");
            None
        }
    }

    fn common_corner(&self, a: EdgeId, b: EdgeId) -> Option<CornerId> {
        let a = self.edge(a);
        let b = self.edge(b);
        if b.start == a.start || b.end == a.start {
            Some(a.start)
        } else if b.start == a.end || b.end == a.end {
            Some(a.end)
        } else {
            None
        }
    }

    fn edge_index(&self, triangle: TriangleId, edge: EdgeId) -> usize {
        self.triangle(triangle)
            .edges
            .iter()
            .position(|e| *e == edge)
            .expect("triangulation: edge is not a side of the triangle")
    }

    /// Corner number `i` of a triangle, the start of its `i`-th edge in counter-clockwise order.
    fn corner_of(&self, triangle: TriangleId, i: usize) -> CornerId {
        let edge = self.edge(self.triangle(triangle).edges[i]);
        if edge.left == Some(triangle) {
            edge.start
        } else {
            debug_assert_eq!(edge.right, Some(triangle));
            edge.end
        }
    }

    /// The corner of `triangle` not on `edge`.
    fn opposite_corner(&self, triangle: TriangleId, edge: EdgeId) -> CornerId {
        let index = self.edge_index(triangle, edge);
        let next = self.edge(self.triangle(triangle).edges[(index + 1) % 3]);
        if next.left == Some(triangle) {
            next.end
        } else {
            next.start
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Terminal {
        name: &'static str,
        corners: Vec<Point>,
    }

    impl Terminal {
        fn at(name: &'static str, x: i64, y: i64) -> Self {
            Self {
                name,
                corners: vec![Point::new(x, y)],
            }
        }
    }

    impl TriangulationStorable for Terminal {
        fn triangulation_corners(&self) -> Vec<Point> {
            self.corners.clone()
        }
    }

    fn edge_names(triangulation: &PlanarDelaunayTriangulation<'_, Terminal>) -> BTreeSet<(&'static str, &'static str)> {
        triangulation
            .get_edge_lines()
            .iter()
            .map(|e| {
                let (a, b) = (e.start_object.name, e.end_object.name);
                if a <= b {
                    (a, b)
                } else {
                    (b, a)
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let objects: Vec<Terminal> = Vec::new();
        let triangulation = PlanarDelaunayTriangulation::new(&objects).unwrap();
        assert!(triangulation.get_edge_lines().is_empty());
        assert_eq!(triangulation.corner_count(), 0);
        assert!(triangulation.validate());
    }

    #[test]
    fn test_two_points() {
        let objects = vec![Terminal::at("a", 5, 11), Terminal::at("b", 105, 11)];
        let triangulation = PlanarDelaunayTriangulation::new(&objects).unwrap();
        assert_eq!(edge_names(&triangulation), BTreeSet::from([("a", "b")]));
        assert!(triangulation.validate());
    }

    #[test]
    fn test_square_with_center() {
        let objects = vec![
            Terminal::at("a", 10, 20),
            Terminal::at("b", 110, 20),
            Terminal::at("c", 110, 120),
            Terminal::at("d", 10, 120),
            Terminal::at("m", 60, 70),
        ];
        let triangulation = PlanarDelaunayTriangulation::new(&objects).unwrap();
        let edges = edge_names(&triangulation);
        for outer in ["a", "b", "c", "d"] {
            assert!(edges.contains(&(outer, "m")), "missing edge {outer}-m");
        }
        assert!(edges.contains(&("a", "b")));
        assert!(edges.contains(&("b", "c")));
        assert!(edges.contains(&("c", "d")));
        assert!(edges.contains(&("a", "d")));
        assert_eq!(triangulation.illegal_edge_count(), 0);
        assert!(triangulation.validate());
    }

    #[test]
    fn test_collinear_points_split_at_border() {
        let objects: Vec<Terminal> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, name)| Terminal::at(name, i as i64 * 10 + 3, 7))
            .collect();
        let triangulation = PlanarDelaunayTriangulation::new(&objects).unwrap();
        let edges = edge_names(&triangulation);
        assert!(edges.contains(&("a", "b")));
        assert!(edges.contains(&("b", "c")));
        assert!(edges.contains(&("c", "d")));
        assert!(!edges.contains(&("a", "c")));
        assert!(triangulation.validate());
        assert_eq!(triangulation.illegal_edge_count(), 0);
    }

    #[test]
    fn test_coincident_corners_of_different_objects() {
        let objects = vec![
            Terminal::at("a", 3, 5),
            Terminal::at("b", 3, 5),
            Terminal::at("c", 50, 80),
        ];
        let triangulation = PlanarDelaunayTriangulation::new(&objects).unwrap();
        assert_eq!(triangulation.degenerate_edge_count(), 1);
        let lines = triangulation.get_edge_lines();
        let degenerate = &lines[0];
        assert_eq!(degenerate.start_point, degenerate.end_point);
        assert_ne!(degenerate.start_object, degenerate.end_object);
        assert!(triangulation.validate());
    }

    #[test]
    fn test_coincident_corners_of_same_object() {
        let objects = vec![Terminal {
            name: "a",
            corners: vec![Point::new(5, 5), Point::new(5, 5)],
        }];
        let triangulation = PlanarDelaunayTriangulation::new(&objects).unwrap();
        assert_eq!(triangulation.degenerate_edge_count(), 0);
        assert!(triangulation.get_edge_lines().is_empty());
    }

    #[test]
    fn test_corner_out_of_range() {
        let objects = vec![Terminal::at("far", COORDINATE_LIMIT + 1, 0)];
        let err = PlanarDelaunayTriangulation::new(&objects).unwrap_err();
        assert!(matches!(err, TriangulationError::CornerOutOfRange { .. }));
    }

    #[test]
    fn test_same_seed_same_edges() {
        let objects: Vec<Terminal> = (0..30)
            .map(|i| Terminal::at("t", (i * 37) % 101, (i * 53) % 97))
            .collect();
        let lines = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            PlanarDelaunayTriangulation::with_rng(&objects, &mut rng)
                .unwrap()
                .get_edge_lines()
                .iter()
                .map(|e| (e.start_point, e.end_point))
                .collect::<Vec<_>>()
        };
        assert_eq!(lines(5), lines(5));
        assert_eq!(lines(DEFAULT_SEED), {
            PlanarDelaunayTriangulation::new(&objects)
                .unwrap()
                .get_edge_lines()
                .iter()
                .map(|e| (e.start_point, e.end_point))
                .collect::<Vec<_>>()
        });
    }
}

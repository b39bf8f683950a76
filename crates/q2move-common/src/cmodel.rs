// cmodel.rs — point classification and box tracing against a loaded map
//
// All queries run in physics space: the unscaled source units the planes are
// stored in, with index 1 up.

use crate::bspfile::{LoadedMap, NodeRef};
use crate::common::com_warn;
use crate::q_shared::{
    angles_to_axis, box_on_plane_side, dot_product, rotate_point, transpose_axis,
    vector_is_zero, vector_lerp, vector_subtract, CPlane, Contents, Trace, Vec3,
};

// ============================================================
// Constants
// ============================================================

/// 1/32 epsilon to keep floating point happy
pub const DIST_EPSILON: f32 = 0.03125;

/// Descent guard for `point_leaf`.
pub const MAX_POINT_LEAF_STEPS: usize = 5000;

/// Leaf cap for position tests.
pub const MAX_POSITION_LEAFS: usize = 1024;

// ============================================================
// Brush check generations
// ============================================================

/// Stamps each brush with the trace generation that last tested it, so a
/// brush shared by several leaves is clipped once per trace.
#[derive(Debug, Default)]
pub struct BrushChecks {
    checkcount: u32,
    stamps: Vec<u32>,
}

impl BrushChecks {
    pub fn new(num_brushes: usize) -> Self {
        Self {
            checkcount: 0,
            stamps: vec![0; num_brushes],
        }
    }

    fn next_generation(&mut self) {
        self.checkcount = self.checkcount.wrapping_add(1);
        if self.checkcount == 0 {
            // wrapped; stale stamps would alias the new generation
            self.stamps.iter_mut().for_each(|s| *s = 0);
            self.checkcount = 1;
        }
    }

    /// True the first time `brush` is seen in the current generation.
    fn first_visit(&mut self, brush: usize) -> bool {
        match self.stamps.get_mut(brush) {
            Some(stamp) if *stamp != self.checkcount => {
                *stamp = self.checkcount;
                true
            }
            _ => false,
        }
    }
}

// ============================================================
// Point / box classification
// ============================================================

/// Leaves touched by a box, plus the first node the box straddles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxLeafs {
    pub leaves: Vec<usize>,
    pub top_node: Option<usize>,
}

impl LoadedMap {
    /// Leaf containing `p`, `None` if the descent does not finish.
    pub fn point_leaf(&self, head: NodeRef, p: &Vec3) -> Option<usize> {
        let mut r = head;
        for _ in 0..MAX_POINT_LEAF_STEPS {
            match r {
                NodeRef::Leaf(l) => return (l < self.leaves.len()).then_some(l),
                NodeRef::Node(n) => {
                    let node = self.nodes.get(n)?;
                    let d = self.planes[node.plane].distance_to(p);
                    r = if d < 0.0 { node.children[1] } else { node.children[0] };
                }
            }
        }
        com_warn(&format!(
            "point_leaf: no leaf after {} steps at {:?}\n",
            MAX_POINT_LEAF_STEPS, p
        ));
        None
    }

    pub fn point_contents(&self, head: NodeRef, p: &Vec3) -> Contents {
        match self.point_leaf(head, p) {
            Some(l) => self.leaves[l].contents,
            None => Contents::empty(),
        }
    }

    /// Contents of world model 0 at `p`.
    pub fn world_contents(&self, p: &Vec3) -> Contents {
        match self.world_head() {
            Some(head) => self.point_contents(head, p),
            None => Contents::empty(),
        }
    }

    /// Collect up to `max` leaves overlapping `mins..maxs`.
    pub fn box_leafs(&self, head: NodeRef, mins: &Vec3, maxs: &Vec3, max: usize) -> BoxLeafs {
        let mut out = BoxLeafs::default();
        self.box_leafs_r(head, mins, maxs, max, &mut out);
        out
    }

    fn box_leafs_r(&self, mut r: NodeRef, mins: &Vec3, maxs: &Vec3, max: usize, out: &mut BoxLeafs) {
        loop {
            let n = match r {
                NodeRef::Leaf(l) => {
                    if out.leaves.len() < max {
                        out.leaves.push(l);
                    }
                    return;
                }
                NodeRef::Node(n) => n,
            };

            let node = &self.nodes[n];
            match box_on_plane_side(mins, maxs, &self.planes[node.plane]) {
                1 => r = node.children[0],
                2 => r = node.children[1],
                _ => {
                    // go down both
                    if out.top_node.is_none() {
                        out.top_node = Some(n);
                    }
                    self.box_leafs_r(node.children[0], mins, maxs, max, out);
                    r = node.children[1];
                }
            }
        }
    }

    // ============================================================
    // Box tracing
    // ============================================================

    /// Sweep `mins..maxs` from `start` to `end` through the tree at `head`,
    /// stopping at brushes whose contents intersect `mask`.
    pub fn box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        head: NodeRef,
        mask: Contents,
    ) -> Trace {
        let mut checks = self.brush_checks.lock();
        checks.next_generation();
        let mut ctx = TraceContext::new(self, &mut checks, start, end, mins, maxs, mask);

        if self.leaves.is_empty() {
            ctx.trace.endpos = *end;
            return ctx.trace;
        }

        // position test special case
        if start == end {
            let c1 = [start[0] + mins[0] - 1.0, start[1] + mins[1] - 1.0, start[2] + mins[2] - 1.0];
            let c2 = [start[0] + maxs[0] + 1.0, start[1] + maxs[1] + 1.0, start[2] + maxs[2] + 1.0];

            let touched = self.box_leafs(head, &c1, &c2, MAX_POSITION_LEAFS);
            for leaf in touched.leaves {
                ctx.test_in_leaf(leaf);
                if ctx.trace.allsolid {
                    break;
                }
            }
            ctx.trace.endpos = *start;
            return ctx.trace;
        }

        ctx.recursive_hull_check(head, 0.0, 1.0, *start, *end);

        if ctx.trace.fraction == 1.0 {
            ctx.trace.endpos = *end;
        } else {
            ctx.trace.endpos = vector_lerp(start, end, ctx.trace.fraction);
        }
        ctx.trace
    }

    /// `box_trace` against a model placed at `origin` and rotated by
    /// `angles`. The end position and hit normal come back in the caller's
    /// space.
    pub fn transformed_box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        head: NodeRef,
        mask: Contents,
        origin: &Vec3,
        angles: &Vec3,
    ) -> Trace {
        let mut start_l = vector_subtract(start, origin);
        let mut end_l = vector_subtract(end, origin);

        let rotated = !vector_is_zero(angles);
        let mut axis = angles_to_axis(angles);
        if rotated {
            start_l = rotate_point(&start_l, &axis);
            end_l = rotate_point(&end_l, &axis);
        }

        let mut trace = self.box_trace(&start_l, &end_l, mins, maxs, head, mask);

        if rotated && trace.fraction != 1.0 {
            if let Some(plane) = trace.plane.as_mut() {
                transpose_axis(&mut axis);
                plane.normal = rotate_point(&plane.normal, &axis);
            }
        }

        trace.endpos = vector_lerp(start, end, trace.fraction);
        trace
    }
}

/// Fold the trace against clip model `model` into the running world result.
/// Only a strictly closer hit replaces the impact fields.
pub fn clip_to_entity(dst: &mut Trace, src: Trace, model: usize) {
    dst.allsolid |= src.allsolid;
    dst.startsolid |= src.startsolid;

    if src.fraction < dst.fraction {
        dst.fraction = src.fraction;
        dst.endpos = src.endpos;
        dst.plane = src.plane;
        dst.surface = src.surface;
        dst.contents |= src.contents;
        dst.clip_model = Some(model);
    }
}

// ============================================================
// TraceContext
// ============================================================

/// Scratch state for one trace.
struct TraceContext<'a> {
    map: &'a LoadedMap,
    checks: &'a mut BrushChecks,
    start: Vec3,
    end: Vec3,
    extents: Vec3,
    /// Box corner to test against a plane, indexed by the plane's sign bits.
    offsets: [Vec3; 8],
    is_point: bool,
    mask: Contents,
    trace: Trace,
}

impl<'a> TraceContext<'a> {
    fn new(
        map: &'a LoadedMap,
        checks: &'a mut BrushChecks,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        mask: Contents,
    ) -> Self {
        let bounds = [mins, maxs];
        let mut offsets = [[0.0; 3]; 8];
        for (i, ofs) in offsets.iter_mut().enumerate() {
            for j in 0..3 {
                ofs[j] = bounds[(i >> j) & 1][j];
            }
        }

        let is_point = vector_is_zero(mins) && vector_is_zero(maxs);
        let extents = if is_point {
            [0.0; 3]
        } else {
            [
                (-mins[0]).max(maxs[0]),
                (-mins[1]).max(maxs[1]),
                (-mins[2]).max(maxs[2]),
            ]
        };

        Self {
            map,
            checks,
            start: *start,
            end: *end,
            extents,
            offsets,
            is_point,
            mask,
            trace: Trace::default(),
        }
    }

    /// Plane distance pushed out to the box corner facing the plane.
    fn expanded_dist(&self, plane: &CPlane) -> f32 {
        if self.is_point {
            plane.dist
        } else {
            plane.dist - dot_product(&self.offsets[plane.signbits as usize], &plane.normal)
        }
    }

    fn clip_box_to_brush(&mut self, brush_idx: usize) {
        let map = self.map;
        let brush = &map.brushes[brush_idx];
        if brush.num_sides == 0 {
            return;
        }

        let mut enterfrac: f32 = -1.0;
        let mut leavefrac: f32 = 1.0;
        let mut clip_plane: Option<CPlane> = None;
        let mut lead_side = None;
        let mut getout = false;
        let mut startout = false;

        for side in &map.brush_sides[brush.first_side..brush.first_side + brush.num_sides] {
            let plane = &map.planes[side.plane];
            let dist = self.expanded_dist(plane);

            let d1 = dot_product(&self.start, &plane.normal) - dist;
            let d2 = dot_product(&self.end, &plane.normal) - dist;

            if d2 > 0.0 {
                getout = true; // endpoint is not in solid
            }
            if d1 > 0.0 {
                startout = true;
            }

            // completely in front of face, no intersection
            if d1 > 0.0 && d2 >= d1 {
                return;
            }
            if d1 <= 0.0 && d2 <= 0.0 {
                continue;
            }

            // crosses face
            if d1 > d2 {
                // enter
                let f = (d1 - DIST_EPSILON) / (d1 - d2);
                if f > enterfrac {
                    enterfrac = f;
                    clip_plane = Some(*plane);
                    lead_side = Some(side);
                }
            } else {
                // leave
                let f = (d1 + DIST_EPSILON) / (d1 - d2);
                if f < leavefrac {
                    leavefrac = f;
                }
            }
        }

        if !startout {
            // original point was inside brush
            self.trace.startsolid = true;
            if !getout {
                self.trace.allsolid = true;
                self.trace.fraction = 0.0;
                self.trace.contents = brush.contents;
            }
            return;
        }

        if enterfrac < leavefrac && enterfrac > -1.0 && enterfrac < self.trace.fraction {
            self.trace.fraction = enterfrac.max(0.0);
            self.trace.plane = clip_plane;
            self.trace.surface = lead_side.and_then(|s| map.side_surface(s));
            self.trace.contents = brush.contents;
        }
    }

    fn test_box_in_brush(&mut self, brush_idx: usize) {
        let map = self.map;
        let brush = &map.brushes[brush_idx];
        if brush.num_sides == 0 {
            return;
        }

        for side in &map.brush_sides[brush.first_side..brush.first_side + brush.num_sides] {
            let plane = &map.planes[side.plane];
            let d1 = dot_product(&self.start, &plane.normal) - self.expanded_dist(plane);

            // if completely in front of face, no intersection
            if d1 > 0.0 {
                return;
            }
        }

        // inside this brush
        self.trace.startsolid = true;
        self.trace.allsolid = true;
        self.trace.fraction = 0.0;
        self.trace.contents = brush.contents;
    }

    /// Run `test` on every unvisited brush of `leaf` matching the mask.
    fn for_each_leaf_brush(&mut self, leaf: usize, test: fn(&mut Self, usize)) {
        let map = self.map;
        let leaf = &map.leaves[leaf];
        if !leaf.contents.intersects(self.mask) {
            return;
        }

        let first = leaf.first_leaf_brush;
        for &brush in &map.leaf_brushes[first..first + leaf.num_leaf_brushes] {
            if !self.checks.first_visit(brush) {
                continue; // already checked this brush in another leaf
            }
            if !map.brushes[brush].contents.intersects(self.mask) {
                continue;
            }
            test(self, brush);
            if self.trace.fraction == 0.0 {
                return;
            }
        }
    }

    fn trace_to_leaf(&mut self, leaf: usize) {
        self.for_each_leaf_brush(leaf, Self::clip_box_to_brush);
    }

    fn test_in_leaf(&mut self, leaf: usize) {
        self.for_each_leaf_brush(leaf, Self::test_box_in_brush);
    }

    fn recursive_hull_check(&mut self, r: NodeRef, p1f: f32, p2f: f32, p1: Vec3, p2: Vec3) {
        // already hit something nearer
        if self.trace.fraction <= p1f {
            return;
        }

        let n = match r {
            NodeRef::Leaf(l) => {
                self.trace_to_leaf(l);
                return;
            }
            NodeRef::Node(n) => n,
        };

        let map = self.map;
        let node = &map.nodes[n];
        let plane = &map.planes[node.plane];

        // find the point distances to the separating plane
        // and the offset for the size of the box
        let (t1, t2, offset) = match plane.axial() {
            Some(t) => (p1[t] - plane.dist, p2[t] - plane.dist, self.extents[t]),
            None => {
                let offset = if self.is_point {
                    0.0
                } else {
                    (self.extents[0] * plane.normal[0]).abs()
                        + (self.extents[1] * plane.normal[1]).abs()
                        + (self.extents[2] * plane.normal[2]).abs()
                };
                (
                    dot_product(&plane.normal, &p1) - plane.dist,
                    dot_product(&plane.normal, &p2) - plane.dist,
                    offset,
                )
            }
        };

        // see which sides we need to consider
        if t1 >= offset && t2 >= offset {
            self.recursive_hull_check(node.children[0], p1f, p2f, p1, p2);
            return;
        }
        if t1 < -offset && t2 < -offset {
            self.recursive_hull_check(node.children[1], p1f, p2f, p1, p2);
            return;
        }

        // put the crosspoint DIST_EPSILON pixels on the near side
        let (side, frac, frac2) = if t1 < t2 {
            let idist = 1.0 / (t1 - t2);
            (
                1,
                (t1 - offset + DIST_EPSILON) * idist,
                (t1 + offset + DIST_EPSILON) * idist,
            )
        } else if t1 > t2 {
            let idist = 1.0 / (t1 - t2);
            (
                0,
                (t1 + offset + DIST_EPSILON) * idist,
                (t1 - offset - DIST_EPSILON) * idist,
            )
        } else {
            (0, 1.0, 0.0)
        };
        let frac = frac.clamp(0.0, 1.0);
        let frac2 = frac2.clamp(0.0, 1.0);

        // move up to the node
        let midf = p1f + (p2f - p1f) * frac;
        let mid = vector_lerp(&p1, &p2, frac);
        self.recursive_hull_check(node.children[side], p1f, midf, p1, mid);

        // go past the node
        let midf = p1f + (p2f - p1f) * frac2;
        let mid = vector_lerp(&p1, &p2, frac2);
        self.recursive_hull_check(node.children[side ^ 1], midf, p2f, mid, p2);
    }
}

// ============================================================
// Tests
// ============================================================

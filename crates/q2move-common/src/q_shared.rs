// q_shared.rs — foundational types and math shared by the loader, tracer and mover

// ============================================================
// Basic types
// ============================================================

/// Three-component vector. After loading, index 1 is "up".
pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

// angle indexes
pub const PITCH: usize = 0;
pub const YAW: usize = 1;
pub const ROLL: usize = 2;

/// Vertical axis once the source Y/Z swap has been applied.
pub const UP: usize = 1;

/// Map file X/Y/Z to the engine's X/up/Z ordering.
#[inline]
pub fn swap_yz(v: Vec3) -> Vec3 {
    [v[0], v[2], v[1]]
}

// ============================================================
// Contents flags
// ============================================================

bitflags::bitflags! {
    /// Brush and leaf contents. Lower bits are visible, upper bits are not.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Contents: u32 {
        const SOLID        = 0x00000001;
        const WINDOW       = 0x00000002;
        const AUX          = 0x00000004;
        const LAVA         = 0x00000008;
        const SLIME        = 0x00000010;
        const WATER        = 0x00000020;
        const MIST         = 0x00000040;
        const AREAPORTAL   = 0x00008000;
        const PLAYERCLIP   = 0x00010000;
        const MONSTERCLIP  = 0x00020000;
        const CURRENT_0    = 0x00040000;
        const CURRENT_90   = 0x00080000;
        const CURRENT_180  = 0x00100000;
        const CURRENT_270  = 0x00200000;
        const CURRENT_UP   = 0x00400000;
        const CURRENT_DOWN = 0x00800000;
        const ORIGIN       = 0x01000000;
        const MONSTER      = 0x02000000;
        const DEADMONSTER  = 0x04000000;
        const DETAIL       = 0x08000000;
        const TRANSLUCENT  = 0x10000000;
        const LADDER       = 0x20000000;
    }
}

impl Contents {
    pub const MASK_PLAYERSOLID: Contents = Contents::SOLID
        .union(Contents::PLAYERCLIP)
        .union(Contents::WINDOW)
        .union(Contents::MONSTER);
    pub const MASK_WATER: Contents = Contents::WATER
        .union(Contents::LAVA)
        .union(Contents::SLIME);
}

// ============================================================
// Surface flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SurfaceFlags: u32 {
        const LIGHT   = 0x01;
        const SLICK   = 0x02;
        const SKY     = 0x04;
        const WARP    = 0x08;
        const TRANS33 = 0x10;
        const TRANS66 = 0x20;
        const FLOWING = 0x40;
        const NODRAW  = 0x80;
    }
}

impl SurfaceFlags {
    /// Faces carrying any of these never have a lightmap.
    pub const MASK_NOLIGHTMAP: SurfaceFlags = SurfaceFlags::TRANS33
        .union(SurfaceFlags::TRANS66)
        .union(SurfaceFlags::SKY)
        .union(SurfaceFlags::NODRAW)
        .union(SurfaceFlags::WARP);
}

// ============================================================
// Cvar flags
// ============================================================

pub const CVAR_ARCHIVE: i32 = 1;
/// Don't allow change from the console at all, only from code.
pub const CVAR_NOSET: i32 = 8;

// ============================================================
// Collision primitives
// ============================================================

// plane_t structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
    /// 0-2 axial along that index, 3-5 mostly along that index minus 3
    pub plane_type: u8,
    /// bit i set when normal[i] < 0
    pub signbits: u8,
}

impl Default for CPlane {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            dist: 0.0,
            plane_type: 0,
            signbits: 0,
        }
    }
}

impl CPlane {
    pub fn new(normal: Vec3, dist: f32, plane_type: u8) -> Self {
        Self {
            normal,
            dist,
            plane_type,
            signbits: plane_signbits(&normal),
        }
    }

    /// Coordinate index for the single-axis fast paths. Only positive axial
    /// normals qualify; negated axial planes go through the dot product.
    #[inline]
    pub fn axial(&self) -> Option<usize> {
        if self.plane_type < 3 && self.signbits == 0 {
            Some(self.plane_type as usize)
        } else {
            None
        }
    }

    /// Signed distance of `p` from the plane.
    #[inline]
    pub fn distance_to(&self, p: &Vec3) -> f32 {
        match self.axial() {
            Some(t) => p[t] - self.dist,
            None => dot_product(&self.normal, p) - self.dist,
        }
    }
}

/// Sign bits for fast box-on-plane-side tests.
pub fn plane_signbits(normal: &Vec3) -> u8 {
    let mut bits = 0u8;
    for (j, n) in normal.iter().enumerate() {
        if *n < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

/// Surface information reported by traces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CSurface {
    pub name: String,
    pub flags: SurfaceFlags,
    pub value: i32,
}

/// A trace is returned when a box is swept through the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// if true, plane is not valid
    pub allsolid: bool,
    /// if true, the initial point was in a solid area
    pub startsolid: bool,
    /// time completed, 1.0 = didn't hit anything
    pub fraction: f32,
    /// final position
    pub endpos: Vec3,
    /// surface normal at impact
    pub plane: Option<CPlane>,
    /// surface hit
    pub surface: Option<CSurface>,
    /// contents on other side of surface hit
    pub contents: Contents,
    /// registration index of the clip model that was hit, `None` for the world
    pub clip_model: Option<usize>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            fraction: 1.0,
            endpos: [0.0; 3],
            plane: None,
            surface: None,
            contents: Contents::empty(),
            clip_model: None,
        }
    }
}

// ============================================================
// Vector math
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn vector_lerp(a: &Vec3, b: &Vec3, frac: f32) -> Vec3 {
    [
        a[0] + frac * (b[0] - a[0]),
        a[1] + frac * (b[1] - a[1]),
        a[2] + frac * (b[2] - a[2]),
    ]
}

#[inline]
pub fn vector_is_zero(v: &Vec3) -> bool {
    v[0] == 0.0 && v[1] == 0.0 && v[2] == 0.0
}

// ============================================================
// Orientation
// ============================================================

/// Orientation basis for a clip model in Y-up space.
/// Angles are in degrees: pitch, yaw, roll. Yaw turns about index 1.
pub fn angles_to_axis(angles: &Vec3) -> [Vec3; 3] {
    let angle_yaw = angles[YAW].to_radians();
    let sy = angle_yaw.sin();
    let cy = angle_yaw.cos();

    let angle_pitch = angles[PITCH].to_radians();
    let sp = angle_pitch.sin();
    let cp = angle_pitch.cos();

    let angle_roll = angles[ROLL].to_radians();
    let sr = angle_roll.sin();
    let cr = angle_roll.cos();

    // forward, right, up in Z-up space
    let zup = [
        [cp * cy, cp * sy, -sp],
        [sr * sp * cy + cr * -sy, sr * sp * sy + cr * cy, sr * cp],
        [cr * sp * cy + -sr * -sy, cr * sp * sy + -sr * cy, cr * cp],
    ];

    // conjugate by the Y/Z swap: columns and rows 1 and 2 trade places
    [swap_yz(zup[0]), swap_yz(zup[2]), swap_yz(zup[1])]
}

pub fn transpose_axis(axis: &mut [Vec3; 3]) {
    for i in 0..3 {
        for j in (i + 1)..3 {
            let temp = axis[i][j];
            axis[i][j] = axis[j][i];
            axis[j][i] = temp;
        }
    }
}

/// Project `point` onto each row of `axis`.
pub fn rotate_point(point: &Vec3, axis: &[Vec3; 3]) -> Vec3 {
    [
        dot_product(point, &axis[0]),
        dot_product(point, &axis[1]),
        dot_product(point, &axis[2]),
    ]
}

// ============================================================
// BoxOnPlaneSide
// ============================================================

/// Returns 1 when the box is entirely in front of the plane, 2 when
/// entirely behind, 3 when it straddles.
pub fn box_on_plane_side(emins: &Vec3, emaxs: &Vec3, p: &CPlane) -> i32 {
    // fast axial cases
    if let Some(t) = p.axial() {
        if p.dist <= emins[t] {
            return 1;
        }
        if p.dist > emaxs[t] {
            return 2;
        }
        return 3;
    }

    // general case: the sign bits pick the extreme corners
    let bounds = [emins, emaxs];
    let i = (p.signbits & 1) as usize;
    let j = ((p.signbits >> 1) & 1) as usize;
    let k = ((p.signbits >> 2) & 1) as usize;

    let dist1 = p.normal[0] * bounds[i ^ 1][0]
        + p.normal[1] * bounds[j ^ 1][1]
        + p.normal[2] * bounds[k ^ 1][2];
    let dist2 = p.normal[0] * bounds[i][0]
        + p.normal[1] * bounds[j][1]
        + p.normal[2] * bounds[k][2];

    let mut sides = 0;
    if dist1 >= p.dist {
        sides = 1;
    }
    if dist2 < p.dist {
        sides |= 2;
    }
    sides
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn brute_force_side(emins: &Vec3, emaxs: &Vec3, p: &CPlane) -> i32 {
        let mut front = false;
        let mut back = false;
        for corner in 0..8 {
            let c = [
                if corner & 1 != 0 { emaxs[0] } else { emins[0] },
                if corner & 2 != 0 { emaxs[1] } else { emins[1] },
                if corner & 4 != 0 { emaxs[2] } else { emins[2] },
            ];
            let d = dot_product(&p.normal, &c);
            if d >= p.dist {
                front = true;
            }
            if d < p.dist {
                back = true;
            }
        }
        (front as i32) | ((back as i32) << 1)
    }

    #[test]
    fn test_contents_masks() {
        assert_eq!(Contents::MASK_PLAYERSOLID.bits(), 0x02010003);
        assert_eq!(Contents::MASK_WATER.bits(), 0x38);
        assert_eq!(SurfaceFlags::MASK_NOLIGHTMAP.bits(), 0xBC);
    }

    #[test]
    fn test_plane_signbits() {
        assert_eq!(plane_signbits(&[1.0, 0.0, 0.0]), 0);
        assert_eq!(plane_signbits(&[-1.0, 0.0, 0.0]), 1);
        assert_eq!(plane_signbits(&[0.0, -0.5, -0.5]), 6);
    }

    #[test]
    fn test_negated_axial_plane_is_not_axial() {
        let p = CPlane::new([0.0, -1.0, 0.0], -5.0, 1);
        assert_eq!(p.axial(), None);
        assert_eq!(p.distance_to(&[0.0, 10.0, 0.0]), -5.0);
        let q = CPlane::new([0.0, 1.0, 0.0], 5.0, 1);
        assert_eq!(q.axial(), Some(1));
        assert_eq!(q.distance_to(&[0.0, 10.0, 0.0]), 5.0);
    }

    #[test]
    fn test_box_on_plane_side_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(0x1b5b);
        for n in 0..2000 {
            let mut normal = [
                rng.gen_range(-1.0f32..1.0),
                rng.gen_range(-1.0f32..1.0),
                rng.gen_range(-1.0f32..1.0),
            ];
            if vector_normalize(&mut normal) == 0.0 {
                continue;
            }
            let mins = [
                rng.gen_range(-64.0f32..0.0),
                rng.gen_range(-64.0f32..0.0),
                rng.gen_range(-64.0f32..0.0),
            ];
            let maxs = [
                mins[0] + rng.gen_range(0.0f32..64.0),
                mins[1] + rng.gen_range(0.0f32..64.0),
                mins[2] + rng.gen_range(0.0f32..64.0),
            ];
            // every fourth plane passes exactly through a box corner
            let dist = if n % 4 == 0 {
                dot_product(&normal, &mins)
            } else {
                rng.gen_range(-96.0f32..96.0)
            };
            let plane = CPlane::new(normal, dist, 3);
            assert_eq!(
                box_on_plane_side(&mins, &maxs, &plane),
                brute_force_side(&mins, &maxs, &plane),
                "mismatch for normal {:?} dist {} box {:?}..{:?}",
                normal, dist, mins, maxs
            );
        }
    }

    #[test]
    fn test_box_on_plane_side_axial() {
        let plane = CPlane::new([0.0, 1.0, 0.0], 10.0, 1);
        assert_eq!(box_on_plane_side(&[0.0, 12.0, 0.0], &[1.0, 20.0, 1.0], &plane), 1);
        assert_eq!(box_on_plane_side(&[0.0, 0.0, 0.0], &[1.0, 8.0, 1.0], &plane), 2);
        assert_eq!(box_on_plane_side(&[0.0, 5.0, 0.0], &[1.0, 15.0, 1.0], &plane), 3);
        for (mins, maxs) in [([0.0, 10.0, 0.0], [1.0, 12.0, 1.0]), ([0.0, 2.0, 0.0], [1.0, 10.0, 1.0])] {
            assert_eq!(
                box_on_plane_side(&mins, &maxs, &plane),
                brute_force_side(&mins, &maxs, &plane)
            );
        }
    }

    #[test]
    fn test_axis_identity_and_transpose() {
        let axis = angles_to_axis(&[0.0, 0.0, 0.0]);
        assert_eq!(axis, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

        let mut axis = angles_to_axis(&[10.0, 35.0, -20.0]);
        let p = [3.0, -4.0, 12.0];
        let rotated = rotate_point(&p, &axis);
        transpose_axis(&mut axis);
        let back = rotate_point(&rotated, &axis);
        for i in 0..3 {
            assert!((back[i] - p[i]).abs() < 1e-4, "axis {} got {} expected {}", i, back[i], p[i]);
        }
    }

    #[test]
    fn test_yaw_turns_about_up() {
        for yaw in [30.0f32, 90.0, 180.0, 275.0] {
            let axis = angles_to_axis(&[0.0, yaw, 0.0]);
            let up = rotate_point(&[0.0, 1.0, 0.0], &axis);
            assert!(up[0].abs() < 1e-5 && (up[1] - 1.0).abs() < 1e-5 && up[2].abs() < 1e-5, "yaw {} up {:?}", yaw, up);

            let side = rotate_point(&[5.0, 0.0, 0.0], &axis);
            assert!(side[1].abs() < 1e-5, "yaw {} side {:?}", yaw, side);
            assert!((vector_length(&side) - 5.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_vector_helpers() {
        let mut v = [3.0, 0.0, 4.0];
        assert_eq!(vector_normalize(&mut v), 5.0);
        assert!((vector_length(&v) - 1.0).abs() < 1e-6);
        assert_eq!(cross_product(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
        assert_eq!(vector_lerp(&[0.0; 3], &[2.0, 4.0, 8.0], 0.5), [1.0, 2.0, 4.0]);
        assert_eq!(swap_yz([1.0, 2.0, 3.0]), [1.0, 3.0, 2.0]);
    }
}

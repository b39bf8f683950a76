// bspfile.rs — BSP v38 map loading
//
// A load is all or nothing: every lump is decoded and cross-checked before a
// `LoadedMap` is handed back. Coordinates are converted to the engine
// convention on the way in (Y/Z swapped so index 1 is up) and positional data
// takes the world scale. Planes keep source units, which is the space the
// collision code works in.

use crate::cmodel::BrushChecks;
use crate::common::{com_dprintf, com_warn};
use crate::entity::Entity;
use crate::entstring::parse_entities;
use crate::error::MapLoadError;
use crate::q_shared::{
    dot_product, swap_yz, vector_add, vector_length, vector_scale, CPlane, CSurface, Contents, SurfaceFlags,
    Vec3,
};
use crate::qfiles::{
    self, lump_name, DBrush, DBrushSide, DEdge, DFace, DHeader, DLeaf, DModel, DNode, DPlane,
    DVertex, Lump, BSPVERSION, BSP_HEADER_SIZE, HEADER_LUMPS, IDBSPHEADER, LUMP_BRUSHES,
    LUMP_BRUSHSIDES, LUMP_EDGES, LUMP_ENTITIES, LUMP_FACES, LUMP_LEAFBRUSHES, LUMP_LEAFFACES,
    LUMP_LEAFS, LUMP_LIGHTING, LUMP_MODELS, LUMP_NODES, LUMP_PLANES, LUMP_SURFEDGES,
    LUMP_TEXINFO, LUMP_VERTEXES, MAX_FACE_EDGES, MIN_FACE_EDGES, NO_LIGHTOFS, NO_TEXINFO,
    TEXTURE_NAME_LEN,
};

use parking_lot::Mutex;
use rayon::prelude::*;
use std::fmt;

/// Parallel threshold for lump parsing - below this count, sequential is faster
pub const PARALLEL_LUMP_THRESHOLD: usize = 64;

/// Lightmap luxel size in source units.
const LIGHTMAP_BLOCK: f32 = 16.0;

// ============================================================
// BSP byte helpers
// ============================================================

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_i16_le(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_i32_le(data: &[u8], offset: usize) -> i32 {
    read_u32_le(data, offset) as i32
}

fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32_le(data, offset))
}

fn read_vec3(data: &[u8], offset: usize) -> [f32; 3] {
    [
        read_f32_le(data, offset),
        read_f32_le(data, offset + 4),
        read_f32_le(data, offset + 8),
    ]
}

fn read_short3(data: &[u8], offset: usize) -> [i16; 3] {
    [
        read_i16_le(data, offset),
        read_i16_le(data, offset + 2),
        read_i16_le(data, offset + 4),
    ]
}

// ============================================================
// Fixed-size lump records
// ============================================================

/// A record type with a fixed on-disk stride. `read` is handed exactly
/// `SIZE` bytes.
pub trait LumpRecord: Sized + Send {
    const SIZE: usize;
    fn read(b: &[u8]) -> Self;
}

impl LumpRecord for DVertex {
    const SIZE: usize = qfiles::DVERTEX_SIZE;
    fn read(b: &[u8]) -> Self {
        DVertex { point: read_vec3(b, 0) }
    }
}

impl LumpRecord for DPlane {
    const SIZE: usize = qfiles::DPLANE_SIZE;
    fn read(b: &[u8]) -> Self {
        DPlane {
            normal: read_vec3(b, 0),
            dist: read_f32_le(b, 12),
            plane_type: read_u32_le(b, 16),
        }
    }
}

impl LumpRecord for DEdge {
    const SIZE: usize = qfiles::DEDGE_SIZE;
    fn read(b: &[u8]) -> Self {
        DEdge { v: [read_u16_le(b, 0), read_u16_le(b, 2)] }
    }
}

impl LumpRecord for qfiles::TexInfo {
    const SIZE: usize = qfiles::TEXINFO_SIZE;
    fn read(b: &[u8]) -> Self {
        let mut vecs = [[0.0f32; 4]; 2];
        for (i, row) in vecs.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = read_f32_le(b, (i * 4 + j) * 4);
            }
        }
        let mut texture = [0u8; TEXTURE_NAME_LEN];
        texture.copy_from_slice(&b[40..40 + TEXTURE_NAME_LEN]);
        qfiles::TexInfo {
            vecs,
            flags: read_u32_le(b, 32),
            value: read_u32_le(b, 36),
            texture,
            nexttexinfo: read_u32_le(b, 72),
        }
    }
}

impl LumpRecord for DFace {
    const SIZE: usize = qfiles::DFACE_SIZE;
    fn read(b: &[u8]) -> Self {
        DFace {
            planenum: read_u16_le(b, 0),
            side: read_u16_le(b, 2),
            firstedge: read_u32_le(b, 4),
            numedges: read_u16_le(b, 8),
            texinfo: read_u16_le(b, 10),
            styles: [b[12], b[13], b[14], b[15]],
            lightofs: read_u32_le(b, 16),
        }
    }
}

impl LumpRecord for DNode {
    const SIZE: usize = qfiles::DNODE_SIZE;
    fn read(b: &[u8]) -> Self {
        DNode {
            planenum: read_u32_le(b, 0),
            children: [read_i32_le(b, 4), read_i32_le(b, 8)],
            mins: read_short3(b, 12),
            maxs: read_short3(b, 18),
            firstface: read_u16_le(b, 24),
            numfaces: read_u16_le(b, 26),
        }
    }
}

impl LumpRecord for DLeaf {
    const SIZE: usize = qfiles::DLEAF_SIZE;
    fn read(b: &[u8]) -> Self {
        DLeaf {
            contents: read_u32_le(b, 0),
            cluster: read_i16_le(b, 4),
            area: read_i16_le(b, 6),
            mins: read_short3(b, 8),
            maxs: read_short3(b, 14),
            firstleafface: read_u16_le(b, 20),
            numleaffaces: read_u16_le(b, 22),
            firstleafbrush: read_u16_le(b, 24),
            numleafbrushes: read_u16_le(b, 26),
        }
    }
}

impl LumpRecord for DBrush {
    const SIZE: usize = qfiles::DBRUSH_SIZE;
    fn read(b: &[u8]) -> Self {
        DBrush {
            firstside: read_u32_le(b, 0),
            numsides: read_u32_le(b, 4),
            contents: read_u32_le(b, 8),
        }
    }
}

impl LumpRecord for DBrushSide {
    const SIZE: usize = qfiles::DBRUSHSIDE_SIZE;
    fn read(b: &[u8]) -> Self {
        DBrushSide {
            planenum: read_u16_le(b, 0),
            texinfo: read_u16_le(b, 2),
        }
    }
}

impl LumpRecord for DModel {
    const SIZE: usize = qfiles::DMODEL_SIZE;
    fn read(b: &[u8]) -> Self {
        DModel {
            mins: read_vec3(b, 0),
            maxs: read_vec3(b, 12),
            origin: read_vec3(b, 24),
            headnode: read_u32_le(b, 36),
            firstface: read_u32_le(b, 40),
            numfaces: read_u32_le(b, 44),
        }
    }
}

// leaf faces and leaf brushes
impl LumpRecord for u16 {
    const SIZE: usize = qfiles::LEAFFACE_SIZE;
    fn read(b: &[u8]) -> Self {
        read_u16_le(b, 0)
    }
}

// surface edges
impl LumpRecord for i32 {
    const SIZE: usize = qfiles::SURFEDGE_SIZE;
    fn read(b: &[u8]) -> Self {
        read_i32_le(b, 0)
    }
}

// ============================================================
// MapReader: header validation and lump slicing
// ============================================================

pub struct MapReader<'a> {
    data: &'a [u8],
    pub header: DHeader,
}

impl<'a> MapReader<'a> {
    /// Validate the header and the lump directory.
    pub fn new(data: &'a [u8]) -> Result<Self, MapLoadError> {
        if data.len() < BSP_HEADER_SIZE {
            return Err(MapLoadError::TruncatedHeader { len: data.len() });
        }

        let ident = read_u32_le(data, 0);
        if ident != IDBSPHEADER {
            return Err(MapLoadError::BadMagic(ident));
        }
        let version = read_u32_le(data, 4);
        if version != BSPVERSION {
            return Err(MapLoadError::BadVersion(version));
        }

        let mut lumps = [Lump::default(); HEADER_LUMPS];
        for (i, lump) in lumps.iter_mut().enumerate() {
            let base = 8 + i * 8;
            lump.fileofs = read_u32_le(data, base);
            lump.filelen = read_u32_le(data, base + 4);

            if lump.fileofs as u64 + lump.filelen as u64 > data.len() as u64 {
                return Err(MapLoadError::LumpOutOfBounds {
                    lump: lump_name(i),
                    offset: lump.fileofs,
                    length: lump.filelen,
                    size: data.len(),
                });
            }
        }

        Ok(Self {
            data,
            header: DHeader { ident, version, lumps },
        })
    }

    /// Raw bytes of one lump. Bounds were checked in `new`.
    pub fn lump(&self, lump: usize) -> &'a [u8] {
        let l = &self.header.lumps[lump];
        let start = l.fileofs as usize;
        &self.data[start..start + l.filelen as usize]
    }

    /// Decode every record of a lump.
    pub fn records<T: LumpRecord>(&self, lump: usize) -> Result<Vec<T>, MapLoadError> {
        let bytes = self.lump(lump);
        if bytes.len() % T::SIZE != 0 {
            return Err(MapLoadError::FunnyLumpSize {
                lump: lump_name(lump),
                length: bytes.len() as u32,
                stride: T::SIZE,
            });
        }

        let count = bytes.len() / T::SIZE;
        let records = if count >= PARALLEL_LUMP_THRESHOLD {
            bytes.par_chunks_exact(T::SIZE).map(T::read).collect()
        } else {
            bytes.chunks_exact(T::SIZE).map(T::read).collect()
        };
        Ok(records)
    }
}

// ============================================================
// Loaded geometry
// ============================================================

/// Texture handle supplied by the texture collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

/// Looks textures up by their texinfo name.
pub trait TextureResolver {
    fn resolve(&self, name: &str) -> Option<TextureInfo>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TexInfo {
    pub u_axis: Vec3,
    /// World units.
    pub u_offset: f32,
    pub v_axis: Vec3,
    /// World units.
    pub v_offset: f32,
    pub flags: SurfaceFlags,
    pub value: i32,
    pub texture_name: String,
    pub next_texinfo: u32,
    /// `None` until `LoadedMap::resolve_textures` finds it.
    pub texture: Option<TextureInfo>,
}

impl TexInfo {
    pub fn surface(&self) -> CSurface {
        CSurface {
            name: self.texture_name.clone(),
            flags: self.flags,
            value: self.value,
        }
    }
}

/// One edge of a face winding, already oriented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceEdge {
    pub v1: usize,
    pub v2: usize,
    pub flipped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lightmap {
    pub width: usize,
    pub height: usize,
    /// Smallest u/v projection of the winding, source units.
    pub u_min: f32,
    pub v_min: f32,
    /// RGB, `width * height * 3` bytes unless the lump ran short.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub plane: usize,
    pub side: u16,
    pub edges: Vec<FaceEdge>,
    pub texinfo: usize,
    pub styles: [u8; qfiles::MAXLIGHTMAPS],
    pub lightofs: u32,
    /// Average of the winding's leading vertices, world units.
    pub center: Vec3,
    /// Plane normal, flipped for back-side faces.
    pub normal: Vec3,
    pub lightmap: Option<Lightmap>,
}

/// A child or head reference in the BSP tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Node(usize),
    Leaf(usize),
}

impl NodeRef {
    /// Node child: negative numbers are -(leafs+1).
    pub fn from_child(child: i32) -> Self {
        if child < 0 {
            NodeRef::Leaf((-1 - child) as usize)
        } else {
            NodeRef::Node(child as usize)
        }
    }

    /// Model head: the top bit marks an inverted leaf index.
    pub fn from_headnode(value: u32) -> Self {
        if value & 0x8000_0000 != 0 {
            NodeRef::Leaf(!value as usize)
        } else {
            NodeRef::Node(value as usize)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub plane: usize,
    /// [front, back]
    pub children: [NodeRef; 2],
    /// World units.
    pub mins: Vec3,
    pub maxs: Vec3,
    pub first_face: usize,
    pub num_faces: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub contents: Contents,
    pub cluster: i32,
    pub area: i32,
    /// Source units, swapped.
    pub mins: Vec3,
    pub maxs: Vec3,
    pub first_leaf_face: usize,
    pub num_leaf_faces: usize,
    pub first_leaf_brush: usize,
    pub num_leaf_brushes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brush {
    pub first_side: usize,
    pub num_sides: usize,
    pub contents: Contents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrushSide {
    pub plane: usize,
    pub texinfo: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// World units.
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub head: NodeRef,
    pub first_face: usize,
    pub num_faces: usize,
    pub is_world: bool,
}

/// Everything a map load produces. The default value is the empty map left
/// behind by a failed load.
#[derive(Debug, Default)]
pub struct LoadedMap {
    pub name: String,
    pub version: u32,
    pub scale: f32,
    pub vertices: Vec<Vec3>,
    pub planes: Vec<CPlane>,
    pub edges: Vec<[usize; 2]>,
    pub texinfo: Vec<TexInfo>,
    pub faces: Vec<Face>,
    pub nodes: Vec<Node>,
    pub leaves: Vec<Leaf>,
    pub leaf_faces: Vec<usize>,
    pub leaf_brushes: Vec<usize>,
    pub brushes: Vec<Brush>,
    pub brush_sides: Vec<BrushSide>,
    pub models: Vec<Model>,
    pub entity_text: String,
    pub entities: Vec<Entity>,
    /// Per-trace brush stamps, shared by every trace against this map.
    pub(crate) brush_checks: Mutex<BrushChecks>,
}

/// Map summary for the console.
#[derive(Debug, Clone, PartialEq)]
pub struct MapInfo {
    pub name: String,
    pub version: u32,
    pub vertices: usize,
    pub planes: usize,
    pub edges: usize,
    pub faces: usize,
    pub face_edges: usize,
    pub texinfo: usize,
    pub brushes: usize,
    pub brush_sides: usize,
    pub leaves: usize,
    pub message: String,
}

impl fmt::Display for MapInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Map name: {}", self.name)?;
        writeln!(f, "BSP file version: {}", self.version)?;
        writeln!(f, "Vertices: {}", self.vertices)?;
        writeln!(f, "Planes: {}", self.planes)?;
        writeln!(f, "Edges: {}", self.edges)?;
        writeln!(f, "Faces: {}", self.faces)?;
        writeln!(f, "Face edges: {}", self.face_edges)?;
        writeln!(f, "Texture variants: {}", self.texinfo)?;
        writeln!(f, "Brushes: {}", self.brushes)?;
        writeln!(f, "Brush sides: {}", self.brush_sides)?;
        writeln!(f, "Leaves: {}", self.leaves)?;
        write!(f, "Map msg: {}", self.message)
    }
}

impl LoadedMap {
    /// Head of model 0, `None` for the empty map.
    pub fn world_head(&self) -> Option<NodeRef> {
        self.models.first().map(|m| m.head)
    }

    pub fn worldspawn(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.classname == "worldspawn")
    }

    pub fn info(&self) -> MapInfo {
        MapInfo {
            name: self.name.clone(),
            version: self.version,
            vertices: self.vertices.len(),
            planes: self.planes.len(),
            edges: self.edges.len(),
            faces: self.faces.len(),
            face_edges: self.faces.iter().map(|f| f.edges.len()).sum(),
            texinfo: self.texinfo.len(),
            brushes: self.brushes.len(),
            brush_sides: self.brush_sides.len(),
            leaves: self.leaves.len(),
            message: self.worldspawn().map(|w| w.message.clone()).unwrap_or_default(),
        }
    }

    /// Surface reported when a trace stops on `side`.
    pub fn side_surface(&self, side: &BrushSide) -> Option<CSurface> {
        side.texinfo
            .and_then(|i| self.texinfo.get(i))
            .map(TexInfo::surface)
    }

    /// Ask the collaborator for every texture the map names. Returns how
    /// many texinfos stayed unresolved.
    pub fn resolve_textures(&mut self, resolver: &dyn TextureResolver) -> usize {
        let mut missing = 0;
        let mut warned: Vec<String> = Vec::new();
        for tex in &mut self.texinfo {
            tex.texture = resolver.resolve(&tex.texture_name);
            if tex.texture.is_none() {
                missing += 1;
                if !warned.contains(&tex.texture_name) {
                    com_warn(&format!("Texture {} not found\n", tex.texture_name));
                    warned.push(tex.texture_name.clone());
                }
            }
        }
        missing
    }

    /// Texture coordinates of world point `p` on `face`, (0, 0) when the
    /// texture is unresolved.
    pub fn texture_uv(&self, face: usize, p: &Vec3) -> [f32; 2] {
        let tex = match self.faces.get(face).and_then(|f| self.texinfo.get(f.texinfo)) {
            Some(t) => t,
            None => return [0.0, 0.0],
        };
        let dims = match tex.texture {
            Some(d) if d.width > 0 && d.height > 0 => d,
            _ => return [0.0, 0.0],
        };

        let u = dot_product(p, &tex.u_axis) + tex.u_offset;
        let v = dot_product(p, &tex.v_axis) + tex.v_offset;
        [
            u / (dims.width as f32 * self.scale),
            v / (dims.height as f32 * self.scale),
        ]
    }

    /// Lightmap coordinates of world point `p` on `face`, (0, 0) for faces
    /// without a lightmap.
    pub fn lightmap_uv(&self, face: usize, p: &Vec3) -> [f32; 2] {
        let f = match self.faces.get(face) {
            Some(f) => f,
            None => return [0.0, 0.0],
        };
        let (lm, tex) = match (&f.lightmap, self.texinfo.get(f.texinfo)) {
            (Some(lm), Some(tex)) if lm.width > 0 && lm.height > 0 => (lm, tex),
            _ => return [0.0, 0.0],
        };

        let src = vector_scale(p, 1.0 / self.scale);
        let mut u = dot_product(&src, &tex.u_axis) + tex.u_offset / self.scale;
        let mut v = dot_product(&src, &tex.v_axis) + tex.v_offset / self.scale;

        u += ((lm.width << 4) + 8) as f32 - lm.u_min;
        v += ((lm.height << 4) + 8) as f32 - lm.v_min;

        [
            u * (1.0 / (lm.width as f32 * LIGHTMAP_BLOCK)),
            v * (1.0 / (lm.height as f32 * LIGHTMAP_BLOCK)),
        ]
    }
}

// ============================================================
// Cross-reference checks
// ============================================================

fn check_index(
    lump: usize,
    index: usize,
    field: &'static str,
    value: i64,
    limit: usize,
) -> Result<usize, MapLoadError> {
    if value < 0 || value as u64 >= limit as u64 {
        return Err(MapLoadError::BadIndex {
            lump: lump_name(lump),
            index,
            field,
            value,
            limit,
        });
    }
    Ok(value as usize)
}

/// `first..first + count` must fit in `limit` records.
fn check_range(
    lump: usize,
    index: usize,
    field: &'static str,
    first: u64,
    count: u64,
    limit: usize,
) -> Result<(), MapLoadError> {
    let end = first + count;
    if end > limit as u64 {
        return Err(MapLoadError::BadIndex {
            lump: lump_name(lump),
            index,
            field,
            value: end as i64,
            limit,
        });
    }
    Ok(())
}

fn check_ref(
    lump: usize,
    index: usize,
    field: &'static str,
    r: NodeRef,
    num_nodes: usize,
    num_leaves: usize,
) -> Result<NodeRef, MapLoadError> {
    match r {
        NodeRef::Node(n) => check_index(lump, index, field, n as i64, num_nodes).map(NodeRef::Node),
        NodeRef::Leaf(l) => check_index(lump, index, field, l as i64, num_leaves).map(NodeRef::Leaf),
    }
}

/// Depth-first walk from every model head; reaching a node that is still on
/// the walk stack means the tree loops.
fn check_acyclic(nodes: &[Node], models: &[Model]) -> Result<(), MapLoadError> {
    const UNSEEN: u8 = 0;
    const ACTIVE: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; nodes.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for model in models {
        let root = match model.head {
            NodeRef::Node(n) => n,
            NodeRef::Leaf(_) => continue,
        };
        if state[root] == DONE {
            continue;
        }
        state[root] = ACTIVE;
        stack.push((root, 0));

        while let Some(&(node, child)) = stack.last() {
            if child == 2 {
                state[node] = DONE;
                stack.pop();
                continue;
            }
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            if let NodeRef::Node(next) = nodes[node].children[child] {
                match state[next] {
                    ACTIVE => return Err(MapLoadError::CyclicTree { node: next }),
                    UNSEEN => {
                        state[next] = ACTIVE;
                        stack.push((next, 0));
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

// ============================================================
// Lump conversion
// ============================================================

/// Plane types name an axis; follow the Y/Z swap.
fn swap_plane_type(t: u32) -> u8 {
    match t {
        1 => 2,
        2 => 1,
        4 => 5,
        5 => 4,
        other => other as u8,
    }
}

fn short3_to_vec(v: [i16; 3]) -> Vec3 {
    swap_yz([v[0] as f32, v[1] as f32, v[2] as f32])
}

fn texture_name(raw: &[u8; TEXTURE_NAME_LEN]) -> String {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(TEXTURE_NAME_LEN);
    String::from_utf8_lossy(&raw[..len]).into_owned()
}

fn convert_texinfo(d: &qfiles::TexInfo, scale: f32) -> TexInfo {
    let [u, v] = d.vecs;
    TexInfo {
        u_axis: swap_yz([u[0], u[1], u[2]]),
        u_offset: u[3] * scale,
        v_axis: swap_yz([v[0], v[1], v[2]]),
        v_offset: v[3] * scale,
        flags: SurfaceFlags::from_bits_retain(d.flags),
        value: d.value as i32,
        texture_name: texture_name(&d.texture),
        next_texinfo: d.nexttexinfo,
        texture: None,
    }
}

/// Derive lightmap size from the face's texture-space extents and cut its
/// RGB block out of the lighting lump.
fn build_lightmap(
    index: usize,
    face: &Face,
    tex: &TexInfo,
    vertices: &[Vec3],
    scale: f32,
    lighting: &[u8],
) -> Option<Lightmap> {
    if tex.flags.intersects(SurfaceFlags::MASK_NOLIGHTMAP) || face.lightofs == NO_LIGHTOFS {
        return None;
    }

    let mut min_u = f32::MAX;
    let mut max_u = f32::MIN;
    let mut min_v = f32::MAX;
    let mut max_v = f32::MIN;
    for e in &face.edges {
        let p = vector_scale(&vertices[e.v1], 1.0 / scale);
        let u = dot_product(&p, &tex.u_axis) + tex.u_offset / scale;
        let v = dot_product(&p, &tex.v_axis) + tex.v_offset / scale;
        min_u = min_u.min(u);
        max_u = max_u.max(u);
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }

    let mut width = (max_u / LIGHTMAP_BLOCK).ceil() as i32 - (min_u / LIGHTMAP_BLOCK).floor() as i32 + 1;
    let mut height = (max_v / LIGHTMAP_BLOCK).ceil() as i32 - (min_v / LIGHTMAP_BLOCK).floor() as i32 + 1;

    // scaled texinfo: the axis length divides the luxel count
    let u_len = vector_length(&tex.u_axis);
    if u_len > 1.0 {
        width /= u_len.trunc() as i32;
    }
    let v_len = vector_length(&tex.v_axis);
    if v_len > 1.0 {
        height /= v_len.trunc() as i32;
    }
    let width = width.max(0) as usize;
    let height = height.max(0) as usize;

    let want = width * height * 3;
    let start = (face.lightofs as usize).min(lighting.len());
    let end = (face.lightofs as usize).saturating_add(want).min(lighting.len());
    if end - start < want {
        com_warn(&format!(
            "face {}: lightmap needs {} bytes at offset {}, lighting lump has {}\n",
            index,
            want,
            face.lightofs,
            end - start
        ));
    }

    Some(Lightmap {
        width,
        height,
        u_min: min_u,
        v_min: min_v,
        data: lighting[start..end].to_vec(),
    })
}

// ============================================================
// load_bsp
// ============================================================

/// Decode and validate a whole map. `entity_override`, when present,
/// replaces the entity lump.
pub fn load_bsp(
    name: &str,
    data: &[u8],
    scale: f32,
    entity_override: Option<&str>,
) -> Result<LoadedMap, MapLoadError> {
    let reader = MapReader::new(data)?;

    // geometry
    let vertices: Vec<Vec3> = reader
        .records::<DVertex>(LUMP_VERTEXES)?
        .into_iter()
        .map(|d| vector_scale(&swap_yz(d.point), scale))
        .collect();

    let planes: Vec<CPlane> = reader
        .records::<DPlane>(LUMP_PLANES)?
        .into_iter()
        .map(|d| CPlane::new(swap_yz(d.normal), d.dist, swap_plane_type(d.plane_type)))
        .collect();

    let mut edges = Vec::new();
    for (i, d) in reader.records::<DEdge>(LUMP_EDGES)?.into_iter().enumerate() {
        let v1 = check_index(LUMP_EDGES, i, "vertex", d.v[0] as i64, vertices.len())?;
        let v2 = check_index(LUMP_EDGES, i, "vertex", d.v[1] as i64, vertices.len())?;
        edges.push([v1, v2]);
    }

    let texinfo: Vec<TexInfo> = reader
        .records::<qfiles::TexInfo>(LUMP_TEXINFO)?
        .iter()
        .map(|d| convert_texinfo(d, scale))
        .collect();

    let surfedges = reader.records::<i32>(LUMP_SURFEDGES)?;
    for (i, &se) in surfedges.iter().enumerate() {
        check_index(LUMP_SURFEDGES, i, "edge", se.unsigned_abs() as i64, edges.len())?;
    }

    let mut faces = Vec::new();
    for (i, d) in reader.records::<DFace>(LUMP_FACES)?.into_iter().enumerate() {
        let plane = check_index(LUMP_FACES, i, "plane", d.planenum as i64, planes.len())?;
        let tex = check_index(LUMP_FACES, i, "texinfo", d.texinfo as i64, texinfo.len())?;
        if d.numedges < MIN_FACE_EDGES || d.numedges > MAX_FACE_EDGES {
            return Err(MapLoadError::BadEdgeCount { index: i, count: d.numedges });
        }
        check_range(LUMP_FACES, i, "edge range", d.firstedge as u64, d.numedges as u64, surfedges.len())?;

        let first = d.firstedge as usize;
        let winding: Vec<FaceEdge> = surfedges[first..first + d.numedges as usize]
            .iter()
            .map(|&se| {
                let [a, b] = edges[se.unsigned_abs() as usize];
                if se < 0 {
                    FaceEdge { v1: b, v2: a, flipped: true }
                } else {
                    FaceEdge { v1: a, v2: b, flipped: false }
                }
            })
            .collect();

        let mut center = [0.0; 3];
        for e in &winding {
            center = vector_add(&center, &vertices[e.v1]);
        }
        let center = vector_scale(&center, 1.0 / winding.len() as f32);

        let normal = if d.side != 0 {
            vector_scale(&planes[plane].normal, -1.0)
        } else {
            planes[plane].normal
        };

        faces.push(Face {
            plane,
            side: d.side,
            edges: winding,
            texinfo: tex,
            styles: d.styles,
            lightofs: d.lightofs,
            center,
            normal,
            lightmap: None,
        });
    }

    // bsp tree
    let dleaves = reader.records::<DLeaf>(LUMP_LEAFS)?;
    let dnodes = reader.records::<DNode>(LUMP_NODES)?;

    let leaf_faces: Vec<usize> = reader
        .records::<u16>(LUMP_LEAFFACES)?
        .into_iter()
        .enumerate()
        .map(|(i, f)| check_index(LUMP_LEAFFACES, i, "face", f as i64, faces.len()))
        .collect::<Result<_, _>>()?;

    let brushes: Vec<Brush> = reader
        .records::<DBrush>(LUMP_BRUSHES)?
        .into_iter()
        .map(|d| Brush {
            first_side: d.firstside as usize,
            num_sides: d.numsides as usize,
            contents: Contents::from_bits_retain(d.contents),
        })
        .collect();

    let leaf_brushes: Vec<usize> = reader
        .records::<u16>(LUMP_LEAFBRUSHES)?
        .into_iter()
        .enumerate()
        .map(|(i, b)| check_index(LUMP_LEAFBRUSHES, i, "brush", b as i64, brushes.len()))
        .collect::<Result<_, _>>()?;

    let mut leaves = Vec::with_capacity(dleaves.len());
    for (i, d) in dleaves.iter().enumerate() {
        check_range(LUMP_LEAFS, i, "leaf face range", d.firstleafface as u64, d.numleaffaces as u64, leaf_faces.len())?;
        check_range(LUMP_LEAFS, i, "leaf brush range", d.firstleafbrush as u64, d.numleafbrushes as u64, leaf_brushes.len())?;
        leaves.push(Leaf {
            contents: Contents::from_bits_retain(d.contents),
            cluster: d.cluster as i32,
            area: d.area as i32,
            mins: vector_scale(&short3_to_vec(d.mins), scale),
            maxs: vector_scale(&short3_to_vec(d.maxs), scale),
            first_leaf_face: d.firstleafface as usize,
            num_leaf_faces: d.numleaffaces as usize,
            first_leaf_brush: d.firstleafbrush as usize,
            num_leaf_brushes: d.numleafbrushes as usize,
        });
    }

    let mut nodes = Vec::with_capacity(dnodes.len());
    for (i, d) in dnodes.iter().enumerate() {
        let plane = check_index(LUMP_NODES, i, "plane", d.planenum as i64, planes.len())?;
        let front = check_ref(LUMP_NODES, i, "front child", NodeRef::from_child(d.children[0]), dnodes.len(), leaves.len())?;
        let back = check_ref(LUMP_NODES, i, "back child", NodeRef::from_child(d.children[1]), dnodes.len(), leaves.len())?;
        check_range(LUMP_NODES, i, "face range", d.firstface as u64, d.numfaces as u64, faces.len())?;
        nodes.push(Node {
            plane,
            children: [front, back],
            mins: vector_scale(&short3_to_vec(d.mins), scale),
            maxs: vector_scale(&short3_to_vec(d.maxs), scale),
            first_face: d.firstface as usize,
            num_faces: d.numfaces as usize,
        });
    }

    let mut brush_sides = Vec::new();
    for (i, d) in reader.records::<DBrushSide>(LUMP_BRUSHSIDES)?.into_iter().enumerate() {
        let plane = check_index(LUMP_BRUSHSIDES, i, "plane", d.planenum as i64, planes.len())?;
        let tex = if d.texinfo == NO_TEXINFO {
            None
        } else {
            Some(check_index(LUMP_BRUSHSIDES, i, "texinfo", d.texinfo as i64, texinfo.len())?)
        };
        brush_sides.push(BrushSide { plane, texinfo: tex });
    }
    for (i, b) in brushes.iter().enumerate() {
        check_range(LUMP_BRUSHES, i, "side range", b.first_side as u64, b.num_sides as u64, brush_sides.len())?;
    }

    let dmodels = reader.records::<DModel>(LUMP_MODELS)?;
    if dmodels.is_empty() {
        return Err(MapLoadError::NoModels);
    }
    let mut models = Vec::with_capacity(dmodels.len());
    for (i, d) in dmodels.iter().enumerate() {
        let head = check_ref(LUMP_MODELS, i, "headnode", NodeRef::from_headnode(d.headnode), nodes.len(), leaves.len())?;
        check_range(LUMP_MODELS, i, "face range", d.firstface as u64, d.numfaces as u64, faces.len())?;
        let spread = |v: [f32; 3], delta: f32| [v[0] + delta, v[1] + delta, v[2] + delta];
        models.push(Model {
            mins: vector_scale(&swap_yz(spread(d.mins, -1.0)), scale),
            maxs: vector_scale(&swap_yz(spread(d.maxs, 1.0)), scale),
            origin: vector_scale(&swap_yz(d.origin), scale),
            head,
            first_face: d.firstface as usize,
            num_faces: d.numfaces as usize,
            is_world: i == 0,
        });
    }

    check_acyclic(&nodes, &models)?;

    // lightmaps
    let lighting = reader.lump(LUMP_LIGHTING);
    if !lighting.is_empty() {
        for (i, face) in faces.iter_mut().enumerate() {
            face.lightmap = build_lightmap(i, face, &texinfo[face.texinfo], &vertices, scale, lighting);
        }
    }

    // entities
    let entity_text = match entity_override {
        Some(text) => {
            com_dprintf(&format!("{}: using entity override\n", name));
            text.to_string()
        }
        None => {
            let raw = reader.lump(LUMP_ENTITIES);
            let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[..len]).into_owned()
        }
    };
    let entities: Vec<Entity> = parse_entities(&entity_text)?
        .iter()
        .map(|d| Entity::from_dict(d, scale))
        .collect();

    let map = LoadedMap {
        name: name.to_string(),
        version: reader.header.version,
        scale,
        vertices,
        planes,
        edges,
        texinfo,
        faces,
        nodes,
        leaves,
        leaf_faces,
        leaf_brushes,
        brush_checks: Mutex::new(BrushChecks::new(brushes.len())),
        brushes,
        brush_sides,
        models,
        entity_text,
        entities,
    };

    com_dprintf(&format!(
        "{}: {} vertices, {} faces, {} nodes, {} leaves, {} brushes, {} models, {} entities\n",
        name,
        map.vertices.len(),
        map.faces.len(),
        map.nodes.len(),
        map.leaves.len(),
        map.brushes.len(),
        map.models.len(),
        map.entities.len()
    ));

    Ok(map)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{com_begin_redirect, com_end_redirect};
    use crate::testmap::{box_world, pool_world, MapBuilder};

    const SCALE: f32 = 0.015625;

    struct FixedTextures;

    impl TextureResolver for FixedTextures {
        fn resolve(&self, name: &str) -> Option<TextureInfo> {
            match name {
                "e1u1/floor1_1" => Some(TextureInfo { id: 1, width: 64, height: 32 }),
                _ => None,
            }
        }
    }

    /// A single 64x64 floor quad at z = 0 with a lightmap and a texture.
    fn floor_face_map(u_axis: [f32; 3], lighting_len: usize) -> MapBuilder {
        let mut b = box_world(&[]);
        let tex = b.add_texinfo(
            "e1u1/floor1_1",
            SurfaceFlags::empty(),
            [u_axis[0], u_axis[1], u_axis[2], 0.0],
            [0.0, 1.0, 0.0, 0.0],
        );
        let up = b.add_plane([0.0, 0.0, 1.0], 0.0);
        b.add_face(
            &[[0.0, 0.0, 0.0], [64.0, 0.0, 0.0], [64.0, 64.0, 0.0], [0.0, 64.0, 0.0]],
            up,
            0,
            tex,
            0,
        );
        b.set_lighting(&vec![0x80; lighting_len]);
        b
    }

    #[test]
    fn test_vertex_count_and_edges() {
        let b = floor_face_map([1.0, 0.0, 0.0], 5 * 5 * 3);
        let data = b.build();
        let map = load_bsp("test", &data, SCALE, None).unwrap();
        assert_eq!(map.vertices.len(), b.vertices.len());
        assert_eq!(map.vertices.len(), 4);
        for e in &map.edges {
            assert!(e[0] < map.vertices.len() && e[1] < map.vertices.len());
        }
        // swapped and scaled
        assert_eq!(map.vertices[2], [1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_face_derived_fields() {
        let data = floor_face_map([1.0, 0.0, 0.0], 5 * 5 * 3).build();
        let map = load_bsp("test", &data, SCALE, None).unwrap();
        let face = &map.faces[0];
        assert_eq!(face.edges.len(), 4);
        assert_eq!(face.normal, [0.0, 1.0, 0.0]);
        assert_eq!(face.center, [0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_plane_type_follows_swap() {
        let mut b = box_world(&[]);
        b.add_plane([0.0, 1.0, 0.0], 8.0);
        b.add_plane([0.0, 0.0, 1.0], 16.0);
        let map = load_bsp("test", &b.build(), SCALE, None).unwrap();
        assert_eq!(map.planes[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(map.planes[0].plane_type, 2);
        assert_eq!(map.planes[1].normal, [0.0, 1.0, 0.0]);
        assert_eq!(map.planes[1].plane_type, 1);
        // distances stay in source units
        assert_eq!(map.planes[1].dist, 16.0);
    }

    #[test]
    fn test_lightmap_dimensions() {
        let data = floor_face_map([1.0, 0.0, 0.0], 5 * 5 * 3).build();
        let map = load_bsp("test", &data, SCALE, None).unwrap();
        let lm = map.faces[0].lightmap.as_ref().unwrap();
        // u and v span 0..64: ceil(4) - floor(0) + 1
        assert_eq!((lm.width, lm.height), (5, 5));
        assert_eq!((lm.u_min, lm.v_min), (0.0, 0.0));
        assert_eq!(lm.data.len(), 75);
    }

    #[test]
    fn test_lightmap_axis_magnitude_quirk() {
        // a u axis of length 2 doubles the projected extent, then the
        // width is divided by 2
        let data = floor_face_map([2.0, 0.0, 0.0], 5 * 5 * 3).build();
        let map = load_bsp("test", &data, SCALE, None).unwrap();
        let lm = map.faces[0].lightmap.as_ref().unwrap();
        assert_eq!(lm.width, (8 - 0 + 1) / 2);
        assert_eq!(lm.height, 5);
    }

    #[test]
    fn test_truncated_lightmap_warns() {
        let data = floor_face_map([1.0, 0.0, 0.0], 30).build();
        com_begin_redirect();
        let map = load_bsp("test", &data, SCALE, None).unwrap();
        let out = com_end_redirect().unwrap();
        assert_eq!(map.faces[0].lightmap.as_ref().unwrap().data.len(), 30);
        assert!(out.contains("lightmap needs 75 bytes"));
    }

    #[test]
    fn test_no_lightmap_for_sky() {
        let mut b = floor_face_map([1.0, 0.0, 0.0], 75);
        b.texinfo[0].flags = SurfaceFlags::SKY.bits();
        let map = load_bsp("test", &b.build(), SCALE, None).unwrap();
        assert!(map.faces[0].lightmap.is_none());
    }

    #[test]
    fn test_uv_helpers() {
        let data = floor_face_map([1.0, 0.0, 0.0], 75).build();
        let mut map = load_bsp("test", &data, SCALE, None).unwrap();
        let p = [0.5, 0.0, 0.25];
        assert_eq!(map.texture_uv(0, &p), [0.0, 0.0]);

        assert_eq!(map.resolve_textures(&FixedTextures), 0);
        let uv = map.texture_uv(0, &p);
        // 32 source units across a 64 wide texture
        assert!((uv[0] - 0.5).abs() < 1e-5);
        assert!((uv[1] - 0.5).abs() < 1e-5);

        let luv = map.lightmap_uv(0, &[0.0, 0.0, 0.0]);
        // (0 + 5*16 + 8 - 0) / 80
        assert!((luv[0] - 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_missing_texture_warns_once() {
        let mut b = floor_face_map([1.0, 0.0, 0.0], 75);
        b.add_texinfo(
            "e1u1/unknown",
            SurfaceFlags::empty(),
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
        );
        b.add_texinfo(
            "e1u1/unknown",
            SurfaceFlags::empty(),
            [0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
        );
        let mut map = load_bsp("test", &b.build(), SCALE, None).unwrap();
        com_begin_redirect();
        assert_eq!(map.resolve_textures(&FixedTextures), 2);
        let out = com_end_redirect().unwrap();
        assert_eq!(out.matches("Texture e1u1/unknown not found").count(), 1);
    }

    #[test]
    fn test_bad_face_edge_count() {
        let mut b = floor_face_map([1.0, 0.0, 0.0], 75);
        b.faces[0].numedges = 2;
        assert!(matches!(
            load_bsp("test", &b.build(), SCALE, None),
            Err(MapLoadError::BadEdgeCount { index: 0, count: 2 })
        ));

        b.faces[0].numedges = 4097;
        assert!(matches!(
            load_bsp("test", &b.build(), SCALE, None),
            Err(MapLoadError::BadEdgeCount { index: 0, count: 4097 })
        ));
    }

    #[test]
    fn test_bad_face_plane_and_texinfo() {
        let mut b = floor_face_map([1.0, 0.0, 0.0], 75);
        b.faces[0].planenum = 99;
        match load_bsp("test", &b.build(), SCALE, None) {
            Err(MapLoadError::BadIndex { lump, field, value, .. }) => {
                assert_eq!((lump, field, value), ("faces", "plane", 99));
            }
            other => panic!("unexpected result {:?}", other.map(|m| m.name)),
        }

        let mut b = floor_face_map([1.0, 0.0, 0.0], 75);
        b.faces[0].texinfo = 3;
        match load_bsp("test", &b.build(), SCALE, None) {
            Err(MapLoadError::BadIndex { lump, field, value, limit, .. }) => {
                assert_eq!((lump, field, value, limit), ("faces", "texinfo", 3, 1));
            }
            other => panic!("unexpected result {:?}", other.map(|m| m.name)),
        }
    }

    #[test]
    fn test_bad_edge_vertex() {
        let mut b = floor_face_map([1.0, 0.0, 0.0], 75);
        b.edges[1].v[1] = 40;
        assert!(matches!(
            load_bsp("test", &b.build(), SCALE, None),
            Err(MapLoadError::BadIndex { lump: "edges", index: 1, .. })
        ));
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(load_bsp("t", &[0u8; 10], SCALE, None), Err(MapLoadError::TruncatedHeader { len: 10 })));

        let mut data = box_world(&[]).build();
        data[0] = b'X';
        assert!(matches!(load_bsp("t", &data, SCALE, None), Err(MapLoadError::BadMagic(_))));

        let mut data = box_world(&[]).build();
        data[4] = 37;
        assert!(matches!(load_bsp("t", &data, SCALE, None), Err(MapLoadError::BadVersion(37))));

        let mut data = box_world(&[]).build();
        // stretch the vertex lump past the end of the file
        let base = 8 + LUMP_VERTEXES * 8 + 4;
        let file_len = data.len() as u32;
        data[base..base + 4].copy_from_slice(&file_len.to_le_bytes());
        assert!(matches!(
            load_bsp("t", &data, SCALE, None),
            Err(MapLoadError::LumpOutOfBounds { lump: "vertexes", .. })
        ));
    }

    #[test]
    fn test_funny_lump_size() {
        let mut b = box_world(&[]);
        b.add_plane([0.0, 0.0, 1.0], 0.0);
        let mut data = b.build();
        let base = 8 + LUMP_PLANES * 8 + 4;
        let len = read_u32_le(&data, base);
        data[base..base + 4].copy_from_slice(&(len - 1).to_le_bytes());
        assert!(matches!(
            load_bsp("t", &data, SCALE, None),
            Err(MapLoadError::FunnyLumpSize { lump: "planes", stride: 20, .. })
        ));
    }

    #[test]
    fn test_bad_node_child_and_cycle() {
        let mut b = box_world(&[]);
        let p = b.add_plane([0.0, 0.0, 1.0], 0.0);
        let leaf = b.add_leaf(Contents::empty(), &[]);
        let n0 = b.add_node(p, leaf, leaf);
        b.models[0].headnode = n0 as u32;

        b.nodes[0].children[0] = 5;
        assert!(matches!(
            load_bsp("t", &b.build(), SCALE, None),
            Err(MapLoadError::BadIndex { lump: "nodes", field: "front child", .. })
        ));

        b.nodes[0].children[0] = 0;
        assert!(matches!(load_bsp("t", &b.build(), SCALE, None), Err(MapLoadError::CyclicTree { node: 0 })));
    }

    #[test]
    fn test_headnode_decode() {
        assert_eq!(NodeRef::from_headnode(0), NodeRef::Node(0));
        assert_eq!(NodeRef::from_headnode(!3u32), NodeRef::Leaf(3));
        assert_eq!(NodeRef::from_child(-1), NodeRef::Leaf(0));
        assert_eq!(NodeRef::from_child(7), NodeRef::Node(7));
    }

    #[test]
    fn test_models() {
        let map = load_bsp("t", &box_world(&[]).build(), 1.0, None).unwrap();
        let world = &map.models[0];
        assert!(world.is_world);
        assert_eq!(world.head, NodeRef::Leaf(0));
        // source bounds +-4096, widened by one unit
        assert_eq!(world.mins, [-4097.0; 3]);
        assert_eq!(world.maxs, [4097.0; 3]);
    }

    #[test]
    fn test_tree_bounds_are_scaled() {
        let map = load_bsp("pool", &pool_world(512.0, 48.0).build(), SCALE, None).unwrap();
        assert!(!map.nodes.is_empty() && !map.leaves.is_empty());
        // source bounds +-4096
        for leaf in &map.leaves {
            assert_eq!(leaf.mins, [-64.0; 3]);
            assert_eq!(leaf.maxs, [64.0; 3]);
        }
        for node in &map.nodes {
            assert_eq!(node.mins, [-64.0; 3]);
            assert_eq!(node.maxs, [64.0; 3]);
        }
    }

    #[test]
    fn test_entities_and_override() {
        let mut b = box_world(&[]);
        b.set_entities("{\n\"classname\" \"worldspawn\"\n\"message\" \"Outer Base\"\n}\n");
        let data = b.build();

        let map = load_bsp("base1", &data, SCALE, None).unwrap();
        assert_eq!(map.entities.len(), 1);
        assert_eq!(map.info().message, "Outer Base");

        let over = "{ \"classname\" \"worldspawn\" }\n{ \"classname\" \"info_player_start\" \"origin\" \"0 0 64\" }";
        let map = load_bsp("base1", &data, SCALE, Some(over)).unwrap();
        assert_eq!(map.entities.len(), 2);
        assert_eq!(map.entities[1].origin, [0.0, 1.0, 0.0]);
        assert_eq!(map.info().message, "");
    }

    #[test]
    fn test_bad_entity_text_fails_load() {
        let mut b = box_world(&[]);
        b.set_entities("{ \"classname\" \"worldspawn\n");
        assert!(matches!(load_bsp("t", &b.build(), SCALE, None), Err(MapLoadError::Entities(_))));
    }

    #[test]
    fn test_large_lumps_decode_in_parallel() {
        let mut b = box_world(&[]);
        for i in 0..(PARALLEL_LUMP_THRESHOLD * 2) {
            b.add_plane([1.0, 0.0, 0.0], i as f32);
        }
        let map = load_bsp("t", &b.build(), SCALE, None).unwrap();
        assert_eq!(map.planes.len(), PARALLEL_LUMP_THRESHOLD * 2);
        for (i, p) in map.planes.iter().enumerate() {
            assert_eq!(p.dist, i as f32);
        }
    }

    #[test]
    fn test_map_info_display() {
        let map = load_bsp("t", &floor_face_map([1.0, 0.0, 0.0], 75).build(), SCALE, None).unwrap();
        let text = map.info().to_string();
        assert!(text.contains("Vertices: 4"));
        assert!(text.contains("Face edges: 4"));
    }
}

// testmap.rs — assembles small BSP files in memory
//
// Input coordinates are map-file coordinates (Z up, unscaled). Records are
// kept in public vectors so tests can corrupt them before `build`.

use crate::q_shared::{Contents, SurfaceFlags, Vec3};
use crate::qfiles::{
    DBrush, DBrushSide, DEdge, DFace, DLeaf, DModel, DNode, DPlane, DVertex, TexInfo,
    BSPVERSION, BSP_HEADER_SIZE, HEADER_LUMPS, IDBSPHEADER, LUMP_BRUSHES, LUMP_BRUSHSIDES,
    LUMP_EDGES, LUMP_ENTITIES, LUMP_FACES, LUMP_LEAFBRUSHES, LUMP_LEAFFACES, LUMP_LEAFS,
    LUMP_LIGHTING, LUMP_MODELS, LUMP_NODES, LUMP_PLANES, LUMP_SURFEDGES, LUMP_TEXINFO,
    LUMP_VERTEXES, NO_TEXINFO, TEXTURE_NAME_LEN,
};

/// Half size of every leaf, node and model box the builder writes.
const EXTENT: i16 = 4096;

// ============================================================
// Record encoders
// ============================================================

trait WriteRecord {
    fn write(&self, out: &mut Vec<u8>);
}

fn put_f32s(out: &mut Vec<u8>, v: &[f32]) {
    for f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
}

fn put_i16s(out: &mut Vec<u8>, v: &[i16]) {
    for s in v {
        out.extend_from_slice(&s.to_le_bytes());
    }
}

impl WriteRecord for DVertex {
    fn write(&self, out: &mut Vec<u8>) {
        put_f32s(out, &self.point);
    }
}

impl WriteRecord for DPlane {
    fn write(&self, out: &mut Vec<u8>) {
        put_f32s(out, &self.normal);
        out.extend_from_slice(&self.dist.to_le_bytes());
        out.extend_from_slice(&self.plane_type.to_le_bytes());
    }
}

impl WriteRecord for DEdge {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.v[0].to_le_bytes());
        out.extend_from_slice(&self.v[1].to_le_bytes());
    }
}

impl WriteRecord for TexInfo {
    fn write(&self, out: &mut Vec<u8>) {
        put_f32s(out, &self.vecs[0]);
        put_f32s(out, &self.vecs[1]);
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
        out.extend_from_slice(&self.texture);
        out.extend_from_slice(&self.nexttexinfo.to_le_bytes());
    }
}

impl WriteRecord for DFace {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.planenum.to_le_bytes());
        out.extend_from_slice(&self.side.to_le_bytes());
        out.extend_from_slice(&self.firstedge.to_le_bytes());
        out.extend_from_slice(&self.numedges.to_le_bytes());
        out.extend_from_slice(&self.texinfo.to_le_bytes());
        out.extend_from_slice(&self.styles);
        out.extend_from_slice(&self.lightofs.to_le_bytes());
    }
}

impl WriteRecord for DNode {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.planenum.to_le_bytes());
        out.extend_from_slice(&self.children[0].to_le_bytes());
        out.extend_from_slice(&self.children[1].to_le_bytes());
        put_i16s(out, &self.mins);
        put_i16s(out, &self.maxs);
        out.extend_from_slice(&self.firstface.to_le_bytes());
        out.extend_from_slice(&self.numfaces.to_le_bytes());
    }
}

impl WriteRecord for DLeaf {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.contents.to_le_bytes());
        out.extend_from_slice(&self.cluster.to_le_bytes());
        out.extend_from_slice(&self.area.to_le_bytes());
        put_i16s(out, &self.mins);
        put_i16s(out, &self.maxs);
        out.extend_from_slice(&self.firstleafface.to_le_bytes());
        out.extend_from_slice(&self.numleaffaces.to_le_bytes());
        out.extend_from_slice(&self.firstleafbrush.to_le_bytes());
        out.extend_from_slice(&self.numleafbrushes.to_le_bytes());
    }
}

impl WriteRecord for DBrush {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.firstside.to_le_bytes());
        out.extend_from_slice(&self.numsides.to_le_bytes());
        out.extend_from_slice(&self.contents.to_le_bytes());
    }
}

impl WriteRecord for DBrushSide {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.planenum.to_le_bytes());
        out.extend_from_slice(&self.texinfo.to_le_bytes());
    }
}

impl WriteRecord for DModel {
    fn write(&self, out: &mut Vec<u8>) {
        put_f32s(out, &self.mins);
        put_f32s(out, &self.maxs);
        put_f32s(out, &self.origin);
        out.extend_from_slice(&self.headnode.to_le_bytes());
        out.extend_from_slice(&self.firstface.to_le_bytes());
        out.extend_from_slice(&self.numfaces.to_le_bytes());
    }
}

impl WriteRecord for u16 {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl WriteRecord for i32 {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

fn encode<T: WriteRecord>(records: &[T]) -> Vec<u8> {
    let mut out = Vec::new();
    for r in records {
        r.write(&mut out);
    }
    out
}

// ============================================================
// MapBuilder
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct MapBuilder {
    pub vertices: Vec<DVertex>,
    pub planes: Vec<DPlane>,
    pub edges: Vec<DEdge>,
    pub surfedges: Vec<i32>,
    pub texinfo: Vec<TexInfo>,
    pub faces: Vec<DFace>,
    pub nodes: Vec<DNode>,
    pub leaves: Vec<DLeaf>,
    pub leaf_faces: Vec<u16>,
    pub leaf_brushes: Vec<u16>,
    pub brushes: Vec<DBrush>,
    pub brush_sides: Vec<DBrushSide>,
    pub models: Vec<DModel>,
    pub lighting: Vec<u8>,
    pub entities: String,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plane(&mut self, normal: Vec3, dist: f32) -> u16 {
        let plane_type = match normal.iter().position(|n| n.abs() == 1.0) {
            Some(axis) => axis as u32,
            None => {
                let mut best = 0;
                for i in 1..3 {
                    if normal[i].abs() > normal[best].abs() {
                        best = i;
                    }
                }
                3 + best as u32
            }
        };
        self.planes.push(DPlane { normal, dist, plane_type });
        (self.planes.len() - 1) as u16
    }

    pub fn add_texinfo(&mut self, name: &str, flags: SurfaceFlags, u: [f32; 4], v: [f32; 4]) -> u16 {
        let mut texture = [0u8; TEXTURE_NAME_LEN];
        let len = name.len().min(TEXTURE_NAME_LEN - 1);
        texture[..len].copy_from_slice(&name.as_bytes()[..len]);
        self.texinfo.push(TexInfo {
            vecs: [u, v],
            flags: flags.bits(),
            value: 0,
            texture,
            nexttexinfo: u32::MAX,
        });
        (self.texinfo.len() - 1) as u16
    }

    /// Axis-aligned brush with six untextured sides.
    pub fn add_brush(&mut self, mins: Vec3, maxs: Vec3, contents: Contents) -> u16 {
        self.add_textured_brush(mins, maxs, contents, NO_TEXINFO)
    }

    pub fn add_textured_brush(&mut self, mins: Vec3, maxs: Vec3, contents: Contents, texinfo: u16) -> u16 {
        let first = self.brush_sides.len() as u32;
        for axis in 0..3 {
            let mut normal = [0.0; 3];
            normal[axis] = 1.0;
            let front = self.add_plane(normal, maxs[axis]);
            normal[axis] = -1.0;
            let back = self.add_plane(normal, -mins[axis]);
            self.brush_sides.push(DBrushSide { planenum: front, texinfo });
            self.brush_sides.push(DBrushSide { planenum: back, texinfo });
        }
        self.brushes.push(DBrush {
            firstside: first,
            numsides: 6,
            contents: contents.bits(),
        });
        (self.brushes.len() - 1) as u16
    }

    /// Returns the leaf as a node child code.
    pub fn add_leaf(&mut self, contents: Contents, brushes: &[u16]) -> i32 {
        self.leaves.push(DLeaf {
            contents: contents.bits(),
            cluster: 0,
            area: 0,
            mins: [-EXTENT; 3],
            maxs: [EXTENT; 3],
            firstleafface: 0,
            numleaffaces: 0,
            firstleafbrush: self.leaf_brushes.len() as u16,
            numleafbrushes: brushes.len() as u16,
        });
        self.leaf_brushes.extend_from_slice(brushes);
        -(self.leaves.len() as i32)
    }

    /// `front` and `back` are child codes from `add_leaf` or `add_node`.
    pub fn add_node(&mut self, plane: u16, front: i32, back: i32) -> i32 {
        self.nodes.push(DNode {
            planenum: plane as u32,
            children: [front, back],
            mins: [-EXTENT; 3],
            maxs: [EXTENT; 3],
            firstface: 0,
            numfaces: 0,
        });
        (self.nodes.len() - 1) as i32
    }

    /// Model rooted at child code `head`.
    pub fn add_model(&mut self, head: i32) -> usize {
        let headnode = if head < 0 { !((-1 - head) as u32) } else { head as u32 };
        let e = EXTENT as f32;
        self.models.push(DModel {
            mins: [-e; 3],
            maxs: [e; 3],
            origin: [0.0; 3],
            headnode,
            firstface: 0,
            numfaces: 0,
        });
        self.models.len() - 1
    }

    /// Face winding over `points`, one edge per consecutive pair.
    pub fn add_face(&mut self, points: &[Vec3], plane: u16, side: u16, texinfo: u16, lightofs: u32) -> u16 {
        let base = self.vertices.len() as u16;
        for p in points {
            self.vertices.push(DVertex { point: *p });
        }
        let firstedge = self.surfedges.len() as u32;
        let n = points.len() as u16;
        for i in 0..n {
            self.edges.push(DEdge { v: [base + i, base + (i + 1) % n] });
            self.surfedges.push((self.edges.len() - 1) as i32);
        }
        self.faces.push(DFace {
            planenum: plane,
            side,
            firstedge,
            numedges: n,
            texinfo,
            styles: [0, 255, 255, 255],
            lightofs,
        });
        (self.faces.len() - 1) as u16
    }

    pub fn set_lighting(&mut self, bytes: &[u8]) {
        self.lighting = bytes.to_vec();
    }

    pub fn set_entities(&mut self, text: &str) {
        self.entities = text.to_string();
    }

    /// Serialize to a version 38 BSP image.
    pub fn build(&self) -> Vec<u8> {
        let mut lumps: Vec<Vec<u8>> = vec![Vec::new(); HEADER_LUMPS];

        let mut ents = self.entities.as_bytes().to_vec();
        ents.push(0);
        lumps[LUMP_ENTITIES] = ents;
        lumps[LUMP_PLANES] = encode(&self.planes);
        lumps[LUMP_VERTEXES] = encode(&self.vertices);
        lumps[LUMP_NODES] = encode(&self.nodes);
        lumps[LUMP_TEXINFO] = encode(&self.texinfo);
        lumps[LUMP_FACES] = encode(&self.faces);
        lumps[LUMP_LIGHTING] = self.lighting.clone();
        lumps[LUMP_LEAFS] = encode(&self.leaves);
        lumps[LUMP_LEAFFACES] = encode(&self.leaf_faces);
        lumps[LUMP_LEAFBRUSHES] = encode(&self.leaf_brushes);
        lumps[LUMP_EDGES] = encode(&self.edges);
        lumps[LUMP_SURFEDGES] = encode(&self.surfedges);
        lumps[LUMP_MODELS] = encode(&self.models);
        lumps[LUMP_BRUSHES] = encode(&self.brushes);
        lumps[LUMP_BRUSHSIDES] = encode(&self.brush_sides);

        let mut out = Vec::new();
        out.extend_from_slice(&IDBSPHEADER.to_le_bytes());
        out.extend_from_slice(&BSPVERSION.to_le_bytes());
        out.resize(BSP_HEADER_SIZE, 0);

        for (i, lump) in lumps.iter().enumerate() {
            while out.len() % 4 != 0 {
                out.push(0);
            }
            let ofs = out.len() as u32;
            let dir = 8 + i * 8;
            out[dir..dir + 4].copy_from_slice(&ofs.to_le_bytes());
            out[dir + 4..dir + 8].copy_from_slice(&(lump.len() as u32).to_le_bytes());
            out.extend_from_slice(lump);
        }
        out
    }
}

/// One leaf holding every brush, as model 0. The leaf takes the union of the
/// brush contents so traces visit it.
pub fn box_world(brushes: &[(Vec3, Vec3, Contents)]) -> MapBuilder {
    let mut b = MapBuilder::new();
    let mut contents = Contents::empty();
    let ids: Vec<u16> = brushes
        .iter()
        .map(|(mins, maxs, c)| {
            contents |= *c;
            b.add_brush(*mins, *maxs, *c)
        })
        .collect();
    let leaf = b.add_leaf(contents, &ids);
    b.add_model(leaf);
    b
}

/// A solid floor whose top is at z = 0 spanning `half` units each way, with
/// water from the floor up to `water_top`.
///
/// Node 0 splits on the water surface (front: open air, back: node 1); node 1
/// splits on the floor top (front: water, back: the floor brush).
pub fn pool_world(half: f32, water_top: f32) -> MapBuilder {
    let mut b = MapBuilder::new();
    let floor = b.add_brush([-half, -half, -64.0], [half, half, 0.0], Contents::SOLID);
    let surface = b.add_plane([0.0, 0.0, 1.0], water_top);
    let ground = b.add_plane([0.0, 0.0, 1.0], 0.0);
    let air = b.add_leaf(Contents::empty(), &[]);
    let water = b.add_leaf(Contents::WATER, &[]);
    let solid = b.add_leaf(Contents::SOLID, &[floor]);
    let root = b.add_node(surface, air, 1);
    b.add_node(ground, water, solid);
    b.add_model(root);
    b
}

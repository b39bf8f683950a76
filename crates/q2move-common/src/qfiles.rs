// qfiles.rs — on-disk layouts for BSP maps and PAK archives
//
// Every multi-byte field is little-endian. The `D*` structs document the
// record layouts; the decoders in bspfile.rs read them field by field.

// ============================================================
// .PAK archives
// ============================================================

pub const IDPAKHEADER: u32 = (b'K' as u32) << 24 | (b'C' as u32) << 16 | (b'A' as u32) << 8 | b'P' as u32;

pub const PACK_NAME_LEN: usize = 56;
pub const MAX_FILES_IN_PACK: usize = 4096;

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DPackHeader {
    pub ident: u32,
    pub dirofs: u32,
    pub dirlen: u32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DPackFile {
    pub name: [u8; PACK_NAME_LEN],
    pub filepos: u32,
    pub filelen: u32,
}

pub const PACK_HEADER_SIZE: usize = 12;
pub const PACK_ENTRY_SIZE: usize = 64;

// ============================================================
// .BSP file format
// ============================================================

pub const IDBSPHEADER: u32 = (b'P' as u32) << 24 | (b'S' as u32) << 16 | (b'B' as u32) << 8 | b'I' as u32;
pub const BSPVERSION: u32 = 38;

pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_VERTEXES: usize = 2;
pub const LUMP_VISIBILITY: usize = 3;
pub const LUMP_NODES: usize = 4;
pub const LUMP_TEXINFO: usize = 5;
pub const LUMP_FACES: usize = 6;
pub const LUMP_LIGHTING: usize = 7;
pub const LUMP_LEAFS: usize = 8;
pub const LUMP_LEAFFACES: usize = 9;
pub const LUMP_LEAFBRUSHES: usize = 10;
pub const LUMP_EDGES: usize = 11;
pub const LUMP_SURFEDGES: usize = 12;
pub const LUMP_MODELS: usize = 13;
pub const LUMP_BRUSHES: usize = 14;
pub const LUMP_BRUSHSIDES: usize = 15;
pub const LUMP_POP: usize = 16;
pub const LUMP_AREAS: usize = 17;
pub const LUMP_AREAPORTALS: usize = 18;
pub const HEADER_LUMPS: usize = 19;

const LUMP_NAMES: [&str; HEADER_LUMPS] = [
    "entities",
    "planes",
    "vertexes",
    "visibility",
    "nodes",
    "texinfo",
    "faces",
    "lighting",
    "leafs",
    "leaffaces",
    "leafbrushes",
    "edges",
    "surfedges",
    "models",
    "brushes",
    "brushsides",
    "pop",
    "areas",
    "areaportals",
];

/// Human-readable lump name for diagnostics.
pub fn lump_name(lump: usize) -> &'static str {
    LUMP_NAMES.get(lump).copied().unwrap_or("unknown")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Lump {
    pub fileofs: u32,
    pub filelen: u32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DHeader {
    pub ident: u32,
    pub version: u32,
    pub lumps: [Lump; HEADER_LUMPS],
}

pub const BSP_HEADER_SIZE: usize = 8 + HEADER_LUMPS * 8;

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DModel {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub origin: [f32; 3],
    pub headnode: u32,
    pub firstface: u32,
    pub numfaces: u32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DVertex {
    pub point: [f32; 3],
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DPlane {
    pub normal: [f32; 3],
    pub dist: f32,
    pub plane_type: u32,
}

// planes (x&~1) and (x&~1)+1 are always opposites
pub const PLANE_X: u32 = 0;
pub const PLANE_Y: u32 = 1;
pub const PLANE_Z: u32 = 2;
pub const PLANE_ANYX: u32 = 3;
pub const PLANE_ANYY: u32 = 4;
pub const PLANE_ANYZ: u32 = 5;

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DNode {
    pub planenum: u32,
    /// negative numbers are -(leafs+1), not nodes
    pub children: [i32; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstface: u16,
    pub numfaces: u16,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct TexInfo {
    /// [s/t][xyz offset]
    pub vecs: [[f32; 4]; 2],
    pub flags: u32,
    pub value: u32,
    pub texture: [u8; 32],
    pub nexttexinfo: u32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DEdge {
    pub v: [u16; 2],
}

pub const MAXLIGHTMAPS: usize = 4;

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DFace {
    pub planenum: u16,
    pub side: u16,
    pub firstedge: u32,
    pub numedges: u16,
    pub texinfo: u16,
    pub styles: [u8; MAXLIGHTMAPS],
    pub lightofs: u32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DLeaf {
    pub contents: u32,
    /// -1 for leaves outside the visible world
    pub cluster: i16,
    pub area: i16,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub firstleafface: u16,
    pub numleaffaces: u16,
    pub firstleafbrush: u16,
    pub numleafbrushes: u16,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DBrushSide {
    pub planenum: u16,
    pub texinfo: u16,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DBrush {
    pub firstside: u32,
    pub numsides: u32,
    pub contents: u32,
}

// record strides
pub const DVERTEX_SIZE: usize = 12;
pub const DPLANE_SIZE: usize = 20;
pub const DEDGE_SIZE: usize = 4;
pub const TEXINFO_SIZE: usize = 76;
pub const DFACE_SIZE: usize = 20;
pub const DNODE_SIZE: usize = 28;
pub const DLEAF_SIZE: usize = 28;
pub const DBRUSH_SIZE: usize = 12;
pub const DBRUSHSIDE_SIZE: usize = 4;
pub const DMODEL_SIZE: usize = 48;
pub const LEAFFACE_SIZE: usize = 2;
pub const LEAFBRUSH_SIZE: usize = 2;
pub const SURFEDGE_SIZE: usize = 4;

pub const MIN_FACE_EDGES: u16 = 3;
pub const MAX_FACE_EDGES: u16 = 4096;

/// Face light offset meaning "no lightmap".
pub const NO_LIGHTOFS: u32 = 0xFFFF_FFFF;
/// Brush side texinfo meaning "no surface".
pub const NO_TEXINFO: u16 = 0xFFFF;

pub const TEXTURE_NAME_LEN: usize = 32;

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    // =========================================================================
    // On-disk record sizes
    // =========================================================================

    #[test]
    fn size_of_dpack_header() {
        assert_eq!(size_of::<DPackHeader>(), PACK_HEADER_SIZE);
    }

    #[test]
    fn size_of_dpack_file() {
        // [u8; 56] + u32 + u32 = 64 bytes
        assert_eq!(size_of::<DPackFile>(), PACK_ENTRY_SIZE);
    }

    #[test]
    fn size_of_dheader() {
        assert_eq!(size_of::<DHeader>(), BSP_HEADER_SIZE);
        assert_eq!(size_of::<Lump>(), 8);
    }

    #[test]
    fn size_of_bsp_records() {
        assert_eq!(size_of::<DVertex>(), DVERTEX_SIZE);
        assert_eq!(size_of::<DPlane>(), DPLANE_SIZE);
        assert_eq!(size_of::<DEdge>(), DEDGE_SIZE);
        assert_eq!(size_of::<TexInfo>(), TEXINFO_SIZE);
        assert_eq!(size_of::<DFace>(), DFACE_SIZE);
        assert_eq!(size_of::<DNode>(), DNODE_SIZE);
        assert_eq!(size_of::<DLeaf>(), DLEAF_SIZE);
        assert_eq!(size_of::<DBrush>(), DBRUSH_SIZE);
        assert_eq!(size_of::<DBrushSide>(), DBRUSHSIDE_SIZE);
        assert_eq!(size_of::<DModel>(), DMODEL_SIZE);
        assert_eq!(size_of::<i32>(), SURFEDGE_SIZE);
    }

    // =========================================================================
    // Magic numbers
    // =========================================================================

    #[test]
    fn pak_magic_bytes() {
        assert_eq!(&IDPAKHEADER.to_le_bytes(), b"PACK");
    }

    #[test]
    fn bsp_magic_bytes() {
        assert_eq!(&IDBSPHEADER.to_le_bytes(), b"IBSP");
        assert_eq!(IDBSPHEADER, 0x50534249);
        assert_eq!(BSPVERSION, 38);
    }

    #[test]
    fn lump_names() {
        assert_eq!(HEADER_LUMPS, 19);
        assert_eq!(lump_name(LUMP_ENTITIES), "entities");
        assert_eq!(lump_name(LUMP_SURFEDGES), "surfedges");
        assert_eq!(lump_name(LUMP_AREAPORTALS), "areaportals");
        assert_eq!(lump_name(42), "unknown");
    }
}

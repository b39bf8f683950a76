// files.rs — where map bytes come from
//
// Maps live at maps/<name>.bsp and entity overrides at ent/<name>.ent, looked
// up through an ordered list of loose directories and PAK archives.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rayon::prelude::*;
use thiserror::Error;

use q2move_common::common::{com_dprintf, com_printf};
use q2move_common::qfiles::{IDPAKHEADER, MAX_FILES_IN_PACK, PACK_ENTRY_SIZE, PACK_HEADER_SIZE, PACK_NAME_LEN};

/// Directory entries at or above this count are decoded on the rayon pool.
const PARALLEL_THRESHOLD: usize = 64;

// ============================================================
// Sources
// ============================================================

/// Anything that can hand out file bytes by relative path.
pub trait MapSource: Send + Sync {
    fn load(&self, path: &str) -> Option<Vec<u8>>;

    /// Name for diagnostics.
    fn describe(&self) -> String;
}

pub fn map_path(name: &str) -> String {
    format!("maps/{}.bsp", name)
}

pub fn entity_override_path(name: &str) -> String {
    format!("ent/{}.ent", name)
}

/// Loose files under a base directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    base: PathBuf,
}

impl DirSource {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }
}

impl MapSource for DirSource {
    fn load(&self, path: &str) -> Option<Vec<u8>> {
        let netpath = self.base.join(path);
        match std::fs::read(&netpath) {
            Ok(data) => {
                com_dprintf(&format!("FindFile: {}\n", netpath.display()));
                Some(data)
            }
            Err(_) => None,
        }
    }

    fn describe(&self) -> String {
        self.base.display().to_string()
    }
}

// ============================================================
// PAK archives
// ============================================================

#[derive(Debug, Error)]
pub enum PakError {
    #[error("{name} is not a packfile")]
    BadIdent { name: String },

    #[error("{name} has {count} files")]
    TooManyFiles { name: String, count: usize },

    #[error("{name}: {path} runs past the end of the archive")]
    EntryOutOfBounds { name: String, path: String },

    #[error("{name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// A file entry within a pack file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackFile {
    pub name: String,
    pub filepos: u32,
    pub filelen: u32,
}

/// A Quake `PACK` archive. The directory is read once; file data is read on
/// demand from the underlying reader.
pub struct PakSource<R> {
    name: String,
    files: Vec<PackFile>,
    /// lowercase filename -> index in files
    file_index: HashMap<String, usize>,
    reader: Mutex<R>,
}

impl PakSource<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PakError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let f = File::open(path).map_err(|source| PakError::Io { name: name.clone(), source })?;
        Self::new(name, f)
    }
}

impl<R: Read + Seek> PakSource<R> {
    pub fn new(name: impl Into<String>, mut reader: R) -> Result<Self, PakError> {
        let name = name.into();
        let io_err = |source| PakError::Io { name: name.clone(), source };

        // Read the header
        let mut header = [0u8; PACK_HEADER_SIZE];
        reader.read_exact(&mut header).map_err(io_err)?;

        let word = |i: usize| u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]]);
        if word(0) != IDPAKHEADER {
            return Err(PakError::BadIdent { name });
        }
        let dirofs = word(4);
        let dirlen = word(8) as usize;

        let count = dirlen / PACK_ENTRY_SIZE;
        if count > MAX_FILES_IN_PACK {
            return Err(PakError::TooManyFiles { name, count });
        }

        let size = reader.seek(SeekFrom::End(0)).map_err(io_err)?;

        reader.seek(SeekFrom::Start(dirofs as u64)).map_err(io_err)?;
        let mut dir = vec![0u8; count * PACK_ENTRY_SIZE];
        reader.read_exact(&mut dir).map_err(io_err)?;

        let decode = |entry: &[u8]| {
            let name_bytes = &entry[..PACK_NAME_LEN];
            let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(PACK_NAME_LEN);
            let field = |i: usize| u32::from_le_bytes([entry[i], entry[i + 1], entry[i + 2], entry[i + 3]]);
            PackFile {
                name: String::from_utf8_lossy(&name_bytes[..name_end]).to_string(),
                filepos: field(PACK_NAME_LEN),
                filelen: field(PACK_NAME_LEN + 4),
            }
        };

        let files: Vec<PackFile> = if count >= PARALLEL_THRESHOLD {
            dir.par_chunks_exact(PACK_ENTRY_SIZE).map(decode).collect()
        } else {
            dir.chunks_exact(PACK_ENTRY_SIZE).map(decode).collect()
        };

        for f in &files {
            if f.filepos as u64 + f.filelen as u64 > size {
                return Err(PakError::EntryOutOfBounds { name, path: f.name.clone() });
            }
        }

        let file_index = files
            .iter()
            .enumerate()
            .map(|(i, pf)| (pf.name.to_lowercase(), i))
            .collect();

        com_printf(&format!("Added {} ({} files)\n", name, count));
        Ok(Self {
            name,
            files,
            file_index,
            reader: Mutex::new(reader),
        })
    }

    pub fn files(&self) -> &[PackFile] {
        &self.files
    }

    /// Finds a file by name (case-insensitive).
    pub fn find_file(&self, filename: &str) -> Option<&PackFile> {
        self.file_index
            .get(&filename.to_lowercase())
            .map(|&idx| &self.files[idx])
    }

    fn read_file(&self, pf: &PackFile) -> io::Result<Vec<u8>> {
        let mut reader = self.reader.lock();
        reader.seek(SeekFrom::Start(pf.filepos as u64))?;
        let mut buf = vec![0u8; pf.filelen as usize];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + Seek + Send> MapSource for PakSource<R> {
    fn load(&self, path: &str) -> Option<Vec<u8>> {
        let pf = self.find_file(path)?;
        match self.read_file(pf) {
            Ok(data) => {
                com_dprintf(&format!("PackFile: {} : {}\n", self.name, path));
                Some(data)
            }
            Err(e) => {
                com_printf(&format!("{}: read error on {}: {}\n", self.name, path, e));
                None
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} ({} files)", self.name, self.files.len())
    }
}

// ============================================================
// Search path
// ============================================================

/// Sources tried in order; the first hit wins.
#[derive(Default)]
pub struct SearchPath {
    sources: Vec<Box<dyn MapSource>>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: impl MapSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Print the current search path.
    pub fn path_f(&self) {
        com_printf("Current search path:\n");
        for s in &self.sources {
            com_printf(&format!("{}\n", s.describe()));
        }
    }
}

impl MapSource for SearchPath {
    fn load(&self, path: &str) -> Option<Vec<u8>> {
        let found = self.sources.iter().find_map(|s| s.load(path));
        if found.is_none() {
            com_dprintf(&format!("FindFile: can't find {}\n", path));
        }
        found
    }

    fn describe(&self) -> String {
        format!("search path ({} sources)", self.sources.len())
    }
}

// ============================================================
// Tests
// ============================================================

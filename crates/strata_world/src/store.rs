//! # Chunk Store
//!
//! Two-layer on-disk persistence, one directory per world seed:
//!
//! - `base_<cx>_<cz>.bin`: the generator's output for a chunk. Written once,
//!   never rewritten.
//! - `mods_<cx>_<cz>.bin`: the player's modifications to that chunk, keyed by
//!   position, last write wins. Removals are stored as tombstones.
//!
//! The resolved chunk is base with the modifications applied on top.
//!
//! ## Record Format
//!
//! ```text
//! magic[4] version:u32 seed:u64 cx:i32 cz:i32 written_at:u64 count:u32 len:u32
//! payload[len]   lz4 (size-prepended) of `count` 20-byte voxel records
//! crc:u32        CRC32 of everything before it
//! ```
//!
//! All integers little-endian. Files are written to a `.tmp` sibling and
//! renamed into place, so a crash never leaves a torn record.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use parking_lot::Mutex;
use strata_procedural::{ChunkKey, Material, Rgb, Voxel, VoxelPos, VoxelSet, WorldSeed};

use crate::error::{WorldError, WorldResult};

/// Magic bytes for base records.
const BASE_MAGIC: &[u8; 4] = b"STRB";
/// Magic bytes for modification records.
const MODS_MAGIC: &[u8; 4] = b"STRM";
/// Record format version.
const RECORD_VERSION: u32 = 1;
/// Header size before the payload.
const HEADER_LEN: usize = 40;

/// A player edit to one voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edit {
    /// Put a voxel here, replacing whatever was there.
    Place {
        /// Material to place.
        material: Material,
        /// Colour, `None` for the material default.
        color: Option<Rgb>,
    },
    /// Remove the voxel here.
    Remove,
}

/// An edit at a world position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Modification {
    /// Voxel position.
    pub pos: VoxelPos,
    /// What happened there.
    pub edit: Edit,
}

impl Modification {
    /// Creates a modification.
    #[must_use]
    pub const fn new(pos: VoxelPos, edit: Edit) -> Self {
        Self { pos, edit }
    }

    /// Owning chunk.
    #[must_use]
    pub const fn chunk(&self, chunk_size: u32) -> ChunkKey {
        ChunkKey::from_world(self.pos.x, self.pos.z, chunk_size)
    }

    /// The stored record: a player-placed voxel or a tombstone.
    #[must_use]
    pub const fn to_voxel(&self) -> Voxel {
        match self.edit {
            Edit::Place { material, color } => {
                let color = match color {
                    Some(color) => color,
                    None => material.default_color(),
                };
                Voxel::new(self.pos, material, color, true)
            }
            Edit::Remove => Voxel::tombstone(self.pos),
        }
    }

    /// Applies the edit to a voxel set. Unbreakable voxels survive removal.
    pub fn apply(&self, voxels: &mut VoxelSet) {
        match self.edit {
            Edit::Place { .. } => {
                voxels.insert(self.to_voxel());
            }
            Edit::Remove => {
                remove_breakable(voxels, self.pos);
            }
        }
    }
}

/// Removes the voxel at `pos` unless its material is unbreakable.
fn remove_breakable(voxels: &mut VoxelSet, pos: VoxelPos) {
    let unbreakable = voxels
        .get(pos)
        .and_then(Voxel::material)
        .is_some_and(Material::is_unbreakable);
    if unbreakable {
        tracing::debug!(?pos, "removal of unbreakable voxel ignored");
        return;
    }
    voxels.remove(pos);
}

/// All modifications for one chunk, one per position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModificationOverlay {
    records: HashMap<VoxelPos, Voxel>,
}

impl ModificationOverlay {
    /// Empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an edit; a later edit at the same position replaces it.
    pub fn record(&mut self, modification: Modification) {
        self.records
            .insert(modification.pos, modification.to_voxel());
    }

    /// The stored record at a position (tombstones included).
    #[must_use]
    pub fn get(&self, pos: VoxelPos) -> Option<&Voxel> {
        self.records.get(&pos)
    }

    /// Number of positions touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing was modified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Applies every record: tombstones remove (except unbreakable voxels),
    /// everything else replaces.
    pub fn merge_onto(&self, voxels: &mut VoxelSet) {
        for record in self.records.values() {
            if record.is_tombstone() {
                remove_breakable(voxels, record.pos());
            } else {
                voxels.insert(*record);
            }
        }
    }

    /// Records sorted by position, for stable files.
    fn sorted(&self) -> Vec<Voxel> {
        let mut records: Vec<Voxel> = self.records.values().copied().collect();
        records.sort_unstable_by_key(|v| (v.y, v.z, v.x));
        records
    }

    fn from_records(records: Vec<Voxel>) -> Self {
        Self {
            records: records.into_iter().map(|v| (v.pos(), v)).collect(),
        }
    }
}

/// A decoded base record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Chunk the record belongs to.
    pub key: ChunkKey,
    /// Generated voxels.
    pub voxels: VoxelSet,
    /// Unix time of the write, in milliseconds.
    pub generated_at: u64,
}

/// Per-seed chunk storage on the local filesystem.
pub struct ChunkStore {
    root: PathBuf,
    seed: WorldSeed,
    /// Serializes overlay read-modify-write cycles.
    overlay_lock: Mutex<()>,
}

impl ChunkStore {
    /// Opens (creating if needed) the store for a seed under `store_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PersistenceIoFailure`] if the directory cannot be
    /// created.
    pub fn open(store_dir: impl AsRef<Path>, seed: WorldSeed) -> WorldResult<Self> {
        let root = store_dir.as_ref().join(format!("seed_{}", seed.value()));
        fs::create_dir_all(&root).map_err(|e| WorldError::io(&root, e))?;
        tracing::debug!(root = %root.display(), "chunk store opened");
        Ok(Self {
            root,
            seed,
            overlay_lock: Mutex::new(()),
        })
    }

    /// Directory holding this seed's records.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Seed the store belongs to.
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Path of a chunk's base record.
    #[must_use]
    pub fn base_path(&self, key: ChunkKey) -> PathBuf {
        self.root.join(format!("base_{}_{}.bin", key.x, key.z))
    }

    /// Path of a chunk's modification record.
    #[must_use]
    pub fn mods_path(&self, key: ChunkKey) -> PathBuf {
        self.root.join(format!("mods_{}_{}.bin", key.x, key.z))
    }

    /// Returns true if a base record exists.
    #[must_use]
    pub fn has_base(&self, key: ChunkKey) -> bool {
        self.base_path(key).exists()
    }

    /// Writes a chunk's base record unless one already exists. Returns
    /// whether a record was written.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PersistenceIoFailure`] if the write fails.
    pub fn save_base(&self, key: ChunkKey, voxels: &VoxelSet) -> WorldResult<bool> {
        let path = self.base_path(key);
        if path.exists() {
            return Ok(false);
        }
        let bytes = encode_record(BASE_MAGIC, self.seed, key, now_millis(), &voxels.sorted());
        write_atomic(&path, &bytes)?;
        tracing::trace!(%key, voxels = voxels.len(), bytes = bytes.len(), "base record written");
        Ok(true)
    }

    /// Reads a chunk's base record. `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PersistenceIoFailure`] if the file cannot be read
    /// or fails verification.
    pub fn load_base(&self, key: ChunkKey) -> WorldResult<Option<ChunkRecord>> {
        let path = self.base_path(key);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        let (generated_at, voxels) = decode_record(&path, &bytes, BASE_MAGIC, self.seed, key)?;
        Ok(Some(ChunkRecord {
            key,
            voxels: voxels.into_iter().collect(),
            generated_at,
        }))
    }

    /// Reads a chunk's modifications; empty if there are none.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PersistenceIoFailure`] if the file cannot be read
    /// or fails verification.
    pub fn load_overlay(&self, key: ChunkKey) -> WorldResult<ModificationOverlay> {
        let path = self.mods_path(key);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(ModificationOverlay::new());
        };
        let (_, records) = decode_record(&path, &bytes, MODS_MAGIC, self.seed, key)?;
        Ok(ModificationOverlay::from_records(records))
    }

    /// Records one modification in its chunk's overlay file.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PersistenceIoFailure`] if the existing overlay
    /// cannot be read or the new one cannot be written.
    pub fn write_modification(&self, key: ChunkKey, modification: Modification) -> WorldResult<()> {
        let _guard = self.overlay_lock.lock();
        let mut overlay = self.load_overlay(key)?;
        overlay.record(modification);
        let bytes = encode_record(MODS_MAGIC, self.seed, key, now_millis(), &overlay.sorted());
        write_atomic(&self.mods_path(key), &bytes)
    }

    /// Base plus overlay. `Ok(None)` if no base record exists.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PersistenceIoFailure`] if either record is
    /// unreadable.
    pub fn load_resolved(&self, key: ChunkKey) -> WorldResult<Option<VoxelSet>> {
        let Some(record) = self.load_base(key)? else {
            return Ok(None);
        };
        let mut voxels = record.voxels;
        self.load_overlay(key)?.merge_onto(&mut voxels);
        Ok(Some(voxels))
    }

    /// Deletes every record for this seed.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PersistenceIoFailure`] if the directory cannot be
    /// removed or recreated.
    pub fn reset_world(&self) -> WorldResult<()> {
        let _guard = self.overlay_lock.lock();
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorldError::io(&self.root, e)),
        }
        fs::create_dir_all(&self.root).map_err(|e| WorldError::io(&self.root, e))?;
        tracing::info!(root = %self.root.display(), "world storage reset");
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

fn read_optional(path: &Path) -> WorldResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WorldError::io(path, e)),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> WorldResult<()> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp).map_err(|e| WorldError::io(&tmp, e))?;
    file.write_all(bytes).map_err(|e| WorldError::io(&tmp, e))?;
    file.sync_all().map_err(|e| WorldError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| WorldError::io(path, e))
}

fn encode_record(
    magic: &[u8; 4],
    seed: WorldSeed,
    key: ChunkKey,
    written_at: u64,
    voxels: &[Voxel],
) -> Vec<u8> {
    let payload = compress_prepend_size(bytemuck::cast_slice(voxels));

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + 4);
    buf.extend_from_slice(magic);
    buf.extend_from_slice(&RECORD_VERSION.to_le_bytes());
    buf.extend_from_slice(&seed.value().to_le_bytes());
    buf.extend_from_slice(&key.x.to_le_bytes());
    buf.extend_from_slice(&key.z.to_le_bytes());
    buf.extend_from_slice(&written_at.to_le_bytes());
    buf.extend_from_slice(&(voxels.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

/// Little-endian field reader over a verified header.
struct Fields<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Fields<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.offset..self.offset + N]);
        self.offset += N;
        out
    }
}

fn decode_record(
    path: &Path,
    bytes: &[u8],
    magic: &[u8; 4],
    seed: WorldSeed,
    key: ChunkKey,
) -> WorldResult<(u64, Vec<Voxel>)> {
    let fail = |reason: &str| WorldError::io(path, reason);

    if bytes.len() < HEADER_LEN + 4 {
        return Err(fail("record truncated"));
    }
    let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
    let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    if crc32fast::hash(body) != stored_crc {
        return Err(fail("CRC mismatch"));
    }

    let mut fields = Fields {
        bytes: body,
        offset: 0,
    };
    if &fields.take::<4>() != magic {
        return Err(fail("bad magic"));
    }
    let version = u32::from_le_bytes(fields.take());
    if version != RECORD_VERSION {
        return Err(fail(&format!("unsupported record version {version}")));
    }
    if u64::from_le_bytes(fields.take()) != seed.value() {
        return Err(fail("record belongs to another seed"));
    }
    let stored_key = ChunkKey::new(
        i32::from_le_bytes(fields.take()),
        i32::from_le_bytes(fields.take()),
    );
    if stored_key != key {
        return Err(fail(&format!("record is for chunk {stored_key}")));
    }
    let written_at = u64::from_le_bytes(fields.take());
    let count = u32::from_le_bytes(fields.take()) as usize;
    let payload_len = u32::from_le_bytes(fields.take()) as usize;
    if body.len() != HEADER_LEN + payload_len {
        return Err(fail("payload length mismatch"));
    }

    let raw = decompress_size_prepended(&body[HEADER_LEN..])
        .map_err(|e| fail(&format!("decompression failed: {e}")))?;
    if raw.len() != count * Voxel::SIZE {
        return Err(fail("voxel count mismatch"));
    }
    Ok((written_at, bytemuck::pod_collect_to_vec(&raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str, seed: u64) -> ChunkStore {
        let id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("strata_store_{name}_{id}"));
        ChunkStore::open(dir, WorldSeed::new(seed)).unwrap()
    }

    fn cleanup(store: &ChunkStore) {
        if let Some(dir) = store.root().parent() {
            fs::remove_dir_all(dir).ok();
        }
    }

    fn sample() -> VoxelSet {
        [
            Voxel::generated(VoxelPos::new(0, 0, 0), Material::Bedrock),
            Voxel::generated(VoxelPos::new(0, 1, 0), Material::Stone),
            Voxel::generated(VoxelPos::new(0, 2, 0), Material::Grass),
            Voxel::generated(VoxelPos::new(3, 2, 5), Material::Sand),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_base_is_write_once() {
        let store = temp_store("write_once", 1);
        let key = ChunkKey::new(-2, 7);

        assert!(store.load_base(key).unwrap().is_none());
        assert!(store.save_base(key, &sample()).unwrap());
        assert!(!store.save_base(key, &VoxelSet::new()).unwrap());

        let record = store.load_base(key).unwrap().unwrap();
        assert_eq!(record.key, key);
        assert_eq!(record.voxels, sample());
        assert!(record.generated_at > 0);
        assert!(store.base_path(key).ends_with("base_-2_7.bin"));
        cleanup(&store);
    }

    #[test]
    fn test_overlay_takes_precedence() {
        let store = temp_store("overlay", 2);
        let key = ChunkKey::new(0, 0);
        store.save_base(key, &sample()).unwrap();

        let grass = VoxelPos::new(0, 2, 0);
        store
            .write_modification(key, Modification::new(grass, Edit::Remove))
            .unwrap();
        let resolved = store.load_resolved(key).unwrap().unwrap();
        assert!(!resolved.contains(grass));
        assert_eq!(resolved.len(), 3);

        store
            .write_modification(
                key,
                Modification::new(
                    grass,
                    Edit::Place {
                        material: Material::Wood,
                        color: None,
                    },
                ),
            )
            .unwrap();
        let resolved = store.load_resolved(key).unwrap().unwrap();
        let placed = resolved.get(grass).unwrap();
        assert_eq!(placed.material(), Some(Material::Wood));
        assert!(placed.is_player_placed());
        assert_eq!(store.load_overlay(key).unwrap().len(), 1);
        cleanup(&store);
    }

    #[test]
    fn test_corrupted_record_is_an_error() {
        let store = temp_store("corrupt", 3);
        let key = ChunkKey::new(1, 1);
        store.save_base(key, &sample()).unwrap();

        let path = store.base_path(key);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 5;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            store.load_base(key),
            Err(WorldError::PersistenceIoFailure { .. })
        ));
        cleanup(&store);
    }

    #[test]
    fn test_record_bound_to_chunk_and_seed() {
        let store = temp_store("bound", 4);
        let key = ChunkKey::new(5, 5);
        store.save_base(key, &sample()).unwrap();

        let other = ChunkKey::new(6, 5);
        fs::copy(store.base_path(key), store.base_path(other)).unwrap();
        assert!(store.load_base(other).is_err());
        cleanup(&store);
    }

    #[test]
    fn test_seeds_are_isolated() {
        let a = temp_store("isolated", 10);
        let b = ChunkStore::open(a.root().parent().unwrap(), WorldSeed::new(11)).unwrap();
        let key = ChunkKey::new(0, 0);
        a.save_base(key, &sample()).unwrap();
        assert!(!b.has_base(key));
        cleanup(&a);
    }

    #[test]
    fn test_reset_world_removes_records() {
        let store = temp_store("reset", 5);
        let key = ChunkKey::new(0, 0);
        store.save_base(key, &sample()).unwrap();
        store
            .write_modification(key, Modification::new(VoxelPos::new(0, 9, 0), Edit::Remove))
            .unwrap();

        store.reset_world().unwrap();
        assert!(!store.has_base(key));
        assert!(store.load_overlay(key).unwrap().is_empty());
        assert!(store.root().exists());
        cleanup(&store);
    }

    #[test]
    fn test_tombstone_keeps_unbreakable_voxel() {
        let store = temp_store("bedrock", 6);
        let key = ChunkKey::new(0, 0);
        store.save_base(key, &sample()).unwrap();

        let floor = VoxelPos::new(0, 0, 0);
        store
            .write_modification(key, Modification::new(floor, Edit::Remove))
            .unwrap();
        let resolved = store.load_resolved(key).unwrap().unwrap();
        assert_eq!(resolved.get(floor).and_then(Voxel::material), Some(Material::Bedrock));

        let mut voxels = sample();
        Modification::new(floor, Edit::Remove).apply(&mut voxels);
        assert!(voxels.contains(floor));
        cleanup(&store);
    }

    #[test]
    fn test_overlay_merge_last_write_wins() {
        let pos = VoxelPos::new(1, 1, 1);
        let mut overlay = ModificationOverlay::new();
        overlay.record(Modification::new(
            pos,
            Edit::Place {
                material: Material::Ice,
                color: Some(Rgb(5)),
            },
        ));
        overlay.record(Modification::new(pos, Edit::Remove));
        assert!(overlay.get(pos).unwrap().is_tombstone());

        let mut voxels = VoxelSet::from_iter([Voxel::generated(pos, Material::Dirt)]);
        overlay.merge_onto(&mut voxels);
        assert!(voxels.is_empty());
    }
}

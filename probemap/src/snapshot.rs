//! Snapshot files for a [`HashedDictionary`].
//!
//! A snapshot records the whole slot array together with the entry and used
//! counts. Loading never trusts the recorded layout: it rebuilds a table of
//! the same size and replays an insertion for every live record, so the
//! tombstones in the file only serve as a consistency check.
//!
//! Layout:
//! [header: 48 bytes][record_0][record_1]...[record_{slot_count - 1}]
//!
//! Every record starts with an 8 byte bit-packed header holding a 2 bit slot
//! status and the key and value lengths; occupied records are
//! followed by the encoded key and then the encoded value.

use std::borrow::Borrow;
use std::fs::{File, OpenOptions};
use std::hash::{BuildHasher, Hash};
use std::mem::size_of;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use log::trace;
use memmap2::{Mmap, MmapMut};
use modular_bitfield::prelude::B31;
use modular_bitfield::{Specifier, bitfield};

use crate::config::TableConfig;
use crate::error::{DictError, Result};
use crate::prime::is_prime;
use crate::slot::Slot;
use crate::types::{BytesDecode, BytesEncode};
use crate::HashedDictionary;

const MAGIC: [u8; 8] = *b"PROBEMAP";
const VERSION: u64 = 1;

/// Largest key or value, in encoded bytes, that fits in a record.
pub const MAX_PAYLOAD_LEN: usize = (1 << 31) - 1;

#[derive(Specifier, Debug, Clone, Copy, PartialEq, Eq)]
enum SlotStatus {
    Empty,
    Occupied,
    Removed,
    Unused,
}

#[bitfield(bits = 64)]
#[derive(Clone, Copy, Zeroable, Pod)]
#[repr(C)]
struct RecordHeader {
    #[bits = 2]
    status: SlotStatus,
    key_len: B31,
    value_len: B31,
}

#[derive(Debug, Clone, Copy, Zeroable, Pod)]
#[repr(C)]
struct SnapshotHeader {
    magic: [u8; 8],
    version: u64,
    slot_count: u64,
    entry_count: u64,
    used_count: u64,
    max_load_factor: f64,
}

fn corrupt(msg: impl Into<String>) -> DictError {
    DictError::CorruptSnapshot(msg.into())
}

fn payload_len(bytes: &[u8]) -> Result<u32> {
    if bytes.len() > MAX_PAYLOAD_LEN {
        return Err(DictError::Encoding(format!(
            "payload of {} bytes exceeds the record limit of {MAX_PAYLOAD_LEN}",
            bytes.len()
        )));
    }
    Ok(bytes.len() as u32)
}

fn put(buf: &mut [u8], pos: &mut usize, bytes: &[u8]) {
    buf[*pos..*pos + bytes.len()].copy_from_slice(bytes);
    *pos += bytes.len();
}

/// Bounds-checked cursor over a mapped snapshot.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| corrupt(format!("truncated at byte {}", self.pos)))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_pod<T: Pod>(&mut self) -> Result<T> {
        self.take(size_of::<T>()).map(bytemuck::pod_read_unaligned)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

impl<K, V, S> HashedDictionary<K, V, S> {
    /// Writes every slot, the entry count and the used count to `path`,
    /// replacing any existing file.
    pub fn write_snapshot<KC, VC>(&self, path: impl AsRef<Path>) -> Result<()>
    where
        KC: BytesEncode,
        VC: BytesEncode,
        K: Borrow<KC::EItem>,
        V: Borrow<VC::EItem>,
    {
        let mut records = Vec::with_capacity(self.capacity());
        let mut total_len = size_of::<SnapshotHeader>();

        for slot in self.slots() {
            let record = match slot {
                Slot::Empty => (RecordHeader::new().with_status(SlotStatus::Empty), None),
                Slot::Removed(_) => (RecordHeader::new().with_status(SlotStatus::Removed), None),
                Slot::Occupied(k, v) => {
                    let key = KC::bytes_encode(k.borrow())?;
                    let value = VC::bytes_encode(v.borrow())?;
                    let header = RecordHeader::new()
                        .with_status(SlotStatus::Occupied)
                        .with_key_len(payload_len(&key)?)
                        .with_value_len(payload_len(&value)?);
                    total_len += key.len() + value.len();
                    (header, Some((key, value)))
                }
            };
            total_len += size_of::<RecordHeader>();
            records.push(record);
        }

        let header = SnapshotHeader {
            magic: MAGIC,
            version: VERSION,
            slot_count: self.capacity() as u64,
            entry_count: self.len() as u64,
            used_count: self.used_count() as u64,
            max_load_factor: self.max_load_factor(),
        };

        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total_len as u64)?;

        // SAFETY: the file was just truncated and sized by us; nothing else maps it.
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        let mut pos = 0;
        put(&mut mmap, &mut pos, bytemuck::bytes_of(&header));
        for (record, payload) in &records {
            put(&mut mmap, &mut pos, bytemuck::bytes_of(record));
            if let Some((key, value)) = payload {
                put(&mut mmap, &mut pos, key);
                put(&mut mmap, &mut pos, value);
            }
        }
        debug_assert_eq!(pos, total_len);
        mmap.flush()?;

        trace!(
            "wrote snapshot of {} slots ({} entries) to {path:?}, {total_len} bytes",
            self.capacity(),
            self.len()
        );
        Ok(())
    }
}

impl<K, V, S> HashedDictionary<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Loads a snapshot written by [`write_snapshot`](Self::write_snapshot)
    /// using the default hasher.
    pub fn load_snapshot<KC, VC>(path: impl AsRef<Path>) -> Result<Self>
    where
        KC: BytesDecode<DItem = K>,
        VC: BytesDecode<DItem = V>,
        S: Default,
    {
        Self::load_snapshot_with_hasher::<KC, VC>(path, S::default())
    }

    /// Rebuilds a table of the recorded size and replays every live entry
    /// in slot order. Tombstones are dropped.
    pub fn load_snapshot_with_hasher<KC, VC>(path: impl AsRef<Path>, hasher: S) -> Result<Self>
    where
        KC: BytesDecode<DItem = K>,
        VC: BytesDecode<DItem = V>,
    {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: mapped read-only; the file must not be modified while loading.
        let mmap = unsafe { Mmap::map(&file)? };
        let mut reader = Reader {
            bytes: &mmap,
            pos: 0,
        };

        let header: SnapshotHeader = reader.read_pod()?;
        if header.magic != MAGIC {
            return Err(corrupt("bad magic"));
        }
        if header.version != VERSION {
            return Err(corrupt(format!("unsupported version {}", header.version)));
        }

        let slot_count = usize::try_from(header.slot_count)
            .map_err(|_| corrupt(format!("slot count {} too large", header.slot_count)))?;
        if slot_count > reader.remaining() / size_of::<RecordHeader>() {
            return Err(corrupt(format!(
                "{slot_count} slots do not fit in {} bytes",
                reader.remaining()
            )));
        }
        if !is_prime(slot_count) {
            return Err(corrupt(format!("slot count {slot_count} is not prime")));
        }

        let config = TableConfig::default()
            .with_initial_capacity(slot_count)
            .with_max_load_factor(header.max_load_factor);
        config.validate().map_err(|e| corrupt(e.to_string()))?;
        let mut table = Self::with_config_and_hasher(config, hasher)?;

        let mut occupied = 0u64;
        let mut used = 0u64;
        for slot_idx in 0..slot_count {
            let record: RecordHeader = reader.read_pod()?;
            let status = record.status();
            if status != SlotStatus::Occupied && (record.key_len() != 0 || record.value_len() != 0)
            {
                return Err(corrupt(format!("slot {slot_idx} has a payload but no entry")));
            }
            match status {
                SlotStatus::Empty => {}
                SlotStatus::Removed => used += 1,
                SlotStatus::Occupied => {
                    let key = KC::bytes_decode(reader.take(record.key_len() as usize)?)?;
                    let value = VC::bytes_decode(reader.take(record.value_len() as usize)?)?;
                    if table.add(key, value).is_some() {
                        return Err(corrupt(format!("slot {slot_idx} repeats a key")));
                    }
                    occupied += 1;
                    used += 1;
                }
                SlotStatus::Unused => {
                    return Err(corrupt(format!("slot {slot_idx} has an unknown status")));
                }
            }
        }

        if reader.remaining() != 0 {
            return Err(corrupt(format!("{} trailing bytes", reader.remaining())));
        }
        if occupied != header.entry_count || used != header.used_count {
            return Err(corrupt(format!(
                "header claims {} entries and {} used slots, found {occupied} and {used}",
                header.entry_count, header.used_count
            )));
        }

        trace!("loaded {occupied} entries from {path:?}");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bytes, Native, Str};
    use rustc_hash::FxBuildHasher;
    use std::fs;
    use tempfile::tempdir;

    type U64StringMap = HashedDictionary<u64, String>;

    #[test]
    fn test_record_header_layout() {
        assert_eq!(size_of::<RecordHeader>(), 8);
        assert_eq!(size_of::<SnapshotHeader>(), 48);

        let header = RecordHeader::new()
            .with_status(SlotStatus::Occupied)
            .with_key_len(MAX_PAYLOAD_LEN as u32)
            .with_value_len(3);
        let copy: RecordHeader = bytemuck::pod_read_unaligned(bytemuck::bytes_of(&header));
        assert_eq!(copy.status(), SlotStatus::Occupied);
        assert_eq!(copy.key_len() as usize, MAX_PAYLOAD_LEN);
        assert_eq!(copy.value_len(), 3);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");

        let mut map = U64StringMap::new();
        for k in 0..40u64 {
            map.add(k, format!("value{k}"));
        }
        for k in (0..40u64).step_by(4) {
            map.remove(&k);
        }
        assert!(map.used_count() > map.len());
        map.write_snapshot::<Native<u64>, Str>(&path).unwrap();

        let loaded = U64StringMap::load_snapshot::<Native<u64>, Str>(&path).unwrap();
        assert_eq!(loaded.len(), 30);
        assert_eq!(loaded.capacity(), map.capacity());
        assert_eq!(loaded.used_count(), loaded.len(), "tombstones are not replayed");
        assert_eq!(loaded.max_load_factor(), map.max_load_factor());
        for k in 0..40u64 {
            assert_eq!(loaded.get_value(&k), map.get_value(&k), "key: {k}");
        }
    }

    #[test]
    fn test_string_bytes_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");

        let config = TableConfig::default()
            .with_initial_capacity(11)
            .with_max_load_factor(0.85);
        let mut map: HashedDictionary<String, Vec<u8>> =
            HashedDictionary::with_config(config).unwrap();
        map.add("empty".to_string(), vec![]);
        map.add("bytes".to_string(), vec![0, 1, 2, 255]);
        map.add(String::new(), b"empty key".to_vec());
        map.write_snapshot::<Str, Bytes>(&path).unwrap();

        let loaded: HashedDictionary<String, Vec<u8>> =
            HashedDictionary::load_snapshot::<Str, Bytes>(&path).unwrap();
        assert_eq!(loaded.capacity(), 11);
        assert_eq!(loaded.max_load_factor(), 0.85);
        assert_eq!(loaded.get_value("empty"), Some(&vec![]));
        assert_eq!(loaded.get_value("bytes"), Some(&vec![0, 1, 2, 255]));
        assert_eq!(loaded.get_value(""), Some(&b"empty key".to_vec()));
    }

    #[test]
    fn test_empty_table_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.snap");

        let map = U64StringMap::with_capacity(5);
        map.write_snapshot::<Native<u64>, Str>(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 48 + 5 * 8);

        let loaded = U64StringMap::load_snapshot::<Native<u64>, Str>(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.capacity(), 5);
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        fs::write(&path, vec![0xaa; 4096]).unwrap();

        let mut map = U64StringMap::with_capacity(7);
        map.add(1, "one".to_string());
        map.write_snapshot::<Native<u64>, Str>(&path).unwrap();

        let loaded = U64StringMap::load_snapshot::<Native<u64>, Str>(&path).unwrap();
        assert_eq!(loaded.get_value(&1).map(String::as_str), Some("one"));
    }

    #[test]
    fn test_load_with_hasher() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");

        let mut map = U64StringMap::new();
        map.add(9, "nine".to_string());
        map.write_snapshot::<Native<u64>, Str>(&path).unwrap();

        let loaded: HashedDictionary<u64, String, std::hash::RandomState> =
            HashedDictionary::load_snapshot_with_hasher::<Native<u64>, Str>(
                &path,
                std::hash::RandomState::new(),
            )
            .unwrap();
        assert_eq!(loaded.get_value(&9).map(String::as_str), Some("nine"));
    }

    fn write_sample(path: &Path) -> Vec<u8> {
        let mut map = HashedDictionary::<u64, u64, FxBuildHasher>::with_capacity(7);
        map.add(1, 10);
        map.add(2, 20);
        map.remove(&2);
        map.write_snapshot::<Native<u64>, Native<u64>>(path).unwrap();
        fs::read(path).unwrap()
    }

    fn load_sample(path: &Path) -> Result<HashedDictionary<u64, u64>> {
        HashedDictionary::load_snapshot::<Native<u64>, Native<u64>>(path)
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_sample(&dir.path().join("missing.snap")).unwrap_err();
        assert!(matches!(err, DictError::Io(_)));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        let mut bytes = write_sample(&path);
        bytes[0] = b'X';
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(load_sample(&path), Err(DictError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        let bytes = write_sample(&path);
        for cut in [10, 48, 60, bytes.len() - 1] {
            fs::write(&path, &bytes[..cut]).unwrap();
            assert!(
                matches!(load_sample(&path), Err(DictError::CorruptSnapshot(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        let mut bytes = write_sample(&path);
        bytes.push(0);
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(load_sample(&path), Err(DictError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_count_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        let mut bytes = write_sample(&path);
        // entry_count lives at bytes 24..32
        bytes[24..32].copy_from_slice(&5u64.to_ne_bytes());
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(load_sample(&path), Err(DictError::CorruptSnapshot(_))));
    }

    /// Byte offset of the first record with `status` in a snapshot file.
    fn record_offset(bytes: &[u8], status: SlotStatus) -> usize {
        let mut pos = size_of::<SnapshotHeader>();
        loop {
            let record: RecordHeader = bytemuck::pod_read_unaligned(&bytes[pos..pos + 8]);
            if record.status() == status {
                return pos;
            }
            pos += 8 + record.key_len() as usize + record.value_len() as usize;
        }
    }

    fn patch_record(bytes: &mut [u8], pos: usize, patch: impl Fn(RecordHeader) -> RecordHeader) {
        let record: RecordHeader = bytemuck::pod_read_unaligned(&bytes[pos..pos + 8]);
        bytes[pos..pos + 8].copy_from_slice(bytemuck::bytes_of(&patch(record)));
    }

    #[test]
    fn test_slot_count_not_prime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        let mut bytes = write_sample(&path);
        // slot_count lives at bytes 16..24
        bytes[16..24].copy_from_slice(&6u64.to_ne_bytes());
        fs::write(&path, &bytes).unwrap();
        let err = load_sample(&path).unwrap_err();
        assert!(matches!(err, DictError::CorruptSnapshot(ref msg) if msg.contains("not prime")));
    }

    #[test]
    fn test_payload_on_removed_slot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        let mut bytes = write_sample(&path);
        let pos = record_offset(&bytes, SlotStatus::Removed);
        patch_record(&mut bytes, pos, |record| record.with_key_len(8));
        fs::write(&path, &bytes).unwrap();
        let err = load_sample(&path).unwrap_err();
        assert!(matches!(err, DictError::CorruptSnapshot(ref msg) if msg.contains("payload")));
    }

    #[test]
    fn test_unknown_status_bits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        let mut bytes = write_sample(&path);
        let pos = record_offset(&bytes, SlotStatus::Empty);
        patch_record(&mut bytes, pos, |record| record.with_status(SlotStatus::Unused));
        assert_eq!(bytes[pos] & 0b11, 0b11);
        fs::write(&path, &bytes).unwrap();
        let err = load_sample(&path).unwrap_err();
        assert!(matches!(err, DictError::CorruptSnapshot(ref msg) if msg.contains("unknown status")));
    }

    #[test]
    fn test_sample_loads_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.snap");
        write_sample(&path);
        let map = load_sample(&path).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_value(&1), Some(&10));
        assert_eq!(map.get_value(&2), None);
    }
}

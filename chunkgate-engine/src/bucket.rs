//! Bucket abstraction over fjall partitions

use chunkgate_core::*;
use fjall::{PartitionCreateOptions, PartitionHandle};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::StorageEngine;

/// A named object namespace backed by one fjall partition.
///
/// Each object is one `meta:` entry (JSON [`ObjectMetadata`]) plus
/// `part_count` body parts of at most [`StorageEngine::part_size`] bytes,
/// keyed by the object's version.
pub struct Bucket {
    id: BucketId,
    partition: PartitionHandle,
    engine: StorageEngine,
}

impl Bucket {
    pub(crate) fn new(engine: StorageEngine, id: BucketId) -> Result<Self> {
        let partition_name = format!("{}_objects", id.as_str());

        let partition = engine
            .keyspace()
            .open_partition(&partition_name, PartitionCreateOptions::default())
            .map_err(|e| GateError::Storage(e.to_string()))?;

        Ok(Bucket {
            id,
            partition,
            engine,
        })
    }

    pub fn id(&self) -> &BucketId {
        &self.id
    }

    /// Store the contents of a local file under `key`, replacing any previous object
    pub fn put_file(&self, key: &ObjectKey, path: &Path) -> Result<ObjectMetadata> {
        let mut file = File::open(path)?;
        self.put_reader(key, &mut file)
    }

    /// Store an in-memory body under `key`
    pub fn put_bytes(&self, key: &ObjectKey, data: &[u8]) -> Result<ObjectMetadata> {
        let mut reader = data;
        self.put_reader(key, &mut reader)
    }

    /// Parts are written under a fresh version before the metadata entry is
    /// swapped in, so readers only ever see a fully written object. The
    /// superseded version's parts are dropped once the swap is durable.
    fn put_reader(&self, key: &ObjectKey, reader: &mut impl Read) -> Result<ObjectMetadata> {
        let version = Version::new();
        let mut hasher = blake3::Hasher::new();
        let mut size = 0u64;
        let mut part_count = 0u32;

        let written = self.write_parts(key, &version, reader, &mut hasher, &mut size, &mut part_count);
        if let Err(e) = written {
            // Nothing references these parts yet
            let _ = self.remove_parts(key, &version, part_count);
            return Err(e);
        }

        let metadata = ObjectMetadata {
            size,
            version,
            content_hash: ContentHash::from_bytes(hasher.finalize().into()),
            created_at: SystemTime::now(),
            part_count,
        };
        let metadata_json = serde_json::to_vec(&metadata)?;

        let superseded = {
            let _commit = self.engine.commit_guard();
            let previous = self.get_metadata(key)?;
            self.partition
                .insert(self.metadata_key(key), metadata_json)
                .map_err(|e| GateError::Storage(e.to_string()))?;
            self.engine.persist()?;

            if let Some(previous) = &previous {
                if let Err(e) = self.remove_parts(key, &previous.version, previous.part_count) {
                    warn!("Failed to collect parts of {} version {}: {}", key, previous.version, e);
                }
            }
            previous
        };

        if let Some(previous) = superseded {
            debug!(
                "Replaced {} version {} with {} ({} parts)",
                key, previous.version, metadata.version, metadata.part_count
            );
        }

        Ok(metadata)
    }

    fn write_parts(
        &self,
        key: &ObjectKey,
        version: &Version,
        reader: &mut impl Read,
        hasher: &mut blake3::Hasher,
        size: &mut u64,
        part_count: &mut u32,
    ) -> Result<()> {
        let mut buffer = vec![0u8; self.engine.part_size()];

        loop {
            let filled = fill_buffer(reader, &mut buffer)?;
            if filled == 0 {
                return Ok(());
            }

            let part = &buffer[..filled];
            hasher.update(part);
            self.partition
                .insert(self.part_key(key, version, *part_count), part)
                .map_err(|e| GateError::Storage(e.to_string()))?;

            *size += filled as u64;
            *part_count += 1;

            if filled < buffer.len() {
                return Ok(());
            }
        }
    }

    fn remove_parts(&self, key: &ObjectKey, version: &Version, part_count: u32) -> Result<()> {
        for index in 0..part_count {
            self.partition
                .remove(self.part_key(key, version, index))
                .map_err(|e| GateError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    pub fn get_metadata(&self, key: &ObjectKey) -> Result<Option<ObjectMetadata>> {
        match self.partition.get(self.metadata_key(key)) {
            Ok(Some(data)) => Ok(Some(serde_json::from_slice(&data)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(GateError::Storage(e.to_string())),
        }
    }

    /// Read a whole object back, reassembling its parts in order
    pub fn get(&self, key: &ObjectKey) -> Result<Option<Vec<u8>>> {
        let mut attempts = 0;
        loop {
            let Some(metadata) = self.get_metadata(key)? else {
                return Ok(None);
            };
            if let Some(data) = self.read_parts(key, &metadata)? {
                return Ok(Some(data));
            }

            // A concurrent replace collected the version we were reading
            attempts += 1;
            let current = self.get_metadata(key)?.map(|m| m.version);
            if attempts >= 5 || current.as_ref() == Some(&metadata.version) {
                return Err(GateError::Storage(format!(
                    "object {} version {} is missing parts",
                    key, metadata.version
                )));
            }
        }
    }

    fn read_parts(&self, key: &ObjectKey, metadata: &ObjectMetadata) -> Result<Option<Vec<u8>>> {
        let mut data = Vec::with_capacity(metadata.size as usize);
        for index in 0..metadata.part_count {
            match self.partition.get(self.part_key(key, &metadata.version, index)) {
                Ok(Some(part)) => data.extend_from_slice(&part),
                Ok(None) => return Ok(None),
                Err(e) => return Err(GateError::Storage(e.to_string())),
            }
        }
        Ok(Some(data))
    }

    fn metadata_key(&self, key: &ObjectKey) -> Vec<u8> {
        format!("meta:{}", key.as_str()).into_bytes()
    }

    // Object keys never contain control characters, so NUL cannot collide
    fn part_key(&self, key: &ObjectKey, version: &Version, index: u32) -> Vec<u8> {
        format!("part:{}\0{}\0{:010}", key.as_str(), version, index).into_bytes()
    }
}

/// Read until `buffer` is full or the reader is exhausted
fn fill_buffer(reader: &mut impl Read, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

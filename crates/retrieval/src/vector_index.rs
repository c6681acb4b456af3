//! Flat squared-Euclidean vector index.
//!
//! Vectors are identified by their insertion position. The index is built
//! once and never mutated; there is no delete or update.

use incidex_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::path::Path;

/// File name of the persisted index inside a store directory.
pub const INDEX_FILE: &str = "flat_index.bin";

const MAGIC: &[u8; 4] = b"IXFL";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Exact nearest-neighbour index over a contiguous `f32` buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from vectors of exactly `dimension` finite entries.
    pub fn build(dimension: usize, vectors: &[Vec<f32>]) -> AppResult<Self> {
        if dimension == 0 {
            return Err(AppError::InvalidArgument(
                "Index dimension must be greater than zero".to_string(),
            ));
        }
        if vectors.is_empty() {
            return Err(AppError::InvalidArgument(
                "Cannot build an index from zero vectors".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (id, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(AppError::InvalidArgument(format!(
                    "Vector {} has {} dimensions, expected {}",
                    id,
                    vector.len(),
                    dimension
                )));
            }
            if !vector.iter().all(|v| v.is_finite()) {
                return Err(AppError::InvalidArgument(format!(
                    "Vector {} contains a non-finite value",
                    id
                )));
            }
            data.extend_from_slice(vector);
        }

        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The stored vector with id `id`, if any.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Return the `k` nearest ids with their squared distances.
    ///
    /// Results ascend by distance, ties going to the smaller id. `k` larger
    /// than the index is clamped.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(usize, f32)>> {
        if k == 0 {
            return Err(AppError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }
        if query.len() != self.dimension {
            return Err(AppError::InvalidArgument(format!(
                "Query has {} dimensions, index has {}",
                query.len(),
                self.dimension
            )));
        }
        if !query.iter().all(|v| v.is_finite()) {
            return Err(AppError::InvalidArgument(
                "Query contains a non-finite value".to_string(),
            ));
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, vector)| (id, squared_distance(query, vector)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k.min(scored.len()));

        Ok(scored)
    }

    /// Write the index to `path` in the `IXFL` binary format.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        std::fs::write(path, bytes)?;
        tracing::debug!(
            "Saved flat index ({} vectors, dim {}) to {}",
            self.len(),
            self.dimension,
            path.display()
        );
        Ok(())
    }

    /// Read an index written by [`FlatIndex::save`].
    pub fn load(path: &Path) -> AppResult<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ResourceLoad(format!(
                    "missing index file {}",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(AppError::ResourceLoad(format!(
                    "unreadable index file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let malformed = |reason: &str| {
            AppError::ResourceLoad(format!(
                "malformed index file {}: {}",
                path.display(),
                reason
            ))
        };

        if bytes.len() < HEADER_LEN {
            return Err(malformed("truncated header"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(malformed("bad magic"));
        }

        let version = read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(malformed(&format!("unsupported version {}", version)));
        }

        let dimension = read_u32(&bytes[8..12]) as usize;
        let count = read_u64(&bytes[12..20]) as usize;
        if dimension == 0 || count == 0 {
            return Err(malformed("empty index"));
        }

        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| malformed("header overflow"))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            return Err(malformed(&format!(
                "payload is {} bytes, header implies {}",
                payload.len(),
                expected
            )));
        }

        let data: Vec<f32> = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if !data.iter().all(|v| v.is_finite()) {
            return Err(malformed("non-finite value"));
        }

        Ok(Self { dimension, data })
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

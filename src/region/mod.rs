//! Owned, mutable backing stores for ELF images. A [`Region`] holds the whole
//! file image and vends [`Chunk`]s that alias into it.

use std::path::Path;

use tracing::debug;

use crate::{
    chunk::Chunk,
    error::{Error, Result},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// An owned, resizable byte buffer backing an ELF image. Chunks vended before
/// a splice view the pre-splice layout; callers must re-fetch them after any
/// mutation.
pub struct Region {
    data: Vec<u8>,
}

impl Region {
    /// Load a region from a file on the filesystem
    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let data = std::fs::read(path.as_ref()).map_err(|e| Error::Io { kind: e.kind() })?;
        debug!(
            path = %path.as_ref().display(),
            len = data.len(),
            "loaded region from file"
        );
        Ok(Self { data })
    }

    /// Create a zero-filled region of `size` bytes
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// The length of the region in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the region is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A chunk viewing the entire region
    pub fn chunk(&self) -> Chunk<'_> {
        Chunk::new(&self.data)
    }

    /// A chunk viewing `length` bytes starting at `offset`. Fails when the
    /// range does not lie within the region.
    pub fn chunk_at(&self, offset: u64, length: u64) -> Result<Chunk<'_>> {
        self.chunk().slice(offset, length)
    }

    /// Insert `bytes` at `offset`, shifting the trailing bytes up. Bytes
    /// outside the splice range are preserved exactly. Returns the new length
    /// of the region.
    pub fn insert(&mut self, offset: u64, bytes: &[u8]) -> Result<usize> {
        if offset > self.data.len() as u64 {
            return Err(Error::OutOfRange {
                offset,
                length: bytes.len() as u64,
                available: self.data.len() as u64,
            });
        }

        self.data
            .splice(offset as usize..offset as usize, bytes.iter().copied());
        Ok(self.data.len())
    }

    /// Remove `length` bytes starting at `offset`, shifting the trailing
    /// bytes down. Bytes outside the splice range are preserved exactly.
    /// Returns the new length of the region.
    pub fn remove(&mut self, offset: u64, length: u64) -> Result<usize> {
        let end = offset.checked_add(length).ok_or(Error::OutOfRange {
            offset,
            length,
            available: self.data.len() as u64,
        })?;

        if end > self.data.len() as u64 {
            return Err(Error::OutOfRange {
                offset,
                length,
                available: self.data.len() as u64,
            });
        }

        self.data.drain(offset as usize..end as usize);
        Ok(self.data.len())
    }

    /// Overwrite the bytes at `offset` with `bytes` without changing the
    /// region's length
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let end = offset.checked_add(bytes.len() as u64).ok_or(Error::OutOfRange {
            offset,
            length: bytes.len() as u64,
            available: self.data.len() as u64,
        })?;

        if end > self.data.len() as u64 {
            return Err(Error::OutOfRange {
                offset,
                length: bytes.len() as u64,
                available: self.data.len() as u64,
            });
        }

        self.data[offset as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }

    /// The raw bytes of the region
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Region {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_load_missing_file() {
        assert_eq!(
            Region::load("/nonexistent/does-not-exist"),
            Err(Error::Io {
                kind: ErrorKind::NotFound
            })
        );
    }

    #[test]
    fn test_insert_preserves_surrounding_bytes() {
        let mut region = Region::from(vec![1u8, 2, 3, 4]);
        let new_len = region.insert(2, &[9, 9]).unwrap();
        assert_eq!(new_len, 6);
        assert_eq!(region.as_slice(), &[1, 2, 9, 9, 3, 4]);
    }

    #[test]
    fn test_remove_preserves_surrounding_bytes() {
        let mut region = Region::from(vec![1u8, 2, 9, 9, 3, 4]);
        let new_len = region.remove(2, 2).unwrap();
        assert_eq!(new_len, 4);
        assert_eq!(region.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_insert_then_remove_restores_image() {
        let original = vec![0u8, 1, 2, 3, 4, 5, 6, 7];
        let mut region = Region::from(original.clone());
        region.insert(3, &[0xaa, 0xbb, 0xcc]).unwrap();
        region.remove(3, 3).unwrap();
        assert_eq!(region.as_slice(), original.as_slice());
    }

    #[test]
    fn test_splice_bounds() {
        let mut region = Region::with_size(4);
        assert!(region.insert(5, &[1]).is_err());
        assert!(region.remove(2, 3).is_err());
        assert!(region.chunk_at(2, 3).is_err());
        assert_eq!(region.chunk_at(0, 4).unwrap().len(), 4);
    }
}

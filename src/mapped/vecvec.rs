use std::marker::PhantomData;
use std::ops::Range;
use std::path::{Path, PathBuf};

use bytemuck::Pod;

use log::{debug, warn};

use super::{vector::MappedVec, with_suffix, Result};
use crate::error::StorageError;
use crate::ids::RecordKey;
use crate::parallel::DisjointWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Idle,
    Counting,
    Filling,
}

/// A memory-mapped vector of vectors: for each key `K` in `0..len()`,
/// a variable-length sequence of `T`.
///
/// The sequences are stored back to back in a single data vector,
/// with a table of contents holding the offset of each key's
/// sequence, plus a final entry holding the total size.
///
/// Besides appending one vector at a time, the structure can be
/// filled in two passes, which is how it is built in parallel:
///
/// 1. [`begin_pass1`](Self::begin_pass1), then
///    [`increment_count`](Self::increment_count) for each key until
///    the table holds the final length of every vector;
/// 2. [`begin_pass2`](Self::begin_pass2) turns the counts into
///    offsets and allocates the data once, after which each key's
///    slot is filled through [`slot_mut`](Self::slot_mut);
/// 3. [`end_pass2`](Self::end_pass2) makes the structure queryable.
///
/// For a store at `path`, the table of contents and the data live in
/// `path.toc` and `path.data`.
pub struct MappedVecOfVecs<T, K = u64> {
    path: Option<PathBuf>,
    toc: MappedVec<u64>,
    data: MappedVec<T>,
    pass: Pass,
    // Next free position of each slot, only used by `store`.
    cursors: Option<MappedVec<u64>>,
    _key: PhantomData<K>,
}

fn part_paths(path: Option<&Path>) -> (Option<PathBuf>, Option<PathBuf>) {
    match path {
        None => (None, None),
        Some(path) => {
            (Some(with_suffix(path, ".toc")), Some(with_suffix(path, ".data")))
        }
    }
}

impl<T: Pod, K: RecordKey> MappedVecOfVecs<T, K> {
    pub fn create_new(path: Option<&Path>, page_size: usize) -> Result<Self> {
        let (toc_path, data_path) = part_paths(path);
        let mut toc = MappedVec::create_new(toc_path.as_deref(), page_size)?;
        toc.push(0)?;
        let data = match MappedVec::create_new(data_path.as_deref(), page_size) {
            Ok(data) => data,
            Err(err) => {
                if let Err(removed) = toc.remove() {
                    warn!("could not remove a table of contents: {}", removed);
                }
                return Err(err);
            }
        };
        Ok(Self {
            path: path.map(Path::to_path_buf),
            toc,
            data,
            pass: Pass::Idle,
            cursors: None,
            _key: PhantomData,
        })
    }

    pub fn access_existing_read_only(path: &Path) -> Result<Self> {
        Self::access_existing(path, false)
    }

    pub fn access_existing_read_write(path: &Path) -> Result<Self> {
        Self::access_existing(path, true)
    }

    fn access_existing(path: &Path, writable: bool) -> Result<Self> {
        let (toc_path, data_path) = part_paths(Some(path));
        let (toc_path, data_path) = match (toc_path, data_path) {
            (Some(toc), Some(data)) => (toc, data),
            _ => unreachable!(),
        };

        let (toc, data) = if writable {
            (
                MappedVec::<u64>::access_existing_read_write(&toc_path)?,
                MappedVec::<T>::access_existing_read_write(&data_path)?,
            )
        } else {
            (
                MappedVec::<u64>::access_existing_read_only(&toc_path)?,
                MappedVec::<T>::access_existing_read_only(&data_path)?,
            )
        };

        let consistent = match toc.as_slice().last() {
            Some(&total) => total as usize == data.len(),
            None => false,
        };
        if !consistent {
            return Err(StorageError::BadHeader {
                path: toc_path,
                reason: format!(
                    "table of contents does not match {} data elements",
                    data.len()
                ),
            });
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            toc,
            data,
            pass: Pass::Idle,
            cursors: None,
            _key: PhantomData,
        })
    }

    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The number of keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.toc.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The total number of elements over all keys.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.data.page_size()
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.data.is_read_only()
    }

    #[inline]
    fn range(&self, ix: usize) -> Range<usize> {
        let toc = self.toc.as_slice();
        (toc[ix] as usize)..(toc[ix + 1] as usize)
    }

    /// The vector stored for `key`.
    #[inline]
    pub fn get(&self, key: K) -> &[T] {
        debug_assert_eq!(self.pass, Pass::Idle);
        let range = self.range(key.to_index());
        &self.data.as_slice()[range]
    }

    /// The length of the vector stored for `key`.
    #[inline]
    pub fn size(&self, key: K) -> usize {
        debug_assert_eq!(self.pass, Pass::Idle);
        self.range(key.to_index()).len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.len()).map(move |ix| &self.data.as_slice()[self.range(ix)])
    }

    /// Append a new key holding a copy of `values`.
    pub fn append_vector(&mut self, values: &[T]) -> Result<()> {
        self.expect_pass(Pass::Idle);
        self.data.extend_from_slice(values)?;
        self.toc.push(self.data.len() as u64)?;
        Ok(())
    }

    fn expect_pass(&self, expected: Pass) {
        assert_eq!(
            self.pass, expected,
            "vector of vectors {:?} used out of order",
            self.path
        );
    }

    /// Start counting the lengths of `key_count` vectors, discarding
    /// the current contents.
    pub fn begin_pass1(&mut self, key_count: usize) -> Result<()> {
        self.expect_pass(Pass::Idle);
        self.data.resize(0, bytemuck::Zeroable::zeroed())?;
        self.toc.resize(key_count + 1, 0)?;
        self.toc.fill(0);
        self.pass = Pass::Counting;
        Ok(())
    }

    #[inline]
    pub fn increment_count(&mut self, key: K, n: u64) {
        self.expect_pass(Pass::Counting);
        let ix = key.to_index();
        assert!(
            ix < self.len(),
            "key {} of {:?} is out of range, {} keys are being counted",
            ix,
            self.path,
            self.len()
        );
        self.toc[ix] += n;
    }

    /// Counting access that can be shared between threads.
    pub fn counters(&mut self) -> Counters<'_, K> {
        self.expect_pass(Pass::Counting);
        let key_count = self.len();
        Counters {
            counts: DisjointWriter::new(
                &mut self.toc.as_mut_slice()[..key_count],
            ),
            _key: PhantomData,
        }
    }

    /// Turn the counts into offsets and allocate the data.
    pub fn begin_pass2(&mut self) -> Result<()> {
        self.expect_pass(Pass::Counting);

        let mut offset = 0u64;
        for entry in self.toc.as_mut_slice().iter_mut() {
            let count = *entry;
            *entry = offset;
            offset += count;
        }

        self.data.resize(offset as usize, bytemuck::Zeroable::zeroed())?;
        debug!(
            "vector of vectors {:?}: {} keys, {} elements",
            self.path,
            self.len(),
            offset
        );
        self.pass = Pass::Filling;
        Ok(())
    }

    /// The slot for `key`, which has exactly the length counted in
    /// pass 1.
    #[inline]
    pub fn slot_mut(&mut self, key: K) -> &mut [T] {
        self.expect_pass(Pass::Filling);
        let range = self.range(key.to_index());
        &mut self.data.as_mut_slice()[range]
    }

    /// Append `value` to the slot of `key`, filling each slot from the
    /// front. Panics if the slot is already full.
    pub fn store(&mut self, key: K, value: T) -> Result<()> {
        self.expect_pass(Pass::Filling);
        if self.cursors.is_none() {
            let mut cursors = MappedVec::create_new(None, self.page_size())?;
            cursors.extend_from_slice(&self.toc.as_slice()[..self.len()])?;
            self.cursors = Some(cursors);
        }

        let ix = key.to_index();
        let end = self.toc[ix + 1];
        if let Some(cursors) = self.cursors.as_mut() {
            let position = cursors[ix];
            assert!(
                position < end,
                "slot {} of {:?} is already full",
                ix,
                self.path
            );
            self.data[position as usize] = value;
            cursors[ix] = position + 1;
        }
        Ok(())
    }

    /// Filling access that can be shared between threads.
    pub fn filler(&mut self) -> Filler<'_, T, K> {
        self.expect_pass(Pass::Filling);
        Filler {
            toc: self.toc.as_slice(),
            data: DisjointWriter::new(self.data.as_mut_slice()),
            _key: PhantomData,
        }
    }

    /// Finish filling. If [`store`](Self::store) was used, every slot
    /// must have been filled completely.
    pub fn end_pass2(&mut self) -> Result<()> {
        self.expect_pass(Pass::Filling);
        if let Some(cursors) = self.cursors.take() {
            let toc = self.toc.as_slice();
            for (ix, &position) in cursors.iter().enumerate() {
                assert_eq!(
                    position,
                    toc[ix + 1],
                    "slot {} of {:?} was not completely filled",
                    ix,
                    self.path
                );
            }
        }
        self.pass = Pass::Idle;
        self.flush()
    }

    pub fn flush(&self) -> Result<()> {
        self.toc.flush()?;
        self.data.flush()
    }

    /// Move both backing files so the store lives at `new_path`.
    /// Anonymous stores have nothing to rename.
    ///
    /// The data file is moved first and the table of contents last, so
    /// that a store found at `new_path` never pairs a new table of
    /// contents with old data. If the table of contents cannot be
    /// moved, the data file is moved back and the store stays at its
    /// old path.
    pub fn rename(&mut self, new_path: &Path) -> Result<()> {
        if self.path.is_none() {
            return Ok(());
        }
        let (toc_path, data_path) = part_paths(Some(new_path));
        if let (Some(toc_path), Some(data_path)) = (toc_path, data_path) {
            let old_data_path = self.data.path().map(Path::to_path_buf);
            self.data.rename(&data_path)?;
            if let Err(err) = self.toc.rename(&toc_path) {
                if let Some(old_data_path) = old_data_path {
                    if let Err(undo) = self.data.rename(&old_data_path) {
                        warn!(
                            "could not move {} back to {}: {}",
                            data_path.display(),
                            old_data_path.display(),
                            undo
                        );
                    }
                }
                return Err(err);
            }
        }
        self.path = Some(new_path.to_path_buf());
        Ok(())
    }

    /// Drop the mappings and delete the backing files, if any.
    pub fn remove(self) -> Result<()> {
        self.toc.remove()?;
        self.data.remove()
    }

    pub fn close(self) -> Result<()> {
        self.expect_pass(Pass::Idle);
        self.toc.close()?;
        self.data.close()
    }

    pub fn into_read_only(self) -> Result<Self> {
        self.expect_pass(Pass::Idle);
        Ok(Self {
            path: self.path,
            toc: self.toc.into_read_only()?,
            data: self.data.into_read_only()?,
            pass: Pass::Idle,
            cursors: None,
            _key: PhantomData,
        })
    }
}

impl<T: Pod, K: RecordKey> std::ops::Index<K> for MappedVecOfVecs<T, K> {
    type Output = [T];

    #[inline]
    fn index(&self, key: K) -> &[T] {
        self.get(key)
    }
}

impl<T, K> std::fmt::Debug for MappedVecOfVecs<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedVecOfVecs")
            .field("path", &self.path)
            .field("toc", &self.toc)
            .field("data", &self.data)
            .field("pass", &self.pass)
            .finish()
    }
}

/// Pass 1 access to a [`MappedVecOfVecs`] that can be shared by
/// worker threads.
pub struct Counters<'a, K> {
    counts: DisjointWriter<'a, u64>,
    _key: PhantomData<K>,
}

impl<'a, K: RecordKey> Counters<'a, K> {
    /// # Safety
    ///
    /// No other thread may count `key` concurrently.
    #[inline]
    pub unsafe fn increment_count(&self, key: K, n: u64) {
        *self.counts.get_mut(key.to_index()) += n;
    }
}

/// Pass 2 access to a [`MappedVecOfVecs`] that can be shared by
/// worker threads.
pub struct Filler<'a, T, K> {
    toc: &'a [u64],
    data: DisjointWriter<'a, T>,
    _key: PhantomData<K>,
}

impl<'a, T, K: RecordKey> Filler<'a, T, K> {
    /// # Safety
    ///
    /// No other thread may access the slot of `key` while the
    /// returned slice is alive.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub unsafe fn slot_mut(&self, key: K) -> &mut [T] {
        let ix = key.to_index();
        let range = (self.toc[ix] as usize)..(self.toc[ix + 1] as usize);
        self.data.slice_mut(range)
    }
}

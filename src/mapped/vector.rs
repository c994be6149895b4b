use std::fs::{self, File, OpenOptions};
use std::marker::PhantomData;
use std::mem::size_of;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use memmap2::{Mmap, MmapMut};

use log::debug;

use super::{round_to_pages, Result};
use crate::error::StorageError;

const MAGIC: u64 = 0x6d61_7070_6564_7631;

/// Size of the header at the start of every mapping. The elements
/// follow it directly; since mappings are page aligned, the elements
/// are aligned for any `T` with an alignment of at most this.
pub(crate) const HEADER_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Header {
    magic: u64,
    object_size: u64,
    len: u64,
    capacity: u64,
    page_size: u64,
    _unused: [u64; 3],
}

enum Mapping {
    Writable(MmapMut),
    ReadOnly(Mmap),
}

impl Mapping {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::Writable(mmap) => &mmap[..],
            Mapping::ReadOnly(mmap) => &mmap[..],
        }
    }
}

/// A vector of `T` stored in a memory mapping whose size is a
/// multiple of the page size.
///
/// The mapping is read-write after [`create_new`](MappedVec::create_new)
/// and [`access_existing_read_write`](MappedVec::access_existing_read_write);
/// trying to modify a read-only vector panics.
pub struct MappedVec<T> {
    path: Option<PathBuf>,
    mapping: Mapping,
    len: usize,
    capacity: usize,
    page_size: usize,
    _element: PhantomData<T>,
}

impl<T: Pod> MappedVec<T> {
    #[inline]
    fn capacity_for(byte_len: usize) -> usize {
        (byte_len - HEADER_SIZE) / size_of::<T>()
    }

    #[inline]
    fn byte_len_for(capacity: usize, page_size: usize) -> usize {
        round_to_pages(HEADER_SIZE + capacity * size_of::<T>(), page_size)
    }

    fn map_new(path: Option<&Path>, byte_len: usize) -> Result<MmapMut> {
        match path {
            None => MmapMut::map_anon(byte_len)
                .map_err(|err| StorageError::io(None, err)),
            Some(path) => {
                let io_err = |err| StorageError::io(Some(path.to_path_buf()), err);
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(io_err)?;
                file.set_len(byte_len as u64).map_err(io_err)?;
                // SAFETY: the file was just created by us and is owned
                // by this vector from now on.
                unsafe { MmapMut::map_mut(&file) }.map_err(io_err)
            }
        }
    }

    /// Create an empty vector, backed by the file at `path`, which is
    /// created or truncated, or by anonymous memory if `path` is
    /// `None`.
    pub fn create_new(path: Option<&Path>, page_size: usize) -> Result<Self> {
        assert!(page_size > 0, "page size must be positive");
        assert!(size_of::<T>() > 0, "cannot map zero-sized elements");
        assert!(std::mem::align_of::<T>() <= HEADER_SIZE);

        let byte_len = Self::byte_len_for(0, page_size);
        let mmap = Self::map_new(path, byte_len)?;

        let mut vector = Self {
            path: path.map(Path::to_path_buf),
            mapping: Mapping::Writable(mmap),
            len: 0,
            capacity: Self::capacity_for(byte_len),
            page_size,
            _element: PhantomData,
        };
        vector.write_header();
        Ok(vector)
    }

    pub fn access_existing_read_only(path: &Path) -> Result<Self> {
        Self::access_existing(path, false)
    }

    pub fn access_existing_read_write(path: &Path) -> Result<Self> {
        Self::access_existing(path, true)
    }

    fn access_existing(path: &Path, writable: bool) -> Result<Self> {
        let io_err = |err| StorageError::io(Some(path.to_path_buf()), err);
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(io_err)?;

        // SAFETY: the structures in this crate are owned by a single
        // marker graph, which is the only one accessing the file.
        let mapping = if writable {
            Mapping::Writable(unsafe { MmapMut::map_mut(&file) }.map_err(io_err)?)
        } else {
            Mapping::ReadOnly(unsafe { Mmap::map(&file) }.map_err(io_err)?)
        };

        let bad_header = |reason: String| StorageError::BadHeader {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = mapping.bytes();
        if bytes.len() < HEADER_SIZE {
            return Err(bad_header(format!(
                "file is {} bytes, shorter than the header",
                bytes.len()
            )));
        }
        let header: Header = *bytemuck::from_bytes(&bytes[..HEADER_SIZE]);

        if header.magic != MAGIC {
            return Err(bad_header("not a mapped vector".to_string()));
        }
        if header.object_size as usize != size_of::<T>() {
            return Err(bad_header(format!(
                "element size is {}, expected {}",
                header.object_size,
                size_of::<T>()
            )));
        }
        let len = header.len as usize;
        let capacity = header.capacity as usize;
        if len > capacity
            || HEADER_SIZE + capacity * size_of::<T>() > bytes.len()
        {
            return Err(bad_header(format!(
                "length {} and capacity {} do not fit in {} bytes",
                len,
                capacity,
                bytes.len()
            )));
        }

        debug!("opened {} with {} elements", path.display(), len);

        Ok(Self {
            path: Some(path.to_path_buf()),
            mapping,
            len,
            capacity,
            page_size: header.page_size as usize,
            _element: PhantomData,
        })
    }

    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Size of the mapping in bytes, always a multiple of the page
    /// size.
    #[inline]
    pub fn mapped_bytes(&self) -> usize {
        self.mapping.bytes().len()
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        matches!(self.mapping, Mapping::ReadOnly(_))
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        let end = HEADER_SIZE + self.len * size_of::<T>();
        bytemuck::cast_slice(&self.mapping.bytes()[HEADER_SIZE..end])
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let end = HEADER_SIZE + self.len * size_of::<T>();
        let bytes = self.writable_bytes();
        bytemuck::cast_slice_mut(&mut bytes[HEADER_SIZE..end])
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    fn writable_bytes(&mut self) -> &mut [u8] {
        match &mut self.mapping {
            Mapping::Writable(mmap) => &mut mmap[..],
            Mapping::ReadOnly(_) => panic!(
                "attempted to modify read-only mapped vector {:?}",
                self.path
            ),
        }
    }

    fn write_header(&mut self) {
        let header = Header {
            magic: MAGIC,
            object_size: size_of::<T>() as u64,
            len: self.len as u64,
            capacity: self.capacity as u64,
            page_size: self.page_size as u64,
            _unused: [0; 3],
        };
        self.writable_bytes()[..HEADER_SIZE]
            .copy_from_slice(bytemuck::bytes_of(&header));
    }

    /// Make room for at least `capacity` elements, remapping if
    /// needed. The contents are preserved.
    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        if capacity <= self.capacity {
            return Ok(());
        }
        assert!(
            !self.is_read_only(),
            "attempted to grow read-only mapped vector {:?}",
            self.path
        );

        let byte_len = Self::byte_len_for(capacity, self.page_size);
        let new_mmap = match &self.path {
            None => {
                let mut mmap = MmapMut::map_anon(byte_len)
                    .map_err(|err| StorageError::io(None, err))?;
                let used = HEADER_SIZE + self.len * size_of::<T>();
                mmap[..used].copy_from_slice(&self.mapping.bytes()[..used]);
                mmap
            }
            Some(path) => {
                let io_err = |err| StorageError::io(Some(path.clone()), err);
                if let Mapping::Writable(mmap) = &self.mapping {
                    mmap.flush().map_err(io_err)?;
                }
                let file: File = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(io_err)?;
                file.set_len(byte_len as u64).map_err(io_err)?;
                // SAFETY: the file is owned by this vector.
                unsafe { MmapMut::map_mut(&file) }.map_err(io_err)?
            }
        };

        self.mapping = Mapping::Writable(new_mmap);
        self.capacity = Self::capacity_for(byte_len);
        self.write_header();
        Ok(())
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        if self.len == self.capacity {
            self.reserve((2 * self.capacity).max(self.len + 1))?;
        }
        self.len += 1;
        let last = self.len - 1;
        self.as_mut_slice()[last] = value;
        self.write_header();
        Ok(())
    }

    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<()> {
        let new_len = self.len + values.len();
        if new_len > self.capacity {
            self.reserve((2 * self.capacity).max(new_len))?;
        }
        let old_len = self.len;
        self.len = new_len;
        self.as_mut_slice()[old_len..].copy_from_slice(values);
        self.write_header();
        Ok(())
    }

    /// Set the length to `new_len`, filling any new elements with
    /// `value`. Growing allocates exactly the pages needed.
    pub fn resize(&mut self, new_len: usize, value: T) -> Result<()> {
        self.reserve(new_len)?;
        let old_len = self.len;
        self.len = new_len;
        if new_len > old_len {
            self.as_mut_slice()[old_len..].fill(value);
        }
        self.write_header();
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    pub fn flush(&self) -> Result<()> {
        match (&self.mapping, &self.path) {
            (Mapping::Writable(mmap), Some(path)) => mmap
                .flush()
                .map_err(|err| StorageError::io(Some(path.clone()), err)),
            _ => Ok(()),
        }
    }

    /// Move the backing file to `new_path`. The mapping stays valid.
    /// Anonymous vectors have nothing to rename.
    pub fn rename(&mut self, new_path: &Path) -> Result<()> {
        if let Some(path) = &self.path {
            fs::rename(path, new_path)
                .map_err(|err| StorageError::io(Some(path.clone()), err))?;
            debug!("renamed {} to {}", path.display(), new_path.display());
            self.path = Some(new_path.to_path_buf());
        }
        Ok(())
    }

    /// Drop the mapping and delete the backing file, if any.
    pub fn remove(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        if let Some(path) = path {
            fs::remove_file(&path).map_err(|err| StorageError::io(Some(path), err))?;
        }
        Ok(())
    }

    /// Flush and drop the mapping.
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    /// Flush and turn the mapping read-only in place.
    pub fn into_read_only(self) -> Result<Self> {
        self.flush()?;
        let MappedVec {
            path,
            mapping,
            len,
            capacity,
            page_size,
            _element,
        } = self;

        let mapping = match mapping {
            Mapping::Writable(mmap) => Mapping::ReadOnly(
                mmap.make_read_only()
                    .map_err(|err| StorageError::io(path.clone(), err))?,
            ),
            read_only => read_only,
        };

        Ok(MappedVec {
            path,
            mapping,
            len,
            capacity,
            page_size,
            _element,
        })
    }
}

impl<T: Pod> std::ops::Index<usize> for MappedVec<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T: Pod> std::ops::IndexMut<usize> for MappedVec<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<T> std::fmt::Debug for MappedVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedVec")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("page_size", &self.page_size)
            .field("read_only", &matches!(self.mapping, Mapping::ReadOnly(_)))
            .finish()
    }
}

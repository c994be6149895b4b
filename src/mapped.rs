/*!
Memory-mapped collections of plain-old-data elements.

Everything in the marker graph is stored in these, so that the graph
can be larger than the available memory and can be reopened without
parsing anything. The mappings are backed either by a file or, when
no path is given, by anonymous memory.

* [`MappedVec`] is a flat vector of fixed-width elements.
* [`MappedVecOfVecs`] stores one variable-length vector per key, and
  is filled in two passes: first the length of each vector is
  counted, then the space for all of them is allocated at once and
  the vectors are filled in.

The size of each mapping is always a multiple of the page size it
was created with.
*/

pub mod vecvec;
pub mod vector;

pub use self::{
    vecvec::{Counters, Filler, MappedVecOfVecs},
    vector::MappedVec,
};

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Round `bytes` up to a positive multiple of `page_size`.
#[inline]
pub(crate) fn round_to_pages(bytes: usize, page_size: usize) -> usize {
    let pages = (bytes.max(1) - 1) / page_size + 1;
    pages * page_size
}

/// The path of a temporary generation of the structure at `path`.
pub fn temporary_path(path: &Path) -> PathBuf {
    with_suffix(path, "-tmp")
}

pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_up() {
        assert_eq!(round_to_pages(0, 4096), 4096);
        assert_eq!(round_to_pages(1, 4096), 4096);
        assert_eq!(round_to_pages(4096, 4096), 4096);
        assert_eq!(round_to_pages(4097, 4096), 8192);
        assert_eq!(round_to_pages(64, 16), 64);
    }

    #[test]
    fn temporary_names_append_suffix() {
        let path = Path::new("/data/vertices");
        assert_eq!(temporary_path(path), PathBuf::from("/data/vertices-tmp"));
        assert_eq!(
            with_suffix(path, ".toc"),
            PathBuf::from("/data/vertices.toc")
        );
    }
}

/*!
Settings for where and how the marker graph is stored, and for how
compaction is run.
*/

use std::path::{Path, PathBuf};

/// The page size of ordinary memory pages.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// The page size of huge pages. Large stores should use this.
pub const HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Number of consecutive vertices handed to a worker at a time.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Where the marker graph structures live. With no directory, every
/// structure is backed by anonymous memory and nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub directory: Option<PathBuf>,
    pub page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StorageConfig {
    pub fn anonymous() -> Self {
        Default::default()
    }

    pub fn in_directory<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: Some(directory.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// The path of the structure with the given logical name, or
    /// `None` for anonymous storage.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(name))
    }
}

/// Parameters of [`MarkerGraph::remove_vertices`](crate::markergraph::MarkerGraph::remove_vertices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionOptions {
    /// Page size of the newly built structures.
    pub page_size: usize,
    /// Number of worker threads; 0 means one per available CPU.
    pub thread_count: usize,
    pub batch_size: usize,
}

impl Default for CompactionOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            thread_count: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl CompactionOptions {
    pub fn new(page_size: usize, thread_count: usize) -> Self {
        Self {
            page_size,
            thread_count,
            ..Default::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// The thread count to actually use, resolving 0 to the available
    /// parallelism.
    pub fn effective_thread_count(&self) -> usize {
        if self.thread_count > 0 {
            self.thread_count
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_storage_has_no_paths() {
        let config = StorageConfig::anonymous();
        assert_eq!(config.path("vertices"), None);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn directory_storage_joins_names() {
        let config =
            StorageConfig::in_directory("/data").with_page_size(HUGE_PAGE_SIZE);
        assert_eq!(
            config.path("vertexTable"),
            Some(PathBuf::from("/data/vertexTable"))
        );
        assert_eq!(config.page_size, HUGE_PAGE_SIZE);
    }

    #[test]
    fn zero_threads_means_all_cpus() {
        let options = CompactionOptions::new(DEFAULT_PAGE_SIZE, 0);
        assert!(options.effective_thread_count() >= 1);
        let options = CompactionOptions::new(DEFAULT_PAGE_SIZE, 3);
        assert_eq!(options.effective_thread_count(), 3);
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
    }
}

use crate::common::errors::PurgeResult;

/// Capability set consumed from the storage backend.
///
/// Paths are relative to the backend root (bucket plus configured
/// prefix). Directory entries are marked with a trailing `/`. The listing
/// order is whatever the backend yields and callers treat it as stable
/// for the remainder of the run.
pub trait ObjectStore {
    /// List entries up to `depth` levels below `path`. Depth 0 returns
    /// the immediate children only.
    fn list_dir(&self, path: &str, depth: u32) -> PurgeResult<Vec<String>>;

    /// Delete the object at `path`, or the whole subtree when
    /// `recursive` is set.
    fn delete(&self, path: &str, recursive: bool) -> PurgeResult<()>;
}

use tracing::debug;

use super::store::ObjectStore;
use crate::common::errors::PurgeResult;

/// List the immediate candidate repository directories under the backend
/// root.
///
/// The storage collaborator marks directories with a trailing `/`; that
/// convention is stripped here. No recursion, no filtering: the return
/// order is exactly what the backend yielded and stays stable for the
/// rest of the run.
pub fn list_candidates(store: &dyn ObjectStore) -> PurgeResult<Vec<String>> {
    let entries = store.list_dir("", 0)?;
    let candidates: Vec<String> = entries
        .into_iter()
        .map(|entry| entry.trim_end_matches('/').to_string())
        .collect();
    debug!(count = candidates.len(), "enumerated candidates");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore {
        entries: Vec<String>,
    }

    impl ObjectStore for FixedStore {
        fn list_dir(&self, path: &str, depth: u32) -> PurgeResult<Vec<String>> {
            assert_eq!(path, "");
            assert_eq!(depth, 0);
            Ok(self.entries.clone())
        }

        fn delete(&self, _path: &str, _recursive: bool) -> PurgeResult<()> {
            unreachable!("enumeration never deletes");
        }
    }

    #[test]
    fn test_strips_directory_markers() {
        let store = FixedStore {
            entries: vec!["repo-b/".to_string(), "repo-a/".to_string()],
        };
        let candidates = list_candidates(&store).unwrap();
        assert_eq!(candidates, vec!["repo-b", "repo-a"]);
    }

    #[test]
    fn test_preserves_backend_order() {
        let store = FixedStore {
            entries: vec![
                "zeta/".to_string(),
                "alpha/".to_string(),
                "mid/".to_string(),
            ],
        };
        let candidates = list_candidates(&store).unwrap();
        assert_eq!(candidates, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_plain_objects_pass_through() {
        // Loose objects at the root are not filtered here; the probe will
        // fail to open them as repositories and exclude them.
        let store = FixedStore {
            entries: vec!["repo-a/".to_string(), "README".to_string()],
        };
        let candidates = list_candidates(&store).unwrap();
        assert_eq!(candidates, vec!["repo-a", "README"]);
    }
}

use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Evaluated by the merger after validation, right before the changes are committed.
pub const MERGE_BEFORE_COMMIT: &str = "merge.before_commit";
/// Evaluated by the in-memory store inside a commit, after conflict detection and before any
/// row is written.
pub const MEMORY_STORE_BEFORE_APPLY: &str = "memory_store.before_apply";

/// Returns an error when the fail point `name` is configured to `return`.
///
/// The optional parameter selects the error kind: `merge_conflict`, `io` or `store` (default).
pub fn etl_fail_point(name: &str) -> EtlResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("merge_conflict") => ErrorKind::MergeConflict,
            Some("io") => ErrorKind::IoError,
            _ => ErrorKind::StoreError,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}

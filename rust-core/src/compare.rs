//! compare.rs – сравнение двух xlsx-файлов по значениям ячеек

use std::path::Path;

use log::{debug, warn};

use crate::{config::LibraryConfig, workbook::Workbook};

/// `true` when both files load and hold the same sheet titles (same order)
/// with the same populated cell values. Formatting is not compared.
/// A file that cannot be loaded makes the result `false`.
pub fn documents_equal<A: AsRef<Path>, B: AsRef<Path>>(path_a: A, path_b: B) -> bool {
    documents_equal_with(path_a, path_b, &LibraryConfig::default())
}

pub fn documents_equal_with<A: AsRef<Path>, B: AsRef<Path>>(
    path_a: A,
    path_b: B,
    cfg: &LibraryConfig,
) -> bool {
    let (path_a, path_b) = (path_a.as_ref(), path_b.as_ref());
    let load = |p: &Path| match Workbook::open_with(p, cfg) {
        Ok(wb) => Some(wb),
        Err(e) => {
            warn!("cannot load {} for comparison: {e}", p.display());
            None
        }
    };
    let (Some(a), Some(b)) = (load(path_a), load(path_b)) else {
        return false;
    };
    let equal = a.content_eq(&b);
    debug!(
        "{} vs {}: {}",
        path_a.display(),
        path_b.display(),
        if equal { "equal" } else { "different" }
    );
    equal
}

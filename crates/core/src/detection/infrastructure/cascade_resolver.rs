//! Locates and loads the stock face and eye cascades.
use std::path::{Path, PathBuf};

use crate::shared::constants::{EYE_CASCADE_NAME, EYE_CASCADE_URL, FACE_CASCADE_NAME, FACE_CASCADE_URL};
use crate::shared::model_resolver::{self, ResolveError};

use super::cascade_detector::CascadeDetector;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadePaths {
    pub face: PathBuf,
    pub eye: PathBuf,
}

/// Resolve both cascade files, downloading whichever is missing.
pub fn resolve_cascades(bundled_dir: Option<&Path>) -> Result<CascadePaths, ResolveError> {
    Ok(CascadePaths {
        face: model_resolver::resolve(FACE_CASCADE_NAME, FACE_CASCADE_URL, bundled_dir)?,
        eye: model_resolver::resolve(EYE_CASCADE_NAME, EYE_CASCADE_URL, bundled_dir)?,
    })
}

/// Face and eye detectors, in that order.
pub fn load_detectors(
    bundled_dir: Option<&Path>,
) -> Result<(CascadeDetector, CascadeDetector), Box<dyn std::error::Error>> {
    let paths = resolve_cascades(bundled_dir)?;
    let face = CascadeDetector::load(&paths.face)?;
    let eye = CascadeDetector::load(&paths.eye)?;
    Ok((face, eye))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{NEVER_CASCADE_XML, SQUARE_CASCADE_XML};
    use std::fs;

    #[test]
    fn test_bundled_cascades_load_without_network() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FACE_CASCADE_NAME), SQUARE_CASCADE_XML).unwrap();
        fs::write(dir.path().join(EYE_CASCADE_NAME), NEVER_CASCADE_XML).unwrap();

        let paths = resolve_cascades(Some(dir.path())).unwrap();
        assert_eq!(paths.face, dir.path().join(FACE_CASCADE_NAME));
        assert_eq!(paths.eye, dir.path().join(EYE_CASCADE_NAME));
        assert!(load_detectors(Some(dir.path())).is_ok());
    }

    #[test]
    fn test_corrupt_bundled_cascade_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FACE_CASCADE_NAME), "garbage").unwrap();
        fs::write(dir.path().join(EYE_CASCADE_NAME), NEVER_CASCADE_XML).unwrap();

        assert!(load_detectors(Some(dir.path())).is_err());
    }
}

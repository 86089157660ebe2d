//! Boundary to image decoding.
//!
//! The catalog only deals in paths. Turning a path into voxel data is delegated to a
//! [`VolumeLoader`]. With the `nifti` feature enabled, [`NiftiLoader`] reads NIfTI files
//! into an `ndarray` array.

use std::path::Path;

pub trait VolumeLoader {
    type Volume;
    type Error;

    fn load(&self, path: &Path) -> Result<Self::Volume, Self::Error>;
}

#[cfg(feature = "nifti")]
pub use nifti_loader::NiftiLoader;

#[cfg(feature = "nifti")]
mod nifti_loader {
    use super::VolumeLoader;
    use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
    use std::path::Path;

    /// Reads a NIfTI-1 volume (`.nii` or `.nii.gz`) as `f64` voxels.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NiftiLoader;

    impl VolumeLoader for NiftiLoader {
        type Volume = ndarray::ArrayD<f64>;
        type Error = nifti::NiftiError;

        fn load(&self, path: &Path) -> Result<Self::Volume, Self::Error> {
            let object = ReaderOptions::new().read_file(path)?;
            object.into_volume().into_ndarray::<f64>()
        }
    }
}

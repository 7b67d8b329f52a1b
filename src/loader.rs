//! Reading input images into 8-bit grayscale buffers.

use std::path::Path;

use image::GrayImage;
use tracing::debug;

use crate::error::LoadError;
use crate::pgm::parse_pgm;

/// How image files are decoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LoaderStrategy {
    /// Any format supported by the `image` crate, converted to 8-bit luma.
    #[default]
    Decoder,
    /// Only PGM files (`P2`/`P5`), read by a small built-in parser.
    Pgm,
}

/// Check that `path` names an existing regular file.
pub fn validate_input(path: &Path) -> Result<(), LoadError> {
    let metadata = match path.metadata() {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if !metadata.is_file() {
        return Err(LoadError::NotRegularFile(path.to_path_buf()));
    }
    Ok(())
}

pub fn load_image(path: &Path, strategy: LoaderStrategy) -> Result<GrayImage, LoadError> {
    validate_input(path)?;
    let img = match strategy {
        LoaderStrategy::Decoder => image::open(path)
            .map_err(|source| LoadError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8(),
        LoaderStrategy::Pgm => {
            let data = std::fs::read(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            parse_pgm(&data).map_err(|message| LoadError::Pgm {
                path: path.to_path_buf(),
                message,
            })?
        }
    };
    debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        ?strategy,
        "image loaded"
    );
    Ok(img)
}

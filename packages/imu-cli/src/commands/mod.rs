pub mod analyze;
pub mod bands;
pub mod capture;

use imu_rs::BandSet;
use std::path::Path;

/// Bands from `path`, or the built-in set.
pub(crate) fn load_bands(path: Option<&Path>) -> Result<BandSet, String> {
    match path {
        Some(path) => BandSet::from_json_file(path).map_err(|e| e.to_string()),
        None => Ok(BandSet::default()),
    }
}

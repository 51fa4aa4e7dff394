//! Test suite for the data loader.
//!
//! Fixtures are written into a temporary data root shaped like the real
//! capture layout: one subfolder per category, instance tokens in the
//! filenames, and the two-line metadata preamble ahead of the data
//! header where the deployment uses one.

mod snapshot_tests;

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Data root with one soil and one TVWS file, both with the two-line
/// preamble and a header at row 2 (end-to-end scenario layout)
pub fn fixture_data_root(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path().join("Data");

    let soil = root.join("soil");
    fs::create_dir_all(&soil).unwrap();
    fs::write(
        soil.join("soil_1_a.csv"),
        "Sensor Name,Depth\n\
         probe2,-3\n\
         Date (Year-Mon-Day),Time (Hour-Min-Sec),Soil Moisture Value,Depth\n\
         2025-06-06,09-00-00,1831,-3\n\
         2025-06-06,09-00-05,1829,-3\n",
    )
    .unwrap();

    let tvws = root.join("tvws");
    fs::create_dir_all(&tvws).unwrap();
    fs::write(
        tvws.join("tvws_1_a.csv"),
        "Sensor Name,SpecialValue\n\
         node4,tower\n\
         Date (Year-Mon-Day),Time (Hour-Min-Sec),DRSSI\n\
         2025-06-06,09-00-02,-91.0\n\
         2025-06-06,09-00-07,-90.5\n",
    )
    .unwrap();

    root
}

pub fn columns(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

use assert_matches::assert_matches;

use kmz2shp::domain::{InputArchive, derive_output_name};
use kmz2shp::error::ConvertError;

#[test]
fn derive_output_name_cases() {
    assert_eq!(derive_output_name("20-006 GIS"), "20-006");
    assert_eq!(derive_output_name("20-006 gis"), "20-006");
    assert_eq!(derive_output_name("GIS 20-006"), " 20-006");
    assert_eq!(derive_output_name("Site Gis  "), "Site Gis");
    assert_eq!(derive_output_name("Logistics"), "Lotics");
    assert_eq!(derive_output_name("plain"), "plain");
}

#[test]
fn identifier_is_the_enumerated_path() {
    let input = InputArchive::new("/data/GIS KMZs/Region A/20-006 GIS.kmz");
    assert_eq!(input.as_str(), "/data/GIS KMZs/Region A/20-006 GIS.kmz");
    assert_eq!(input.output_name().unwrap(), "20-006");
}

#[test]
fn names_that_leave_the_output_root_are_rejected() {
    for path in ["/in/..kmz", "/in/...kmz", "/in/GIS..kmz", "/in/GIS.kmz", "/in/gis.kmz"] {
        assert_matches!(
            InputArchive::new(path).output_name(),
            Err(ConvertError::InvalidOutputName(name)) if name == path
        );
    }
    assert_eq!(InputArchive::new("/in/.hidden.kmz").output_name().unwrap(), ".hidden");
}

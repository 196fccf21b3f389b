use std::fs;

use assert_matches::assert_matches;

use kmz2shp::config::{Config, ConfigLoader, Overrides};
use kmz2shp::domain::VectorDriver;
use kmz2shp::error::ConvertError;

#[test]
fn parse_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kmz2shp.json");
    fs::write(
        &path,
        r#"{
            "input_root": "/srv/kmz",
            "output_root": "/srv/shp",
            "workspace_dir": "scratch",
            "driver": "ESRI Shapefile",
            "layer_options": ["ENCODING=UTF-8"]
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str(), Overrides::default()).unwrap();
    assert_eq!(resolved.workspace_path().as_str(), "/srv/kmz/scratch");
    assert_eq!(
        resolved.ledger_path().as_str(),
        "/srv/shp/PreviouslyConvertedFiles.txt"
    );
    assert_eq!(resolved.driver, VectorDriver::EsriShapefile);
    assert_eq!(resolved.layer_options, vec!["ENCODING=UTF-8".to_string()]);
}

#[test]
fn explicit_missing_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str(), Overrides::default()),
        Err(ConvertError::ConfigRead(_))
    );
}

#[test]
fn relative_roots_become_absolute() {
    let config = Config {
        input_root: Some("kmz".to_string()),
        output_root: Some("shp".to_string()),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config, Overrides::default()).unwrap();
    assert!(resolved.input_root.is_absolute());
    assert!(resolved.output_root.ends_with("shp"));
}

#[test]
fn empty_workspace_name_is_rejected() {
    let config = Config {
        input_root: Some("/srv/kmz".to_string()),
        output_root: Some("/srv/shp".to_string()),
        workspace_dir: Some(" ".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config, Overrides::default()),
        Err(ConvertError::ConfigParse(_))
    );
}

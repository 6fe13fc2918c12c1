use keelgraph::{
    Model, ModelRegistry, ModelVersion, VersionConverter, load_conversion_from_path,
};
use std::path::PathBuf;

pub fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

pub fn load_model(name: &str) -> Model {
    Model::load_from_path(&testdata(name))
        .unwrap_or_else(|e| panic!("failed to load fixture {name}: {e:#}"))
}

pub fn version(label: &str) -> ModelVersion {
    ModelVersion(label.to_string())
}

/// All fixture releases, registered oldest first.
pub fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    for fixture in [
        "taxonomy-3-4a.json",
        "taxonomy-3-5a.json",
        "taxonomy-3-6a.json",
    ] {
        registry
            .register(load_model(fixture))
            .expect("fixture registration failed");
    }
    registry
}

pub fn converter(registry: &ModelRegistry) -> VersionConverter<'_> {
    let mut converter = VersionConverter::new(registry);
    for fixture in ["conversion-3-5a.json", "conversion-3-6a.json"] {
        let document = load_conversion_from_path(&testdata(fixture))
            .unwrap_or_else(|e| panic!("failed to load fixture {fixture}: {e:#}"));
        converter
            .add_table(&document)
            .expect("conversion table registration failed");
    }
    converter
}

//! Ordered asset resolution: probe candidates by priority, load the first hit.

use anyhow::Result;

use crate::{
    error::{AssetError, AssetResult},
    fbx, glb,
    manifest::{AssetManifest, ModelFormat},
    mesh::SceneObject,
    obj,
    source::{AssetSource, DefaultSource},
    texture::TextureData,
};

/// Turns fetched bytes into a scene object for one format.
pub trait ModelLoader: Send {
    fn parse(&self, format: ModelFormat, bytes: &[u8]) -> Result<SceneObject>;
}

/// The built-in GLB / OBJ / FBX parsers.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormatLoader;

impl ModelLoader for FormatLoader {
    fn parse(&self, format: ModelFormat, bytes: &[u8]) -> Result<SceneObject> {
        match format {
            ModelFormat::Glb => glb::load_glb_from_bytes(bytes),
            ModelFormat::Obj => obj::load_obj_from_bytes(bytes),
            ModelFormat::Fbx => fbx::load_fbx_from_bytes(bytes),
        }
    }
}

pub struct AssetResolver<S = DefaultSource, L = FormatLoader> {
    source: S,
    loader: L,
}

impl Default for AssetResolver {
    fn default() -> Self {
        Self::new(DefaultSource::default(), FormatLoader)
    }
}

impl<S: AssetSource, L: ModelLoader> AssetResolver<S, L> {
    pub fn new(source: S, loader: L) -> Self {
        Self { source, loader }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// `true` if `location` exists. Failures are logged and read as absent.
    pub fn probe(&self, location: &str) -> bool {
        match self.source.probe(location) {
            Ok(()) => {
                log::debug!("probe {}: found", location);
                true
            }
            Err(e) => {
                log::debug!("{}", e);
                false
            }
        }
    }

    /// First candidate (glb, then obj, then fbx) whose probe succeeds. Later
    /// candidates are not probed once one is found.
    pub fn resolve_first_available(
        &self,
        manifest: &AssetManifest,
    ) -> AssetResult<(ModelFormat, String)> {
        let mut tried = Vec::new();
        for (format, location) in manifest.candidates() {
            if self.probe(location) {
                log::info!("Using {} asset {}", format, location);
                return Ok((format, location.to_owned()));
            }
            tried.push(location.to_owned());
        }
        Err(AssetError::NoAssetFound { tried })
    }

    pub fn load(&self, location: &str, format: ModelFormat) -> AssetResult<SceneObject> {
        let load_err = |source| AssetError::Load {
            location: location.to_owned(),
            format,
            source,
        };
        let bytes = self.source.fetch(location).map_err(load_err)?;
        let object = self.loader.parse(format, &bytes).map_err(load_err)?;
        log::info!(
            "Loaded {}: {} meshes, {} vertices, {} triangles",
            location,
            object.meshes.len(),
            object.vertex_count(),
            object.triangle_count()
        );
        Ok(object)
    }

    pub fn load_poster(&self, location: &str) -> AssetResult<TextureData> {
        self.source
            .fetch(location)
            .and_then(|bytes| TextureData::from_bytes(&bytes))
            .map_err(|source| AssetError::Poster {
                location: location.to_owned(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    /// In-memory source that records every call.
    #[derive(Default)]
    struct MemorySource {
        files: HashMap<String, Vec<u8>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MemorySource {
        fn with(mut self, location: &str, bytes: &[u8]) -> Self {
            self.files.insert(location.to_owned(), bytes.to_vec());
            self
        }
    }

    impl AssetSource for MemorySource {
        fn probe(&self, location: &str) -> Result<(), AssetError> {
            self.calls.lock().unwrap().push(format!("probe {location}"));
            if self.files.contains_key(location) {
                Ok(())
            } else {
                Err(AssetError::ProbeFailure {
                    location: location.to_owned(),
                    reason: "404".into(),
                })
            }
        }

        fn fetch(&self, location: &str) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(format!("fetch {location}"));
            self.files
                .get(location)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404"))
        }
    }

    fn manifest() -> AssetManifest {
        AssetManifest::from_base("x")
    }

    #[test]
    fn glb_wins_without_probing_others() {
        let src = MemorySource::default()
            .with("x.glb", &glb::tests::triangle_glb(0.0, false))
            .with("x.obj", b"v 0 0 0\n");
        let calls = src.calls.clone();
        let resolver = AssetResolver::new(src, FormatLoader);

        let (format, location) = resolver.resolve_first_available(&manifest()).unwrap();
        assert_eq!((format, location.as_str()), (ModelFormat::Glb, "x.glb"));
        assert_eq!(*calls.lock().unwrap(), vec!["probe x.glb".to_owned()]);

        let obj = resolver.load(&location, format).unwrap();
        assert_eq!(obj.meshes.len(), 1);
    }

    #[test]
    fn falls_through_to_fbx() {
        let src = MemorySource::default().with("x.fbx", &fbx::tests::quad_fbx(false, false));
        let resolver = AssetResolver::new(src, FormatLoader);
        let (format, location) = resolver.resolve_first_available(&manifest()).unwrap();
        assert_eq!(format, ModelFormat::Fbx);
        assert_eq!(resolver.load(&location, format).unwrap().triangle_count(), 2);
    }

    #[test]
    fn nothing_found_lists_every_candidate() {
        let resolver = AssetResolver::new(MemorySource::default(), FormatLoader);
        match resolver.resolve_first_available(&manifest()) {
            Err(AssetError::NoAssetFound { tried }) => {
                assert_eq!(tried, vec!["x.glb", "x.obj", "x.fbx"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn corrupt_asset_is_a_load_error() {
        let src = MemorySource::default().with("x.obj", b"f 1 2 3\n");
        let resolver = AssetResolver::new(src, FormatLoader);
        let err = resolver.load("x.obj", ModelFormat::Obj).unwrap_err();
        assert!(matches!(err, AssetError::Load { format: ModelFormat::Obj, .. }));
        assert!(resolver.load("x.glb", ModelFormat::Glb).is_err());
    }

    #[test]
    fn poster_must_decode() {
        let src = MemorySource::default().with("x.png", b"garbage");
        let resolver = AssetResolver::new(src, FormatLoader);
        assert!(matches!(
            resolver.load_poster("x.png"),
            Err(AssetError::Poster { .. })
        ));
    }
}

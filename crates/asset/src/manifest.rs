//! Candidate asset locations and their preference order.

use std::fmt;

/// 3D formats the viewer can load, in no particular order; see
/// [`ModelFormat::PRIORITY`] for probing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Glb,
    Obj,
    Fbx,
}

impl ModelFormat {
    /// Probing order: the first format found wins.
    pub const PRIORITY: [ModelFormat; 3] = [ModelFormat::Glb, ModelFormat::Obj, ModelFormat::Fbx];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Glb => "glb",
            Self::Obj => "obj",
            Self::Fbx => "fbx",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Where each candidate lives. Locations are file paths or `http(s)://` URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetManifest {
    pub glb: String,
    pub obj: String,
    pub fbx: String,
    /// Terminal fallback; never loaded as a model.
    pub poster: String,
}

impl AssetManifest {
    pub const DEFAULT_BASE: &'static str = "assets/rubble1";

    /// `base` + `.glb` / `.obj` / `.fbx` / `.png`.
    pub fn from_base(base: &str) -> Self {
        Self {
            glb: format!("{base}.glb"),
            obj: format!("{base}.obj"),
            fbx: format!("{base}.fbx"),
            poster: format!("{base}.png"),
        }
    }

    pub fn location(&self, format: ModelFormat) -> &str {
        match format {
            ModelFormat::Glb => &self.glb,
            ModelFormat::Obj => &self.obj,
            ModelFormat::Fbx => &self.fbx,
        }
    }

    /// Model candidates in priority order.
    pub fn candidates(&self) -> impl Iterator<Item = (ModelFormat, &str)> {
        ModelFormat::PRIORITY
            .into_iter()
            .map(move |f| (f, self.location(f)))
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self::from_base(Self::DEFAULT_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_paths() {
        let m = AssetManifest::default();
        assert_eq!(m.glb, "assets/rubble1.glb");
        assert_eq!(m.poster, "assets/rubble1.png");
    }

    #[test]
    fn candidates_follow_priority_and_skip_poster() {
        let m = AssetManifest::from_base("https://example.org/scan");
        let c: Vec<_> = m.candidates().collect();
        assert_eq!(
            c,
            vec![
                (ModelFormat::Glb, "https://example.org/scan.glb"),
                (ModelFormat::Obj, "https://example.org/scan.obj"),
                (ModelFormat::Fbx, "https://example.org/scan.fbx"),
            ]
        );
    }
}

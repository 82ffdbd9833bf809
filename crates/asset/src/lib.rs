//! Scan asset pipeline: format loaders (GLB, OBJ, FBX), poster decoding,
//! the asset manifest, file/HTTP sources, ordered resolution and
//! normalization of loaded objects.

pub mod error;
pub mod fbx;
pub mod glb;
pub mod manifest;
pub mod material;
pub mod mesh;
pub mod normalize;
pub mod obj;
pub mod resolver;
pub mod source;
pub mod texture;

pub use error::{AssetError, AssetResult};
pub use manifest::{AssetManifest, ModelFormat};
pub use mesh::{GeometryLimit, MeshData, MeshVertex, SceneMesh, SceneObject};
pub use normalize::{NormalizedSceneObject, normalize};
pub use resolver::{AssetResolver, FormatLoader, ModelLoader};
pub use source::{AssetSource, DefaultSource, FileSource, HttpSource};
pub use texture::TextureData;

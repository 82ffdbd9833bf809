//! Surface materials attached to loaded meshes.

/// Minimal PBR-style surface description.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA.
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
}

impl Material {
    /// Plain light-grey matte surface assigned to meshes that arrive without a
    /// usable material (common for raw scans). sRGB `#bec3c7`.
    pub fn default_matte() -> Self {
        Self {
            name: "default_matte".to_owned(),
            base_color: srgb_hex(0xbec3c7),
            roughness: 0.96,
            metalness: 0.0,
        }
    }

    /// Material known only by name (OBJ `usemtl` without a material library).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default_matte()
        }
    }
}

/// What a mesh carries in its material slot.
#[derive(Clone, Debug, PartialEq)]
pub enum MaterialSlot {
    Missing,
    Single(Material),
    /// Per-face-group materials. The renderer draws one material per mesh,
    /// so these are replaced during normalization.
    Multi(Vec<Material>),
}

impl MaterialSlot {
    /// Collapse a list of material names into a slot.
    pub fn from_names(mut names: Vec<String>) -> Self {
        match names.len() {
            0 => Self::Missing,
            1 => Self::Single(Material::named(names.remove(0))),
            _ => Self::Multi(names.into_iter().map(Material::named).collect()),
        }
    }

    pub fn single(&self) -> Option<&Material> {
        match self {
            Self::Single(m) => Some(m),
            _ => None,
        }
    }
}

/// Decode a packed `0xRRGGBB` sRGB color into linear RGBA.
pub fn srgb_hex(hex: u32) -> [f32; 4] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0), 1.0]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

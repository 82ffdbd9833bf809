//! Binary FBX (7.x) geometry loader.
//!
//! Reads the node-record tree, then pulls every `Objects/Geometry` node that
//! carries `Vertices` + `PolygonVertexIndex`. Polygons are fan-triangulated
//! with one output vertex per polygon corner. Model transforms and
//! connections are not applied; the viewer re-centers and rescales anyway.

use std::io::Read;

use anyhow::{Context, Result, anyhow, bail};
use flate2::read::ZlibDecoder;

use crate::{
    material::MaterialSlot,
    mesh::{MeshData, MeshVertex, SceneMesh, SceneObject},
    source::MAX_ASSET_BYTES,
};

const MAGIC: &[u8; 23] = b"Kaydara FBX Binary  \x00\x1a\x00";
/// Real files nest well under ten levels.
const MAX_DEPTH: usize = 64;

/// Decoded property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    I16(i16),
    Bool(bool),
    I32(i32),
    F32(f32),
    F64(f64),
    I64(i64),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    I64Array(Vec<i64>),
    I32Array(Vec<i32>),
    BoolArray(Vec<bool>),
    String(String),
    Raw(Vec<u8>),
}

impl Property {
    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric arrays widened to f64.
    fn to_f64s(&self) -> Option<Vec<f64>> {
        match self {
            Self::F64Array(v) => Some(v.clone()),
            Self::F32Array(v) => Some(v.iter().map(|&f| f as f64).collect()),
            _ => None,
        }
    }

    fn as_i32s(&self) -> Option<&[i32]> {
        match self {
            Self::I32Array(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn first_str(&self) -> Option<&str> {
        self.properties.first().and_then(Property::as_str)
    }
}

/// Parsed FBX document: format version and top-level nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub version: u32,
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Load all mesh geometry from a binary FBX.
pub fn load_fbx_from_bytes(bytes: &[u8]) -> Result<SceneObject> {
    let doc = parse_document(bytes)?;
    let objects = doc.node("Objects").context("FBX has no Objects section")?;

    let mut meshes = Vec::new();
    for geometry in objects.children_named("Geometry") {
        if geometry.child("Vertices").is_none() {
            continue;
        }
        let name = object_name(geometry);
        let data = read_geometry(geometry).with_context(|| format!("Bad FBX geometry '{}'", name))?;
        meshes.push(SceneMesh {
            name,
            data,
            material: MaterialSlot::Missing,
        });
    }

    if meshes.is_empty() {
        bail!("FBX contains no mesh geometry");
    }
    log::debug!("FBX v{}: {} geometries", doc.version, meshes.len());
    Ok(SceneObject::new(meshes))
}

/// Parse the node tree of a binary FBX file.
pub fn parse_document(bytes: &[u8]) -> Result<Document> {
    if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
        bail!("Not a binary FBX file (ASCII FBX is not supported)");
    }
    let mut r = Reader {
        data: bytes,
        pos: MAGIC.len(),
        wide: false,
    };
    let version = r.u32()?;
    r.wide = version >= 7500;

    let mut nodes = Vec::new();
    while r.remaining() >= r.record_header_len() {
        match read_node(&mut r, 0)? {
            Some(node) => nodes.push(node),
            None => break,
        }
    }
    Ok(Document { version, nodes })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    /// 64-bit record header fields (7.5+).
    wide: bool,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn record_header_len(&self) -> usize {
        if self.wide { 25 } else { 13 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| anyhow!("Unexpected end of FBX data at offset {}", self.pos))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Record header field: u32 before 7.5, u64 after.
    fn offset(&mut self) -> Result<u64> {
        if self.wide {
            Ok(u64::from_le_bytes(self.array()?))
        } else {
            Ok(self.u32()? as u64)
        }
    }
}

/// `None` marks the null record that terminates a node list.
fn read_node(r: &mut Reader, depth: usize) -> Result<Option<Node>> {
    if depth > MAX_DEPTH {
        bail!("FBX nodes nested deeper than {} levels", MAX_DEPTH);
    }
    let start = r.pos;
    let end = r.offset()?;
    let num_props = r.offset()?;
    let _props_len = r.offset()?;
    let name_len = r.u8()? as usize;
    if end == 0 {
        return Ok(None);
    }
    let end = usize::try_from(end)?;
    if end <= start || end > r.data.len() {
        bail!("FBX node at offset {} has bad end offset {}", start, end);
    }

    let name = String::from_utf8_lossy(r.bytes(name_len)?).into_owned();
    let mut properties = Vec::with_capacity(num_props.min(64) as usize);
    for _ in 0..num_props {
        properties.push(read_property(r).with_context(|| format!("In FBX node '{}'", name))?);
    }

    let mut children = Vec::new();
    while r.pos < end {
        match read_node(r, depth + 1)? {
            Some(child) => children.push(child),
            None => break,
        }
    }
    r.pos = end;

    Ok(Some(Node {
        name,
        properties,
        children,
    }))
}

fn read_property(r: &mut Reader) -> Result<Property> {
    let code = r.u8()?;
    let prop = match code {
        b'Y' => Property::I16(i16::from_le_bytes(r.array()?)),
        b'C' => Property::Bool(r.u8()? != 0),
        b'I' => Property::I32(i32::from_le_bytes(r.array()?)),
        b'F' => Property::F32(f32::from_le_bytes(r.array()?)),
        b'D' => Property::F64(f64::from_le_bytes(r.array()?)),
        b'L' => Property::I64(i64::from_le_bytes(r.array()?)),
        b'f' => Property::F32Array(read_array(r, 4, |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))?),
        b'i' => Property::I32Array(read_array(r, 4, |b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))?),
        b'd' => Property::F64Array(read_array(r, 8, |b| {
            f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })?),
        b'l' => Property::I64Array(read_array(r, 8, |b| {
            i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })?),
        b'b' => Property::BoolArray(read_array(r, 1, |b| b[0] != 0)?),
        b'S' => {
            let len = r.u32()? as usize;
            Property::String(String::from_utf8_lossy(r.bytes(len)?).into_owned())
        }
        b'R' => {
            let len = r.u32()? as usize;
            Property::Raw(r.bytes(len)?.to_vec())
        }
        other => bail!("Unknown FBX property type {:?}", other as char),
    };
    Ok(prop)
}

/// Array header: element count, encoding (0 raw, 1 zlib), stored byte length.
fn read_array<T>(r: &mut Reader, elem_size: usize, decode: impl Fn(&[u8]) -> T) -> Result<Vec<T>> {
    let count = r.u32()? as usize;
    let encoding = r.u32()?;
    let stored_len = r.u32()? as usize;
    let stored = r.bytes(stored_len)?;

    let expected = count
        .checked_mul(elem_size)
        .filter(|&n| n as u64 <= MAX_ASSET_BYTES)
        .ok_or_else(|| anyhow!("FBX array too large ({} elements)", count))?;
    let raw = match encoding {
        0 => stored.to_vec(),
        1 => {
            // One extra byte so an oversized stream shows up as a length mismatch.
            let mut out = Vec::new();
            ZlibDecoder::new(stored)
                .take(expected as u64 + 1)
                .read_to_end(&mut out)
                .context("Failed to inflate FBX array")?;
            out
        }
        other => bail!("Unknown FBX array encoding {}", other),
    };
    if raw.len() != expected {
        bail!(
            "FBX array holds {} bytes, expected {} ({} x {})",
            raw.len(),
            expected,
            count,
            elem_size
        );
    }
    Ok(raw.chunks_exact(elem_size).map(decode).collect())
}

/// Object names are stored as `name\0\x01Class`.
fn object_name(node: &Node) -> String {
    node.properties
        .get(1)
        .and_then(Property::as_str)
        .and_then(|s| s.split("\u{0}\u{1}").next())
        .filter(|s| !s.is_empty())
        .unwrap_or("geometry")
        .to_owned()
}

enum NormalMapping {
    PerCorner,
    PerControlPoint,
}

struct Normals {
    mapping: NormalMapping,
    values: Vec<f64>,
    index: Option<Vec<i32>>,
}

impl Normals {
    fn read(geometry: &Node) -> Option<Self> {
        let layer = geometry.child("LayerElementNormal")?;
        let mapping = match layer.child("MappingInformationType")?.first_str()? {
            "ByPolygonVertex" => NormalMapping::PerCorner,
            "ByVertice" | "ByVertex" | "ByControlPoint" => NormalMapping::PerControlPoint,
            other => {
                log::debug!("Unsupported FBX normal mapping '{}'", other);
                return None;
            }
        };
        let values = layer.child("Normals")?.properties.first()?.to_f64s()?;
        let index = match layer.child("ReferenceInformationType")?.first_str()? {
            "Direct" => None,
            "IndexToDirect" | "Index" => Some(layer.child("NormalsIndex")?.properties.first()?.as_i32s()?.to_vec()),
            _ => return None,
        };
        Some(Self {
            mapping,
            values,
            index,
        })
    }

    fn get(&self, corner: usize, control_point: usize) -> Option<[f32; 3]> {
        let slot = match self.mapping {
            NormalMapping::PerCorner => corner,
            NormalMapping::PerControlPoint => control_point,
        };
        let slot = match &self.index {
            Some(index) => usize::try_from(*index.get(slot)?).ok()?,
            None => slot,
        };
        let n = self.values.get(slot * 3..slot * 3 + 3)?;
        Some([n[0] as f32, n[1] as f32, n[2] as f32])
    }
}

fn read_geometry(geometry: &Node) -> Result<MeshData> {
    let points = geometry
        .child("Vertices")
        .and_then(|n| n.properties.first())
        .and_then(Property::to_f64s)
        .context("Geometry has no vertex array")?;
    if points.len() % 3 != 0 {
        bail!("Vertex array length {} is not a multiple of 3", points.len());
    }
    let polygon_index = geometry
        .child("PolygonVertexIndex")
        .and_then(|n| n.properties.first())
        .and_then(Property::as_i32s)
        .context("Geometry has no PolygonVertexIndex")?;

    let normals = Normals::read(geometry);
    let point_count = points.len() / 3;

    let mut vertices: Vec<MeshVertex> = Vec::with_capacity(polygon_index.len());
    let mut indices: Vec<u32> = Vec::new();
    let mut polygon: Vec<u32> = Vec::new();
    let mut missing_normal = normals.is_none();

    for (corner, &raw) in polygon_index.iter().enumerate() {
        // Negative entries close a polygon and store `!index`.
        let (cp, closes) = if raw < 0 { (!raw, true) } else { (raw, false) };
        let cp = cp as usize;
        if cp >= point_count {
            bail!("Control point {} out of range ({} points)", cp, point_count);
        }
        let position = [
            points[cp * 3] as f32,
            points[cp * 3 + 1] as f32,
            points[cp * 3 + 2] as f32,
        ];
        let normal = match normals.as_ref().and_then(|n| n.get(corner, cp)) {
            Some(n) => n,
            None => {
                missing_normal = true;
                [0.0, 0.0, 1.0]
            }
        };
        polygon.push(u32::try_from(vertices.len())?);
        vertices.push(MeshVertex::new(position, normal, [0.0, 0.0]));

        if closes {
            for tri in 1..polygon.len().saturating_sub(1) {
                indices.extend_from_slice(&[polygon[0], polygon[tri], polygon[tri + 1]]);
            }
            polygon.clear();
        }
    }

    let mut data = MeshData::new(vertices, indices);
    if !data.is_valid() {
        bail!("Geometry has no complete polygons");
    }
    if missing_normal {
        data.compute_normals();
    }
    Ok(data)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::{Compression, write::ZlibEncoder};
    use std::io::Write;

    pub(crate) struct TNode {
        name: &'static str,
        props: Vec<Vec<u8>>,
        children: Vec<TNode>,
    }

    fn node(name: &'static str, props: Vec<Vec<u8>>, children: Vec<TNode>) -> TNode {
        TNode {
            name,
            props,
            children,
        }
    }

    fn p_str(s: &str) -> Vec<u8> {
        let mut out = vec![b'S'];
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn p_i64(v: i64) -> Vec<u8> {
        let mut out = vec![b'L'];
        out.extend_from_slice(&v.to_le_bytes());
        out
    }

    fn p_array(code: u8, count: usize, raw: Vec<u8>, compress: bool) -> Vec<u8> {
        let (encoding, stored) = if compress {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(&raw).unwrap();
            (1u32, enc.finish().unwrap())
        } else {
            (0u32, raw)
        };
        let mut out = vec![code];
        out.extend_from_slice(&(count as u32).to_le_bytes());
        out.extend_from_slice(&encoding.to_le_bytes());
        out.extend_from_slice(&(stored.len() as u32).to_le_bytes());
        out.extend_from_slice(&stored);
        out
    }

    fn p_f64s(v: &[f64], compress: bool) -> Vec<u8> {
        p_array(b'd', v.len(), v.iter().flat_map(|f| f.to_le_bytes()).collect(), compress)
    }

    fn p_i32s(v: &[i32]) -> Vec<u8> {
        p_array(b'i', v.len(), v.iter().flat_map(|f| f.to_le_bytes()).collect(), false)
    }

    fn write_node(out: &mut Vec<u8>, n: &TNode) {
        let start = out.len();
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(n.props.len() as u32).to_le_bytes());
        out.extend_from_slice(&(n.props.iter().map(Vec::len).sum::<usize>() as u32).to_le_bytes());
        out.push(n.name.len() as u8);
        out.extend_from_slice(n.name.as_bytes());
        for p in &n.props {
            out.extend_from_slice(p);
        }
        for c in &n.children {
            write_node(out, c);
        }
        if !n.children.is_empty() {
            out.extend_from_slice(&[0u8; 13]);
        }
        let end = out.len() as u32;
        out[start..start + 4].copy_from_slice(&end.to_le_bytes());
    }

    fn build_fbx(nodes: &[TNode]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&7400u32.to_le_bytes());
        for n in nodes {
            write_node(&mut out, n);
        }
        out.extend_from_slice(&[0u8; 13]);
        out
    }

    /// A unit quad in the XY plane as one FBX polygon.
    pub(crate) fn quad_fbx(with_normals: bool, compress: bool) -> Vec<u8> {
        let mut geometry_children = vec![
            node(
                "Vertices",
                vec![p_f64s(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0], compress)],
                vec![],
            ),
            node("PolygonVertexIndex", vec![p_i32s(&[0, 1, 2, -4])], vec![]),
        ];
        if with_normals {
            geometry_children.push(node(
                "LayerElementNormal",
                vec![],
                vec![
                    node("MappingInformationType", vec![p_str("ByVertice")], vec![]),
                    node("ReferenceInformationType", vec![p_str("Direct")], vec![]),
                    node("Normals", vec![p_f64s(&[0.0f64, 0.0, -1.0].repeat(4), false)], vec![]),
                ],
            ));
        }
        build_fbx(&[
            node("FBXHeaderExtension", vec![], vec![node("FBXVersion", vec![], vec![])]),
            node(
                "Objects",
                vec![],
                vec![node(
                    "Geometry",
                    vec![p_i64(42), p_str("Rubble\u{0}\u{1}Geometry"), p_str("Mesh")],
                    geometry_children,
                )],
            ),
        ])
    }

    #[test]
    fn parses_node_tree() {
        let doc = parse_document(&quad_fbx(false, false)).expect("parse");
        assert_eq!(doc.version, 7400);
        assert_eq!(doc.nodes.len(), 2);
        let geometry = doc.node("Objects").and_then(|o| o.child("Geometry")).unwrap();
        assert_eq!(geometry.properties[0], Property::I64(42));
        assert_eq!(object_name(geometry), "Rubble");
    }

    #[test]
    fn loads_quad_as_two_triangles() {
        let obj = load_fbx_from_bytes(&quad_fbx(false, true)).expect("load");
        assert_eq!(obj.meshes.len(), 1);
        let mesh = &obj.meshes[0];
        assert_eq!(mesh.name, "Rubble");
        assert_eq!(mesh.data.vertices.len(), 4);
        assert_eq!(mesh.data.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.data.vertices[2].position, [1.0, 1.0, 0.0]);
        // Generated from winding.
        assert_eq!(mesh.data.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.material, MaterialSlot::Missing);
    }

    #[test]
    fn uses_stored_normals() {
        let obj = load_fbx_from_bytes(&quad_fbx(true, false)).expect("load");
        assert_eq!(obj.meshes[0].data.vertices[3].normal, [0.0, 0.0, -1.0]);
    }

    #[test]
    fn rejects_array_with_inflated_count() {
        let mut prop = p_f64s(&[1.0, 2.0, 3.0], true);
        prop[1..5].copy_from_slice(&u32::MAX.to_le_bytes());
        let bytes = build_fbx(&[node(
            "Objects",
            vec![],
            vec![node("Geometry", vec![], vec![node("Vertices", vec![prop], vec![])])],
        )]);
        let err = parse_document(&bytes).unwrap_err();
        assert!(format!("{:#}", err).contains("too large"), "{:#}", err);
    }

    #[test]
    fn rejects_array_longer_than_count() {
        let mut prop = p_f64s(&[1.0, 2.0, 3.0, 4.0], true);
        prop[1..5].copy_from_slice(&2u32.to_le_bytes());
        let bytes = build_fbx(&[node("Vertices", vec![prop], vec![])]);
        let err = parse_document(&bytes).unwrap_err();
        assert!(format!("{:#}", err).contains("expected 16"), "{:#}", err);
    }

    #[test]
    fn rejects_deep_nesting() {
        let mut deep = node("Leaf", vec![], vec![]);
        for _ in 0..MAX_DEPTH + 1 {
            deep = node("Nest", vec![], vec![deep]);
        }
        let err = parse_document(&build_fbx(&[deep])).unwrap_err();
        assert!(format!("{:#}", err).contains("nested deeper"), "{:#}", err);

        let mut shallow = node("Leaf", vec![], vec![]);
        for _ in 0..8 {
            shallow = node("Nest", vec![], vec![shallow]);
        }
        assert!(parse_document(&build_fbx(&[shallow])).is_ok());
    }

    #[test]
    fn rejects_ascii_and_truncated() {
        assert!(load_fbx_from_bytes(b"; FBX 7.4.0 project file\nFBXHeaderExtension: {\n").is_err());
        let mut bytes = quad_fbx(false, false);
        bytes.truncate(60);
        assert!(load_fbx_from_bytes(&bytes).is_err());
    }
}

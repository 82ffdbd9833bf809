//! Wavefront OBJ loader. Positions, normals, texture coordinates, `o`/`g`
//! grouping and `usemtl` names; material libraries are not read.

use std::{
    collections::HashMap,
    io::{self, BufRead},
};

use anyhow::{Context, Result, anyhow};

use crate::{
    material::MaterialSlot,
    mesh::{MeshData, MeshVertex, SceneMesh, SceneObject},
};

/// Parse OBJ text from raw bytes.
pub fn load_obj_from_bytes(bytes: &[u8]) -> Result<SceneObject> {
    parse_obj(io::Cursor::new(bytes))
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> Result<SceneObject> {
    parse_obj(io::Cursor::new(contents))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Key(usize, Option<usize>, Option<usize>);

/// Mesh being accumulated until the next `o`/`g` or end of input.
#[derive(Default)]
struct Group {
    name: String,
    unique: HashMap<Key, u32>,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    materials: Vec<String>,
    has_normals: bool,
}

impl Group {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    fn finish(self, out: &mut Vec<SceneMesh>) {
        if self.indices.is_empty() {
            return;
        }
        let mut data = MeshData::new(self.vertices, self.indices);
        if !self.has_normals {
            data.compute_normals();
        }
        out.push(SceneMesh {
            name: self.name,
            data,
            material: MaterialSlot::from_names(self.materials),
        });
    }
}

fn parse_obj<R: BufRead>(reader: R) -> Result<SceneObject> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();

    let mut meshes: Vec<SceneMesh> = Vec::new();
    let mut group = Group::named("default");

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed OBJ line {}: '{}'", line_no + 1, trimmed))?;

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                normals.push([nx, ny, nz]);
            }
            "o" | "g" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                let next = Group::named(if name.is_empty() { "default" } else { &name });
                std::mem::replace(&mut group, next).finish(&mut meshes);
            }
            "usemtl" => {
                if let Some(name) = parts.next() {
                    if !group.materials.iter().any(|m| m == name) {
                        group.materials.push(name.to_owned());
                    }
                }
            }
            "f" => {
                let mut face: Vec<u32> = Vec::new();
                for part in parts {
                    let (vi, vti, vni) = parse_face_vertex(
                        part,
                        positions.len(),
                        texcoords.len(),
                        normals.len(),
                        line_no,
                    )?;
                    let key = Key(vi, vti, vni);
                    let index = match group.unique.get(&key) {
                        Some(&idx) => idx,
                        None => {
                            let position = positions[vi];
                            let uv = vti.map(|i| texcoords[i]).unwrap_or([0.0, 0.0]);
                            let normal = match vni {
                                Some(i) => {
                                    group.has_normals = true;
                                    normals[i]
                                }
                                None => [0.0, 0.0, 1.0],
                            };

                            let idx = u32::try_from(group.vertices.len())
                                .map_err(|_| anyhow!("Too many vertices in OBJ (>{})", u32::MAX))?;
                            group.vertices.push(MeshVertex::new(position, normal, uv));
                            group.unique.insert(key, idx);
                            idx
                        }
                    };
                    face.push(index);
                }

                if face.len() < 3 {
                    continue;
                }
                for tri in 1..(face.len() - 1) {
                    group.indices.extend_from_slice(&[face[0], face[tri], face[tri + 1]]);
                }
            }
            _ => {
                // mtllib, s, l, p and friends carry nothing we draw.
            }
        }
    }
    group.finish(&mut meshes);

    if meshes.is_empty() {
        anyhow::bail!("OBJ contained no triangles");
    }
    Ok(SceneObject::new(meshes))
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> Result<(usize, Option<usize>, Option<usize>)> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .ok_or_else(|| anyhow!("Malformed face element '{}' on line {}", token, line_no + 1))?;
    let pos_idx = resolve_index(pos, pos_count, line_no)?;

    let tex_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let norm_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    Ok((pos_idx, tex_idx, norm_idx))
}

/// 1-based, negative counts back from the current end.
fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i64>()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no + 1))?;
    if raw == 0 {
        anyhow::bail!("OBJ indices are 1-based; found 0 on line {}", line_no + 1);
    }

    let idx = if raw > 0 { raw - 1 } else { len as i64 + raw };
    if idx < 0 || idx as usize >= len {
        anyhow::bail!(
            "OBJ index {} resolved out of bounds (len={}) on line {}",
            raw,
            len,
            line_no + 1
        );
    }

    Ok(idx as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialSlot;

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let obj = load_obj_from_str(src).expect("parse triangle");
        assert_eq!(obj.meshes.len(), 1);
        let mesh = &obj.meshes[0].data;
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices.len(), 3);
        assert_eq!(obj.meshes[0].material, MaterialSlot::Missing);
    }

    #[test]
    fn quad_is_fan_triangulated_with_negative_indices() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf -4 -3 -2 -1\n";
        let obj = load_obj_from_str(src).unwrap();
        assert_eq!(obj.meshes[0].data.indices, vec![0, 1, 2, 0, 2, 3]);
        // No `vn`: normals are generated.
        assert_eq!(obj.meshes[0].data.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn groups_split_meshes_and_track_materials() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
o rock
usemtl stone
f 1 2 3
o debris
usemtl stone
usemtl dirt
f 3 2 1
";
        let obj = load_obj_from_str(src).unwrap();
        assert_eq!(obj.meshes.len(), 2);
        assert_eq!(obj.meshes[0].name, "rock");
        assert_eq!(
            obj.meshes[0].material.single().map(|m| m.name.as_str()),
            Some("stone")
        );
        assert!(matches!(&obj.meshes[1].material, MaterialSlot::Multi(m) if m.len() == 2));
    }

    #[test]
    fn rejects_out_of_range_and_empty() {
        assert!(load_obj_from_str("v 0 0 0\nf 1 2 3\n").is_err());
        assert!(load_obj_from_str("# nothing here\n").is_err());
        assert!(load_obj_from_bytes(b"v 0 0 zero\n").is_err());
    }
}

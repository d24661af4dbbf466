//! Minimal Wavefront OBJ reader producing indexed triangle meshes.
//!
//! Supports `v`, `vt`, `vn`, `f` (triangles and convex polygons, positive and
//! negative indices) and starts a new submesh on `o`, `g` and `usemtl`.
//! Everything else is ignored.

use crate::{error::AssetError, uniforms::MeshVertex};
use glam::{Vec2, Vec3};
use std::{collections::HashMap, ops::Range};

/// A named run of indices drawn as one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submesh {
    pub name: String,
    pub indices: Range<u32>,
}

/// CPU-side indexed triangle mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<Submesh>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// One `v/vt/vn` reference, already resolved to zero-based indices.
type Corner = (usize, Option<usize>, Option<usize>);

struct Builder<'a> {
    name: &'a str,
    positions: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    normals: Vec<Vec3>,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    dedup: HashMap<Corner, u32>,
    /// Vertices that had no `vn` and receive accumulated face normals.
    needs_normal: Vec<bool>,
    submeshes: Vec<Submesh>,
    current: String,
    current_start: u32,
}

impl<'a> Builder<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            positions: Vec::new(),
            tex_coords: Vec::new(),
            normals: Vec::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            dedup: HashMap::new(),
            needs_normal: Vec::new(),
            submeshes: Vec::new(),
            current: String::from("default"),
            current_start: 0,
        }
    }

    fn err(&self, line: usize, message: impl Into<String>) -> AssetError {
        AssetError::Obj {
            name: self.name.to_owned(),
            line,
            message: message.into(),
        }
    }

    fn floats<const N: usize>(
        &self,
        line: usize,
        parts: &mut std::str::SplitWhitespace<'_>,
        what: &str,
    ) -> Result<[f32; N], AssetError> {
        let mut out = [0.0f32; N];
        for (i, slot) in out.iter_mut().enumerate() {
            let token = parts
                .next()
                .ok_or_else(|| self.err(line, format!("{what}: missing component {i}")))?;
            *slot = token
                .parse()
                .map_err(|_| self.err(line, format!("{what}: invalid number '{token}'")))?;
            if !slot.is_finite() {
                return Err(self.err(line, format!("{what}: non-finite value '{token}'")));
            }
        }
        Ok(out)
    }

    /// Resolves a one-based (or negative, relative) OBJ index.
    fn resolve(&self, line: usize, token: &str, len: usize, what: &str) -> Result<usize, AssetError> {
        let raw: i64 = token
            .parse()
            .map_err(|_| self.err(line, format!("invalid {what} index '{token}'")))?;
        let idx = match raw {
            0 => None,
            r if r > 0 => Some(r as usize - 1),
            r => len.checked_sub(r.unsigned_abs() as usize),
        };
        idx.filter(|&i| i < len)
            .ok_or_else(|| self.err(line, format!("{what} index {raw} out of range (have {len})")))
    }

    fn corner(&self, line: usize, token: &str) -> Result<Corner, AssetError> {
        let mut fields = token.split('/');
        let v = fields
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| self.err(line, format!("face corner '{token}' has no position")))?;
        let v = self.resolve(line, v, self.positions.len(), "position")?;

        let vt = match fields.next() {
            Some(s) if !s.is_empty() => {
                Some(self.resolve(line, s, self.tex_coords.len(), "texcoord")?)
            }
            _ => None,
        };
        let vn = match fields.next() {
            Some(s) if !s.is_empty() => Some(self.resolve(line, s, self.normals.len(), "normal")?),
            _ => None,
        };
        Ok((v, vt, vn))
    }

    fn vertex(&mut self, corner: Corner) -> u32 {
        if let Some(&idx) = self.dedup.get(&corner) {
            return idx;
        }
        let (v, vt, vn) = corner;
        // OBJ texture space has its origin bottom-left; images are top-left.
        let uv = vt.map_or(Vec2::ZERO, |i| {
            let t = self.tex_coords[i];
            Vec2::new(t.x, 1.0 - t.y)
        });
        let normal = vn.map_or(Vec3::ZERO, |i| self.normals[i].normalize_or_zero());

        let idx = self.vertices.len() as u32;
        self.vertices.push(MeshVertex {
            position: self.positions[v].to_array(),
            normal: normal.to_array(),
            tex_coord: uv.to_array(),
        });
        self.needs_normal.push(vn.is_none());
        self.dedup.insert(corner, idx);
        idx
    }

    fn face(&mut self, line: usize, parts: std::str::SplitWhitespace<'_>) -> Result<(), AssetError> {
        let corners = parts
            .map(|t| self.corner(line, t))
            .collect::<Result<Vec<_>, _>>()?;
        if corners.len() < 3 {
            return Err(self.err(line, format!("face needs 3 corners, got {}", corners.len())));
        }

        let ids: Vec<u32> = corners.into_iter().map(|c| self.vertex(c)).collect();
        // Fan triangulation; fine for the convex polygons exporters emit.
        for i in 1..ids.len() - 1 {
            self.indices.extend_from_slice(&[ids[0], ids[i], ids[i + 1]]);
        }
        Ok(())
    }

    fn start_submesh(&mut self, name: &str) {
        self.close_submesh();
        self.current = name.to_owned();
    }

    fn close_submesh(&mut self) {
        let end = self.indices.len() as u32;
        if end > self.current_start {
            self.submeshes.push(Submesh {
                name: std::mem::take(&mut self.current),
                indices: self.current_start..end,
            });
        }
        self.current_start = end;
    }

    fn finish(mut self) -> Result<MeshData, AssetError> {
        self.close_submesh();
        if self.indices.is_empty() {
            return Err(AssetError::EmptyMesh(self.name.to_owned()));
        }

        // Smooth normals for vertices the file did not supply one for.
        if self.needs_normal.iter().any(|&n| n) {
            let mut acc = vec![Vec3::ZERO; self.vertices.len()];
            for tri in self.indices.chunks_exact(3) {
                let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(self.vertices[i as usize].position));
                let n = (b - a).cross(c - a);
                for &i in tri {
                    acc[i as usize] += n;
                }
            }
            for (i, vertex) in self.vertices.iter_mut().enumerate() {
                if self.needs_normal[i] {
                    vertex.normal = acc[i].normalize_or_zero().to_array();
                }
            }
        }

        Ok(MeshData {
            name: self.name.to_owned(),
            vertices: self.vertices,
            indices: self.indices,
            submeshes: self.submeshes,
        })
    }
}

/// Parses OBJ source text. `name` is only used in error messages.
pub fn parse_obj(name: &str, source: &str) -> Result<MeshData, AssetError> {
    let mut b = Builder::new(name);

    for (i, line) in source.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.split('#').next().unwrap_or("").trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let [x, y, z] = b.floats::<3>(line_no, &mut parts, "v")?;
                b.positions.push(Vec3::new(x, y, z));
            }
            "vt" => {
                let [u, v] = b.floats::<2>(line_no, &mut parts, "vt")?;
                b.tex_coords.push(Vec2::new(u, v));
            }
            "vn" => {
                let [x, y, z] = b.floats::<3>(line_no, &mut parts, "vn")?;
                b.normals.push(Vec3::new(x, y, z));
            }
            "f" => b.face(line_no, parts)?,
            "o" | "g" | "usemtl" => {
                let label = parts.collect::<Vec<_>>().join(" ");
                b.start_submesh(if label.is_empty() { keyword } else { &label });
            }
            _ => {}
        }
    }

    b.finish()
}

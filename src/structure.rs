// Structure Module - LED sculpture topology and per-LED buffers
use glam::{Mat3, Vec3};

use crate::error::{EngineError, Result};

/// Point where edges meet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Vec3,
}

/// Straight LED strip between two vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub start: usize,
    pub end: usize,
    pub num_leds: usize,
    /// Insertion order within the structure
    pub index: usize,
    /// Offset of this edge's first LED in the flat pixel/position buffers
    pub offset: usize,
}

impl Edge {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.num_leds
    }
}

/// Axis-aligned bounds of the vertex positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub min: Vec3,
    pub max: Vec3,
}

impl Extents {
    /// (xmin, xmax, ymin, ymax, zmin, zmax)
    pub fn as_tuple(&self) -> (f32, f32, f32, f32, f32, f32) {
        (self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// 3D wireframe of LED edges.
///
/// Built in two phases: vertices and edges are added (and optionally scaled
/// or rotated), then [`Structure::finalize`] caches every LED position and
/// allocates the color buffer. After that only the pixels change.
///
/// LEDs are addressed edge-major: edge `e`, LED `l` lives at flat index
/// `edges[e].offset + l` in both [`Structure::positions`] and the pixel buffer.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    verts: Vec<Vertex>,
    edges: Vec<Edge>,
    num_leds: usize,
    positions: Option<Vec<Vec3>>,
    pixels: Option<Vec<Vec3>>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, pos: Vec3) -> Result<usize> {
        self.ensure_building()?;
        self.verts.push(Vertex { pos });
        Ok(self.verts.len() - 1)
    }

    pub fn add_edge(&mut self, start: usize, end: usize, num_leds: usize) -> Result<usize> {
        self.ensure_building()?;
        for index in [start, end] {
            if index >= self.verts.len() {
                return Err(EngineError::InvalidVertex {
                    index,
                    count: self.verts.len(),
                });
            }
        }

        let index = self.edges.len();
        self.edges.push(Edge {
            start,
            end,
            num_leds,
            index,
            offset: self.num_leds,
        });
        self.num_leds += num_leds;
        Ok(index)
    }

    /// Multiply every vertex position by `factor`.
    pub fn scale(&mut self, factor: f32) -> Result<()> {
        self.ensure_building()?;
        for vert in &mut self.verts {
            vert.pos *= factor;
        }
        Ok(())
    }

    /// Rotate every vertex about `axis` (through the origin) by `angle` radians.
    pub fn rotate(&mut self, axis: Vec3, angle: f32) -> Result<()> {
        self.ensure_building()?;
        let axis = axis.try_normalize().ok_or(EngineError::DegenerateAxis)?;
        let m = Mat3::from_axis_angle(axis, angle);
        for vert in &mut self.verts {
            vert.pos = m * vert.pos;
        }
        Ok(())
    }

    /// Cache LED positions and allocate a zeroed pixel buffer.
    ///
    /// Calling this again is a no-op: the cached positions are kept as they are.
    pub fn finalize(&mut self) {
        if self.is_finalized() {
            return;
        }

        let mut positions = Vec::with_capacity(self.num_leds);
        for edge in &self.edges {
            let p0 = self.verts[edge.start].pos;
            let p1 = self.verts[edge.end].pos;
            for led_idx in 0..edge.num_leds {
                // Centered within its slot, never on a vertex
                let f = (led_idx as f32 + 0.5) / edge.num_leds as f32;
                positions.push((1.0 - f) * p0 + f * p1);
            }
        }

        self.pixels = Some(vec![Vec3::ZERO; self.num_leds]);
        self.positions = Some(positions);
    }

    pub fn is_finalized(&self) -> bool {
        self.positions.is_some()
    }

    pub fn extents(&self) -> Option<Extents> {
        let first = self.verts.first()?.pos;
        let (min, max) = self
            .verts
            .iter()
            .fold((first, first), |(min, max), v| (min.min(v.pos), max.max(v.pos)));
        Some(Extents { min, max })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.verts
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_leds(&self) -> usize {
        self.num_leds
    }

    pub fn positions(&self) -> Result<&[Vec3]> {
        self.positions.as_deref().ok_or(EngineError::NotFinalized)
    }

    pub fn pixels(&self) -> Result<&[Vec3]> {
        self.pixels.as_deref().ok_or(EngineError::NotFinalized)
    }

    pub fn pixels_mut(&mut self) -> Result<&mut [Vec3]> {
        self.pixels.as_deref_mut().ok_or(EngineError::NotFinalized)
    }

    /// Positions (read-only) together with the pixel buffer, for positional shading.
    pub fn split_mut(&mut self) -> Result<(&[Vec3], &mut [Vec3])> {
        match (self.positions.as_deref(), self.pixels.as_deref_mut()) {
            (Some(positions), Some(pixels)) => Ok((positions, pixels)),
            _ => Err(EngineError::NotFinalized),
        }
    }

    /// Cached position of LED `led` on edge `edge`.
    pub fn position(&self, edge: usize, led: usize) -> Result<Vec3> {
        let idx = self.led_index(edge, led)?;
        Ok(self.positions()?[idx])
    }

    pub fn pixel(&self, edge: usize, led: usize) -> Result<Vec3> {
        let idx = self.led_index(edge, led)?;
        Ok(self.pixels()?[idx])
    }

    pub fn edge_pixels_mut(&mut self, edge: usize) -> Result<&mut [Vec3]> {
        let range = self.edge(edge)?.range();
        Ok(&mut self.pixels_mut()?[range])
    }

    /// Edge by index, or `InvalidEdge`.
    pub fn edge(&self, index: usize) -> Result<&Edge> {
        self.edges.get(index).ok_or(EngineError::InvalidEdge {
            index,
            count: self.edges.len(),
        })
    }

    fn led_index(&self, edge: usize, led: usize) -> Result<usize> {
        let edge = self.edge(edge)?;
        if led >= edge.num_leds {
            return Err(EngineError::InvalidLed {
                edge: edge.index,
                index: led,
                count: edge.num_leds,
            });
        }
        Ok(edge.offset + led)
    }

    fn ensure_building(&self) -> Result<()> {
        if self.is_finalized() {
            Err(EngineError::AlreadyFinalized)
        } else {
            Ok(())
        }
    }
}

/// Layout and placement of the reference cube sculpture.
#[derive(Debug, Clone, Copy)]
pub struct CubeLayout {
    pub leds_per_edge: usize,
    pub scale: f32,
    pub rotate_x: f32,
    pub rotate_y: f32,
}

impl Default for CubeLayout {
    fn default() -> Self {
        CubeLayout {
            leds_per_edge: 60,
            scale: 0.5,
            rotate_x: 0.0,
            rotate_y: 0.0,
        }
    }
}

/// Build and finalize the reference cube: 8 corners, 12 edges.
pub fn cube(layout: &CubeLayout) -> Result<Structure> {
    let mut cube = Structure::new();

    // Bottom face (y=-1)
    cube.add_vertex(Vec3::new(-1.0, -1.0, -1.0))?; // 0
    cube.add_vertex(Vec3::new(1.0, -1.0, -1.0))?; // 1
    cube.add_vertex(Vec3::new(1.0, -1.0, 1.0))?; // 2
    cube.add_vertex(Vec3::new(-1.0, -1.0, 1.0))?; // 3

    // Top face (y=1)
    cube.add_vertex(Vec3::new(-1.0, 1.0, -1.0))?; // 4
    cube.add_vertex(Vec3::new(1.0, 1.0, -1.0))?; // 5
    cube.add_vertex(Vec3::new(1.0, 1.0, 1.0))?; // 6
    cube.add_vertex(Vec3::new(-1.0, 1.0, 1.0))?; // 7

    let n = layout.leds_per_edge;
    const EDGES: [(usize, usize); 12] = [
        // Bottom face
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        // Top face
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 4),
        // Bottom to top
        (4, 0),
        (1, 5),
        (6, 2),
        (3, 7),
    ];
    for (a, b) in EDGES {
        cube.add_edge(a, b, n)?;
    }

    cube.scale(layout.scale)?;
    if layout.rotate_x != 0.0 {
        cube.rotate(Vec3::X, layout.rotate_x)?;
    }
    if layout.rotate_y != 0.0 {
        cube.rotate(Vec3::Y, layout.rotate_y)?;
    }
    cube.finalize();

    Ok(cube)
}

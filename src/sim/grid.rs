//! Tile grid and collision shapes
//!
//! The movers only ever read the grid through [`TileGrid`]. Anything that
//! changes tiles (breaking, chain reactions) happens after a move returns.

use glam::IVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Collision shape of one tile.
///
/// Triangle names refer to the corner that is *empty*, which is also the
/// direction the collision surface faces. `UpLeft` has its upper left corner
/// open and its lower right half solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Shape {
    #[default]
    None,
    Square,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Shape {
    /// Collision bits in level metadata
    pub const COLLISION_MASK: u8 = 0x07;

    /// Decode the collision nibble of a metadata tile.
    ///
    /// Unknown combinations are treated as passable.
    pub fn from_bits(bits: u8) -> Self {
        match bits & Self::COLLISION_MASK {
            0x01 => Shape::Square,
            0x02 => Shape::UpLeft,
            0x03 => Shape::UpRight,
            0x04 => Shape::DownLeft,
            0x05 => Shape::DownRight,
            _ => Shape::None,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Shape::None => 0x00,
            Shape::Square => 0x01,
            Shape::UpLeft => 0x02,
            Shape::UpRight => 0x03,
            Shape::DownLeft => 0x04,
            Shape::DownRight => 0x05,
        }
    }

    #[inline]
    pub fn is_open(self) -> bool {
        self == Shape::None
    }

    #[inline]
    pub fn is_square(self) -> bool {
        self == Shape::Square
    }

    #[inline]
    pub fn is_triangle(self) -> bool {
        !matches!(self, Shape::None | Shape::Square)
    }

    /// ASCII glyph used by [`TileMap::from_rows`]
    pub fn glyph(self) -> char {
        match self {
            Shape::None => '.',
            Shape::Square => '#',
            Shape::UpLeft => '/',
            Shape::UpRight => '\\',
            Shape::DownLeft => '7',
            Shape::DownRight => 'F',
        }
    }

    pub fn from_glyph(c: char) -> Option<Self> {
        match c {
            '.' | ' ' => Some(Shape::None),
            '#' => Some(Shape::Square),
            '/' => Some(Shape::UpLeft),
            '\\' => Some(Shape::UpRight),
            '7' => Some(Shape::DownLeft),
            'F' => Some(Shape::DownRight),
            _ => None,
        }
    }
}

/// Read-only view of the world's collision tiles.
pub trait TileGrid {
    /// Collision shape at a tile address. Only called for in-bounds tiles.
    fn shape_at(&self, tile: IVec2) -> Shape;
}

impl<G: TileGrid + ?Sized> TileGrid for &G {
    fn shape_at(&self, tile: IVec2) -> Shape {
        (**self).shape_at(tile)
    }
}

/// Caller-side boundary check: everything outside the world reads as solid.
#[derive(Debug)]
pub struct Bounded<'a, G: ?Sized> {
    grid: &'a G,
    size: IVec2,
}

impl<G: ?Sized> Clone for Bounded<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G: ?Sized> Copy for Bounded<'_, G> {}

impl<'a, G: TileGrid + ?Sized> Bounded<'a, G> {
    pub fn new(grid: &'a G, size: IVec2) -> Self {
        Self { grid, size }
    }

    #[inline]
    pub fn in_bounds(&self, tile: IVec2) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.size.x && tile.y < self.size.y
    }

    #[inline]
    pub fn shape(&self, tile: IVec2) -> Shape {
        if self.in_bounds(tile) {
            self.grid.shape_at(tile)
        } else {
            Shape::Square
        }
    }
}

/// Dense row-major tile map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    width: i32,
    height: i32,
    tiles: Vec<Shape>,
}

impl TileMap {
    /// Create an empty (fully passable) map
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tiles: vec![Shape::None; (width * height) as usize],
        }
    }

    /// Build a map from ASCII rows, one glyph per tile (see [`Shape::glyph`]).
    ///
    /// Short rows are padded with open tiles; unknown glyphs read as open.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;
        let mut map = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let shape = Shape::from_glyph(c).unwrap_or_default();
                map.set(IVec2::new(x as i32, y as i32), shape);
            }
        }
        map
    }

    /// Seeded random map: solid border, interior scattered with squares and
    /// triangles at the given density (0..1).
    pub fn scatter(width: i32, height: i32, seed: u64, density: f64) -> Self {
        const SHAPES: [Shape; 5] = [
            Shape::Square,
            Shape::UpLeft,
            Shape::UpRight,
            Shape::DownLeft,
            Shape::DownRight,
        ];

        let mut rng = Pcg32::seed_from_u64(seed);
        let mut map = Self::new(width, height);
        let density = density.clamp(0.0, 1.0);
        for y in 0..map.height {
            for x in 0..map.width {
                let border = x == 0 || y == 0 || x == map.width - 1 || y == map.height - 1;
                let shape = if border {
                    Shape::Square
                } else if rng.random_bool(density) {
                    SHAPES[rng.random_range(0..SHAPES.len())]
                } else {
                    Shape::None
                };
                map.set(IVec2::new(x, y), shape);
            }
        }
        map
    }

    #[inline]
    pub fn dimensions(&self) -> IVec2 {
        IVec2::new(self.width, self.height)
    }

    #[inline]
    fn index(&self, tile: IVec2) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 || tile.x >= self.width || tile.y >= self.height {
            return None;
        }
        Some((tile.y * self.width + tile.x) as usize)
    }

    /// Shape at `tile`, or `None` when out of range
    pub fn get(&self, tile: IVec2) -> Option<Shape> {
        self.index(tile).map(|i| self.tiles[i])
    }

    /// Set a tile; out-of-range writes are ignored
    pub fn set(&mut self, tile: IVec2, shape: Shape) {
        if let Some(i) = self.index(tile) {
            self.tiles[i] = shape;
        }
    }

    /// Wrap this map with its own extents as the world boundary
    pub fn bounded(&self) -> Bounded<'_, Self> {
        Bounded::new(self, self.dimensions())
    }

    /// Render back to ASCII rows
    pub fn to_rows(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| self.tiles[(y * self.width + x) as usize].glyph())
                    .collect()
            })
            .collect()
    }
}

impl TileGrid for TileMap {
    fn shape_at(&self, tile: IVec2) -> Shape {
        self.get(tile).unwrap_or(Shape::Square)
    }
}

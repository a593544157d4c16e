//! Sprite alpha bitmaps and the per-pixel collision masks derived from them
//!
//! A [`Mask`] is built once per sprite/size combination (see `AssetCache`)
//! and tested with [`overlaps`], which rejects on bounding boxes first and
//! then ANDs the two bitmaps over their overlapping region.

use bitvec::prelude::*;

use crate::game::constants::mask::ALPHA_THRESHOLD;
use crate::util::vec2::Vec2;

/// Alpha-only bitmap supplied by the rendering side (or generated as a fallback)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl Sprite {
    /// Wrap a row-major alpha buffer. Returns None if the buffer size is wrong
    /// or either dimension is zero.
    pub fn from_alpha(width: u32, height: u32, alpha: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || alpha.len() != (width * height) as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            alpha,
        })
    }

    /// Build a sprite by evaluating `f(x, y)` for every pixel
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                alpha.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            alpha,
        }
    }

    /// Filled circle touching all four edges, transparent corners
    pub fn disc(diameter: u32) -> Self {
        let d = diameter.max(1);
        let r = d as f32 / 2.0;
        Self::from_fn(d, d, |x, y| {
            let dx = x as f32 + 0.5 - r;
            let dy = y as f32 + 0.5 - r;
            if dx * dx + dy * dy <= r * r {
                255
            } else {
                0
            }
        })
    }

    /// Fully opaque rectangle
    pub fn rect(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| 255)
    }

    /// Barrel over a half-disc base, roughly the silhouette of the cannon art
    pub fn cannon(size: u32) -> Self {
        let s = size.max(4) as f32;
        let barrel_half = s * 0.1;
        let base_r = s * 0.45;
        let base_cy = s;
        Self::from_fn(size.max(4), size.max(4), |x, y| {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let in_barrel = (px - s / 2.0).abs() <= barrel_half && py >= s * 0.2;
            let dx = px - s / 2.0;
            let dy = py - base_cy;
            let in_base = dx * dx + dy * dy <= base_r * base_r;
            if in_barrel || in_base {
                255
            } else {
                0
            }
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.alpha[(y * self.width + x) as usize]
    }

    /// Nearest-neighbour rescale
    pub fn scaled(&self, width: u32, height: u32) -> Sprite {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return self.clone();
        }
        Sprite::from_fn(width, height, |x, y| {
            let sx = ((x as u64 * self.width as u64) / width as u64) as u32;
            let sy = ((y as u64 * self.height as u64) / height as u64) as u32;
            self.alpha_at(sx.min(self.width - 1), sy.min(self.height - 1))
        })
    }
}

/// Binary opacity bitmap, row-major, one bit per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: BitVec<u64, Lsb0>,
}

impl Mask {
    /// Empty (fully transparent) mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: bitvec![u64, Lsb0; 0; (width * height) as usize],
        }
    }

    /// Mask with every pixel whose alpha exceeds `ALPHA_THRESHOLD` set
    pub fn from_sprite(sprite: &Sprite) -> Self {
        Self::from_fn(sprite.width(), sprite.height(), |x, y| {
            sprite.alpha_at(x, y) > ALPHA_THRESHOLD
        })
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            self.bits.set((y * self.width + x) as usize, value);
        }
    }

    /// Number of opaque pixels
    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Test whether any pixel is set in both masks when `other`'s origin sits
    /// at `offset` in this mask's coordinates
    pub fn overlap(&self, other: &Mask, offset: (i32, i32)) -> bool {
        let (dx, dy) = offset;
        let x0 = dx.max(0);
        let y0 = dy.max(0);
        let x1 = (dx + other.width as i32).min(self.width as i32);
        let y1 = (dy + other.height as i32).min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return false;
        }

        let span = (x1 - x0) as usize;
        for y in y0..y1 {
            let a_start = (y as u32 * self.width) as usize + x0 as usize;
            let b_start =
                ((y - dy) as u32 * other.width) as usize + (x0 - dx) as usize;
            let a_row = &self.bits[a_start..a_start + span];
            let b_row = &other.bits[b_start..b_start + span];
            if a_row.iter_ones().any(|i| b_row[i]) {
                return true;
            }
        }
        false
    }

    /// Top-left pixel of this mask when centred on `center`
    #[inline]
    pub fn origin_at(&self, center: Vec2) -> (i32, i32) {
        let (cx, cy) = center.to_pixel();
        (cx - (self.width / 2) as i32, cy - (self.height / 2) as i32)
    }
}

/// Pixel-accurate overlap of two masks centred at float positions
pub fn overlaps(a: &Mask, pos_a: Vec2, b: &Mask, pos_b: Vec2) -> bool {
    let (ax, ay) = a.origin_at(pos_a);
    let (bx, by) = b.origin_at(pos_b);

    // Bounding box rejection
    if ax >= bx + b.width as i32
        || bx >= ax + a.width as i32
        || ay >= by + b.height as i32
        || by >= ay + a.height as i32
    {
        return false;
    }

    a.overlap(b, (bx - ax, by - ay))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10x10 L shape: left column and bottom row opaque
    fn l_shape() -> Mask {
        Mask::from_fn(10, 10, |x, y| x < 3 || y >= 7)
    }

    /// The L shape rotated 180 degrees: right column and top row opaque
    fn l_shape_flipped() -> Mask {
        Mask::from_fn(10, 10, |x, y| x >= 7 || y < 3)
    }

    #[test]
    fn test_sprite_from_alpha_validates_size() {
        assert!(Sprite::from_alpha(2, 2, vec![0, 0, 0, 0]).is_some());
        assert!(Sprite::from_alpha(2, 2, vec![0, 0, 0]).is_none());
        assert!(Sprite::from_alpha(0, 2, vec![]).is_none());
    }

    #[test]
    fn test_disc_has_transparent_corners() {
        let mask = Mask::from_sprite(&Sprite::disc(20));
        assert!(!mask.get(0, 0));
        assert!(!mask.get(19, 19));
        assert!(mask.get(10, 10));
        assert!(mask.count() > 250 && mask.count() < 400);
    }

    #[test]
    fn test_scaled_sprite_dimensions() {
        let sprite = Sprite::disc(100);
        let small = sprite.scaled(40, 40);
        assert_eq!(small.width(), 40);
        assert_eq!(small.height(), 40);
        let mask = Mask::from_sprite(&small);
        assert!(mask.get(20, 20));
        assert!(!mask.get(0, 0));
    }

    #[test]
    fn test_identical_positions_overlap() {
        let a = Mask::from_sprite(&Sprite::disc(30));
        let b = Mask::from_sprite(&Sprite::rect(10, 30));
        assert!(overlaps(&a, Vec2::new(100.0, 100.0), &b, Vec2::new(100.0, 100.0)));
    }

    #[test]
    fn test_far_apart_rejected() {
        let a = Mask::from_sprite(&Sprite::rect(10, 10));
        let b = Mask::from_sprite(&Sprite::rect(10, 10));
        assert!(!overlaps(&a, Vec2::new(0.0, 0.0), &b, Vec2::new(100.0, 0.0)));
        // Touching edges do not overlap
        assert!(!overlaps(&a, Vec2::new(0.0, 0.0), &b, Vec2::new(10.0, 0.0)));
        assert!(overlaps(&a, Vec2::new(0.0, 0.0), &b, Vec2::new(9.0, 0.0)));
    }

    #[test]
    fn test_l_shapes_transparent_corners_do_not_collide() {
        let a = l_shape();
        let b = l_shape_flipped();
        // Boxes overlap by 4x4 in a's top-right / b's bottom-left corner,
        // both of which are transparent.
        let pos_a = Vec2::new(50.0, 50.0);
        let pos_b = Vec2::new(56.0, 44.0);
        assert!(!overlaps(&a, pos_a, &b, pos_b));
        assert!(!overlaps(&b, pos_b, &a, pos_a));

        // Shift b so its opaque right column reaches a's opaque bottom row
        let pos_b = Vec2::new(50.0, 52.0);
        assert!(overlaps(&a, pos_a, &b, pos_b));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = Mask::from_sprite(&Sprite::disc(24));
        let b = Mask::from_sprite(&Sprite::cannon(18));
        let c = Mask::from_sprite(&Sprite::rect(10, 30));
        let masks = [&a, &b, &c];
        for (i, m1) in masks.iter().enumerate() {
            for m2 in masks.iter().skip(i) {
                for step in 0..40 {
                    let p1 = Vec2::new(100.0, 100.0);
                    let p2 = Vec2::new(80.0 + step as f32 * 1.3, 95.0 + (step % 7) as f32 * 2.1);
                    assert_eq!(overlaps(m1, p1, m2, p2), overlaps(m2, p2, m1, p1));
                }
            }
        }
    }

    #[test]
    fn test_overlap_negative_offset() {
        let a = Mask::from_fn(4, 4, |x, y| x == 0 && y == 0);
        let b = Mask::from_fn(4, 4, |x, y| x == 3 && y == 3);
        assert!(a.overlap(&b, (-3, -3)));
        assert!(!a.overlap(&b, (-2, -3)));
        assert!(!a.overlap(&b, (-4, 0)));
    }
}

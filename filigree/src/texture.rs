// Copyright 2025 the Filigree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Texture bookkeeping.
//!
//! The store owns the metadata side of every texture: its id, dimensions and
//! pixel format. The backing GPU images live in the engine, keyed by the same
//! id, so that this half stays a plain data structure.

use std::num::NonZeroU32;

/// Opaque handle to a texture created through the renderer.
///
/// Ids are assigned from a monotonically increasing counter starting at 1 and
/// are never reused within a renderer's lifetime, even after deletion. The
/// raw value 0 is reserved to mean "no texture", which is why the handle is
/// backed by [`NonZeroU32`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureId(NonZeroU32);

impl TextureId {
    /// Returns the underlying non-zero integer id.
    pub fn to_raw(self) -> u32 {
        self.0.get()
    }

    /// Reconstructs a handle from a raw id. Returns `None` for the reserved
    /// value 0.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }
}

/// Pixel format of a texture.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TextureFormat {
    /// Four 8-bit channels.
    Rgba8,
    /// A single 8-bit coverage/alpha channel.
    Alpha8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8 => 4,
            Self::Alpha8 => 1,
        }
    }
}

/// Metadata for one texture.
#[derive(Clone, Copy, Debug)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    format: TextureFormat,
}

impl Texture {
    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Byte length of a tightly packed, row-major pixel upload covering the
    /// full texture extent.
    pub fn data_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}

/// Registry of live textures.
///
/// Lookups are a linear scan; texture counts in an immediate-mode frontend
/// are small and dominated by create/delete churn, not lookups.
#[derive(Default)]
pub struct TextureStore {
    next_id: u32,
    textures: Vec<Texture>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new texture and returns its freshly assigned id.
    pub fn insert(&mut self, format: TextureFormat, width: u32, height: u32) -> TextureId {
        self.next_id += 1;
        let id = TextureId(NonZeroU32::new(self.next_id).expect("id counter starts above zero"));
        self.textures.push(Texture {
            id,
            width,
            height,
            format,
        });
        id
    }

    /// Removes a texture. Returns `false` if the id is unknown, which is a
    /// defined no-op rather than an error.
    pub fn remove(&mut self, id: TextureId) -> bool {
        match self.textures.iter().position(|tex| tex.id == id) {
            Some(ix) => {
                self.textures.remove(ix);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.iter().find(|tex| tex.id == id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut store = TextureStore::new();
        let ids: Vec<_> = (0..4)
            .map(|_| store.insert(TextureFormat::Rgba8, 8, 8).to_raw())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn deleted_ids_are_never_reused() {
        let mut store = TextureStore::new();
        let a = store.insert(TextureFormat::Rgba8, 8, 8);
        let b = store.insert(TextureFormat::Alpha8, 8, 8);
        assert!(store.remove(a));
        assert!(store.remove(b));
        let c = store.insert(TextureFormat::Rgba8, 8, 8);
        assert_eq!(c.to_raw(), 3);
        assert!(store.get(a).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn interleaved_creates_and_deletes_stay_strictly_increasing() {
        let mut store = TextureStore::new();
        let mut seen = Vec::new();
        for round in 0..5 {
            let id = store.insert(TextureFormat::Alpha8, 1, 1);
            seen.push(id.to_raw());
            if round % 2 == 0 {
                assert!(store.remove(id));
            }
        }
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(seen, sorted);
    }

    #[test]
    fn remove_unknown_id_is_a_no_op() {
        let mut store = TextureStore::new();
        store.insert(TextureFormat::Rgba8, 2, 2);
        let stale = TextureId::from_raw(99).unwrap();
        assert!(!store.remove(stale));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lookup_reports_metadata() {
        let mut store = TextureStore::new();
        let id = store.insert(TextureFormat::Alpha8, 64, 32);
        let tex = store.get(id).unwrap();
        assert_eq!(tex.width(), 64);
        assert_eq!(tex.height(), 32);
        assert_eq!(tex.format(), TextureFormat::Alpha8);
        assert_eq!(tex.data_len(), 64 * 32);
    }

    #[test]
    fn raw_zero_is_reserved() {
        assert!(TextureId::from_raw(0).is_none());
    }
}

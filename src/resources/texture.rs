//! Texture storage and generated textures.

use std::collections::HashMap;

use image::{Rgba, RgbaImage};
use log::warn;
use slotmap::SlotMap;

use crate::{
    data_structures::texture::{Texture, TextureId},
    error::{NginError, NginResult},
};

pub const BLANK: &str = "__BLANK";
pub const MISSING: &str = "__MISSING";

pub const ARNE16: [&str; 16] = [
    "#000", "#9D9D9D", "#FFF", "#BE2633", "#E06F8B", "#493C2B", "#A46422", "#EB8931", "#F7E26B",
    "#2F484E", "#44891A", "#A3CE27", "#1B2632", "#005784", "#31A2F2", "#B2DCEF",
];

pub const PICO8: [&str; 16] = [
    "#000", "#1D2B53", "#7E2553", "#008751", "#AB5236", "#5F574F", "#C2C3C7", "#FFF1E8",
    "#FF004D", "#FFA300", "#FFEC27", "#00E436", "#29ADFF", "#83769C", "#FF77A8", "#FFCCAA",
];

/// Key → texture store.
///
/// Lookups never fail: unknown keys resolve to [`MISSING`]. Newly added
/// textures are queued so the renderer can create GPU bindings for them, and
/// removed ones are queued so it can free them.
pub struct TextureManager {
    textures: SlotMap<TextureId, Texture>,
    keys: HashMap<String, TextureId>,
    blank: TextureId,
    missing: TextureId,
    pending: Vec<TextureId>,
    released: Vec<TextureId>,
}

impl Default for TextureManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureManager {
    pub fn new() -> Self {
        let mut manager = Self {
            textures: SlotMap::with_key(),
            keys: HashMap::new(),
            blank: TextureId::default(),
            missing: TextureId::default(),
            pending: Vec::new(),
            released: Vec::new(),
        };
        manager.blank = manager.add(BLANK, Texture::from_image(RgbaImage::new(32, 32)));
        manager.missing = manager.add(MISSING, Texture::from_image(missing_image()));
        manager
    }

    /// Stores `texture` under `key`. If the key is taken the existing
    /// texture is kept and its id returned.
    pub fn add(&mut self, key: &str, mut texture: Texture) -> TextureId {
        if let Some(&id) = self.keys.get(key) {
            return id;
        }
        texture.key = key.to_string();
        let id = self.textures.insert(texture);
        self.keys.insert(key.to_string(), id);
        self.pending.push(id);
        id
    }

    pub fn has(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Id for `key`, or the missing texture.
    pub fn get(&self, key: &str) -> TextureId {
        match self.keys.get(key) {
            Some(&id) => id,
            None => {
                warn!("Texture missing: {key}");
                self.missing
            }
        }
    }

    pub fn get_id(&self, key: &str) -> Option<TextureId> {
        self.keys.get(key).copied()
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(id)
    }

    pub fn blank(&self) -> TextureId {
        self.blank
    }

    pub fn missing(&self) -> TextureId {
        self.missing
    }

    /// Removes `key`. The reserved textures cannot be removed.
    pub fn remove(&mut self, key: &str) -> Option<Texture> {
        if key == BLANK || key == MISSING {
            warn!("Refusing to remove reserved texture {key}");
            return None;
        }
        let id = self.keys.remove(key)?;
        self.pending.retain(|&p| p != id);
        self.released.push(id);
        self.textures.remove(id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &Texture)> {
        self.textures.iter()
    }

    /// Textures added since the last call.
    pub fn take_pending(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.pending)
    }

    /// Textures removed since the last call.
    pub fn take_released(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.released)
    }
}

/// 32×32 green outline crossed by a diagonal.
fn missing_image() -> RgbaImage {
    let green = Rgba([0, 255, 0, 255]);
    RgbaImage::from_fn(32, 32, |x, y| {
        if x == 0 || y == 0 || x == 31 || y == 31 || x == y {
            green
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Parses `#RGB` or `#RRGGBB` (leading `#` optional) into opaque RGBA.
pub fn parse_hex_color(color: &str) -> Option<[u8; 4]> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.char_indices() {
                let v = channel(&hex[i..i + c.len_utf8()])?;
                rgb[i] = v * 17;
            }
            Some([rgb[0], rgb[1], rgb[2], 255])
        }
        6 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ]),
        _ => None,
    }
}

pub struct PixelTexture<'a> {
    /// One string per row; each character is a palette index in hex, with
    /// `.` or space for a transparent pixel.
    pub data: &'a [&'a str],
    pub palette: &'a [&'a str],
    pub pixel_width: u32,
    pub pixel_height: Option<u32>,
}

impl<'a> PixelTexture<'a> {
    pub fn new(data: &'a [&'a str]) -> Self {
        Self {
            data,
            palette: &ARNE16,
            pixel_width: 1,
            pixel_height: None,
        }
    }

    pub fn with_palette(mut self, palette: &'a [&'a str]) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_pixel_size(mut self, width: u32, height: u32) -> Self {
        self.pixel_width = width;
        self.pixel_height = Some(height);
        self
    }

    /// Paints the grid. The image is as wide as the first row.
    pub fn build(&self) -> NginResult<Texture> {
        let pixel_width = self.pixel_width;
        let pixel_height = self.pixel_height.unwrap_or(pixel_width);
        let columns = self.data.first().map(|row| row.chars().count()).unwrap_or(0) as u32;
        let width = columns * pixel_width;
        let height = self.data.len() as u32 * pixel_height;
        if width == 0 || height == 0 {
            return Err(NginError::InvalidPixelData("empty pixel grid".into()));
        }
        let palette = self
            .palette
            .iter()
            .map(|c| {
                parse_hex_color(c)
                    .ok_or_else(|| NginError::InvalidPixelData(format!("bad palette color {c}")))
            })
            .collect::<NginResult<Vec<_>>>()?;

        let mut image = RgbaImage::new(width, height);
        for (y, row) in self.data.iter().enumerate() {
            for (x, cell) in row.chars().enumerate() {
                if cell == '.' || cell == ' ' {
                    continue;
                }
                let color = cell
                    .to_digit(16)
                    .and_then(|i| palette.get(i as usize))
                    .ok_or_else(|| {
                        NginError::InvalidPixelData(format!("no palette entry for '{cell}'"))
                    })?;
                let (left, top) = (x as u32 * pixel_width, y as u32 * pixel_height);
                for py in top..top + pixel_height {
                    for px in left..left + pixel_width {
                        if px < width && py < height {
                            image.put_pixel(px, py, Rgba(*color));
                        }
                    }
                }
            }
        }
        Ok(Texture::from_image(image))
    }
}

/// A texture filled with one `0xAARRGGBB` color.
///
/// Like the other color helpers, an alpha byte of zero on a color no larger
/// than `0xFFFFFF` means opaque.
pub fn solid_color_texture(color: u32, width: u32, height: u32) -> Texture {
    let [r, g, b, a] = crate::context::rgb_array(color);
    let px = Rgba([
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
        (a * 255.0).round() as u8,
    ]);
    Texture::from_image(RgbaImage::from_pixel(width, height, px))
}

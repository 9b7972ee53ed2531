//! Font loading for the parameter panel.
//!
//! Fonts are rasterised once with `fontdue` into a single-channel atlas
//! texture. No font ships with the crate: [`Assets::load_default_font`] tries
//! an explicit path first and then a list of common system locations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings};

use crate::error::AppError;
use crate::gpu::GpuContext;

/// System fonts probed when no font path is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/noto/NotoSansMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/System/Library/Fonts/Supplemental/Courier New.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Opaque identifier for a loaded font.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontId(pub(crate) usize);

/// Placement of one glyph in the atlas.
#[derive(Clone, Copy, Debug)]
pub struct GlyphInfo {
    /// Atlas rectangle (x, y, width, height) normalised to [0, 1].
    pub uv: [f32; 4],
    pub width: u32,
    pub height: u32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub advance: f32,
}

/// Glyph positions produced by [`pack_glyphs`].
struct AtlasPacking {
    width: u32,
    height: u32,
    positions: Vec<(u32, u32)>,
}

/// Shelf-pack glyph boxes, doubling the smaller atlas side until they fit.
fn pack_glyphs(sizes: &[(u32, u32)], padding: u32) -> AtlasPacking {
    let (mut width, mut height) = (256u32, 256u32);
    loop {
        let mut positions = Vec::with_capacity(sizes.len());
        let (mut x, mut y, mut row_height) = (padding, padding, 0u32);
        let mut fits = true;

        for &(w, h) in sizes {
            if x + w + padding > width {
                x = padding;
                y += row_height + padding;
                row_height = 0;
            }
            if y + h + padding > height || w + 2 * padding > width {
                fits = false;
                break;
            }
            positions.push((x, y));
            x += w + padding;
            row_height = row_height.max(h);
        }

        if fits {
            return AtlasPacking {
                width,
                height,
                positions,
            };
        }
        if width <= height {
            width *= 2;
        } else {
            height *= 2;
        }
    }
}

/// Printable ASCII glyphs rasterised at one size.
pub struct FontAtlas {
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    glyphs: HashMap<char, GlyphInfo>,
    size: f32,
    line_height: f32,
}

impl FontAtlas {
    /// Rasterise printable ASCII from `font` and upload the atlas.
    pub fn new(gpu: &GpuContext, font: &Font, size: f32) -> Self {
        let rasterized: Vec<(char, fontdue::Metrics, Vec<u8>)> = (32u8..=126u8)
            .map(char::from)
            .map(|c| {
                let (metrics, bitmap) = font.rasterize(c, size);
                (c, metrics, bitmap)
            })
            .collect();

        let sizes: Vec<(u32, u32)> = rasterized
            .iter()
            .map(|(_, m, _)| (m.width as u32, m.height as u32))
            .collect();
        let packing = pack_glyphs(&sizes, 1);
        let (atlas_width, atlas_height) = (packing.width, packing.height);

        let mut atlas_data = vec![0u8; (atlas_width * atlas_height) as usize];
        let mut glyphs = HashMap::new();

        for ((c, metrics, bitmap), &(x, y)) in rasterized.iter().zip(&packing.positions) {
            let (glyph_w, glyph_h) = (metrics.width as u32, metrics.height as u32);
            for gy in 0..glyph_h {
                let src = (gy * glyph_w) as usize;
                let dst = ((y + gy) * atlas_width + x) as usize;
                atlas_data[dst..dst + glyph_w as usize]
                    .copy_from_slice(&bitmap[src..src + glyph_w as usize]);
            }

            glyphs.insert(
                *c,
                GlyphInfo {
                    uv: [
                        x as f32 / atlas_width as f32,
                        y as f32 / atlas_height as f32,
                        glyph_w as f32 / atlas_width as f32,
                        glyph_h as f32 / atlas_height as f32,
                    ],
                    width: glyph_w,
                    height: glyph_h,
                    offset_x: metrics.xmin as f32,
                    offset_y: metrics.ymin as f32,
                    advance: metrics.advance_width,
                },
            );
        }

        let extent = wgpu::Extent3d {
            width: atlas_width,
            height: atlas_height,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Font Atlas"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &atlas_data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(atlas_width),
                rows_per_image: Some(atlas_height),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Font Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let line_height = font
            .horizontal_line_metrics(size)
            .map(|m| m.new_line_size)
            .unwrap_or(size * 1.2);

        Self {
            view,
            sampler,
            glyphs,
            size,
            line_height,
        }
    }

    pub fn glyph(&self, c: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&c)
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Width of `text` in pixels.
    pub fn measure(&self, text: &str) -> f32 {
        text.chars()
            .map(|c| self.glyphs.get(&c).map_or(self.size * 0.5, |g| g.advance))
            .sum()
    }
}

/// Loaded fonts, indexed by [`FontId`].
#[derive(Default)]
pub struct Assets {
    pub(crate) fonts: Vec<FontAtlas>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a font file and rasterise it at `size` pixels.
    pub fn load_font(
        &mut self,
        gpu: &GpuContext,
        path: impl AsRef<Path>,
        size: f32,
    ) -> Result<FontId, AppError> {
        let path = path.as_ref();
        let font_error = |reason: String| AppError::Font {
            path: path.to_path_buf(),
            reason,
        };
        let data = std::fs::read(path).map_err(|e| font_error(e.to_string()))?;
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| font_error(e.to_string()))?;

        let id = FontId(self.fonts.len());
        self.fonts.push(FontAtlas::new(gpu, &font, size));
        log::info!("loaded font {} at {size}px", path.display());
        Ok(id)
    }

    /// Load `preferred` if given, otherwise the first system font that loads.
    ///
    /// Returns `Ok(None)` when no font could be found; the panel then draws
    /// without labels.
    pub fn load_default_font(
        &mut self,
        gpu: &GpuContext,
        preferred: Option<&Path>,
        size: f32,
    ) -> Result<Option<FontId>, AppError> {
        if let Some(path) = preferred {
            return self.load_font(gpu, path, size).map(Some);
        }

        for candidate in SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from) {
            if !candidate.is_file() {
                continue;
            }
            match self.load_font(gpu, &candidate, size) {
                Ok(id) => return Ok(Some(id)),
                Err(err) => log::debug!("skipping font candidate: {err}"),
            }
        }

        log::warn!("no usable system font found; set DISSOLVE_FONT to show panel labels");
        Ok(None)
    }

    pub fn font(&self, id: FontId) -> Option<&FontAtlas> {
        self.fonts.get(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> bool {
        a.0 < b.0 + b.2 && b.0 < a.0 + a.2 && a.1 < b.1 + b.3 && b.1 < a.1 + a.3
    }

    #[test]
    fn packing_keeps_glyphs_inside_and_apart() {
        let sizes: Vec<(u32, u32)> = (0..95).map(|i| (8 + i % 7, 12 + i % 5)).collect();
        let packing = pack_glyphs(&sizes, 1);
        assert_eq!(packing.positions.len(), sizes.len());

        let boxes: Vec<_> = packing
            .positions
            .iter()
            .zip(&sizes)
            .map(|(&(x, y), &(w, h))| (x, y, w, h))
            .collect();
        for (i, a) in boxes.iter().enumerate() {
            assert!(a.0 + a.2 <= packing.width && a.1 + a.3 <= packing.height);
            for b in &boxes[i + 1..] {
                assert!(!overlaps(*a, *b));
            }
        }
    }

    #[test]
    fn packing_grows_the_atlas() {
        let sizes = vec![(100, 100); 12];
        let packing = pack_glyphs(&sizes, 1);
        assert!(packing.width * packing.height >= 12 * 100 * 100);
        assert_eq!(packing.positions.len(), 12);
    }
}

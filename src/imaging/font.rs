// font.rs — 标题字体
// 依次尝试 TrueType 字体文件，全部失败时回退到内置 8x8 点阵字体

use crate::error::{Result, WallError};
use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont, point};
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 已加载、可绘制的字体
pub enum CaptionFont {
    Outline { font: FontVec, px: f32 },
    /// 每个点阵像素放大为 `scale` x `scale`
    Bitmap { scale: u32 },
}

impl CaptionFont {
    pub fn from_file(path: &Path, px: f32) -> Result<Self> {
        let font_err = |reason: String| WallError::FontLoad {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = fs::read(path).map_err(|e| font_err(e.to_string()))?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| font_err(e.to_string()))?;
        Ok(Self::Outline { font, px })
    }

    /// 点阵字体放大到接近 `px` 的高度
    pub fn builtin(px: f32) -> Self {
        Self::Bitmap {
            scale: ((px / 8.0).round() as u32).max(1),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Bitmap { .. })
    }

    /// 文本渲染后的宽和高（像素）
    pub fn measure(&self, text: &str) -> (u32, u32) {
        match self {
            Self::Outline { font, px } => {
                let scaled = font.as_scaled(PxScale::from(*px));
                let mut width = 0.0f32;
                let mut prev: Option<GlyphId> = None;
                for c in text.chars() {
                    let id = scaled.glyph_id(c);
                    if let Some(p) = prev {
                        width += scaled.kern(p, id);
                    }
                    width += scaled.h_advance(id);
                    prev = Some(id);
                }
                let height = scaled.ascent() - scaled.descent();
                (width.ceil().max(0.0) as u32, height.ceil().max(0.0) as u32)
            }
            Self::Bitmap { scale } => {
                let chars = text.chars().count() as u32;
                (chars.saturating_mul(8).saturating_mul(*scale), 8u32.saturating_mul(*scale))
            }
        }
    }

    /// 以 (x, y) 为文本框左上角绘制
    pub fn draw(&self, img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        match self {
            Self::Outline { font, px } => {
                let scaled = font.as_scaled(PxScale::from(*px));
                let baseline = y as f32 + scaled.ascent();
                let mut caret = x as f32;
                let mut prev: Option<GlyphId> = None;
                for c in text.chars() {
                    let id = scaled.glyph_id(c);
                    if let Some(p) = prev {
                        caret += scaled.kern(p, id);
                    }
                    let glyph = id.with_scale_and_position(scaled.scale(), point(caret, baseline));
                    caret += scaled.h_advance(id);
                    prev = Some(id);

                    let Some(outlined) = font.outline_glyph(glyph) else {
                        continue;
                    };
                    let bounds = outlined.px_bounds();
                    outlined.draw(|gx, gy, coverage| {
                        let px = bounds.min.x as i32 + gx as i32;
                        let py = bounds.min.y as i32 + gy as i32;
                        blend(img, px, py, color, coverage);
                    });
                }
            }
            Self::Bitmap { scale } => draw_bitmap_text(img, x, y, text, color, *scale),
        }
    }
}

/// 按顺序尝试的字体候选列表
#[derive(Debug, Clone, Default)]
pub struct FontChain {
    candidates: Vec<PathBuf>,
}

impl FontChain {
    pub fn new(candidates: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    /// 第一个能加载的候选；全部失败时使用内置字体，从不失败
    pub fn resolve(&self, px: f32) -> CaptionFont {
        for path in &self.candidates {
            match CaptionFont::from_file(path, px) {
                Ok(font) => {
                    debug!(font = %path.display(), px, "loaded caption font");
                    return font;
                }
                Err(e) => debug!(error = %e, "font candidate unavailable"),
            }
        }
        debug!(px, "no font candidate loaded, using built-in bitmap font");
        CaptionFont::builtin(px)
    }
}

fn blend(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0);
    let dst = img.get_pixel_mut(x as u32, y as u32);
    for (d, s) in dst.0.iter_mut().zip(color.0) {
        *d = (f32::from(*d) * (1.0 - alpha) + f32::from(s) * alpha).round() as u8;
    }
}

fn draw_bitmap_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: u32) {
    let scale_i = scale.max(1) as i32;
    let mut cursor_x = x;
    for ch in text.chars() {
        let glyph = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?'));
        let Some(glyph) = glyph else {
            cursor_x += 8 * scale_i;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale_i;
                let py = y + row_idx as i32 * scale_i;
                for sy in 0..scale_i {
                    for sx in 0..scale_i {
                        blend(img, px + sx, py + sy, color, 1.0);
                    }
                }
            }
        }
        cursor_x += 8 * scale_i;
    }
}

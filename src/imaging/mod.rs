// imaging/mod.rs — 图片转换与标题叠加
// 去除透明通道（叠加到白色背景）、绘制标题框、编码为 JPEG

pub mod font;

use crate::error::{Result, WallError};
use font::FontChain;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const MIN_FONT_PX: u32 = 13;

/// 标题框尺寸参数
#[derive(Debug, Clone, Copy)]
pub struct CaptionLayout {
    /// 字号占图片高度的比例
    pub font_scale: f32,
    /// 内边距占字号的比例
    pub padding_factor: f32,
}

impl Default for CaptionLayout {
    fn default() -> Self {
        Self {
            font_scale: 0.02,
            padding_factor: 0.4,
        }
    }
}

/// 实际绘制出的标题框（可能比图片更宽，left 为负）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelBox {
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

/// 有透明通道时叠加到不透明白色背景上，否则直接转为 RGB
pub fn flatten(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let a = u32::from(a);
        let over_white = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([over_white(r), over_white(g), over_white(b)]));
    }
    out
}

/// 在图片顶部居中绘制黑底白字的标题框
pub fn overlay_caption(
    img: &mut RgbImage,
    text: &str,
    fonts: &FontChain,
    layout: CaptionLayout,
) -> Option<LabelBox> {
    if text.is_empty() || img.width() == 0 || img.height() == 0 {
        return None;
    }
    let font_px = ((img.height() as f32 * layout.font_scale) as u32).max(MIN_FONT_PX);
    let font = fonts.resolve(font_px as f32);

    let (text_w, text_h) = font.measure(text);
    let pad = (font_px as f32 * layout.padding_factor) as u32;
    let width = text_w.saturating_add(pad.saturating_mul(2));
    let height = text_h.saturating_add(pad.saturating_mul(2));
    let label = LabelBox {
        left: (i64::from(img.width()) - i64::from(width)) / 2,
        top: 0,
        width,
        height,
    };

    fill_rect(img, &label, BOX_COLOR);
    font.draw(
        img,
        (label.left + i64::from(pad)) as i32,
        (label.top + i64::from(pad)) as i32,
        text,
        TEXT_COLOR,
    );
    debug!(?label, font_px, builtin = font.is_builtin(), "caption drawn");
    Some(label)
}

fn fill_rect(img: &mut RgbImage, label: &LabelBox, color: Rgb<u8>) {
    let x0 = label.left.max(0) as u32;
    let y0 = label.top.max(0) as u32;
    let x1 = (label.left + i64::from(label.width)).clamp(0, i64::from(img.width())) as u32;
    let y1 = (label.top + i64::from(label.height)).clamp(0, i64::from(img.height())) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, color);
        }
    }
}

/// 以固定质量编码为 JPEG
pub fn encode_jpeg<W: Write>(img: &RgbImage, writer: W, quality: u8) -> image::ImageResult<()> {
    let mut encoder = JpegEncoder::new_with_quality(writer, quality);
    encoder.encode_image(img)
}

/// 标题相关参数，`None` 表示不绘制
pub struct CaptionSpec<'a> {
    pub text: &'a str,
    pub fonts: &'a FontChain,
    pub layout: CaptionLayout,
}

/// 读取下载的源图片，去除透明、叠加标题后写出最终 JPEG
pub fn render_wallpaper(
    source: &Path,
    output: &Path,
    caption: Option<CaptionSpec<'_>>,
    quality: u8,
) -> Result<()> {
    // 按文件内容而不是扩展名判断格式
    let decoded = ImageReader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode())
        .map_err(|e| WallError::ImageDecode {
            path: source.to_path_buf(),
            source: e,
        })?;
    debug!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        "decoded source image"
    );

    let mut rgb = flatten(decoded);
    if let Some(spec) = caption {
        overlay_caption(&mut rgb, spec.text, spec.fonts, spec.layout);
    }

    let context = || format!("writing {}", output.display());
    let file = File::create(output).map_err(|e| WallError::io(context(), e))?;
    let mut writer = BufWriter::new(file);
    encode_jpeg(&rgb, &mut writer, quality)
        .map_err(|e| WallError::io(context(), std::io::Error::other(e)))?;
    writer.flush().map_err(|e| WallError::io(context(), e))
}

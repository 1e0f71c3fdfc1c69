// src/encoder.rs - 二维码编码（委托给 qrcode crate）

use crate::error::EncodingError;
use crate::types::{Color, EcLevel, RenderOptions};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, Rgb, RgbImage};
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use std::io::Cursor;
use std::path::Path;

/// 输出边长上限（像素）
pub const MAX_DIMENSION: u32 = 8192;
/// 静区宽度上限（模块数）
pub const MAX_MARGIN: u32 = 64;

/// 编码器接口：给定载荷和渲染参数，产出位图、矢量图或终端字符画
pub trait QrEncoder {
    fn png(&self, text: &str, options: &RenderOptions) -> Result<Vec<u8>, EncodingError>;
    fn svg(&self, text: &str, options: &RenderOptions) -> Result<String, EncodingError>;
    fn terminal(&self, text: &str, options: &RenderOptions) -> Result<String, EncodingError>;
}

/// 基于 qrcode crate 的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct QrcodeEncoder;

impl QrcodeEncoder {
    fn code(text: &str, level: EcLevel) -> Result<QrCode, EncodingError> {
        QrCode::with_error_correction_level(text.as_bytes(), ec_level(level))
            .map_err(|e| EncodingError::Qr(e.to_string()))
    }
}

/// 边长或静区超出上限时拒绝，避免一次分配巨量内存
pub fn check_dimensions(options: &RenderOptions) -> Result<(), EncodingError> {
    if options.size > MAX_DIMENSION {
        return Err(EncodingError::TooLarge {
            dim: options.size,
            max: MAX_DIMENSION,
        });
    }
    if options.margin > MAX_MARGIN {
        return Err(EncodingError::MarginTooWide {
            margin: options.margin,
            max: MAX_MARGIN,
        });
    }
    Ok(())
}

impl QrEncoder for QrcodeEncoder {
    /// 输出边长恰好为 `size`（不足以容纳所有模块时取模块总数），按最近邻映射到模块
    fn png(&self, text: &str, options: &RenderOptions) -> Result<Vec<u8>, EncodingError> {
        check_dimensions(options)?;
        let code = Self::code(text, options.error_correction)?;
        let modules = code.width();
        let colors = code.to_colors();
        let margin = options.margin as usize;
        let total = modules + 2 * margin;
        let dim = (options.size as usize).max(total);

        let dark = rgb(options.dark);
        let light = rgb(options.light);
        let img = RgbImage::from_fn(dim as u32, dim as u32, |px, py| {
            let mx = px as usize * total / dim;
            let my = py as usize * total / dim;
            let inside = (margin..margin + modules).contains(&mx)
                && (margin..margin + modules).contains(&my);
            if inside && colors[(my - margin) * modules + (mx - margin)] == qrcode::Color::Dark {
                dark
            } else {
                light
            }
        });

        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    fn svg(&self, text: &str, options: &RenderOptions) -> Result<String, EncodingError> {
        check_dimensions(options)?;
        let code = Self::code(text, options.error_correction)?;
        let dark = options.dark.to_string();
        let light = options.light.to_string();
        Ok(code
            .render::<svg::Color>()
            .min_dimensions(options.size, options.size)
            .quiet_zone(options.margin > 0)
            .dark_color(svg::Color(&dark))
            .light_color(svg::Color(&light))
            .build())
    }

    /// UTF-8 块字符二维码，每行加两个前导空格
    fn terminal(&self, text: &str, options: &RenderOptions) -> Result<String, EncodingError> {
        let code = Self::code(text, options.error_correction)?;
        let image = code
            .render::<unicode::Dense1x2>()
            .quiet_zone(options.margin > 0)
            .build();

        let padded = image
            .lines()
            .map(|l| format!("  {l}"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(padded)
    }
}

fn ec_level(level: EcLevel) -> qrcode::EcLevel {
    match level {
        EcLevel::L => qrcode::EcLevel::L,
        EcLevel::M => qrcode::EcLevel::M,
        EcLevel::Q => qrcode::EcLevel::Q,
        EcLevel::H => qrcode::EcLevel::H,
    }
}

fn rgb(c: Color) -> Rgb<u8> {
    Rgb([c.r, c.g, c.b])
}

/// PNG 字节 → 可内嵌的 data URL（历史记录里的缓存图片）
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// data URL → PNG 字节；格式不对返回 None
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let (_, payload) = url.split_once(";base64,")?;
    STANDARD.decode(payload).ok()
}

// ── 输出格式 ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
}

impl OutputFormat {
    /// 按扩展名判断，未知扩展名按 PNG 处理
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => OutputFormat::Svg,
            _ => OutputFormat::Png,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

/// 单张下载的默认文件名 `qr-code-<毫秒时间戳>.<ext>`
pub fn download_filename(format: OutputFormat, millis: i64) -> String {
    format!("qr-code-{millis}.{}", format.extension())
}

/// 按格式编码成可直接写盘的字节
pub fn render<E: QrEncoder + ?Sized>(
    encoder: &E,
    text: &str,
    options: &RenderOptions,
    format: OutputFormat,
) -> Result<Vec<u8>, EncodingError> {
    match format {
        OutputFormat::Png => encoder.png(text, options),
        OutputFormat::Svg => encoder.svg(text, options).map(String::into_bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn png_has_requested_dimensions_and_colors() {
        let options = RenderOptions {
            size: 200,
            dark: Color::rgb(0x1E, 0x40, 0xAF),
            ..RenderOptions::default()
        };
        let png = QrcodeEncoder.png("https://example.com", &options).unwrap();
        assert!(png.starts_with(PNG_MAGIC));

        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (200, 200));
        // 左上角落在静区里
        assert_eq!(*img.get_pixel(0, 0), Rgb([0xFF, 0xFF, 0xFF]));
        assert!(img.pixels().any(|p| *p == Rgb([0x1E, 0x40, 0xAF])));
    }

    #[test]
    fn tiny_size_grows_to_fit_modules() {
        let options = RenderOptions {
            size: 1,
            margin: 0,
            ..RenderOptions::default()
        };
        let png = QrcodeEncoder.png("hi", &options).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        // version 1 = 21 个模块
        assert_eq!(img.width(), 21);
        // 无静区时左上角是定位图案的深色模块
        assert_eq!(*img.to_rgb8().get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn svg_embeds_colors() {
        let options = RenderOptions {
            dark: Color::rgb(0x0F, 0x17, 0x2A),
            light: Color::rgb(0xF8, 0xFA, 0xFC),
            ..RenderOptions::default()
        };
        let svg = QrcodeEncoder.svg("pubkey://example", &options).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("#0F172A"));
        assert!(svg.contains("#F8FAFC"));
    }

    #[test]
    fn over_capacity_is_an_encoding_error() {
        let options = RenderOptions {
            error_correction: EcLevel::H,
            ..RenderOptions::default()
        };
        let text = "a".repeat(4000);
        assert!(matches!(
            QrcodeEncoder.png(&text, &options),
            Err(EncodingError::Qr(_))
        ));
    }

    #[test]
    fn oversized_output_is_rejected_before_rendering() {
        let huge = RenderOptions {
            size: 1_000_000,
            ..RenderOptions::default()
        };
        assert!(matches!(
            QrcodeEncoder.png("hi", &huge),
            Err(EncodingError::TooLarge { dim: 1_000_000, max: MAX_DIMENSION })
        ));
        assert!(QrcodeEncoder.svg("hi", &huge).is_err());

        let wide = RenderOptions {
            margin: u32::MAX,
            ..RenderOptions::default()
        };
        assert!(matches!(
            QrcodeEncoder.png("hi", &wide),
            Err(EncodingError::MarginTooWide { .. })
        ));

        let edge = RenderOptions {
            size: MAX_DIMENSION,
            margin: MAX_MARGIN,
            ..RenderOptions::default()
        };
        assert!(check_dimensions(&edge).is_ok());
    }

    #[test]
    fn terminal_rendering_is_padded() {
        let out = QrcodeEncoder.terminal("hi", &RenderOptions::default()).unwrap();
        assert!(out.lines().all(|l| l.starts_with("  ")));
    }

    #[test]
    fn data_url_round_trip() {
        let url = png_data_url(b"\x89PNGabc");
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), b"\x89PNGabc");
        assert!(decode_data_url("not a data url").is_none());
    }

    #[test]
    fn output_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a.SVG")), OutputFormat::Svg);
        assert_eq!(OutputFormat::from_path(Path::new("a.png")), OutputFormat::Png);
        assert_eq!(OutputFormat::from_path(Path::new("a")), OutputFormat::Png);
        assert_eq!(download_filename(OutputFormat::Svg, 42), "qr-code-42.svg");
    }
}

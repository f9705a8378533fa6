use image::{imageops, GrayImage, ImageError, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::path::Path;
use utils::app_config::QrConfig;
use utils::error::{Error, Result};

/// 每个模块的像素边长
pub const DEFAULT_BOX_SIZE: u32 = 10;
/// 四周留白的模块数
pub const DEFAULT_BORDER: u32 = 5;

const MAX_BOX_SIZE: u32 = 100;
const MAX_BORDER: u32 = 100;

const LIGHT: Luma<u8> = Luma([255]);

/// 把二维码内容写成图片文件
pub trait ArtifactWriter {
    fn write_qr(&self, content: &str, destination: &Path) -> Result<()>;
}

pub fn parse_ec_level(level: &str) -> Result<EcLevel> {
    match level.trim().to_ascii_uppercase().as_str() {
        "L" => Ok(EcLevel::L),
        "M" => Ok(EcLevel::M),
        "Q" => Ok(EcLevel::Q),
        "H" => Ok(EcLevel::H),
        other => Err(Error::Config(format!(
            "unknown error correction level '{}', expected L, M, Q or H",
            other
        ))),
    }
}

/// PNG 二维码写入器，版本随内容自动增长
#[derive(Debug, Clone, Copy)]
pub struct QrWriter {
    pub box_size: u32,
    pub border: u32,
    pub ec_level: EcLevel,
}

impl Default for QrWriter {
    fn default() -> Self {
        Self {
            box_size: DEFAULT_BOX_SIZE,
            border: DEFAULT_BORDER,
            ec_level: EcLevel::M,
        }
    }
}

impl QrWriter {
    pub fn from_config(config: &QrConfig) -> Result<Self> {
        if config.box_size == 0 || config.box_size > MAX_BOX_SIZE {
            return Err(Error::Config(format!(
                "qr.box_size must be between 1 and {}, got {}",
                MAX_BOX_SIZE, config.box_size
            )));
        }
        if config.border > MAX_BORDER {
            return Err(Error::Config(format!(
                "qr.border must be at most {}, got {}",
                MAX_BORDER, config.border
            )));
        }
        Ok(Self {
            box_size: config.box_size,
            border: config.border,
            ec_level: parse_ec_level(&config.error_correction)?,
        })
    }

    /// 编码并栅格化为灰度图
    pub fn render(&self, content: &str) -> Result<GrayImage> {
        let code = QrCode::with_error_correction_level(content.as_bytes(), self.ec_level)
            .map_err(|e| Error::Qr(format!("cannot encode {} bytes: {}", content.len(), e)))?;

        let modules = code.width() as u32;
        let size = self
            .border
            .checked_mul(2)
            .and_then(|b| b.checked_add(modules))
            .and_then(|m| m.checked_mul(self.box_size))
            .ok_or_else(|| {
                Error::Qr(format!(
                    "{} modules with border {} at {} px do not fit in an image",
                    modules, self.border, self.box_size
                ))
            })?;

        let symbol = code
            .render::<Luma<u8>>()
            .quiet_zone(false)
            .module_dimensions(self.box_size, self.box_size)
            .build();

        // 留白宽度与默认 4 模块的 quiet zone 不同，单独铺白底
        let offset = i64::from(self.border) * i64::from(self.box_size);
        let mut image = GrayImage::from_pixel(size, size, LIGHT);
        imageops::overlay(&mut image, &symbol, offset, offset);

        Ok(image)
    }
}

impl ArtifactWriter for QrWriter {
    fn write_qr(&self, content: &str, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let image = self.render(content)?;
        image
            .save_with_format(destination, ImageFormat::Png)
            .map_err(|e| match e {
                ImageError::IoError(io) => Error::Io(io),
                other => Error::Image(format!("{}: {}", destination.display(), other)),
            })?;

        log::debug!("Wrote QR code to {}", destination.display());
        Ok(())
    }
}

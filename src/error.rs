// src/error.rs - 错误分类

use crate::types::ContentType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Encoding(#[from] EncodingError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Archive(#[from] ArchiveError),

    #[error("{0}")]
    Clipboard(#[from] ClipboardError),

    #[error("没有可生成的内容")]
    NothingToGenerate,
}

/// 输入校验失败。`Empty` 与 `TooLong` 是硬性拦截，`Syntax` 仅作提示
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("内容不能为空")]
    Empty,

    #[error("内容过长（{len} 个字符，最多 {max} 个）")]
    TooLong { len: usize, max: usize },

    #[error("{kind} 格式不正确: {value}")]
    Syntax { kind: ContentType, value: String },
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("二维码编码失败: {0}")]
    Qr(String),

    #[error("图片编码失败: {0}")]
    Image(#[from] image::ImageError),

    #[error("图片过大: 边长 {dim}px，上限 {max}px")]
    TooLarge { dim: u32, max: u32 },

    #[error("静区过宽: {margin} 个模块，上限 {max}")]
    MarginTooWide { margin: u32, max: u32 },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("存储读写失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("存储数据格式错误: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("打包失败: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("保存压缩包失败: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("剪贴板不可用")]
    Unavailable,

    #[error("复制失败: {0}")]
    Failed(String),
}

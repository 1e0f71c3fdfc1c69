// src/lib.rs - 载荷格式化、输入清洗、历史记录与批量生成

pub mod batch;
pub mod clipboard;
pub mod config;
pub mod encoder;
pub mod error;
pub mod format;
pub mod history;
pub mod limiter;
pub mod live;
pub mod sanitize;
pub mod store;
pub mod types;

pub use encoder::{QrEncoder, QrcodeEncoder};
pub use error::{Error, Result};
pub use history::{HistoryEntry, HistoryStore};
pub use types::{ContentInput, ContentType, QrRequest, RenderOptions};

// src/clipboard.rs - 复制到系统剪贴板

use crate::error::ClipboardError;
use clipboard_rs::{Clipboard, ClipboardContext};
use tracing::debug;

/// 写入纯文本。拿不到剪贴板（无图形会话等）返回 `Unavailable`，
/// 调用方据此退回到直接打印
pub fn copy(text: &str) -> Result<(), ClipboardError> {
    let ctx = ClipboardContext::new().map_err(|e| {
        debug!("剪贴板不可用: {e}");
        ClipboardError::Unavailable
    })?;
    write_text(&ctx, text)
}

fn write_text<C: Clipboard>(ctx: &C, text: &str) -> Result<(), ClipboardError> {
    ctx.set_text(text.to_string())
        .map_err(|e| ClipboardError::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headless() -> bool {
        cfg!(target_os = "linux")
            && std::env::var_os("DISPLAY").is_none()
            && std::env::var_os("WAYLAND_DISPLAY").is_none()
    }

    #[test]
    fn headless_session_reports_an_error() {
        if !headless() {
            return;
        }
        assert!(copy("hello").is_err());
    }

    #[test]
    fn errors_read_as_messages() {
        assert_eq!(ClipboardError::Unavailable.to_string(), "剪贴板不可用");
        assert_eq!(
            ClipboardError::Failed("denied".into()).to_string(),
            "复制失败: denied"
        );
    }
}

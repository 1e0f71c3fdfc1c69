// src/batch.rs - 批量生成：CSV 导入、逐条编码、打包 zip

use crate::encoder::QrEncoder;
use crate::error::{ArchiveError, Error, Result};
use crate::sanitize;
use crate::types::RenderOptions;
use chrono::{DateTime, Utc};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const TEMPLATE_FILE_NAME: &str = "qr-batch-template.csv";

pub const TEMPLATE_CSV: &str = "text,filename\n\
\"https://example.com\",\"example-url\"\n\
\"Hello World\",\"greeting\"\n\
\"Contact: john@example.com\",\"contact-info\"";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub id: String,
    pub text: String,
    pub filename: Option<String>,
}

impl BatchItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// 压缩包里的条目名；文件名为空时用 `qr-<序号>`（从 1 开始）
    fn entry_name(&self, position: usize) -> String {
        let stem = self
            .filename
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("qr-{position}"));
        format!("{stem}.png")
    }
}

/// 解析两列 CSV（`text,filename`），去引号、去首尾空白，跳过空行和表头
pub fn parse_csv(csv: &str) -> Vec<BatchItem> {
    csv.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !is_header(line))
        .enumerate()
        .map(|(index, line)| {
            let mut cols = line.split(',').map(|s| s.trim().replace('"', ""));
            let text = cols.next().unwrap_or_default();
            let filename = cols
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("qr-{}", index + 1));
            BatchItem {
                id: (index + 1).to_string(),
                text,
                filename: Some(filename),
            }
        })
        .collect()
}

fn is_header(line: &str) -> bool {
    line.replace('"', "").trim().eq_ignore_ascii_case("text,filename")
}

/// 压缩包文件名 `qr-codes-batch-<ISO 时间，冒号换成 ->.zip`
pub fn archive_name(at: DateTime<Utc>) -> String {
    format!("qr-codes-batch-{}.zip", at.format("%Y-%m-%dT%H-%M-%S"))
}

/// 写出 CSV 模板，返回文件路径
pub fn save_template(dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join(TEMPLATE_FILE_NAME);
    std::fs::write(&path, TEMPLATE_CSV)?;
    Ok(path)
}

// ── 批量生成 ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct BatchFailure {
    pub item_id: String,
    pub error: Error,
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// 打包好的 zip 字节
    pub archive: Vec<u8>,
    pub file_name: String,
    /// 实际写进压缩包的条目名（按首次写入顺序）
    pub entries: Vec<String>,
    pub total: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn generated(&self) -> usize {
        self.total - self.failures.len()
    }

    /// 写到目录下，返回完整路径
    pub fn save(&self, dir: &Path) -> std::result::Result<PathBuf, ArchiveError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.archive)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Generating,
}

/// 批量条目的编辑状态与生成流程
#[derive(Debug)]
pub struct BatchCoordinator {
    items: Vec<BatchItem>,
    state: BatchState,
    progress: f64,
}

impl Default for BatchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchCoordinator {
    /// 初始时有一条空白条目
    pub fn new() -> Self {
        Self::with_items(vec![BatchItem::new("1", "")])
    }

    pub fn with_items(items: Vec<BatchItem>) -> Self {
        Self {
            items,
            state: BatchState::Idle,
            progress: 0.0,
        }
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// 新条目 id = 现有最大数字 id + 1
    pub fn add_item(&mut self) -> &BatchItem {
        let next = self
            .items
            .iter()
            .filter_map(|i| i.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        self.items.push(BatchItem::new(next.to_string(), ""));
        &self.items[self.items.len() - 1]
    }

    /// 至少保留一条
    pub fn remove_item(&mut self, id: &str) {
        if self.items.len() > 1 {
            self.items.retain(|i| i.id != id);
        }
    }

    pub fn update_item(&mut self, id: &str, text: Option<&str>, filename: Option<&str>) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            if let Some(t) = text {
                item.text = t.to_string();
            }
            if let Some(f) = filename {
                item.filename = Some(f.to_string());
            }
        }
    }

    /// 用 CSV 内容替换当前条目；CSV 没有有效行时保持不变
    pub fn import_csv(&mut self, csv: &str) -> usize {
        let items = parse_csv(csv);
        let count = items.len();
        if count > 0 {
            self.items = items;
        }
        count
    }

    pub fn has_valid_items(&self) -> bool {
        self.items.iter().any(|i| !i.text.trim().is_empty())
    }

    /// 逐条顺序生成。单条失败只记录不中断；只有打包失败才让整批失败。
    /// 每处理完一条回调一次进度（0–100）。
    pub fn generate<E: QrEncoder + ?Sized>(
        &mut self,
        base: &RenderOptions,
        encoder: &E,
        mut on_progress: impl FnMut(f64),
    ) -> Result<BatchOutcome> {
        let valid: Vec<&BatchItem> = self
            .items
            .iter()
            .filter(|i| !i.text.trim().is_empty())
            .collect();
        if valid.is_empty() {
            return Err(Error::NothingToGenerate);
        }

        self.state = BatchState::Generating;
        self.progress = 0.0;
        let total = valid.len();
        let mut archive = Archive::default();
        let mut failures = Vec::new();

        for (i, item) in valid.iter().enumerate() {
            match render_item(item, base, encoder) {
                Ok(png) => archive.insert(item.entry_name(i + 1), png),
                Err(e) => {
                    warn!(item = %item.id, "批量生成失败: {e}");
                    failures.push(BatchFailure {
                        item_id: item.id.clone(),
                        error: e,
                    });
                }
            }
            self.progress = (i + 1) as f64 / total as f64 * 100.0;
            on_progress(self.progress);
        }

        let packed = archive.pack();
        self.state = BatchState::Idle;
        self.progress = 0.0;

        let bytes = packed.map_err(|e| {
            error!("批量打包失败: {e}");
            Error::Archive(e)
        })?;
        info!("已生成 {} / {} 个二维码", total - failures.len(), total);

        Ok(BatchOutcome {
            archive: bytes,
            file_name: archive_name(Utc::now()),
            entries: archive.names(),
            total,
            failures,
        })
    }
}

fn render_item<E: QrEncoder + ?Sized>(
    item: &BatchItem,
    base: &RenderOptions,
    encoder: &E,
) -> Result<Vec<u8>> {
    let text = sanitize::prepare(item.text.trim())?;
    Ok(encoder.png(&text, base)?)
}

/// 内存中的压缩包内容；同名条目直接覆盖
#[derive(Default)]
struct Archive {
    files: Vec<(String, Vec<u8>)>,
}

impl Archive {
    fn insert(&mut self, name: String, data: Vec<u8>) {
        match self.files.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = data,
            None => self.files.push((name, data)),
        }
    }

    fn names(&self) -> Vec<String> {
        self.files.iter().map(|(n, _)| n.clone()).collect()
    }

    fn pack(&self) -> std::result::Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in &self.files {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

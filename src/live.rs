// src/live.rs - 输入防抖的实时生成：单槽位，新请求覆盖旧请求

use crate::encoder::QrEncoder;
use crate::error::Error;
use crate::sanitize;
use crate::types::{Color, QrRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_QUIET: Duration = Duration::from_millis(300);

/// 一次生成的结果
#[derive(Debug)]
pub enum LiveOutcome {
    /// 输入为空，清空显示
    Cleared,
    Ready { text: String, art: String },
    Failed(Error),
}

#[derive(Debug)]
pub struct Generated {
    pub seq: u64,
    pub request: QrRequest,
    pub outcome: LiveOutcome,
}

/// 被采纳的结果；`record_history` 表示这次需要写入历史
#[derive(Debug)]
pub struct Applied {
    pub generated: Generated,
    pub record_history: bool,
}

/// 同一份内容+外观只记一次历史
#[derive(Debug, Clone, PartialEq, Eq)]
struct GenerationKey {
    text: String,
    size: u32,
    dark: Color,
    light: Color,
}

pub struct LiveSession<E> {
    encoder: Arc<E>,
    quiet: Duration,
    latest: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<Generated>,
    last_recorded: Option<GenerationKey>,
}

impl<E> LiveSession<E>
where
    E: QrEncoder + Send + Sync + 'static,
{
    /// 返回会话和结果接收端
    pub fn new(encoder: E, quiet: Duration) -> (Self, mpsc::UnboundedReceiver<Generated>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            encoder: Arc::new(encoder),
            quiet,
            latest: Arc::new(AtomicU64::new(0)),
            pending: None,
            tx,
            last_recorded: None,
        };
        (session, rx)
    }

    /// 每次输入调用一次：取消尚未触发的定时器，安静期过后只生成最新的请求
    pub fn submit(&mut self, request: QrRequest) -> u64 {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(prev) = self.pending.take() {
            prev.abort();
        }

        let encoder = Arc::clone(&self.encoder);
        let latest = Arc::clone(&self.latest);
        let tx = self.tx.clone();
        let quiet = self.quiet;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if latest.load(Ordering::SeqCst) != seq {
                return;
            }
            let outcome = render(encoder.as_ref(), &request);
            let _ = tx.send(Generated {
                seq,
                request,
                outcome,
            });
        }));
        seq
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// 只采纳最新请求的结果；被覆盖的请求即使晚到也直接丢弃
    pub fn apply(&mut self, generated: Generated) -> Option<Applied> {
        if generated.seq != self.latest() {
            debug!(seq = generated.seq, latest = self.latest(), "丢弃过期结果");
            return None;
        }

        let record_history = match &generated.outcome {
            LiveOutcome::Ready { text, .. } => {
                let opts = &generated.request.options;
                let key = GenerationKey {
                    text: text.clone(),
                    size: opts.size,
                    dark: opts.dark,
                    light: opts.light,
                };
                if self.last_recorded.as_ref() == Some(&key) {
                    false
                } else {
                    self.last_recorded = Some(key);
                    true
                }
            }
            _ => false,
        };

        Some(Applied {
            generated,
            record_history,
        })
    }
}

fn render<E: QrEncoder + ?Sized>(encoder: &E, request: &QrRequest) -> LiveOutcome {
    let text = sanitize::sanitize(&request.text);
    if text.is_empty() {
        return LiveOutcome::Cleared;
    }
    if let Err(e) = sanitize::validate(&text) {
        return LiveOutcome::Failed(e.into());
    }
    match encoder.terminal(&text, &request.options) {
        Ok(art) => LiveOutcome::Ready { text, art },
        Err(e) => LiveOutcome::Failed(e.into()),
    }
}

// src/main.rs - 命令行入口

use airqr::batch::{self, BatchCoordinator};
use airqr::clipboard;
use airqr::config::Config;
use airqr::encoder::{self, OutputFormat, QrEncoder, QrcodeEncoder};
use airqr::error::ClipboardError;
use airqr::format::{self, Escape};
use airqr::history::HistoryStore;
use airqr::live::{LiveOutcome, LiveSession};
use airqr::sanitize;
use airqr::store::FileStore;
use airqr::types::{self, Color, ContentInput, EcLevel, QrRequest, RenderOptions, VCardFields, WifiFields, WifiSecurity};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ════════════════════════════════════════════════════════════════
// CLI 参数
// ════════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "airqr", about = "二维码生成器", version)]
struct Cli {
    #[command(flatten)]
    render: RenderArgs,
    #[command(subcommand)]
    cmd: Cmd,
}

/// 渲染参数，覆盖配置文件里的默认值
#[derive(Args)]
struct RenderArgs {
    /// 图片边长（像素）
    #[arg(long, global = true)]
    size: Option<u32>,
    /// 纠错等级 L/M/Q/H
    #[arg(long = "ec", global = true)]
    error_correction: Option<EcLevel>,
    /// 静区宽度（模块数）
    #[arg(long, global = true)]
    margin: Option<u32>,
    #[arg(long, global = true)]
    dark: Option<Color>,
    #[arg(long, global = true)]
    light: Option<Color>,
    /// 预设配色（Classic/Blue/Green/Purple/Red/Orange/Pink/Teal）
    #[arg(long, global = true)]
    preset: Option<String>,
    /// 转义 WIFI/vCard 字段里的保留字符
    #[arg(long, global = true)]
    escape: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// 输出文件（.png/.svg）或目录；不指定时在终端显示
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// 输出到目录时使用 SVG
    #[arg(long)]
    svg: bool,
    /// 不写入历史记录
    #[arg(long)]
    no_history: bool,
    /// 同时把载荷复制到剪贴板
    #[arg(long)]
    copy: bool,
}

#[derive(Args)]
struct VCardArgs {
    #[arg(long, default_value = "")]
    first: String,
    #[arg(long, default_value = "")]
    last: String,
    #[arg(long, default_value = "")]
    org: String,
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long, default_value = "")]
    phone: String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    website: String,
    #[arg(long, default_value = "")]
    street: String,
    #[arg(long, default_value = "")]
    city: String,
    #[arg(long, default_value = "")]
    state: String,
    #[arg(long, default_value = "")]
    zip: String,
    #[arg(long, default_value = "")]
    country: String,
}

impl From<VCardArgs> for VCardFields {
    fn from(a: VCardArgs) -> Self {
        VCardFields {
            first_name: a.first,
            last_name: a.last,
            organization: a.org,
            title: a.title,
            phone: a.phone,
            email: a.email,
            website: a.website,
            street: a.street,
            city: a.city,
            state: a.state,
            zip: a.zip,
            country: a.country,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// 纯文本
    Text {
        text: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// 网址
    Url {
        url: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// 邮箱地址（生成 mailto:）
    Email {
        address: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// 电话号码（生成 tel:）
    Phone {
        number: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// 短信，格式 `号码:内容`
    Sms {
        raw: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Wi-Fi 连接信息
    Wifi {
        #[arg(long)]
        ssid: String,
        #[arg(long, default_value = "")]
        password: String,
        /// WPA / WEP / nopass
        #[arg(long, default_value = "WPA")]
        security: WifiSecurity,
        #[arg(long)]
        hidden: bool,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// 联系人名片（vCard 3.0）
    Vcard {
        #[command(flatten)]
        fields: VCardArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// 历史记录
    #[command(subcommand)]
    History(HistoryCmd),
    /// 按 CSV（text,filename）批量生成并打包 zip
    Batch {
        csv: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// 写出批量生成用的 CSV 模板
    Template {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// 从标准输入逐行读取，实时生成（防抖）
    Live,
    /// 复制文本到剪贴板
    Copy { text: String },
}

#[derive(Subcommand)]
enum HistoryCmd {
    /// 列出历史记录（最新在前）
    List,
    /// 显示某条记录的二维码
    Show { id: String },
    /// 删除某条记录
    Remove { id: String },
    /// 清空历史记录
    Clear,
    /// 导出某条记录的 PNG
    Export {
        id: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

// ════════════════════════════════════════════════════════════════
// 入口
// ════════════════════════════════════════════════════════════════

/// 一次运行的上下文
struct Ctx {
    cfg: Config,
    render: RenderOptions,
    escape: Escape,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (cfg, cfg_err) = match Config::load() {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_logging(&cfg.log_level);
    if let Some(e) = cfg_err {
        warn!("配置文件无效，使用默认配置: {e:#}");
    }

    let render = cli.render.resolve(&cfg)?;
    let escape = Escape::from_flag(cli.render.escape || cfg.escape_reserved);
    let ctx = Ctx {
        cfg,
        render,
        escape,
    };

    match cli.cmd {
        Cmd::Text { text, out } => generate(&ctx, ContentInput::Text(text), &out)?,
        Cmd::Url { url, out } => generate(&ctx, ContentInput::Url(url), &out)?,
        Cmd::Email { address, out } => generate(&ctx, ContentInput::Email(address), &out)?,
        Cmd::Phone { number, out } => generate(&ctx, ContentInput::Phone(number), &out)?,
        Cmd::Sms { raw, out } => generate(&ctx, ContentInput::sms_from_raw(&raw), &out)?,
        Cmd::Wifi {
            ssid,
            password,
            security,
            hidden,
            out,
        } => {
            let fields = WifiFields {
                ssid,
                password,
                security,
                hidden,
            };
            generate(&ctx, ContentInput::Wifi(fields), &out)?
        }
        Cmd::Vcard { fields, out } => generate(&ctx, ContentInput::VCard(fields.into()), &out)?,
        Cmd::History(cmd) => run_history(&ctx, cmd)?,
        Cmd::Batch { csv, out_dir } => run_batch(&ctx, &csv, &out_dir).await?,
        Cmd::Template { out_dir } => {
            let path = batch::save_template(&out_dir)?;
            println!("模板已保存: {}", path.display());
        }
        Cmd::Live => run_live(&ctx).await?,
        Cmd::Copy { text } => copy_text(&sanitize::sanitize(&text)),
    }

    Ok(())
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

impl RenderArgs {
    /// 配置文件 → 预设配色 → 单项参数，后者覆盖前者
    fn resolve(&self, cfg: &Config) -> Result<RenderOptions> {
        let mut opts = cfg.render_options();
        if let Some(name) = &self.preset {
            let preset = types::preset(name).ok_or_else(|| anyhow!("未知的预设配色: {name}"))?;
            opts = opts.with_preset(&preset);
        }
        if let Some(size) = self.size {
            opts.size = size;
        }
        if let Some(level) = self.error_correction {
            opts.error_correction = level;
        }
        if let Some(margin) = self.margin {
            opts.margin = margin;
        }
        if let Some(dark) = self.dark {
            opts.dark = dark;
        }
        if let Some(light) = self.light {
            opts.light = light;
        }
        if opts.size == 0 {
            bail!("尺寸必须大于 0");
        }
        encoder::check_dimensions(&opts)?;
        Ok(opts)
    }
}

fn open_history(cfg: &Config) -> HistoryStore<FileStore> {
    HistoryStore::load_with_limit(FileStore::new(cfg.data_dir()), cfg.history_limit)
}

// ════════════════════════════════════════════════════════════════
// 单个生成
// ════════════════════════════════════════════════════════════════

fn generate(ctx: &Ctx, input: ContentInput, out: &OutputArgs) -> Result<()> {
    // 语法检查只提示，不拦截
    if let Err(e) = format::check(&input) {
        eprintln!("⚠ {e}");
    }

    let mut request = QrRequest::with_escape(input, ctx.render.clone(), ctx.escape);
    request.text = sanitize::prepare(&request.text)?;
    let text = request.text.as_str();
    let opts = &request.options;
    let encoder = QrcodeEncoder;

    let png = encoder.png(text, opts)?;
    match &out.out {
        Some(path) => {
            let path = resolve_output(path, out.svg);
            let format = OutputFormat::from_path(&path);
            let bytes = match format {
                OutputFormat::Png => png.clone(),
                OutputFormat::Svg => encoder::render(&encoder, text, opts, format)?,
            };
            std::fs::write(&path, bytes).with_context(|| format!("无法写入 {}", path.display()))?;
            println!("已保存: {}", path.display());
        }
        None => println!("{}", encoder.terminal(text, opts)?),
    }

    if out.copy {
        copy_text(text);
    }
    if !out.no_history {
        let mut history = open_history(&ctx.cfg);
        if let Some(id) = history.add(&request, Some(encoder::png_data_url(&png))) {
            info!("已记入历史: {id}");
        }
    }
    Ok(())
}

/// 输出到已有目录时自动命名
fn resolve_output(path: &Path, svg: bool) -> PathBuf {
    if path.is_dir() {
        let format = if svg { OutputFormat::Svg } else { OutputFormat::Png };
        path.join(encoder::download_filename(format, Utc::now().timestamp_millis()))
    } else {
        path.to_path_buf()
    }
}

/// 剪贴板不可用时退回到直接打印，方便手动复制
fn copy_text(text: &str) {
    match clipboard::copy(text) {
        Ok(()) => println!("已复制到剪贴板"),
        Err(ClipboardError::Unavailable) => {
            eprintln!("剪贴板不可用，请手动复制：");
            println!("{text}");
        }
        Err(e) => eprintln!("✗ {e}"),
    }
}

// ════════════════════════════════════════════════════════════════
// 历史记录
// ════════════════════════════════════════════════════════════════

fn run_history(ctx: &Ctx, cmd: HistoryCmd) -> Result<()> {
    let mut history = open_history(&ctx.cfg);
    match cmd {
        HistoryCmd::List => {
            if history.is_empty() {
                println!("暂无历史记录");
                return Ok(());
            }
            let now = Utc::now();
            for entry in history.entries() {
                let opts = &entry.request.options;
                println!(
                    "{}  {:<9} {}×{}px • EC: {}  {}",
                    entry.id,
                    entry.relative_time(now),
                    opts.size,
                    opts.size,
                    opts.error_correction.label(),
                    entry.summary().replace('\n', " ⏎ "),
                );
            }
        }
        HistoryCmd::Show { id } => {
            let entry = history.get(&id).ok_or_else(|| anyhow!("找不到记录: {id}"))?;
            let opts = &entry.request.options;
            println!("{}\n", entry.text);
            println!(
                "{}×{}px • EC: {}，{}",
                opts.size,
                opts.size,
                opts.error_correction.label(),
                opts.error_correction.description(),
            );
            println!("{}", QrcodeEncoder.terminal(&entry.text, &entry.request.options)?);
        }
        HistoryCmd::Remove { id } => {
            history.remove(&id);
            println!("已删除: {id}");
        }
        HistoryCmd::Clear => {
            history.clear();
            println!("历史记录已清空");
        }
        HistoryCmd::Export { id, out } => {
            let entry = history.get(&id).ok_or_else(|| anyhow!("找不到记录: {id}"))?;
            // 没有缓存图片就按原参数重新生成
            let png = match entry.cached_image.as_deref().and_then(encoder::decode_data_url) {
                Some(png) => png,
                None => QrcodeEncoder.png(&entry.text, &entry.request.options)?,
            };
            let path = out.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "{}.png",
                    entry.download_stem(Utc::now().timestamp_millis())
                ))
            });
            std::fs::write(&path, png).with_context(|| format!("无法写入 {}", path.display()))?;
            println!("已导出: {}", path.display());
        }
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════
// 批量生成
// ════════════════════════════════════════════════════════════════

async fn run_batch(ctx: &Ctx, csv: &Path, out_dir: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(csv)
        .await
        .with_context(|| format!("无法读取 {}", csv.display()))?;

    let mut coordinator = BatchCoordinator::new();
    if coordinator.import_csv(&text) == 0 || !coordinator.has_valid_items() {
        bail!("CSV 中没有可生成的内容");
    }

    let outcome = coordinator.generate(&ctx.render, &QrcodeEncoder, |p| {
        eprint!("\r生成中… {p:>3.0}%");
    })?;
    eprintln!();

    let path = outcome.save(out_dir)?;
    println!(
        "已生成 {} / {} 个二维码 → {}",
        outcome.generated(),
        outcome.total,
        path.display()
    );
    for failure in &outcome.failures {
        eprintln!("  ✗ 第 {} 条: {}", failure.item_id, failure.error);
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════
// 实时生成：每行输入视为一次编辑，只显示最新结果
// ════════════════════════════════════════════════════════════════

async fn run_live(ctx: &Ctx) -> Result<()> {
    let (mut session, mut rx) = LiveSession::new(QrcodeEncoder, ctx.cfg.debounce());
    let mut history = open_history(&ctx.cfg);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_done = false;
    let idle = ctx.cfg.debounce() * 4;

    loop {
        tokio::select! {
            line = lines.next_line(), if !input_done => match line? {
                Some(l) => {
                    let input = ContentInput::Text(l);
                    session.submit(QrRequest::with_escape(input, ctx.render.clone(), ctx.escape));
                }
                None => input_done = true,
            },
            Some(generated) = rx.recv() => {
                let Some(applied) = session.apply(generated) else { continue };
                let request = &applied.generated.request;
                match &applied.generated.outcome {
                    LiveOutcome::Cleared => print!("\x1b[2J\x1b[H"),
                    LiveOutcome::Ready { text, art } => {
                        println!("\x1b[2J\x1b[H{art}\n\n  {text}");
                        if applied.record_history {
                            let snapshot = QrRequest { text: text.clone(), ..request.clone() };
                            history.add(&snapshot, None);
                        }
                    }
                    LiveOutcome::Failed(e) => eprintln!("✗ {e}"),
                }
            }
            _ = tokio::time::sleep(idle), if input_done => break,
        }
    }
    Ok(())
}

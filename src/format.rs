// src/format.rs - 把结构化输入转成交给编码器的规范化载荷

use crate::error::ValidationError;
use crate::types::{ContentInput, ContentType, VCardFields, WifiFields};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+]?[1-9][0-9\s\-()]{7,15}$").expect("phone regex"));

/// 名片里被当作"未填写"的占位域名
const PLACEHOLDER_DOMAIN: &str = "@example.com";

/// 与 encodeURIComponent 保持一致的保留集
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// 是否转义 WIFI/vCard 字段里的保留字符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escape {
    /// 原样拼接，值里含保留字符时记录会损坏
    #[default]
    None,
    /// 按各自格式的规则用反斜杠转义
    Reserved,
}

impl Escape {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Escape::Reserved
        } else {
            Escape::None
        }
    }
}

/// 按内容类型生成规范化载荷。只接受原始输入，不要把已规范化的载荷再传进来
pub fn canonical(input: &ContentInput, escape: Escape) -> String {
    match input {
        ContentInput::Text(s) | ContentInput::Url(s) => s.clone(),
        ContentInput::Email(address) => email(address),
        ContentInput::Phone(number) => phone(number),
        ContentInput::Sms { phone, message } => sms(phone, message),
        ContentInput::Wifi(fields) => wifi(fields, escape),
        ContentInput::VCard(fields) => vcard(fields, escape),
    }
}

pub fn email(address: &str) -> String {
    prefixed("mailto:", address)
}

pub fn phone(number: &str) -> String {
    prefixed("tel:", number)
}

fn prefixed(scheme: &str, raw: &str) -> String {
    if raw.is_empty() {
        String::new()
    } else {
        format!("{scheme}{raw}")
    }
}

/// `sms:<号码>`，短信内容非空时追加 `?body=`
pub fn sms(phone: &str, message: &str) -> String {
    if phone.is_empty() && message.is_empty() {
        return String::new();
    }
    if message.is_empty() {
        format!("sms:{phone}")
    } else {
        let body = utf8_percent_encode(message, URI_COMPONENT);
        format!("sms:{phone}?body={body}")
    }
}

pub fn wifi(fields: &WifiFields, escape: Escape) -> String {
    let (ssid, password) = match escape {
        Escape::None => (fields.ssid.clone(), fields.password.clone()),
        Escape::Reserved => (escape_wifi_field(&fields.ssid), escape_wifi_field(&fields.password)),
    };
    format!(
        "WIFI:T:{};S:{ssid};P:{password};H:{};;",
        fields.security.as_str(),
        fields.hidden
    )
}

/// vCard 3.0，行顺序固定
pub fn vcard(fields: &VCardFields, escape: Escape) -> String {
    let v = |s: &str| match escape {
        Escape::None => s.to_string(),
        Escape::Reserved => escape_vcard_value(s),
    };

    let mut card = String::from("BEGIN:VCARD\nVERSION:3.0\n");

    let full_name = format!("{} {}", fields.first_name, fields.last_name);
    let full_name = full_name.trim();
    if !full_name.is_empty() {
        card.push_str(&format!("FN:{}\n", v(full_name)));
    }
    if fields.has_name() {
        card.push_str(&format!(
            "N:{};{};;;\n",
            v(&fields.last_name),
            v(&fields.first_name)
        ));
    }

    for (tag, value) in [("ORG", &fields.organization), ("TITLE", &fields.title), ("TEL", &fields.phone)] {
        if !value.is_empty() {
            card.push_str(&format!("{tag}:{}\n", v(value)));
        }
    }
    if is_real_email(&fields.email) {
        card.push_str(&format!("EMAIL:{}\n", v(&fields.email)));
    }
    if !fields.website.is_empty() {
        card.push_str(&format!("URL:{}\n", v(&fields.website)));
    }

    if fields.has_address() {
        card.push_str(&format!(
            "ADR:;;{};{};{};{};{}\n",
            v(&fields.street),
            v(&fields.city),
            v(&fields.state),
            v(&fields.zip),
            v(&fields.country)
        ));
    }

    card.push_str("END:VCARD");
    card
}

/// 规范化载荷 → 编辑框里显示的值（去掉 `scheme:` 前缀）
pub fn display(ty: ContentType, canonical: &str) -> &str {
    if !ty.has_prefix() {
        return canonical;
    }
    match canonical.find(':') {
        Some(i) if i > 0 => &canonical[i + 1..],
        _ => canonical,
    }
}

// ── 校验（仅提示，不拦截编码）────────────────────────────────

pub fn is_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

pub fn is_phone(s: &str) -> bool {
    PHONE_RE.is_match(s)
}

pub fn is_absolute_url(s: &str) -> bool {
    url::Url::parse(s).is_ok()
}

fn is_real_email(s: &str) -> bool {
    is_email(s) && !s.ends_with(PLACEHOLDER_DOMAIN)
}

/// 按类型做语法检查；空值交给 `sanitize::validate` 处理
pub fn check(input: &ContentInput) -> Result<(), ValidationError> {
    let syntax = |kind: ContentType, value: &str| ValidationError::Syntax {
        kind,
        value: value.to_string(),
    };
    match input {
        ContentInput::Url(s) if !s.is_empty() && !is_absolute_url(s) => {
            Err(syntax(ContentType::Url, s))
        }
        ContentInput::Email(s) if !s.is_empty() && !is_email(s) => {
            Err(syntax(ContentType::Email, s))
        }
        ContentInput::Phone(s) if !s.is_empty() && !is_phone(s) => {
            Err(syntax(ContentType::Phone, s))
        }
        ContentInput::Sms { phone, .. } if !phone.is_empty() && !is_phone(phone) => {
            Err(syntax(ContentType::Sms, phone))
        }
        ContentInput::VCard(f) if !f.email.is_empty() && !is_real_email(&f.email) => {
            Err(syntax(ContentType::VCard, &f.email))
        }
        _ => Ok(()),
    }
}

// ── 转义 ─────────────────────────────────────────────────────

/// WIFI 格式的保留字符：\ ; , " :
fn escape_wifi_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '\\' | ';' | ',' | '"' | ':' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// vCard 3.0 文本值：\ ; , 加反斜杠，换行写成 \n
fn escape_vcard_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '\\' | ';' | ',' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

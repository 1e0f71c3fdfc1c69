// src/types.rs - 所有核心数据类型

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ── 内容类型 ─────────────────────────────────────────────────

/// 二维码内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Url,
    Email,
    Phone,
    Sms,
    Wifi,
    VCard,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Text,
        ContentType::Url,
        ContentType::Email,
        ContentType::Phone,
        ContentType::Sms,
        ContentType::Wifi,
        ContentType::VCard,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Url => "url",
            ContentType::Email => "email",
            ContentType::Phone => "phone",
            ContentType::Sms => "sms",
            ContentType::Wifi => "wifi",
            ContentType::VCard => "vcard",
        }
    }

    /// 该类型是否带 `scheme:` 前缀（编辑时需要去掉）
    pub fn has_prefix(&self) -> bool {
        matches!(self, ContentType::Email | ContentType::Phone | ContentType::Sms)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContentType::Text => "Text",
            ContentType::Url => "URL",
            ContentType::Email => "Email",
            ContentType::Phone => "Phone",
            ContentType::Sms => "SMS",
            ContentType::Wifi => "WiFi",
            ContentType::VCard => "vCard",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ContentType::ALL
            .into_iter()
            .find(|t| t.id() == lower)
            .ok_or_else(|| format!("未知的内容类型: {s}"))
    }
}

// ── 纠错等级 ─────────────────────────────────────────────────

/// 纠错等级（L/M/Q/H），只作为参数透传给编码器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EcLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl EcLevel {
    pub fn label(&self) -> &'static str {
        match self {
            EcLevel::L => "Low (~7%)",
            EcLevel::M => "Medium (~15%)",
            EcLevel::Q => "Quartile (~25%)",
            EcLevel::H => "High (~30%)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EcLevel::L => "Best for clean environments",
            EcLevel::M => "Balanced option",
            EcLevel::Q => "Good for slightly damaged codes",
            EcLevel::H => "Best for damaged environments",
        }
    }
}

impl FromStr for EcLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "L" => Ok(EcLevel::L),
            "M" => Ok(EcLevel::M),
            "Q" => Ok(EcLevel::Q),
            "H" => Ok(EcLevel::H),
            _ => Err(format!("无效的纠错等级: {s}（可选 L/M/Q/H）")),
        }
    }
}

// ── 颜色 ─────────────────────────────────────────────────────

/// RGB 颜色，序列化为 `#RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    /// 支持 `#RGB` 与 `#RRGGBB`，`#` 可省略
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let bad = || format!("无效的颜色: {s}");
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let channel = |part: &str| u8::from_str_radix(part, 16).map_err(|_| bad());
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Ok(Color::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Color::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

/// 预设配色
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub dark: Color,
    pub light: Color,
}

pub const PRESET_COLORS: [Preset; 8] = [
    Preset { name: "Classic", dark: Color::BLACK, light: Color::WHITE },
    Preset { name: "Blue", dark: Color::rgb(0x1E, 0x40, 0xAF), light: Color::WHITE },
    Preset { name: "Green", dark: Color::rgb(0x05, 0x96, 0x69), light: Color::WHITE },
    Preset { name: "Purple", dark: Color::rgb(0x7C, 0x3A, 0xED), light: Color::WHITE },
    Preset { name: "Red", dark: Color::rgb(0xDC, 0x26, 0x26), light: Color::WHITE },
    Preset { name: "Orange", dark: Color::rgb(0xEA, 0x58, 0x0C), light: Color::WHITE },
    Preset { name: "Pink", dark: Color::rgb(0xDB, 0x27, 0x77), light: Color::WHITE },
    Preset { name: "Teal", dark: Color::rgb(0x0D, 0x94, 0x88), light: Color::WHITE },
];

/// 按名称查找预设（大小写不敏感）
pub fn preset(name: &str) -> Option<Preset> {
    PRESET_COLORS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
        .copied()
}

// ── 渲染参数 ─────────────────────────────────────────────────

/// 传给编码器的渲染参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// 输出图片边长（像素）
    pub size: u32,
    pub error_correction: EcLevel,
    /// 静区宽度（模块数）
    pub margin: u32,
    pub dark: Color,
    pub light: Color,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            size: 256,
            error_correction: EcLevel::M,
            margin: 4,
            dark: Color::BLACK,
            light: Color::WHITE,
        }
    }
}

impl RenderOptions {
    pub fn with_preset(mut self, preset: &Preset) -> Self {
        self.dark = preset.dark;
        self.light = preset.light;
        self
    }
}

// ── 各类型的结构化字段 ───────────────────────────────────────

/// Wi-Fi 加密类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WifiSecurity {
    #[default]
    Wpa,
    Wep,
    Nopass,
}

impl WifiSecurity {
    /// 写进 `WIFI:T:` 字段的字面值
    pub fn as_str(&self) -> &'static str {
        match self {
            WifiSecurity::Wpa => "WPA",
            WifiSecurity::Wep => "WEP",
            WifiSecurity::Nopass => "nopass",
        }
    }
}

impl std::fmt::Display for WifiSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WifiSecurity {
    type Err = String;

    /// 只接受 `WIFI:T:` 的三个取值，不区分大小写
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WPA" => Ok(WifiSecurity::Wpa),
            "WEP" => Ok(WifiSecurity::Wep),
            "NOPASS" => Ok(WifiSecurity::Nopass),
            _ => Err(format!("无效的加密类型: {s}（可选 WPA/WEP/nopass）")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiFields {
    pub ssid: String,
    pub password: String,
    pub security: WifiSecurity,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VCardFields {
    pub first_name: String,
    pub last_name: String,
    pub organization: String,
    pub title: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl VCardFields {
    pub fn has_name(&self) -> bool {
        !self.first_name.is_empty() || !self.last_name.is_empty()
    }

    pub fn has_address(&self) -> bool {
        [&self.street, &self.city, &self.state, &self.zip, &self.country]
            .iter()
            .any(|s| !s.is_empty())
    }
}

/// 用户输入：字段集合完全由内容类型决定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "fields", rename_all = "lowercase")]
pub enum ContentInput {
    Text(String),
    Url(String),
    Email(String),
    Phone(String),
    Sms { phone: String, message: String },
    Wifi(WifiFields),
    VCard(VCardFields),
}

impl ContentInput {
    pub fn content_type(&self) -> ContentType {
        match self {
            ContentInput::Text(_) => ContentType::Text,
            ContentInput::Url(_) => ContentType::Url,
            ContentInput::Email(_) => ContentType::Email,
            ContentInput::Phone(_) => ContentType::Phone,
            ContentInput::Sms { .. } => ContentType::Sms,
            ContentInput::Wifi(_) => ContentType::Wifi,
            ContentInput::VCard(_) => ContentType::VCard,
        }
    }

    /// 某类型的空白输入
    pub fn empty(ty: ContentType) -> Self {
        match ty {
            ContentType::Text => ContentInput::Text(String::new()),
            ContentType::Url => ContentInput::Url(String::new()),
            ContentType::Email => ContentInput::Email(String::new()),
            ContentType::Phone => ContentInput::Phone(String::new()),
            ContentType::Sms => ContentInput::Sms {
                phone: String::new(),
                message: String::new(),
            },
            ContentType::Wifi => ContentInput::Wifi(WifiFields::default()),
            ContentType::VCard => ContentInput::VCard(VCardFields::default()),
        }
    }

    /// 从 `电话:短信内容` 格式解析，只按第一个冒号切分
    pub fn sms_from_raw(raw: &str) -> Self {
        let (phone, message) = raw.split_once(':').unwrap_or((raw, ""));
        ContentInput::Sms {
            phone: phone.to_string(),
            message: message.to_string(),
        }
    }
}

/// 一次生成请求：输入快照 + 规范化后的载荷 + 渲染参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrRequest {
    pub input: ContentInput,
    /// 规范化载荷（交给编码器的字符串）
    pub text: String,
    pub options: RenderOptions,
}

impl QrRequest {
    pub fn new(input: ContentInput, options: RenderOptions) -> Self {
        Self::with_escape(input, options, crate::format::Escape::None)
    }

    pub fn with_escape(
        input: ContentInput,
        options: RenderOptions,
        escape: crate::format::Escape,
    ) -> Self {
        let text = crate::format::canonical(&input, escape);
        Self { input, text, options }
    }

    pub fn content_type(&self) -> ContentType {
        self.input.content_type()
    }

    /// 切换内容类型：切到 Text 保留当前载荷，其他类型一律清空
    pub fn switch_to(&self, ty: ContentType) -> Self {
        let input = match ty {
            ContentType::Text => ContentInput::Text(self.text.clone()),
            other => ContentInput::empty(other),
        };
        Self::new(input, self.options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("#000000", Color::BLACK ; "long black")]
    #[test_case("FFFFFF", Color::WHITE ; "no hash")]
    #[test_case("#1e40af", Color::rgb(0x1E, 0x40, 0xAF) ; "lowercase")]
    #[test_case("#f00", Color::rgb(0xFF, 0, 0) ; "short form")]
    fn color_parses(input: &str, expected: Color) {
        assert_eq!(input.parse::<Color>().unwrap(), expected);
    }

    #[test_case("#12345" ; "bad length")]
    #[test_case("#GGGGGG" ; "not hex")]
    #[test_case("" ; "empty")]
    fn color_rejects(input: &str) {
        assert!(input.parse::<Color>().is_err());
    }

    #[test]
    fn color_serializes_as_hex_string() {
        let json = serde_json::to_string(&Color::rgb(0x7C, 0x3A, 0xED)).unwrap();
        assert_eq!(json, "\"#7C3AED\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(0x7C, 0x3A, 0xED));
    }

    #[test]
    fn ec_level_labels() {
        assert_eq!(EcLevel::default().label(), "Medium (~15%)");
        assert_eq!(EcLevel::H.description(), "Best for damaged environments");
        assert_eq!("q".parse::<EcLevel>().unwrap(), EcLevel::Q);
    }

    #[test_case("WPA", WifiSecurity::Wpa ; "wpa")]
    #[test_case("wep", WifiSecurity::Wep ; "wep lowercase")]
    #[test_case(" nopass ", WifiSecurity::Nopass ; "nopass padded")]
    fn security_parses(input: &str, expected: WifiSecurity) {
        assert_eq!(input.parse::<WifiSecurity>().unwrap(), expected);
    }

    #[test_case("bogus" ; "unknown")]
    #[test_case("WPA2 WPA3" ; "scan style")]
    #[test_case("--" ; "dashes")]
    #[test_case("" ; "empty")]
    fn security_rejects(input: &str) {
        assert!(input.parse::<WifiSecurity>().is_err());
    }

    #[test]
    fn sms_raw_splits_on_first_colon_only() {
        let input = ContentInput::sms_from_raw("+1555123:meet at 10:30");
        assert_eq!(
            input,
            ContentInput::Sms {
                phone: "+1555123".into(),
                message: "meet at 10:30".into()
            }
        );
        let no_message = ContentInput::sms_from_raw("+1555123");
        assert_eq!(
            no_message,
            ContentInput::Sms {
                phone: "+1555123".into(),
                message: String::new()
            }
        );
    }

    #[test]
    fn switching_to_text_keeps_payload() {
        let req = QrRequest::new(ContentInput::Email("a@b.io".into()), RenderOptions::default());
        let switched = req.switch_to(ContentType::Text);
        assert_eq!(switched.input, ContentInput::Text("mailto:a@b.io".into()));
        assert_eq!(switched.text, "mailto:a@b.io");
    }

    #[test]
    fn switching_to_other_types_resets_fields() {
        let req = QrRequest::new(ContentInput::Text("hello".into()), RenderOptions::default());
        let switched = req.switch_to(ContentType::Phone);
        assert_eq!(switched.input, ContentInput::Phone(String::new()));
        assert_eq!(switched.text, "");
        assert_eq!(switched.options, req.options);
    }

    #[test]
    fn content_type_round_trips_through_id() {
        for ty in ContentType::ALL {
            assert_eq!(ty.id().parse::<ContentType>().unwrap(), ty);
        }
        assert!("fax".parse::<ContentType>().is_err());
    }

    #[test]
    fn presets_lookup_is_case_insensitive() {
        let teal = preset("teal").unwrap();
        assert_eq!(teal.dark, Color::rgb(0x0D, 0x94, 0x88));
        assert!(preset("Magenta").is_none());
    }
}

use crate::data_structures::{MetricRecord, MoveStatus};
use chrono::{Local, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    Chinese,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Chinese => "zh",
            Language::English => "en",
        }
    }
}

impl TryFrom<String> for Language {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code().to_string()
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "chinese" => Ok(Language::Chinese),
            "en" | "english" => Ok(Language::English),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

struct ReportText {
    lang: &'static str,
    title: &'static str,
    heading: &'static str,
    updated_label: &'static str,
    movers_heading: &'static str,
    no_movers: &'static str,
    watchlist_heading: &'static str,
    price_label: &'static str,
}

fn report_text(language: Language) -> ReportText {
    match language {
        Language::Chinese => ReportText {
            lang: Language::Chinese.code(),
            title: "AI 金融早报",
            heading: "AI 金融异动助手",
            updated_label: "更新时间",
            movers_heading: "今日异动榜",
            no_movers: "今日市场暂无剧烈波动",
            watchlist_heading: "核心观测站",
            price_label: "当前价格",
        },
        Language::English => ReportText {
            lang: Language::English.code(),
            title: "AI Market Brief",
            heading: "AI Market Movers",
            updated_label: "Updated",
            movers_heading: "Today's Movers",
            no_movers: "No significant moves in the market today",
            watchlist_heading: "Watchlist",
            price_label: "Current price",
        },
    }
}

pub fn status_glyph(status: MoveStatus) -> &'static str {
    match status {
        MoveStatus::Surge => "🚀",
        MoveStatus::Plunge => "🔻",
        MoveStatus::Calm => "平静",
    }
}

/// Wall-clock time in `timezone`, or the host's local time when unset.
pub fn generated_at(timezone: Option<Tz>) -> String {
    match timezone {
        Some(tz) => Utc::now().with_timezone(&tz).format(TIMESTAMP_FORMAT).to_string(),
        None => Local::now().format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// Shortest round-trip form, always with a fractional part: `144.0`, `-4.0`, `3.46`.
/// Magnitudes of 1e16 and up switch to exponent form (`1e16`), same as numpy's `str`.
pub fn format_number(value: f64) -> String {
    format!("{:?}", value)
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn movers(records: &[MetricRecord]) -> Vec<&MetricRecord> {
    records.iter().filter(|r| r.status.is_mover()).collect()
}

fn render_mover(out: &mut String, record: &MetricRecord, text: &ReportText) {
    let color = if record.change_pct > 0.0 { "text-green-500" } else { "text-red-500" };
    out.push_str(&format!(
        r#"
            <div class="mover p-4 bg-gray-800 rounded-xl mb-3 border-l-4 border-yellow-500">
                <div class="flex justify-between items-center">
                    <span class="text-lg font-bold text-white">{name}</span>
                    <span class="{color} font-mono font-bold">{change}% {glyph}</span>
                </div>
                <p class="text-gray-400 text-sm">{price_label}: ${price}</p>
            </div>"#,
        name = escape_html(&record.name),
        color = color,
        change = format_number(record.change_pct),
        glyph = status_glyph(record.status),
        price_label = text.price_label,
        price = format_number(record.price),
    ));
}

fn render_watchlist_item(out: &mut String, record: &MetricRecord) {
    let color = if record.change_pct > 0.0 { "text-green-400" } else { "text-red-400" };
    out.push_str(&format!(
        r#"
                    <div class="watchlist-item bg-gray-800 p-3 rounded-lg text-sm border border-gray-700"><b>{name}</b><br/><span class="{color}">{change}%</span></div>"#,
        name = escape_html(&record.name),
        color = color,
        change = format_number(record.change_pct),
    ));
}

/// Builds the full HTML document. Pure: the caller supplies the timestamp.
pub fn render(records: &[MetricRecord], generated_at: &str, language: Language) -> String {
    let text = report_text(language);
    let movers = movers(records);
    debug!(records = records.len(), movers = movers.len(), "Rendering report");

    let mut movers_html = String::new();
    for record in &movers {
        render_mover(&mut movers_html, record, &text);
    }
    if movers.is_empty() {
        movers_html.push_str(&format!(
            r#"
            <p class="no-movers text-gray-500 italic">{}</p>"#,
            text.no_movers
        ));
    }

    let mut watchlist_html = String::new();
    for record in records {
        render_watchlist_item(&mut watchlist_html, record);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="apple-touch-icon" href="https://cdn-icons-png.flaticon.com/512/2488/2488654.png">
    <script src="https://cdn.tailwindcss.com"></script>
    <style>
        body {{ background-color: #111827; }}
    </style>
</head>
<body class="p-4 text-gray-200">
    <div class="max-w-md mx-auto">
        <header class="mb-8 mt-4 text-center">
            <h1 class="text-3xl font-extrabold text-transparent bg-clip-text bg-gradient-to-r from-yellow-400 to-orange-500">{heading}</h1>
            <p class="text-gray-500 mt-2">{updated_label}: {generated_at}</p>
        </header>

        <section id="movers" class="mb-6">
            <h2 class="text-xl font-semibold mb-4 flex items-center">
                <span class="mr-2">🔥</span> {movers_heading}
            </h2>{movers_html}
        </section>

        <section id="watchlist">
            <h2 class="text-xl font-semibold mb-4">📊 {watchlist_heading}</h2>
            <div class="grid grid-cols-2 gap-3">{watchlist_html}
            </div>
        </section>
    </div>
</body>
</html>
"#,
        lang = text.lang,
        title = text.title,
        heading = text.heading,
        updated_label = text.updated_label,
        generated_at = generated_at,
        movers_heading = text.movers_heading,
        movers_html = movers_html,
        watchlist_heading = text.watchlist_heading,
        watchlist_html = watchlist_html,
    )
}

/// Overwrites `path` with the document. No temp file or rename.
pub fn write_report(path: &Path, document: &str) -> io::Result<()> {
    fs::write(path, document)?;
    info!(path = %path.display(), bytes = document.len(), "Wrote report");
    Ok(())
}

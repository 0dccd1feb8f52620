// Output rendering for command results

use chrono::DateTime;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::{Table, Tabled};

use cachetool_core::domain::DecodedValue;

use crate::commands::Command;

static NULL: Value = Value::Null;

const UNITS: [&str; 5] = ["b", "KiB", "MiB", "GiB", "TiB"];

/// Binary-unit size, rounded to two decimals (`1.5 MiB`)
pub fn bytes(size: f64) -> String {
    let size = size.max(0.0);
    let mut pow = 0;
    let mut scaled = size;
    while scaled >= 1024.0 && pow < UNITS.len() - 1 {
        scaled /= 1024.0;
        pow += 1;
    }

    let rounded = format!("{:.2}", scaled);
    let rounded = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rounded, UNITS[pow])
}

/// Unix timestamp as RFC 3339 in UTC
pub fn date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Render a command's decoded result for the terminal
pub fn render(command: &Command, value: DecodedValue) -> String {
    match command {
        Command::ApcBinDump { .. } => bin_dump(&value),
        Command::ApcKeyFetch { .. } => String::from_utf8_lossy(&value.into_raw()).into_owned(),
        Command::ApcCacheInfo { .. } => cache_info(json(&value)),
        Command::ApcCacheInfoFile => cache_info_file(json(&value)),
        Command::ApcSmaInfo => sma_info(json(&value)),
        Command::OpcacheConfiguration => opcache_configuration(json(&value)),
        Command::OpcacheStatus => opcache_status(json(&value)),
        Command::OpcacheStatusScripts => opcache_scripts(json(&value)),
        Command::ApcBinLoad { .. }
        | Command::ApcCacheClear { .. }
        | Command::ApcKeyDelete { .. }
        | Command::ApcKeyExists { .. }
        | Command::ApcKeyStore { .. }
        | Command::OpcacheReset => yes_no(value.is_truthy()).to_string(),
    }
}

fn json(value: &DecodedValue) -> &Value {
    value.as_json().unwrap_or(&NULL)
}

fn at<'a>(value: &'a Value, pointer: &str) -> &'a Value {
    value.pointer(pointer).unwrap_or(&NULL)
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flag(value: &Value) -> &'static str {
    yes_no(DecodedValue::Scalar(value.clone()).is_truthy())
}

fn size(value: &Value) -> String {
    bytes(value.as_f64().unwrap_or(0.0))
}

fn timestamp(value: &Value) -> String {
    match value.as_i64() {
        Some(ts) if ts > 0 => date(ts),
        _ => "Never".to_string(),
    }
}

/// Entries of a PHP array in runtime order; an empty one encodes as `[]`
fn php_array(value: &Value) -> Option<Vec<(String, &Value)>> {
    match value {
        Value::Object(map) => Some(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
        ),
        _ => None,
    }
}

fn unavailable() -> String {
    "No information available".yellow().to_string()
}

fn name_value_table(rows: Vec<(String, String)>) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Name", "Value"]);
    for (name, value) in rows {
        builder.push_record([name, value]);
    }
    builder.build().to_string()
}

fn bin_dump(value: &DecodedValue) -> String {
    match value.as_json().and_then(Value::as_f64) {
        Some(written) => format!("{} written", bytes(written)),
        None => yes_no(false).to_string(),
    }
}

fn cache_info(info: &Value) -> String {
    let Some(map) = info.as_object() else {
        return unavailable();
    };

    let rows = map
        .iter()
        .filter(|(_, v)| !v.is_array() && !v.is_object())
        .map(|(k, v)| {
            let shown = match k.as_str() {
                "mem_size" => size(v),
                "start_time" => timestamp(v),
                _ => text(v),
            };
            (k.clone(), shown)
        })
        .collect();
    name_value_table(rows)
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "Hits")]
    hits: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Filename")]
    filename: String,
}

fn cache_info_file(info: &Value) -> String {
    let Some(entries) = at(info, "/cache_list").as_array() else {
        return unavailable();
    };

    let rows: Vec<FileRow> = entries
        .iter()
        .map(|entry| FileRow {
            hits: text(at(entry, "/num_hits")),
            memory: size(at(entry, "/mem_size")),
            filename: text(at(entry, "/filename")),
        })
        .collect();
    Table::new(rows).to_string()
}

fn sma_info(sma: &Value) -> String {
    if !sma.is_object() {
        return unavailable();
    }

    [
        ("Segments:", text(at(sma, "/num_seg"))),
        ("Segment size:", size(at(sma, "/seg_size"))),
        ("Available memory:", size(at(sma, "/avail_mem"))),
    ]
    .iter()
    .map(|(label, value)| format!("{} {}", label.yellow(), value.green()))
    .collect::<Vec<_>>()
    .join("\n")
}

fn opcache_configuration(config: &Value) -> String {
    let Some(directives) = php_array(at(config, "/directives")) else {
        return unavailable();
    };

    let mut out = String::new();
    let product = text(at(config, "/version/opcache_product_name"));
    let version = text(at(config, "/version/version"));
    if !version.is_empty() {
        out.push_str(&format!("{} {}\n", product.bold(), version));
    }

    let mut builder = Builder::default();
    builder.push_record(["Directive", "Value"]);
    for (name, value) in directives {
        builder.push_record([name, text(value)]);
    }
    out.push_str(&builder.build().to_string());
    out
}

fn opcache_status(info: &Value) -> String {
    if !info.is_object() {
        return unavailable();
    }

    let memory = name_value_table(vec![
        ("Enabled".into(), flag(at(info, "/opcache_enabled")).into()),
        ("Cache full".into(), flag(at(info, "/cache_full")).into()),
        ("Restart pending".into(), flag(at(info, "/restart_pending")).into()),
        ("Restart in progress".into(), flag(at(info, "/restart_in_progress")).into()),
        ("Memory used".into(), size(at(info, "/memory_usage/used_memory"))),
        ("Memory free".into(), size(at(info, "/memory_usage/free_memory"))),
        (
            "Memory wasted (%)".into(),
            format!(
                "{} ({}%)",
                size(at(info, "/memory_usage/wasted_memory")),
                text(at(info, "/memory_usage/current_wasted_percentage"))
            ),
        ),
        ("Strings buffer size".into(), size(at(info, "/interned_strings_usage/buffer_size"))),
        ("Strings memory used".into(), size(at(info, "/interned_strings_usage/used_memory"))),
        ("Strings memory free".into(), size(at(info, "/interned_strings_usage/free_memory"))),
        (
            "Number of strings".into(),
            text(at(info, "/interned_strings_usage/number_of_strings")),
        ),
    ]);

    let stats = at(info, "/opcache_statistics");
    let statistics = name_value_table(vec![
        ("Cached scripts".into(), text(at(stats, "/num_cached_scripts"))),
        ("Cached keys".into(), text(at(stats, "/num_cached_keys"))),
        ("Max cached keys".into(), text(at(stats, "/max_cached_keys"))),
        ("Start time".into(), timestamp(at(stats, "/start_time"))),
        ("Last restart time".into(), timestamp(at(stats, "/last_restart_time"))),
        ("Oom restarts".into(), text(at(stats, "/oom_restarts"))),
        ("Hash restarts".into(), text(at(stats, "/hash_restarts"))),
        ("Manual restarts".into(), text(at(stats, "/manual_restarts"))),
        ("Hits".into(), text(at(stats, "/hits"))),
        ("Misses".into(), text(at(stats, "/misses"))),
        (
            "Blacklist misses (%)".into(),
            format!(
                "{} ({}%)",
                text(at(stats, "/blacklist_misses")),
                text(at(stats, "/blacklist_miss_ratio"))
            ),
        ),
        ("Opcache hit rate".into(), text(at(stats, "/opcache_hit_rate"))),
    ]);

    format!("{}\n{}", memory, statistics)
}

fn opcache_scripts(info: &Value) -> String {
    let Some(scripts) = php_array(at(info, "/scripts")) else {
        return unavailable();
    };

    let rows: Vec<FileRow> = scripts
        .into_iter()
        .map(|(_, script)| FileRow {
            hits: text(at(script, "/hits")),
            memory: size(at(script, "/memory_consumption")),
            filename: text(at(script, "/full_path")),
        })
        .collect();
    Table::new(rows).to_string()
}

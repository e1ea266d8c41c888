use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use irgate_device::SerialPort;
use irgate_frame::percent;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Outcome of one request against a gateway.
#[derive(Serialize)]
pub struct ReplyOutput<'a> {
    pub gateway: &'a str,
    pub operation: &'a str,
    pub reply: &'a str,
}

pub fn print_reply(out: &ReplyOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["GATEWAY", "OPERATION", "REPLY"])
                .add_row(vec![out.gateway, out.operation, out.reply]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "gateway={} operation={} reply={}",
                out.gateway, out.operation, out.reply
            );
        }
        OutputFormat::Raw => println!("{}", out.reply),
    }
}

#[derive(Serialize)]
struct FeedbackOutput<'a> {
    gateway: &'a str,
    port: &'a str,
    size: usize,
    /// Frame bytes in percent/URL form, delimiter included.
    frame: String,
    timestamp: String,
}

pub fn print_feedback(gateway: &str, port: SerialPort, frame: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&FeedbackOutput {
            gateway,
            port: port.name(),
            size: frame.len(),
            frame: percent::encode(frame),
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "SIZE", "FRAME"])
                .add_row(vec![
                    port.name().to_string(),
                    frame.len().to_string(),
                    percent::encode(frame),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "port={} size={} frame={}",
                port,
                frame.len(),
                percent::encode(frame)
            );
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

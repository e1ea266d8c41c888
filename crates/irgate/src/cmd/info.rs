use std::path::Path;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    gateway: String,
    model: String,
    version: String,
    serial_ports: Vec<&'static str>,
}

pub async fn run(args: InfoArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let gateway = args.gateway.start(config)?;
    let version = gateway.get_version().await;
    let capabilities = gateway.capabilities();
    gateway.shutdown().await;
    let version = version.map_err(|err| device_error("version query failed", err))?;

    let out = InfoOutput {
        gateway: args.gateway.ip.clone(),
        model: format!("{:?}", capabilities.model()),
        version,
        serial_ports: capabilities.serial_ports().map(|port| port.name()).collect(),
    };
    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    let ports = if out.serial_ports.is_empty() {
        "-".to_string()
    } else {
        out.serial_ports.join(",")
    };
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["gateway", out.gateway.as_str()])
                .add_row(vec!["model", out.model.as_str()])
                .add_row(vec!["version", out.version.as_str()])
                .add_row(vec!["serial_ports", ports.as_str()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "gateway={} model={} version={} serial_ports={ports}",
                out.gateway, out.model, out.version
            );
        }
        OutputFormat::Raw => println!("{}", out.version),
    }
}

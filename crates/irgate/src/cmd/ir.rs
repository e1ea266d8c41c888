use std::path::Path;

use irgate_device::{Gateway, IrCode};

use crate::cmd::IrArgs;
use crate::exit::{device_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat, ReplyOutput};

pub async fn run(args: IrArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let mut gateway_config = args.gateway.config(config)?;
    if let Some(map) = &args.map {
        gateway_config.map_file = Some(map.clone());
    }
    if args.key.is_some() && gateway_config.map_file.is_none() {
        return Err(CliError::new(USAGE, "--key needs --map or a map_file in the config"));
    }
    let gateway =
        Gateway::start(gateway_config).map_err(|err| device_error("gateway start failed", err))?;

    let (operation, result) = match (&args.code, &args.key) {
        (Some(code), _) => (
            code.as_str(),
            gateway
                .send_ir_code(args.address, &IrCode::classify(code.as_str()))
                .await,
        ),
        (None, Some(key)) => (key.as_str(), gateway.send_ir(args.address, key).await),
        (None, None) => {
            gateway.shutdown().await;
            return Err(CliError::new(USAGE, "one of --code or --key is required"));
        }
    };
    gateway.shutdown().await;
    result.map_err(|err| device_error("IR send failed", err))?;

    print_reply(
        &ReplyOutput {
            gateway: &args.gateway.ip,
            operation: &format!("sendir {} {operation}", args.address),
            reply: "completeir",
        },
        format,
    );
    Ok(SUCCESS)
}

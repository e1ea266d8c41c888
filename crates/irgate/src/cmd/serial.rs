use std::path::Path;

use irgate_device::Response;

use crate::cmd::SerialArgs;
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat, ReplyOutput};

pub async fn run(args: SerialArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let gateway = args.gateway.start(config)?;
    let result = gateway.send_serial_direct(args.port, &args.data).await;
    gateway.shutdown().await;
    result.map_err(|err| device_error("serial send failed", err))?;

    print_reply(
        &ReplyOutput {
            gateway: &args.gateway.ip,
            operation: &format!("{} {}", args.port, args.data),
            reply: Response::SUCCESS_MARKER,
        },
        format,
    );
    Ok(SUCCESS)
}

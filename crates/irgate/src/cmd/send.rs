use std::path::Path;

use crate::cmd::SendArgs;
use crate::exit::{device_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_reply, OutputFormat, ReplyOutput};

pub async fn run(args: SendArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let gateway = args.gateway.start(config)?;
    let reply = gateway.command(args.command.as_str()).await;
    gateway.shutdown().await;
    let reply = reply.map_err(|err| device_error("send failed", err))?;

    print_reply(
        &ReplyOutput {
            gateway: &args.gateway.ip,
            operation: &args.command,
            reply: &reply,
        },
        format,
    );
    // the device answered, but with an error reply
    if irgate_device::command::is_device_error(&reply) {
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}

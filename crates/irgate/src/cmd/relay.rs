use std::path::Path;

use irgate_device::RelayState;

use crate::cmd::{RelayAction, RelayArgs};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat, ReplyOutput};

pub async fn run(args: RelayArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let gateway = args.gateway.start(config)?;
    let result = match args.action {
        RelayAction::On => gateway
            .set_relay(args.address, RelayState::On)
            .await
            .map(|()| RelayState::On),
        RelayAction::Off => gateway
            .set_relay(args.address, RelayState::Off)
            .await
            .map(|()| RelayState::Off),
        RelayAction::Get => gateway.relay_state(args.address).await,
    };
    gateway.shutdown().await;
    let state = result.map_err(|err| device_error("relay command failed", err))?;

    print_reply(
        &ReplyOutput {
            gateway: &args.gateway.ip,
            operation: &format!("relay {}", args.address),
            reply: &state.to_string(),
        },
        format,
    );
    Ok(SUCCESS)
}

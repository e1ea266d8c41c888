use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("irgate {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "default_ports: command={} serial-1={} serial-2={}",
        irgate_device::config::DEFAULT_COMMAND_PORT,
        irgate_device::config::DEFAULT_SERIAL1_PORT,
        irgate_device::config::DEFAULT_SERIAL2_PORT
    );

    Ok(SUCCESS)
}

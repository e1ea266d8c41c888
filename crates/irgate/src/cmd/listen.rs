use std::path::Path;
use std::sync::Arc;

use irgate_device::{
    GatewayBuilder, SerialPort, SerialPortConfig, StatusDetail, StatusSink,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{device_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_feedback, OutputFormat};

/// Hands feedback frames to the printing loop.
struct FeedbackSink {
    frames: mpsc::UnboundedSender<(SerialPort, Vec<u8>)>,
}

impl StatusSink for FeedbackSink {
    fn mark_online(&self) {
        info!("gateway online");
    }

    fn mark_offline(&self) {
        info!("gateway offline");
    }

    fn mark_offline_with_error(&self, detail: StatusDetail, message: &str) {
        warn!(%detail, message, "gateway offline");
    }

    fn update_feedback_channel(&self, port: SerialPort, frame: &[u8]) {
        let _ = self.frames.send((port, frame.to_vec()));
    }
}

pub async fn run(args: ListenArgs, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let mut gateway_config = args.gateway.config(config)?;
    let serial = SerialPortConfig {
        enable_two_way: true,
        end_of_message_delimiter: args.delimiter.clone(),
    };
    match args.port {
        SerialPort::Serial1 => gateway_config.serial1 = serial,
        SerialPort::Serial2 => gateway_config.serial2 = serial,
    }

    let (tx, mut frames) = mpsc::unbounded_channel();
    let gateway = GatewayBuilder::new(gateway_config)
        .with_status_sink(Arc::new(FeedbackSink { frames: tx }))
        .start()
        .map_err(|err| device_error("gateway start failed", err))?;
    if !gateway.capabilities().supports(args.port) {
        gateway.shutdown().await;
        return Err(CliError::new(
            USAGE,
            format!("{} is not available on this model (see --model)", args.port),
        ));
    }

    let mut printed = 0usize;
    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.map_err(|err| {
                    CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
                });
            }
            frame = frames.recv() => {
                let Some((port, frame)) = frame else {
                    break Ok(());
                };
                print_feedback(&args.gateway.ip, port, &frame, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break Ok(());
                }
            }
        }
    };

    gateway.shutdown().await;
    result.map(|()| SUCCESS)
}

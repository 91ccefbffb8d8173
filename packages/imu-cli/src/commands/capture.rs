use crate::cli::{CaptureArgs, MqttArgs, ReplayArgs, SerialArgs};
use crate::commands::load_bands;
use crate::exit_codes;
use crate::output;
use chrono::Local;
use imu_rs::{
    report, CaptureConfig, CaptureError, CaptureReport, CaptureSession, DataLayout, MqttSettings,
    SessionEvent, StopReason, TransportConfig,
};
use std::time::Duration;

pub async fn serial(args: SerialArgs) -> i32 {
    let transport = TransportConfig::Serial {
        port: args.port,
        baud_rate: args.baud,
    };
    execute(transport, args.capture).await
}

pub async fn mqtt(args: MqttArgs) -> i32 {
    let transport = TransportConfig::Mqtt(mqtt_settings(&args));
    execute(transport, args.capture).await
}

pub async fn replay(args: ReplayArgs) -> i32 {
    let transport = TransportConfig::Replay {
        path: args.file,
        rate_limit_ms: args.rate_limit_ms,
    };
    execute(transport, args.capture).await
}

fn mqtt_settings(args: &MqttArgs) -> MqttSettings {
    let mut settings = MqttSettings::new(args.host.clone(), args.topic.clone());
    settings.port = args.port;
    settings.keep_alive_secs = args.keep_alive;
    settings.username = args.username.clone();
    settings.password = args.password.clone();
    if let Some(ref id) = args.client_id {
        settings.client_id = id.clone();
    }
    settings
}

fn build_config(transport: TransportConfig, args: &CaptureArgs) -> Result<CaptureConfig, String> {
    let mut config = CaptureConfig::new(transport);
    config.layout = DataLayout::new(&args.data_dir);
    config.bands = load_bands(args.bands.as_deref())?;
    config.poll_timeout = Duration::from_millis(args.poll_timeout_ms);
    config.echo_payloads = !(args.quiet || args.json);
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

async fn execute(transport: TransportConfig, args: CaptureArgs) -> i32 {
    let config = match build_config(transport, &args) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let mut session = match CaptureSession::from_config(&config, Local::now()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let chatty = config.echo_payloads;
    session.set_event_callback(move |event| match event {
        SessionEvent::CaptureStarted { trace_path, .. } if chatty => {
            println!("Logging to {}", trace_path.display());
            println!("Press Ctrl+C to stop");
        }
        SessionEvent::TraceSealed { trace_path, rows } if chatty => {
            println!("Saved {} ({} samples)", trace_path.display(), rows);
        }
        SessionEvent::Payload(text) => println!("{}", text),
        SessionEvent::BadData(err) => println!("Bad data: {}", err),
        _ => {}
    });

    // Repeated Ctrl+C while finalizing is a no-op
    let stop = session.stop_signal();
    let interrupt = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !stop.trigger() {
                log::info!("Already stopping");
            }
        }
    });

    let result = session.run().await;
    interrupt.abort();

    match result {
        Ok(outcome) => finish(&outcome, &args, chatty),
        Err(e) => {
            eprintln!("Error: {}", e);
            match e {
                CaptureError::Connection(_) => exit_codes::CONNECT_ERROR,
                CaptureError::InvalidConfig(_) => exit_codes::INPUT_ERROR,
                _ => exit_codes::EXECUTION_ERROR,
            }
        }
    }
}

fn finish(outcome: &CaptureReport, args: &CaptureArgs, chatty: bool) -> i32 {
    if args.json {
        if let Err(e) = output::print_json(outcome, false) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else if chatty {
        if let Some(ref summary) = outcome.summary {
            println!();
            print!("{}", report::render(summary));
        }
        for artifact in &outcome.artifacts {
            println!("Wrote {}", artifact.display());
        }
    }

    match outcome.stop_reason {
        StopReason::Interrupted | StopReason::SourceExhausted if outcome.summary.is_some() => {
            exit_codes::SUCCESS
        }
        StopReason::WriteFailed => {
            eprintln!("Error: capture stopped because the trace could not be written");
            exit_codes::EXECUTION_ERROR
        }
        StopReason::SourceFailed => {
            eprintln!("Error: transport failed during capture");
            exit_codes::EXECUTION_ERROR
        }
        _ => {
            eprintln!("Error: analysis of {} failed", outcome.trace_path.display());
            exit_codes::EXECUTION_ERROR
        }
    }
}

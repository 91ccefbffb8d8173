use clap::{Args, Parser, Subcommand};
use imu_rs::config::DEFAULT_POLL_TIMEOUT_MS;
use imu_rs::source::{DEFAULT_BAUD_RATE, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_MQTT_PORT};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "imulog",
    version,
    about = "IMU data logger with impact threshold alerts",
    long_about = "Capture IMU samples from a serial device or an MQTT topic into CSV traces.\n\
                  When capture stops (Ctrl+C or end of input) the trace is analyzed and\n\
                  acceleration/rotation threshold counts are written next to it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Capture from a USB serial device
    Serial(SerialArgs),
    /// Capture from an MQTT topic
    Mqtt(MqttArgs),
    /// Replay a recorded newline-delimited capture file
    Replay(ReplayArgs),
    /// Re-analyze recorded trace CSV files
    Analyze(AnalyzeArgs),
    /// Show the alert bands in use
    Bands(BandsArgs),
}

/// Options shared by every capture mode
#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Root directory for raw/, summaries/ and resultants/
    #[arg(long, env = "IMU_DATA_DIR", default_value = "test_data")]
    pub data_dir: PathBuf,

    /// JSON file with custom alert bands
    #[arg(long, env = "IMU_BANDS_FILE")]
    pub bands: Option<PathBuf>,

    /// Upper bound on a single blocking read, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_TIMEOUT_MS)]
    pub poll_timeout_ms: u64,

    /// Do not echo payloads or progress to stdout
    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    /// Print the final capture report as JSON (implies --quiet)
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SerialArgs {
    /// Serial device (e.g. /dev/ttyUSB0, /dev/ttyACM0, COM3)
    #[arg(long, env = "IMU_SERIAL_PORT")]
    pub port: String,

    /// Baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Args, Debug)]
pub struct MqttArgs {
    /// Broker host name
    #[arg(long, env = "IMU_MQTT_HOST")]
    pub host: String,

    /// Broker port
    #[arg(long, env = "IMU_MQTT_PORT", default_value_t = DEFAULT_MQTT_PORT)]
    pub port: u16,

    /// Topic the device publishes samples to
    #[arg(long, env = "IMU_MQTT_TOPIC")]
    pub topic: String,

    /// Username; with a password this enables TLS
    #[arg(long, env = "IMU_MQTT_USERNAME")]
    pub username: Option<String>,

    /// Password; with a username this enables TLS
    #[arg(long, env = "IMU_MQTT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Client identifier (default: imulog-<pid>)
    #[arg(long)]
    pub client_id: Option<String>,

    /// Keep-alive interval in seconds
    #[arg(long, default_value_t = DEFAULT_KEEP_ALIVE_SECS)]
    pub keep_alive: u64,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Newline-delimited capture file
    pub file: PathBuf,

    /// Delay between payloads in milliseconds
    #[arg(long)]
    pub rate_limit_ms: Option<u64>,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Trace files, glob patterns, or directories of *.csv traces
    #[arg(required = true, num_args = 1..)]
    pub traces: Vec<String>,

    /// Root directory for summaries/ and resultants/
    #[arg(long, env = "IMU_DATA_DIR", default_value = "test_data")]
    pub data_dir: PathBuf,

    /// JSON file with custom alert bands
    #[arg(long, env = "IMU_BANDS_FILE")]
    pub bands: Option<PathBuf>,

    /// Print results as JSON instead of text summaries
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct BandsArgs {
    /// JSON file with custom alert bands
    #[arg(long, env = "IMU_BANDS_FILE")]
    pub bands: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

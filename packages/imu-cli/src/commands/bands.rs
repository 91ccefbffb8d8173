use crate::cli::BandsArgs;
use crate::commands::load_bands;
use crate::exit_codes;
use crate::output;
use imu_rs::{AlertBand, SignalKind};

pub fn execute(args: BandsArgs) -> i32 {
    let bands = match load_bands(args.bands.as_deref()) {
        Ok(b) => b,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if args.json {
        if let Err(e) = output::print_json(&bands, false) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
        return exit_codes::SUCCESS;
    }

    print_table(SignalKind::Acceleration, &bands.acceleration);
    println!();
    print_table(SignalKind::Gyroscope, &bands.gyroscope);

    exit_codes::SUCCESS
}

fn print_table(signal: SignalKind, bands: &[AlertBand]) {
    println!("{} bands:", signal.title());
    println!("  {:<16} {:>14}", "Label", format!("Threshold ({})", signal.unit()));
    println!("  {}", "-".repeat(32));
    for band in bands {
        println!("  {:<16} {:>14.4}", band.label, band.threshold);
    }
}

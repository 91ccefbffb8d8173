use crate::cli::AnalyzeArgs;
use crate::commands::load_bands;
use crate::exit_codes;
use crate::output;
use imu_rs::sink::default_sinks;
use imu_rs::{postprocess, report, resolve_traces, AnalyzedTrace, DataLayout};
use std::time::Instant;

pub fn execute(args: AnalyzeArgs) -> i32 {
    let bands = match load_bands(args.bands.as_deref()) {
        Ok(b) => b,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let files = match resolve_traces(&args.traces) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    if files.is_empty() {
        eprintln!("Error: No matching trace files found");
        return exit_codes::INPUT_ERROR;
    }

    let layout = DataLayout::new(&args.data_dir);
    let mut sinks = default_sinks(&layout);

    let total = files.len();
    let mut results: Vec<AnalyzedTrace> = Vec::with_capacity(total);
    let mut failed = 0usize;
    let start_time = Instant::now();

    for (i, path) in files.iter().enumerate() {
        if !args.quiet {
            eprintln!("[{}/{}] {}...", i + 1, total, path.display());
        }

        match postprocess(path, &bands, &mut sinks) {
            Ok(analyzed) => {
                if !args.json {
                    println!("{} ({} samples)", analyzed.trace_path.display(), analyzed.rows);
                    print!("{}", report::render(&analyzed.summary));
                    println!();
                }
                results.push(analyzed);
            }
            Err(e) => {
                eprintln!("  Error: {}", e);
                failed += 1;
            }
        }
    }

    if args.json {
        if let Err(e) = output::print_json(&results, args.compact) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    let succeeded = results.len();
    if !args.quiet {
        eprintln!(
            "Analysis complete: {}/{} succeeded, {}/{} failed, {:.1}s",
            succeeded,
            total,
            failed,
            total,
            start_time.elapsed().as_secs_f64()
        );
    }

    if failed == 0 {
        exit_codes::SUCCESS
    } else if succeeded > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::EXECUTION_ERROR
    }
}

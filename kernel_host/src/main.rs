//! # Kernel Host
//!
//! Entry point for the simulated kernel host.

use kernel_host::{usage, HostOptions, HostOutput, HostRuntime};
use std::env;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("kernel-host", String::as_str);

    let options = HostOptions::parse(args.get(1..).unwrap_or_default()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("{}", usage(program));
        process::exit(2);
    });

    let runtime = HostRuntime::new(options).unwrap_or_else(|e| {
        eprintln!("Failed to configure kernel: {}", e);
        process::exit(1);
    });

    match runtime.run() {
        Ok(HostOutput::Help) => println!("{}", usage(program)),
        Ok(HostOutput::Comparison(json)) => println!("{}", json),
        Ok(HostOutput::Demo(report)) => {
            log::info!(
                "Demo finished: {} ticks, {} messages, {} context switches",
                report.ticks,
                report.messages_received,
                report.context_switches
            );
        }
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            process::exit(if e.is_usage() { 2 } else { 1 });
        }
    }
}

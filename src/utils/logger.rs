//! Logger setup and the append-only error log.

use std::io::Write;
use std::path::Path;

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

pub fn init_logger() {
    let env = Env::default().filter_or("RUST_LOG", "warn,reelforge=info");

    Builder::from_env(env)
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("rustls", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Stderr)
        .init();
}

/// Append a failure line to `error.log` under the base directory. Best
/// effort: a logging failure must never mask the error being reported.
pub fn append_error_log(base_dir: &Path, message: &str) {
    let line = format!(
        "{} - ERROR - {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    );

    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(base_dir.join("error.log"))
        .and_then(|mut file| file.write_all(line.as_bytes()));

    if let Err(e) = result {
        log::warn!("could not append to error.log: {}", e);
    }
}

//! Copy one file into another through a `FileReader` and a `FileWriter`.
//!
//! Usage: `archive_cat [--append] <source> <destination>`

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use archive_io::{
    transfer, ErrorSink, FileManager, FileManagerConfig, ReadFlags, TracingSink, WriteFlags,
};
use archive_runtime::OsRuntime;
use tracing::{error, info};

const CHUNK_SIZE: usize = 64 * 1024;

struct Args {
    append: bool,
    source: String,
    destination: String,
}

fn parse_args() -> Result<Args, String> {
    let mut append = false;
    let mut paths = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--append" {
            append = true;
        } else if arg.starts_with("--") {
            return Err(format!("unknown option {arg}"));
        } else {
            paths.push(arg);
        }
    }
    match <[String; 2]>::try_from(paths) {
        Ok([source, destination]) => Ok(Args {
            append,
            source,
            destination,
        }),
        Err(_) => Err("usage: archive_cat [--append] <source> <destination>".to_string()),
    }
}

/// Relative arguments mean the working directory, not the configuration directory.
fn absolute(path: &str) -> String {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_string_lossy().into_owned();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn run(args: &Args) -> Result<u64, String> {
    let config = FileManagerConfig::from_env("archive_cat").map_err(|e| e.to_string())?;
    let fm = FileManager::new(Arc::new(OsRuntime::new()), &config).map_err(|e| e.to_string())?;
    let sink: Arc<dyn ErrorSink> = Arc::new(TracingSink);

    let mut reader = fm
        .create_file_reader(&absolute(&args.source), ReadFlags { no_fail: true }, sink.clone())
        .map_err(|e| e.to_string())?;
    let flags = WriteFlags {
        no_fail: true,
        append: args.append,
        ..WriteFlags::default()
    };
    let mut writer = fm
        .create_file_writer(&absolute(&args.destination), flags, sink)
        .map_err(|e| e.to_string())?;

    let moved = transfer(&mut reader, &mut writer, CHUNK_SIZE);

    let read_verdict = reader.close();
    let write_verdict = writer.close();
    read_verdict.map_err(|e| format!("reading {}: {e}", args.source))?;
    write_verdict.map_err(|e| format!("writing {}: {e}", args.destination))?;
    Ok(moved)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(moved) => {
            info!(bytes = moved, source = %args.source, destination = %args.destination, "copied");
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

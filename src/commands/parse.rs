//! Offline decoding of log lines

use eyre::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use crate::event;

pub fn run(file: Option<PathBuf>) -> Result<()> {
    let reader: Box<dyn BufRead> = match file {
        Some(ref path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let (decoded, skipped) = print_messages(reader)?;
    log::info!("Decoded {} events, skipped {} lines", decoded, skipped);

    Ok(())
}

/// Print one alert per event line; returns (decoded, skipped)
fn print_messages<R: BufRead>(reader: R) -> Result<(usize, usize)> {
    let mut decoded = 0;
    let mut skipped = 0;

    for chunk in reader.split(b'\n') {
        let bytes = chunk.context("Failed to read input")?;
        match event::decode(&String::from_utf8_lossy(&bytes)) {
            Some(message) => {
                println!("{}", message);
                decoded += 1;
            }
            None => skipped += 1,
        }
    }

    Ok((decoded, skipped))
}

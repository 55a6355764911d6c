use std::path::Path;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use indicatif::MultiProgress;
use mpa::process::track::{LoadOptions, TrackModel};

use super::command::Cli;
use super::progress::create_spinner;
use crate::input::InputReader;

pub struct LoadedTrack {
    pub data: Vec<u8>,
    pub track: TrackModel,
}

/// Reads the whole input and builds its track model on a worker thread.
pub fn load_track(input: &Path, cli: &Cli, multi: Option<&MultiProgress>) -> Result<LoadedTrack> {
    let mut input_reader = InputReader::new(input)?;
    if input_reader.is_pipe() {
        log::debug!("Reading the whole stream from stdin");
    }
    let data = input_reader.read_all()?;
    log::info!("Loading {} ({} bytes)", input.display(), data.len());

    let pb = multi
        .map(|multi| create_spinner(multi, "Loading track"))
        .transpose()?;

    let options = LoadOptions {
        fail_level: cli.fail_level(),
        ..Default::default()
    };

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let result = TrackModel::load(&data, &options);
        // The receiver only goes away if the main thread already failed
        let _ = tx.send((data, result));
    });

    let received = rx.recv();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    worker
        .join()
        .map_err(|_| anyhow!("Track loader thread panicked"))?;

    let (data, result) = received.context("Track loader thread stopped")?;
    let track = result.with_context(|| format!("Cannot load {}", input.display()))?;

    Ok(LoadedTrack { data, track })
}

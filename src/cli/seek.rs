use anyhow::Result;
use indicatif::MultiProgress;
use mpa::utils::timing::MediaTime;

use super::command::{Cli, SeekArgs};
use super::loader::load_track;

pub fn cmd_seek(args: &SeekArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let loaded = load_track(&args.input, cli, multi)?;
    let track = &loaded.track;

    let source = match track.toc() {
        Some(_) => "seek table",
        None => "linear estimate",
    };
    log::info!("Duration {}, using {source}", track.duration);

    println!("{:>14} {:>12} {:>14}", "time", "offset", "offset time");
    for &ms in &args.times {
        if ms > track.duration_ms {
            log::warn!("{ms} ms is past the end of the track");
        }

        let offset = track.position_for(ms);
        println!(
            "{:>14} {:>12} {:>14}",
            MediaTime::from_millis(ms),
            offset,
            MediaTime::from_millis(track.time_for(offset))
        );
    }

    Ok(())
}

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result, bail};
use indicatif::MultiProgress;
use mpa::process::cursor::StreamCursor;
use mpa::utils::errors::StreamError;

use super::command::{Cli, ExtractArgs};
use super::loader::load_track;
use super::progress::create_progress_bar;

pub fn cmd_extract(args: &ExtractArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let loaded = load_track(&args.input, cli, multi)?;
    let track = &loaded.track;

    let start = if args.skip_info_frame {
        track.audio_start
    } else {
        track.first_frame
    };
    let end = track.audio_start + track.audio_bytes;
    let audio = &loaded.data[start as usize..end as usize];

    let to_stdout = args.output.as_os_str() == "-";
    let mut writer: Box<dyn Write> = if to_stdout {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("Cannot create {}", args.output.display()))?;
        Box::new(BufWriter::new(file))
    };

    let pb = multi
        .map(|multi| create_progress_bar(multi, track.frame_count + 1))
        .transpose()?;

    let mut cursor = StreamCursor::from_slice(audio);
    cursor.set_fail_level(cli.fail_level());

    let mut frames = 0u64;
    let mut written = 0u64;
    loop {
        match cursor.decode_next() {
            Ok(header) if header.is_compatible(&track.header) => {
                let bytes = cursor.frame_bytes();
                writer.write_all(bytes)?;
                written += bytes.len() as u64;
                frames += 1;
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
            }
            Ok(header) => {
                log::warn!(
                    "Dropping stray {header} frame at offset {}",
                    start + cursor.frame_offset()
                );
            }
            Err(StreamError::NeedMoreData) => break,
            Err(StreamError::BadCrc) => bail!(
                "Frame CRC mismatch at offset {}",
                start + cursor.frame_offset()
            ),
            Err(e) => log::debug!("Skipping damaged data: {e}"),
        }
    }

    writer.flush()?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let stats = cursor.stats();
    log::info!(
        "Wrote {frames} frames ({written} bytes), dropped {} bytes",
        loaded.data.len() as u64 - written
    );
    if stats.resyncs > 0 {
        log::warn!("Stream resynchronized {} times", stats.resyncs);
    }

    Ok(())
}

use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar};
use mpa::process::Frame;
use mpa::process::cursor::StreamCursor;
use mpa::utils::errors::StreamError;
use mpa::utils::timing::MediaTime;

use super::command::{Cli, FramesArgs};
use super::progress::create_spinner;
use crate::input::InputReader;

pub fn cmd_frames(args: &FramesArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Listing frames of {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut cursor = StreamCursor::default();
    cursor.set_fail_level(cli.fail_level());

    let mut context = FrameListing {
        limit: args.limit.unwrap_or(u64::MAX),
        pb: multi
            .map(|multi| create_spinner(multi, "Reading frames"))
            .transpose()?,
        ..Default::default()
    };

    println!("{:>8} {:>12} {:>14}  header", "frame", "offset", "time");

    input_reader.process_chunks(64 * 1024, |chunk| {
        cursor.push_bytes(chunk);
        context.drain(&mut cursor)?;
        cursor.compact();
        Ok(!context.done())
    })?;

    if !context.done() {
        cursor.finish();
        context.drain(&mut cursor)?;
    }

    if let Some(pb) = &context.pb {
        pb.finish_and_clear();
    }

    let stats = cursor.stats();
    println!();
    println!("Analysis Summary");
    println!("  Frames                    {}", context.frames);
    println!("  Duration                  {}", context.time);
    println!("  Resynchronizations        {}", stats.resyncs);
    println!("  Bytes skipped             {}", stats.bytes_skipped);
    println!("  Errors                    {}", context.errors);
    println!();

    Ok(())
}

#[derive(Default)]
struct FrameListing {
    limit: u64,
    frames: u64,
    errors: u64,
    time: MediaTime,
    pb: Option<ProgressBar>,
}

impl FrameListing {
    fn done(&self) -> bool {
        self.frames >= self.limit
    }

    fn drain(&mut self, cursor: &mut StreamCursor) -> Result<()> {
        while !self.done() {
            match cursor.next() {
                Some(Ok(frame)) => self.print(&frame),
                // Only reported when warnings are fatal
                Some(Err(StreamError::BadCrc)) => {
                    bail!(
                        "Frame {} at offset {}: {}",
                        self.frames,
                        cursor.frame_offset(),
                        StreamError::BadCrc
                    )
                }
                Some(Err(e)) => {
                    log::debug!("Frame error after frame {}: {e}", self.frames);
                    self.errors += 1;
                }
                None => break,
            }
        }

        Ok(())
    }

    fn print(&mut self, frame: &Frame) {
        let line = format!(
            "{:>8} {:>12} {:>14}  {}",
            self.frames, frame.offset, self.time, frame.header
        );
        match &self.pb {
            Some(pb) => pb.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }

        self.frames += 1;
        self.time += frame.duration();

        if self.frames.is_multiple_of(100) {
            if let Some(pb) = &self.pb {
                pb.set_message(format!("Reading frames...       {}", self.frames));
            }
        }
    }
}

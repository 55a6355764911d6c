use anyhow::Result;
use indicatif::MultiProgress;
use serde::Serialize;

use super::command::{Cli, InfoArgs, ReportFormat};
use super::loader::load_track;
use mpa::process::track::TrackModel;
use mpa::structs::lame::{LameTag, ReplayGain};
use mpa::structs::seek::{SeekMetadata, SeekTag};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing MPEG audio stream: {}", args.input.display());

    let loaded = load_track(&args.input, cli, multi)?;
    let report = TrackReport::new(&loaded.track, loaded.data.len());

    match args.format {
        ReportFormat::Plain => display_report(&report),
        ReportFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&report)?),
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct TrackReport {
    size: usize,
    version: String,
    layer: u8,
    channel_mode: String,
    channels: u8,
    sample_rate: u32,
    bitrate_mode: String,
    /// bits/s
    average_bitrate: u32,
    frames: u64,
    samples: u64,
    playable_samples: u64,
    duration: String,
    duration_ms: u64,
    audio_start: u64,
    audio_bytes: u64,
    id3v2_bytes: usize,
    id3v1: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<MetadataReport>,
}

#[derive(Debug, Serialize)]
struct MetadataReport {
    tag: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<u32>,
    seek_table: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    lame: Option<LameReport>,
}

#[derive(Debug, Serialize)]
struct LameReport {
    vbr_method: String,
    lowpass: u32,
    bitrate: u8,
    encoder_delay: u16,
    end_padding: u16,
    source_sample_rate: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radio_gain_db: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audiophile_gain_db: Option<f32>,
}

impl TrackReport {
    fn new(track: &TrackModel, size: usize) -> Self {
        let header = &track.header;
        Self {
            size,
            version: header.version.to_string(),
            layer: header.layer.number(),
            channel_mode: header.channel_mode.to_string(),
            channels: header.channel_count(),
            sample_rate: track.sample_rate,
            bitrate_mode: track.bitrate_mode.to_string(),
            average_bitrate: track.average_bitrate(),
            frames: track.frame_count,
            samples: track.sample_count,
            playable_samples: track.playable_sample_count(),
            duration: track.duration.to_string(),
            duration_ms: track.duration_ms,
            audio_start: track.audio_start,
            audio_bytes: track.audio_bytes,
            id3v2_bytes: track.id3v2_len,
            id3v1: track.id3v1,
            metadata: track.metadata.as_ref().map(MetadataReport::new),
        }
    }
}

impl MetadataReport {
    fn new(metadata: &SeekMetadata) -> Self {
        let quality = match &metadata.tag {
            SeekTag::Xing(xing) | SeekTag::Info(xing) => xing.quality,
            SeekTag::Vbri(vbri) => Some(vbri.quality as u32),
            SeekTag::Lame => None,
        };

        Self {
            tag: metadata.name(),
            encoder: metadata.encoder.clone(),
            frames: metadata.frames(),
            bytes: metadata.bytes(),
            quality,
            seek_table: metadata.toc().is_some(),
            lame: metadata.lame.as_ref().map(LameReport::new),
        }
    }
}

impl LameReport {
    fn new(lame: &LameTag) -> Self {
        Self {
            vbr_method: lame.vbr_method.to_string(),
            lowpass: lame.lowpass,
            bitrate: lame.bitrate,
            encoder_delay: lame.start_delay,
            end_padding: lame.end_padding,
            source_sample_rate: lame.source_sample_rate_name(),
            peak: lame.peak_amplitude(),
            radio_gain_db: lame.radio_gain.as_ref().map(ReplayGain::db),
            audiophile_gain_db: lame.audiophile_gain.as_ref().map(ReplayGain::db),
        }
    }
}

fn display_report(report: &TrackReport) {
    println!();
    println!("MPEG Audio Stream Information");
    println!("=============================");
    println!();

    println!("Stream Information");
    println!("  Format                    {} Layer {}", report.version, report.layer);
    println!("  Channel mode              {} ({} channels)", report.channel_mode, report.channels);
    println!("  Sampling rate             {} Hz", report.sample_rate);
    println!("  Bitrate mode              {}", report.bitrate_mode);
    println!("  Average bitrate           {:.1} kbps", report.average_bitrate as f64 / 1000.0);
    println!();

    println!("Layout");
    println!("  Size                      {} bytes", report.size);
    if report.id3v2_bytes > 0 {
        println!("  ID3v2 tag                 {} bytes", report.id3v2_bytes);
    }
    println!("  Audio                     {} bytes at offset {}", report.audio_bytes, report.audio_start);
    if report.id3v1 {
        println!("  ID3v1 tag                 128 bytes");
    }
    println!();

    if let Some(metadata) = &report.metadata {
        display_metadata(metadata);
    }

    println!("Analysis Summary");
    println!("  Frames                    {}", report.frames);
    println!("  Samples                   {}", report.samples);
    if report.playable_samples != report.samples {
        println!("  Playable samples          {}", report.playable_samples);
    }
    println!("  Duration                  {}", report.duration);
    println!();
}

fn display_metadata(metadata: &MetadataReport) {
    println!("{} Tag", metadata.tag);
    if let Some(encoder) = &metadata.encoder {
        println!("  Encoder                   {encoder}");
    }
    if let Some(frames) = metadata.frames {
        println!("  Frames                    {frames}");
    }
    if let Some(bytes) = metadata.bytes {
        println!("  Bytes                     {bytes}");
    }
    if let Some(quality) = metadata.quality {
        println!("  Quality                   {quality}");
    }
    println!("  Seek table                {}", metadata.seek_table);

    if let Some(lame) = &metadata.lame {
        println!("  VBR method                {}", lame.vbr_method);
        println!("  Lowpass                   {} Hz", lame.lowpass);
        println!("  Bitrate                   {} kbps", lame.bitrate);
        println!("  Encoder delay             {} samples", lame.encoder_delay);
        println!("  Padding                   {} samples", lame.end_padding);
        println!("  Source sampling rate      {}", lame.source_sample_rate);
        if let Some(peak) = lame.peak {
            println!("  Peak                      {peak:.6}");
        }
        if let Some(gain) = lame.radio_gain_db {
            println!("  Track gain                {gain:+.1} dB");
        }
        if let Some(gain) = lame.audiophile_gain_db {
            println!("  Album gain                {gain:+.1} dB");
        }
    }
    println!();
}

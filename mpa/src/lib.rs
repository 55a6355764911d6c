//! # mpa
//!
//! Framing engine for MPEG-1, MPEG-2 and MPEG-2.5 audio (Layers I, II and III)
//! elementary streams: frame synchronization, free format bitrate
//! measurement, VBR seek metadata and a whole-track duration model.
//!
//! No audio is decoded. Everything here works on frame headers and the
//! metadata some encoders write into the first frame.
//!
//! ## Technical Overview
//!
//! ### Frames
//!
//! Every frame starts with an 11-bit sync word followed by a 21-bit header
//! giving version, layer, bitrate, sample rate and padding. The frame size
//! follows from those fields, except for free format frames, whose bitrate
//! is only found by measuring the distance to the next sync word.
//!
//! ### Synchronization
//!
//! A sync pattern can appear anywhere in audio data. A candidate is only
//! trusted when another compatible header sits exactly where the candidate
//! frame ends. After that the stream is followed frame by frame until the
//! expected sync word is missing.
//!
//! ### Seek Metadata
//!
//! Variable bitrate files usually carry a Xing (or Info) tag, optionally
//! extended by a LAME block, or a Fraunhofer VBRI tag in place of the audio
//! of the first frame. They provide the frame count and a 100-entry table
//! mapping time percentages to byte positions.
//!
//! ## Quick Start
//!
//! 1. Locate frames in a byte stream with [`process::cursor::StreamCursor`]
//! 2. Read the seek metadata of the first frame with [`structs::seek::TagParser`]
//! 3. Or let [`process::track::TrackModel`] do both for a complete file
//!
//! ```rust,no_run
//! use mpa::process::cursor::StreamCursor;
//! use mpa::process::track::{LoadOptions, TrackModel};
//!
//! let data = std::fs::read("track.mp3")?;
//!
//! let mut cursor = StreamCursor::default();
//! cursor.push_bytes(&data);
//! cursor.finish();
//!
//! for frame in &mut cursor {
//!     match frame {
//!         Ok(frame) => println!("{} {}", frame.offset, frame.header),
//!         // Damaged data, the cursor searches on by itself
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//!
//! let track = TrackModel::load(&data, &LoadOptions::default())?;
//! println!("{} ({})", track.duration, track.bitrate_mode);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Stream processing.
///
/// 1. **Synchronization** ([`process::cursor`]): Frame boundaries in a
///    growable buffer with damage recovery.
///
/// 2. **Free Format** ([`process::probe`]): Bitrate measurement for frames
///    without a coded bitrate.
///
/// 3. **Track Model** ([`process::track`]): Duration, bitrate mode and
///    time to byte mapping of a complete stream.
pub mod process;

/// Data structures representing MPEG audio format components.
///
/// - **Frame Headers** ([`structs::header`]): Header fields and derived sizes
/// - **Xing/Info** ([`structs::xing`]): Frame count, byte count and TOC
/// - **LAME** ([`structs::lame`]): Encoder extension with gapless info
/// - **VBRI** ([`structs::vbri`]): Fraunhofer seek table
/// - **Seek Metadata** ([`structs::seek`]): Unified view over all tags
/// - **ID3** ([`structs::id3`]): Extent of surrounding ID3 tags
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **CRC Validation** ([`utils::crc`]): Frame and LAME tag checksums
/// - **Error Handling** ([`utils::errors`]): Error types
/// - **Timing** ([`utils::timing`]): Exact media time arithmetic
pub mod utils;

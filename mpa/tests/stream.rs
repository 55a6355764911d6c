use mpa::process::Frame;
use mpa::process::cursor::StreamCursor;
use mpa::process::track::{BitrateMode, LoadOptions, TrackModel};
use mpa::structs::header::{FrameHeader, Layer, MpegVersion};
use mpa::utils::errors::StreamError;

fn header(version: MpegVersion, layer: Layer, bitrate_index: u8) -> FrameHeader {
    FrameHeader::new(version, layer, bitrate_index, 0).unwrap()
}

fn frame(header: &FrameHeader, fill: u8) -> Vec<u8> {
    let mut out = header.to_bytes().to_vec();
    out.resize(header.frame_size(), fill);
    out
}

/// Layer III stream alternating between three bitrates.
fn vbr_stream(count: usize) -> Vec<u8> {
    let headers = [9, 11, 13].map(|i| header(MpegVersion::Mpeg1, Layer::III, i));
    (0..count)
        .flat_map(|i| frame(&headers[i % headers.len()], 0x55))
        .collect()
}

fn collect(cursor: &mut StreamCursor) -> Vec<Frame> {
    cursor.filter_map(Result::ok).collect()
}

#[test]
fn chunked_input_matches_whole_input() {
    let data = vbr_stream(120);
    let whole = collect(&mut StreamCursor::from_slice(&data));
    assert_eq!(whole.len(), 120);

    fastrand::seed(7);
    for _ in 0..20 {
        let mut cursor = StreamCursor::default();
        let mut frames = Vec::new();
        let mut rest = data.as_slice();

        while !rest.is_empty() {
            let (chunk, tail) = rest.split_at(fastrand::usize(1..=rest.len().min(1500)));
            cursor.push_bytes(chunk);
            frames.extend(collect(&mut cursor));
            rest = tail;
        }
        cursor.finish();
        frames.extend(collect(&mut cursor));

        assert_eq!(frames, whole);
    }
}

#[test]
fn frames_tile_the_stream() {
    let data = vbr_stream(30);
    let frames = collect(&mut StreamCursor::from_slice(&data));

    assert_eq!(frames[0].offset, 0);
    for pair in frames.windows(2) {
        assert_eq!(pair[0].end(), pair[1].offset);
    }
    assert_eq!(frames.last().map(Frame::end), Some(data.len() as u64));
}

#[test]
fn garbage_between_frames_is_skipped() {
    let header = header(MpegVersion::Mpeg2, Layer::III, 8);
    let mut data = Vec::new();
    for i in 0..10 {
        data.extend(frame(&header, 0));
        if i == 4 {
            data.extend([0x12, 0xFF, 0x00, 0x34, 0x56]);
        }
    }

    let mut cursor = StreamCursor::from_slice(&data);
    let mut frames = 0;
    let mut lost = 0;
    for result in &mut cursor {
        match result {
            Ok(frame) => {
                assert_eq!(frame.header.sample_rate, 22050);
                assert_eq!(frame.header.samples_per_frame(), 576);
                frames += 1;
            }
            Err(StreamError::LostSync) => lost += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(frames, 10);
    assert_eq!(lost, 1);
    assert_eq!(cursor.stats().resyncs, 1);
}

#[test]
fn random_damage_never_panics() {
    let clean = vbr_stream(60);

    fastrand::seed(42);
    for _ in 0..200 {
        let mut data = clean.clone();
        for _ in 0..fastrand::usize(1..16) {
            data[fastrand::usize(..clean.len())] ^= 1 << fastrand::u32(0..8);
        }

        let mut cursor = StreamCursor::from_slice(&data);
        let mut end = 0;
        for frame in collect(&mut cursor) {
            assert!(frame.offset >= end);
            end = frame.end();
        }
        assert!(end <= data.len() as u64);

        if let Ok(track) = TrackModel::load(&data, &LoadOptions::default()) {
            assert!(track.audio_start + track.audio_bytes <= data.len() as u64);
            assert!(track.position_for(track.duration_ms) <= data.len() as u64);
        }
    }
}

#[test]
fn track_from_plain_stream() {
    let data = vbr_stream(90);
    let track = TrackModel::load(&data, &LoadOptions::default()).unwrap();

    assert_eq!(track.bitrate_mode, BitrateMode::Variable);
    assert_eq!(track.frame_count, 90);
    assert_eq!(track.sample_count, 90 * 1152);
    assert_eq!(track.duration_ms, 90 * 1152 * 1000 / 44100);
    assert!(track.metadata.is_none());

    let middle = track.position_for(track.duration_ms / 2);
    assert!(middle > 0 && middle < data.len() as u64);
    assert!(track.time_for(middle) <= track.duration_ms / 2);
}

#[test]
fn layer1_and_layer2_streams() {
    for (layer, spf) in [(Layer::I, 384), (Layer::II, 1152)] {
        let header = header(MpegVersion::Mpeg1, layer, 6);
        let data: Vec<u8> = (0..25).flat_map(|_| frame(&header, 0)).collect();
        let track = TrackModel::load(&data, &LoadOptions::default()).unwrap();

        assert_eq!(track.bitrate_mode, BitrateMode::Constant);
        assert_eq!(track.samples_per_frame, spf);
        assert_eq!(track.frame_count, 25);
    }
}

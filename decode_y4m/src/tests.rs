use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use float_cmp::approx_eq;
use vidcursor_core::{CursorOptions, DecodeCursor, FrameBuffer, Window};

use super::*;

/// Write a 4x2 stream where the luma of frame `n` is `16 + 20 * n` and the
/// chroma is neutral.
fn write_fixture(dir: &Path, name: &str, colorspace: &str, num_frames: u8) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();

    writeln!(file, "YUV4MPEG2 W4 H2 F25:1 Ip A1:1 C{}", colorspace).unwrap();
    let chroma_len = match colorspace {
        "mono" => 0,
        "444" => 8,
        "422" => 4,
        _ => 2,
    };
    for n in 0..num_frames {
        file.write_all(b"FRAME\n").unwrap();
        file.write_all(&[16 + 20 * n; 8]).unwrap();
        file.write_all(&vec![128; chroma_len * 2]).unwrap();
    }

    path
}

fn gray(n: u8) -> u8 {
    ((298 * 20 * i32::from(n) + 128) >> 8) as u8
}

fn options(max_readahead_frames: usize) -> CursorOptions {
    CursorOptions {
        max_readahead_frames,
        ..CursorOptions::for_source::<Y4mSource>()
    }
}

fn fetch_at(cursor: &mut DecodeCursor<Y4mSource>, time: f64) -> Option<FrameBuffer> {
    cursor.set_time(time, 0);
    cursor.fetch_buffer()
}

#[test]
fn open_reports_stream_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "info.y4m", "420jpeg", 3);

    let cursor = DecodeCursor::open(Y4mSource::new(path), options(0)).unwrap();
    let info = cursor.info();
    assert_eq!(info.name, "info.y4m");
    assert_eq!((info.width, info.height, info.num_components), (4, 2, 3));
    assert!(approx_eq!(f64, info.timebase, 0.04, ulps = 2));
    assert!(cursor.is_valid());
}

#[test]
fn frames_convert_to_bgr() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "bgr.y4m", "420jpeg", 6);
    let mut cursor = DecodeCursor::open(Y4mSource::new(path), options(0)).unwrap();

    // 25 fps
    let buffer = fetch_at(&mut cursor, 0.12).unwrap();
    assert_eq!(buffer.window(), Window::new(3, 4));
    assert_eq!(buffer.pixels().len(), 4 * 2 * 3);
    assert!(buffer.pixels().iter().all(|&p| p == gray(3)));
}

#[test]
fn seeks_are_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "seek.y4m", "444", 10);
    let mut cursor = DecodeCursor::open(Y4mSource::new(path), options(0)).unwrap();

    let buffer = fetch_at(&mut cursor, 0.32).unwrap();
    assert_eq!(buffer.window(), Window::new(8, 9));
    cursor.release_buffer(buffer);

    let buffer = fetch_at(&mut cursor, 0.04).unwrap();
    assert_eq!(buffer.window(), Window::new(1, 2));
    assert!(buffer.pixels().iter().all(|&p| p == gray(1)));
}

#[test]
fn packets_seek_within_the_file_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "packets.y4m", "422", 5);
    let mut packets = Y4mSource::new(path).open().unwrap().packets;

    assert!(packets.seek(3, false));
    let packet = packets.next_packet().unwrap();
    assert_eq!(packet.frame, 3);
    assert_eq!(packet.payload.y[0], 16 + 60);

    assert!(!packets.seek(5, true));
    assert!(!packets.seek(-1, true));
    assert_eq!(packets.next_packet().map(|p| p.frame), Some(4));
    assert!(packets.next_packet().is_none());
}

#[test]
fn seeks_past_the_end_stop_rereading_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "length.y4m", "420jpeg", 5);
    let mut packets = Y4mSource::new(&path).open().unwrap().packets;

    assert!(!packets.seek(5, false));

    // Growing the file does not help a reader that already knows its length.
    write_fixture(dir.path(), "length.y4m", "420jpeg", 8);
    assert!(!packets.seek(6, false));
    assert!(packets.seek(2, true));
    assert_eq!(packets.next_packet().map(|p| p.frame), Some(2));

    let mut reopened = Y4mSource::new(&path).open().unwrap().packets;
    assert!(reopened.seek(6, false));
    assert_eq!(reopened.next_packet().map(|p| p.frame), Some(6));
}

#[test]
fn end_of_stream_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "eof.y4m", "420jpeg", 4);
    let mut cursor = DecodeCursor::open(Y4mSource::new(path), options(0)).unwrap();

    let buffer = fetch_at(&mut cursor, 1.0).unwrap();
    assert_eq!(buffer.window(), Window::new(3, 4));
    assert_eq!(cursor.eof_frame(), Some(3));

    assert!(cursor.set_time(0.2, 1));
    assert_eq!(cursor.current_frame(), 1);
}

#[test]
fn mono_converts_to_gray() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "mono.y4m", "mono", 2);
    let mut cursor = DecodeCursor::open(Y4mSource::new(path), options(0)).unwrap();
    assert_eq!(cursor.info().num_components, 1);

    let buffer = fetch_at(&mut cursor, 0.04).unwrap();
    assert_eq!(buffer.pixels(), &[36; 8]);
}

#[test]
fn readahead_over_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "readahead.y4m", "420jpeg", 12);
    let mut cursor = DecodeCursor::open(Y4mSource::new(path), options(4)).unwrap();
    assert!(cursor.is_thread_started());

    for frame in [0u8, 1, 2, 9, 4] {
        let start = Instant::now();
        let buffer = loop {
            if let Some(buffer) = fetch_at(&mut cursor, f64::from(frame) * 0.04) {
                break buffer;
            }
            assert!(start.elapsed() < Duration::from_secs(10));
            std::thread::sleep(Duration::from_millis(1));
        };
        assert!(buffer.window().contains(i64::from(frame)));
        assert!(buffer.pixels().iter().all(|&p| p == gray(frame)));
        cursor.release_buffer(buffer);
    }

    cursor.stop_thread();
    assert_eq!(cursor.queued_frames(), 0);
}

#[test]
fn unsupported_streams_fail_to_open() {
    let dir = tempfile::tempdir().unwrap();

    let path = write_fixture(dir.path(), "deep.y4m", "420p10", 1);
    let err = DecodeCursor::open(Y4mSource::new(path), options(0)).err().unwrap();
    assert!(matches!(
        err,
        vidcursor_core::OpenError::Source(OpenError::UnsupportedColorspace(_))
    ));

    let missing = dir.path().join("missing.y4m");
    let err = DecodeCursor::open(Y4mSource::new(missing), options(0)).err().unwrap();
    assert!(matches!(err, vidcursor_core::OpenError::Source(OpenError::Io(_))));

    let mut source = Y4mSource::new(dir.path().join("never.y4m"));
    let info = VideoInfo {
        name: String::from("never"),
        width: 1,
        height: 1,
        num_components: 3,
        timebase: 1.0,
        length: None,
    };
    assert!(matches!(source.converter(&info), Err(OpenError::NotOpened)));
}

/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::{*, super::monitor::Callbacks};
use byteorder::{BigEndian, WriteBytesExt};

fn segment(output: &mut Vec<u8>, pts: u32, kind: u8, payload: &[u8]) {
    output.write_u16::<BigEndian>(bd::MAGIC).unwrap();
    output.write_u32::<BigEndian>(pts).unwrap();
    output.write_u32::<BigEndian>(pts).unwrap();
    output.write_u8(kind).unwrap();
    output.write_u16::<BigEndian>(payload.len() as u16).unwrap();
    output.extend_from_slice(payload);
}

/// One 2x2 caption at (10, 20) shown from 0.5 s to 1.5 s.
fn bd_stream() -> Vec<u8> {

    let mut output = Vec::new();

    segment(&mut output, 45_000, 0x16, &[
        0x07, 0x80, 0x04, 0x38, 0x10, 0x00, 0x01, 0x80, 0x00, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x40, 0x00, 0x0A, 0x00, 0x14,
    ]);
    segment(&mut output, 45_000, 0x14, &[0x00, 0x00, 0x01, 0xEB, 0x80, 0x80, 0xFF]);
    segment(&mut output, 45_000, 0x15, &[
        0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x0C, 0x00, 0x02, 0x00, 0x02,
        0x01, 0x01, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00,
    ]);
    segment(&mut output, 45_000, 0x80, &[]);
    segment(&mut output, 135_000, 0x16, &[
        0x07, 0x80, 0x04, 0x38, 0x10, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
    ]);
    segment(&mut output, 135_000, 0x80, &[]);

    output
}

fn empty_frame(start: u64, end: u64) -> Frame {
    Frame {
        start,
        end,
        width: hd::WIDTH,
        height: hd::HEIGHT,
        forced: false,
        content: FrameContent::HdDvd(Picture::default()),
    }
}

#[test]
fn test_detect() {
    assert_eq!(StreamKind::detect(&[0x50, 0x47, 0x00]), Some(StreamKind::BluRay));
    assert_eq!(StreamKind::detect(b"SP"), Some(StreamKind::HdDvd));
    assert_eq!(StreamKind::detect(b"RIFF"), None);
    assert_eq!(StreamKind::detect(&[0x50]), None);
    assert_eq!(StreamKind::detect(&[0_u8; 0]), None);
}

#[test]
fn test_unrecognized_stream() {
    assert!(matches!(
        SupStream::from_bytes(vec![0x12, 0x34, 0x56]),
        Err(ReadError::UnrecognizedStream),
    ));
}

#[test]
fn test_conclude_downgrades_errors() {

    assert!(matches!(
        Catalog::new().conclude(Err(ReadError::Canceled { offset: 5 })),
        Err(ReadError::Canceled { offset: 5 }),
    ));

    let mut catalog = Catalog::new();

    catalog.push(empty_frame(0, 0));

    let catalog = catalog.conclude(Err(ReadError::BadMagic { offset: 7, magic: 0 })).unwrap();

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.stop_reason().and_then(ReadError::offset), Some(7));
    assert!(catalog.stop_reason().map_or(false, ReadError::is_malformed_container));

    let catalog = Catalog::new().conclude(Ok(())).unwrap();

    assert!(catalog.is_empty());
    assert!(catalog.stop_reason().is_none());
}

#[test]
fn test_frame_duration() {
    assert_eq!(empty_frame(100, 0).duration(), None);
    assert_eq!(empty_frame(100, 300).duration(), Some(200));
    assert_eq!(empty_frame(300, 100).duration(), None);
}

#[test]
fn test_decode_bd_frame() {

    let data = bd_stream();
    let stream = SupStream::from_bytes(data.clone()).unwrap();
    let catalog = stream.catalog();
    let frame = &catalog.frames()[0];

    assert_eq!(stream.kind(), StreamKind::BluRay);
    assert_eq!(catalog.len(), 1);
    assert_eq!((frame.start, frame.end), (45_000, 135_000));
    assert_eq!(frame.duration(), Some(90_000));
    assert!(frame.forced);
    assert_eq!(catalog.forced_count(), 1);
    assert_eq!(catalog.start_offset(0), Some(13 + 19 + 13 + 7 + 13 + 11));
    assert_eq!(catalog.start_offset(1), None);

    let decoded = stream.decode(0, &DecodeOptions::default()).unwrap();

    assert_eq!((decoded.bitmap.x(), decoded.bitmap.y()), (10, 20));
    assert_eq!(decoded.bitmap.pixels(), &[1, 1, 1, 1]);
    assert_eq!(decoded.palette.alpha(1), 0xFF);
    assert_eq!(decoded.palette.entry(1).ycbcr.y, 0xEB);
    assert_eq!(decoded.primary_color_index, Some(1));

    let palette = stream.decode_palette(0, &DecodeOptions::default()).unwrap();

    assert_eq!(stream.decode_bitmap(0, &palette).unwrap(), decoded.bitmap);
    assert!(matches!(
        stream.decode(1, &DecodeOptions::default()),
        Err(DecodeError::FrameIndexOutOfBounds { index: 1 }),
    ));

    let (source, catalog) = stream.into_parts();

    assert_eq!(source.into_inner(), data);
    assert_eq!(catalog.iter().count(), 1);
}

#[test]
fn test_monitor_sees_progress() {

    let data = bd_stream();
    let mut offsets = Vec::new();
    let mut monitor = Callbacks {
        canceled: || false,
        progress: |offset: usize| offsets.push(offset),
    };
    let stream = SupStream::with_monitor(FileSource::from(data.clone()), &mut monitor).unwrap();

    assert_eq!(stream.catalog().len(), 1);
    assert_eq!(offsets.first(), Some(&(13 + 19)));
    assert_eq!(offsets.last(), Some(&data.len()));
    assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn test_truncated_hd_stream() {
    assert!(matches!(
        SupStream::from_bytes(vec![0x53, 0x50, 0x00, 0x00]),
        Err(ReadError::Truncated { .. }),
    ));
}

/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::{
    *,
    super::{
        catalog::{Frame, FrameContent},
        error::{DecodeError, ReadError, RleError},
        monitor::Callbacks,
        options::DecodeOptions,
        palette::RgbPixel,
    },
};
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use rand::{thread_rng, Rng};

#[derive(Default)]
struct BitWriter {
    data: Vec<u8>,
    used: u32,
}

impl BitWriter {

    fn write(&mut self, value: u32, count: u32) -> &mut Self {

        for i in (0..count).rev() {
            if self.used == 0 {
                self.data.push(0);
            }
            let last = self.data.last_mut().unwrap();
            *last |= (((value >> i) & 1) as u8) << (7 - self.used);
            self.used = (self.used + 1) % 8;
        }

        self
    }

    fn sync(&mut self) -> &mut Self {
        self.used = 0;
        self
    }

    fn run(&mut self, color: u8, count: usize) -> &mut Self {

        self.write((count > 1) as u32, 1);

        if color < 4 {
            self.write(0, 1).write(color as u32, 2);
        } else {
            self.write(1, 1).write(color as u32, 8);
        }

        match count {
            1 => self,
            2 ..= 9 => self.write(0, 1).write(count as u32 - 2, 3),
            _ => self.write(1, 1).write(count as u32 - 9, 7),
        }
    }
}

fn encode_field<'a>(rows: impl Iterator<Item = &'a Vec<u8>>) -> Vec<u8> {

    let mut writer = BitWriter::default();

    for row in rows {

        let mut x = 0;

        while x < row.len() {
            let color = row[x];
            let count = row[x..].iter().take_while(|pixel| **pixel == color).count().min(136);
            writer.run(color, count);
            x += count;
        }

        writer.sync();
    }

    writer.data
}

fn alpha_table(raw: u8) -> Vec<u8> {
    let mut table = vec![raw; ALPHA_TABLE_SIZE];
    table[0] = 0xFF;
    table
}

struct Record {
    pts: u32,
    x: u16,
    y: u16,
    rows: Vec<Vec<u8>>,
    start_delay: u16,
    stop_delay: u16,
    alpha_tables: Vec<Vec<u8>>,
    extra_commands: Vec<u8>,
    self_loop: bool,
}

impl Record {

    fn new(pts: u32, x: u16, y: u16, rows: Vec<Vec<u8>>) -> Self {
        Self {
            pts,
            x,
            y,
            rows,
            start_delay: 0,
            stop_delay: 100,
            alpha_tables: vec![alpha_table(0x00)],
            extra_commands: Vec::new(),
            self_loop: false,
        }
    }

    fn solid(pts: u32, width: usize, height: usize, color: u8) -> Self {
        Self::new(pts, 100, 800, vec![vec![color; width]; height])
    }

    fn write(&self, output: &mut Vec<u8>) {

        let even = encode_field(self.rows.iter().step_by(2));
        let odd = encode_field(self.rows.iter().skip(1).step_by(2));
        let width = self.rows.first().map_or(0, |row| row.len()) as u16;
        let height = self.rows.len() as u16;
        let x_end = self.x + width - 1;
        let y_end = self.y + height - 1;
        let even_offset = 10_u32;
        let odd_offset = even_offset + even.len() as u32;
        let command_offset = odd_offset + odd.len() as u32;
        let mut first = Vec::new();

        first.write_u16::<BigEndian>(self.start_delay).unwrap();
        first.write_u32::<BigEndian>(0).unwrap();
        first.write_u8(0x01).unwrap();
        first.write_u8(0x83).unwrap();
        for i in 0..256 {
            first.extend_from_slice(&[i as u8, 0x80, 0x90]);
        }
        for table in self.alpha_tables.iter() {
            first.write_u8(0x84).unwrap();
            first.extend_from_slice(table);
        }
        first.write_u8(0x85).unwrap();
        first.extend_from_slice(&[
            (self.x >> 4) as u8,
            ((self.x & 0x0F) << 4 | x_end >> 8) as u8,
            (x_end & 0xFF) as u8,
            (self.y >> 4) as u8,
            ((self.y & 0x0F) << 4 | y_end >> 8) as u8,
            (y_end & 0xFF) as u8,
        ]);
        first.write_u8(0x86).unwrap();
        first.write_u32::<BigEndian>(even_offset).unwrap();
        first.write_u32::<BigEndian>(odd_offset).unwrap();
        first.extend_from_slice(&self.extra_commands);
        first.write_u8(0xFF).unwrap();

        let second_offset = command_offset + first.len() as u32;

        (&mut first[2..6]).write_u32::<BigEndian>(second_offset).unwrap();

        let mut second = Vec::new();

        second.write_u16::<BigEndian>(self.stop_delay).unwrap();
        second.write_u32::<BigEndian>(second_offset).unwrap();
        if !self.self_loop {
            second.write_u8(0x02).unwrap();
        }
        second.write_u8(0xFF).unwrap();

        let packet_size = command_offset + first.len() as u32 + second.len() as u32;

        output.write_u16::<BigEndian>(MAGIC).unwrap();
        output.write_u32::<LittleEndian>(self.pts).unwrap();
        output.extend_from_slice(&[0; 6]);
        output.write_u32::<BigEndian>(packet_size).unwrap();
        output.write_u32::<BigEndian>(command_offset).unwrap();
        output.extend_from_slice(&even);
        output.extend_from_slice(&odd);
        output.extend_from_slice(&first);
        output.extend_from_slice(&second);
    }
}

fn stream(records: &[Record]) -> Vec<u8> {

    let mut output = Vec::new();

    for record in records {
        record.write(&mut output);
    }

    output
}

fn picture(frame: &Frame) -> &Picture {
    match &frame.content {
        FrameContent::HdDvd(picture) => picture,
        FrameContent::BluRay(_) => panic!("expected an HD-SUP frame"),
    }
}

#[test]
fn test_records_become_frames() {

    let mut rng = thread_rng();
    let mut records = Vec::new();
    let mut pts = rng.gen_range(0..90_000);

    for _ in 0..3 {
        let mut record = Record::solid(pts, 40, 10, 1);
        record.start_delay = rng.gen_range(0..10);
        record.stop_delay = rng.gen_range(1..500);
        records.push(record);
        pts += rng.gen_range(1_000_000..2_000_000);
    }

    let data = stream(&records);
    let catalog = read_catalog(&data, &mut ()).unwrap();

    assert_eq!(catalog.len(), 3);
    assert!(catalog.stop_reason().is_none());
    assert_eq!(catalog.forced_count(), 0);

    for (frame, record) in catalog.iter().zip(records.iter()) {

        let start = record.pts as u64 + record.start_delay as u64 * 1024;

        assert_eq!(frame.start, start);
        assert_eq!(frame.end, start + record.stop_delay as u64 * 1024);
        assert_eq!((frame.width, frame.height), (WIDTH, HEIGHT));
        assert!(!frame.forced);
    }
}

#[test]
fn test_area_and_offsets() {

    let data = stream(&[Record::new(0, 0x123, 0x456, vec![vec![5; 0x20]; 0x11])]);
    let catalog = read_catalog(&data, &mut ()).unwrap();
    let picture = picture(&catalog.frames()[0]);

    assert_eq!((picture.x, picture.y), (0x123, 0x456));
    assert_eq!((picture.image_width, picture.image_height), (0x20, 0x11));
    assert_eq!(picture.record_offset, 0);
    assert_eq!(picture.even_offset, 20);
    assert_eq!(picture.even_range().map(|(offset, _)| offset), Some(20));
    assert_eq!(
        picture.odd_range().map(|(offset, size)| offset + size),
        Some(picture.even_offset + picture.image_buffer_size),
    );
    assert_eq!(picture.palette_offset.map(|offset| data[offset + 3 * 7]), Some(7));
}

#[test]
fn test_interlaced_round_trip() {

    let mut rng = thread_rng();
    let width = rng.gen_range(1..200);
    let height = rng.gen_range(2..30);
    let rows = (0..height)
        .map(|row| (0..width).map(|col| ((row * 3 + col / 5) % 6) as u8).collect::<Vec<u8>>())
        .collect::<Vec<_>>();
    let data = stream(&[Record::new(0, 10, 20, rows.clone())]);
    let catalog = read_catalog(&data, &mut ()).unwrap();
    let frame = &catalog.frames()[0];
    let bitmap = decode_bitmap(&data, picture(frame), frame.width, frame.height, 0xFF).unwrap();

    assert_eq!((bitmap.x(), bitmap.y()), (10, 20));
    assert_eq!((bitmap.width() as usize, bitmap.height() as usize), (width, height));
    assert_eq!(bitmap.pixels(), rows.concat().as_slice());
}

#[test]
fn test_length_nine_fills_row() {

    let mut writer = BitWriter::default();

    // A single pixel, then a run filling the rest of the row.
    writer.write(0b0001, 4).write(0b11, 2).write(0x05, 8).write(1, 1).write(0, 7).sync();
    // A whole row filled by one run.
    writer.write(0b10, 2).write(0b10, 2).write(1, 1).write(0, 7).sync();

    let mut pixels = vec![0xFF; 60];

    decode_field(&writer.data, &mut pixels, 0, 20, 40).unwrap();

    assert_eq!(pixels[0], 1);
    assert!(pixels[1..20].iter().all(|pixel| *pixel == 5));
    assert!(pixels[20..40].iter().all(|pixel| *pixel == 0xFF));
    assert!(pixels[40..60].iter().all(|pixel| *pixel == 2));
}

#[test]
fn test_overflowing_run_continues_on_next_row() {

    let mut writer = BitWriter::default();

    writer.run(3, 4).run(4, 10);

    let mut pixels = vec![0xFF; 40];

    decode_field(&writer.data, &mut pixels, 0, 8, 14).unwrap();

    assert_eq!(&pixels[0..8], &[3, 3, 3, 3, 4, 4, 4, 4]);
    assert!(pixels[8..16].iter().all(|pixel| *pixel == 0xFF));
    assert_eq!(&pixels[16..24], &[4, 4, 4, 4, 4, 4, 0xFF, 0xFF]);
}

#[test]
fn test_exhausted_field_is_reported() {

    let mut pixels = vec![0xFF; 16];

    assert!(matches!(
        decode_field(&[0b1100_0000], &mut pixels, 0, 4, 16),
        Err(RleError::BitsExhausted { .. }),
    ));
    assert!(matches!(
        decode_field(&[0b1011_1111, 0x00], &mut pixels, 0, 4, 64),
        Err(RleError::CorruptFragment { .. }),
    ));
}

#[test]
fn test_self_loop_terminates() {

    let mut record = Record::solid(9_000, 16, 4, 2);

    record.self_loop = true;
    record.stop_delay = 50;

    let data = stream(&[record, Record::solid(900_000, 16, 4, 2)]);
    let catalog = read_catalog(&data, &mut ()).unwrap();

    assert_eq!(catalog.len(), 2);
    // A loop with no stop command still closes the frame with the latest delay. The end must not
    // be left open (zero) here.
    assert_eq!(catalog.frames()[0].end, 9_000 + 50 * 1024);
    assert!(catalog.stop_reason().is_none());
}

#[test]
fn test_sequence_start_is_tolerated() {

    let mut record = Record::solid(0, 16, 4, 2);

    record.extra_commands = vec![0x01];

    let catalog = read_catalog(&stream(&[record]), &mut ()).unwrap();

    assert_eq!(catalog.len(), 1);
}

#[test]
fn test_unexpected_command() {

    let mut bad = Record::solid(90_000, 16, 4, 2);

    bad.extra_commands = vec![0x42];

    let mut data = stream(&[Record::solid(0, 16, 4, 2)]);
    let second = data.len();

    bad.write(&mut data);

    let catalog = read_catalog(&data, &mut ()).unwrap();

    assert_eq!(catalog.len(), 1);
    match catalog.stop_reason() {
        Some(ReadError::UnexpectedCommand { offset, command }) => {
            assert_eq!(*command, 0x42);
            assert_eq!(data[*offset], 0x42);
            assert!(*offset > second);
        }
        other => panic!("unexpected stop reason: {:?}", other),
    }

    assert!(matches!(
        read_catalog(&data[second..], &mut ()),
        Err(ReadError::UnexpectedCommand { command: 0x42, .. }),
    ));
}

#[test]
fn test_bad_magic() {

    let mut data = stream(&[Record::solid(0, 16, 4, 2)]);

    data[1] = 0x47;

    assert!(matches!(
        read_catalog(&data, &mut ()),
        Err(ReadError::BadMagic { offset: 0, magic: 0x5347 }),
    ));
}

#[test]
fn test_truncated_record() {

    let mut data = stream(&[Record::solid(0, 16, 4, 2), Record::solid(90_000, 16, 4, 2)]);

    data.truncate(data.len() - 3);

    let catalog = read_catalog(&data, &mut ()).unwrap();

    assert_eq!(catalog.len(), 1);
    assert!(matches!(catalog.stop_reason(), Some(ReadError::Truncated { .. })));
}

#[test]
fn test_most_opaque_alpha_table_is_kept() {

    let mut record = Record::solid(0, 16, 4, 2);

    record.alpha_tables = vec![alpha_table(0x80), alpha_table(0x10), alpha_table(0xF0)];

    let data = stream(&[record]);
    let catalog = read_catalog(&data, &mut ()).unwrap();
    let picture = picture(&catalog.frames()[0]);
    let palette = decode_palette(&data, picture, &DecodeOptions::default()).unwrap();

    assert_eq!(palette.alpha(0), 0);
    assert_eq!(palette.alpha(1), 0xEF);
    assert_eq!(palette.alpha(255), 0xEF);
}

#[test]
fn test_inverted_alpha() {

    let mut table = alpha_table(0x00);

    table[2] = 0xFF - 10;
    table[3] = 0xFF - 14;

    let mut record = Record::solid(0, 16, 4, 2);

    record.alpha_tables = vec![table];

    let data = stream(&[record]);
    let catalog = read_catalog(&data, &mut ()).unwrap();
    let picture = picture(&catalog.frames()[0]);
    let options = DecodeOptions::default();
    let palette = decode_palette(&data, picture, &options).unwrap();

    assert_eq!(palette.alpha(1), 0xFF);
    assert_eq!(palette.entry(1).ycbcr.y, 1);
    assert_eq!(palette.entry(1).ycbcr.cr, 0x80);
    assert_eq!(palette.entry(1).ycbcr.cb, 0x90);
    assert_eq!(palette.alpha(2), 10);
    assert_eq!(palette.entry(2).rgb, RgbPixel::default());
    assert_eq!(palette.alpha(3), 14);
    assert_eq!(palette.entry(3).ycbcr.y, 3);
    assert_eq!(palette.most_transparent_index(), 0);

    let swapped = DecodeOptions { swap_cr_cb: true, ..options };
    let palette = decode_palette(&data, picture, &swapped).unwrap();

    assert_eq!(palette.entry(1).ycbcr.cb, 0x80);
    assert_eq!(palette.entry(1).ycbcr.cr, 0x90);
}

#[test]
fn test_corrupt_pictures() {

    let picture = Picture {
        image_width: 10,
        image_height: 10,
        even_offset: 40,
        odd_offset: 30,
        image_buffer_size: 20,
        ..Default::default()
    };

    assert!(matches!(
        decode_bitmap(&[0_u8; 64], &picture, WIDTH, HEIGHT, 0),
        Err(DecodeError::CorruptBufferOffsets { even: 40, odd: 30 }),
    ));
    assert!(matches!(
        decode_palette(&[0_u8; 64], &picture, &DecodeOptions::default()),
        Err(DecodeError::MissingColorTable),
    ));

    let huge = Picture { image_width: WIDTH + 1, ..picture };

    assert!(matches!(
        decode_bitmap(&[0_u8; 64], &huge, WIDTH, HEIGHT, 0),
        Err(DecodeError::ImageTooLarge { width: 1921, .. }),
    ));
}

#[test]
fn test_cancellation() {

    let data = stream(&[Record::solid(0, 16, 4, 2), Record::solid(90_000, 16, 4, 2)]);
    let mut monitor = Callbacks {
        canceled: || true,
        progress: |_: usize| {},
    };

    assert!(matches!(
        read_catalog(&data, &mut monitor),
        Err(ReadError::Canceled { offset: 0 }),
    ));
}

/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2021 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

use sup::{
    pts_to_timestamp,
    bd::Composition,
    catalog::{Frame, FrameContent},
    hd::Picture,
    ColorMatrix,
    DecodeOptions,
    FileSource,
    StreamKind,
    SupStream,
};
use std::{
    io::{stdin, Read},
    process::exit,
};
use clap::{app_from_crate, crate_authors, crate_description, crate_name, crate_version, Arg};
use log::{debug, LevelFilter};

fn main() {

    let matches = app_from_crate!()
        .arg(Arg::with_name("decode")
            .long("decode")
            .short("d")
            .help("Decodes the palette and bitmap of every frame")
            .required(false)
        )
        .arg(Arg::with_name("alpha-crop")
            .long("alpha-crop")
            .value_name("ALPHA")
            .help("Palette entries less opaque than this are set to black")
            .takes_value(true)
            .required(false)
            .default_value("14")
            .validator(|value| {
                if value.parse::<u8>().is_ok() {
                    Ok(())
                } else {
                    Err("must be an integer between 0 and 255".to_string())
                }
            })
        )
        .arg(Arg::with_name("alpha-threshold")
            .long("alpha-threshold")
            .value_name("ALPHA")
            .help("Palette entries less opaque than this never count as a frame's primary color")
            .takes_value(true)
            .required(false)
            .default_value("80")
            .validator(|value| {
                if value.parse::<u8>().is_ok() {
                    Ok(())
                } else {
                    Err("must be an integer between 0 and 255".to_string())
                }
            })
        )
        .arg(Arg::with_name("bt601")
            .long("bt601")
            .help("Converts colors using BT.601 coefficients instead of BT.709")
            .required(false)
        )
        .arg(Arg::with_name("swap-cr-cb")
            .long("swap-cr-cb")
            .help("Reads palette entries as Cb before Cr")
            .required(false)
        )
        .arg(Arg::with_name("verbose")
            .long("verbose")
            .short("v")
            .help("Logs more detail; may be given up to three times")
            .multiple(true)
            .required(false)
        )
        .arg(Arg::with_name("input")
            .index(1)
            .value_name("INPUT-FILE")
            .help("Input BD-SUP or HD-SUP file; use - for STDIN")
            .required(true)
        )
        .after_help(format!("This utility will dump the captions found in Blu-ray and HD DVD \
            subtitle streams.\n\n\
            Copyright © 2021 William Swartzendruber\n\
            Licensed under the Mozilla Public License 2.0\n\
            <{}>", env!("CARGO_PKG_REPOSITORY")).as_str())
        .get_matches();
    let level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let options = DecodeOptions {
        alpha_crop: matches.value_of("alpha-crop").unwrap().parse::<u8>().unwrap(),
        alpha_threshold: matches.value_of("alpha-threshold").unwrap().parse::<u8>().unwrap(),
        color_matrix: if matches.is_present("bt601") {
            ColorMatrix::Bt601
        } else {
            ColorMatrix::Bt709
        },
        swap_cr_cb: matches.is_present("swap-cr-cb"),
    };
    let decode = matches.is_present("decode");
    let input_value = matches.value_of("input").unwrap();
    let source = if input_value == "-" {
        let mut data = Vec::new();
        stdin().read_to_end(&mut data).map(|_| FileSource::from(data))
    } else {
        FileSource::open(input_value)
    };
    let source = match source {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read input file: {}", err);
            exit(1)
        }
    };

    debug!("Read {} bytes from {}", source.as_ref().len(), input_value);

    let stream = match SupStream::new(source) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("Could not parse subtitle stream: {}", err);
            exit(1)
        }
    };

    println!("stream_kind = {}", match stream.kind() {
        StreamKind::BluRay => "BD-SUP",
        StreamKind::HdDvd => "HD-SUP",
    });
    println!("frames = {}", stream.catalog().len());
    println!("forced_frames = {}", stream.catalog().forced_count());
    println!();

    for (index, frame) in stream.catalog().iter().enumerate() {

        print_frame(index, frame);

        if decode {
            match stream.decode(index, &options) {
                Ok(decoded) => {
                    println!("  bitmap_x = {}", decoded.bitmap.x());
                    println!("  bitmap_y = {}", decoded.bitmap.y());
                    println!("  bitmap_width = {}", decoded.bitmap.width());
                    println!("  bitmap_height = {}", decoded.bitmap.height());
                    match decoded.primary_color_index {
                        Some(primary) => println!("  primary_color_index = {}", primary),
                        None => println!("  primary_color_index = none"),
                    }
                    if decoded.palette.fade_out_detected() {
                        println!("  fade_out_detected = true");
                    }
                }
                Err(err) => {
                    println!("  decode_error = {}", err);
                }
            }
        }

        println!();
    }

    if let Some(err) = stream.catalog().stop_reason() {
        println!("Parsing stopped early: {}", err);
    }
}

fn print_frame(index: usize, frame: &Frame) {

    println!("frame({})", index);
    println!("  start = {}", pts_to_timestamp(frame.start));
    if frame.end != 0 {
        println!("  end = {}", pts_to_timestamp(frame.end));
    } else {
        println!("  end = open");
    }
    println!("  forced = {}", frame.forced);
    println!("  video_width = {}", frame.width);
    println!("  video_height = {}", frame.height);
    if let Some(offset) = frame.start_offset() {
        println!("  image_offset = {:#010x}", offset);
    }

    match &frame.content {
        FrameContent::BluRay(composition) => print_composition(composition),
        FrameContent::HdDvd(picture) => print_picture(picture),
    }
}

fn print_composition(composition: &Composition) {

    println!("  composition_number = {}", composition.number);
    println!("  composition_state = {:?}", composition.state);
    match composition.frame_rate.fps() {
        Some(fps) => println!("  frame_rate = {:.3}", fps),
        None => println!("  frame_rate = {:?}", composition.frame_rate),
    }
    println!("  palette_id = {}", composition.palette_id);

    if let Some(window) = composition.window() {
        println!("  window_horizontal_position = {}", window.x);
        println!("  window_vertical_position = {}", window.y);
        println!("  window_width = {}", window.width);
        println!("  window_height = {}", window.height);
    }

    for object in composition.image_objects.values() {
        println!("  object");
        println!("    object_id = {}", object.id);
        println!("    object_version = {}", object.version);
        println!("    object_horizontal_position = {}", object.x);
        println!("    object_vertical_position = {}", object.y);
        println!("    object_width = {}", object.width);
        println!("    object_height = {}", object.height);
        println!("    object_fragments = [{}]", object.fragments.len());
        println!("    object_data = [{}]", object.buffer_size());
    }

    for (id, chunks) in composition.palettes.iter() {
        println!("  palette");
        println!("    palette_id = {}", id);
        println!(
            "    palette_entries = [{}]",
            chunks.iter().map(|chunk| chunk.count).sum::<usize>(),
        );
    }
}

fn print_picture(picture: &Picture) {
    println!("  record_offset = {:#010x}", picture.record_offset);
    println!("  picture_horizontal_position = {}", picture.x);
    println!("  picture_vertical_position = {}", picture.y);
    println!("  picture_width = {}", picture.image_width);
    println!("  picture_height = {}", picture.image_height);
    println!("  even_field_offset = {:#010x}", picture.even_offset);
    println!("  odd_field_offset = {:#010x}", picture.odd_offset);
}

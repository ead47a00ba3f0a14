/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

use super::{
    Composition,
    CompositionObject,
    CompositionState,
    Crop,
    Fragment,
    FrameRate,
    ImageObject,
    PaletteChunk,
    SegmentKind,
    Window,
    HEADER_SIZE,
    MAGIC,
    MAX_PALETTE_ID,
    super::{
        catalog::{Catalog, Frame, FrameContent},
        error::{ReadError, ReadResult},
        monitor::Monitor,
        source::ByteSource,
    },
};
use log::{debug, info, trace, warn};

/// A parsed segment header.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SegmentHeader {
    /// The offset of the header itself.
    pub offset: usize,
    pub pts: u32,
    pub dts: u32,
    pub kind: SegmentKind,
    /// The offset of the payload.
    pub payload: usize,
    pub size: usize,
}

impl SegmentHeader {

    pub fn next_offset(&self) -> usize {
        self.payload + self.size
    }
}

/// Reads the segment header at `offset` and makes sure its payload lies within the source.
pub fn read_segment_header<S>(source: &S, offset: usize) -> ReadResult<SegmentHeader> where
    S: ByteSource + ?Sized,
{
    let magic = source.read_u16_be(offset)?;

    if magic != MAGIC {
        return Err(ReadError::BadMagic { offset, magic })
    }

    let pts = source.read_u32_be(offset + 2)?;
    let dts = source.read_u32_be(offset + 6)?;
    let kind = SegmentKind::from(source.read_u8(offset + 10)?);
    let size = source.read_u16_be(offset + 11)? as usize;
    let payload = offset + HEADER_SIZE;

    source.bytes(payload, size)?;

    Ok(SegmentHeader { offset, pts, dts, kind, payload, size })
}

/// Walks an entire BD-SUP stream and catalogs the frames it contains.
///
/// Parsing stops at the first malformed segment. If any frames have been catalogued by then, the
/// error is logged and kept as the catalog's stop reason; otherwise it is returned.
pub fn read_catalog<S, M>(source: &S, monitor: &mut M) -> ReadResult<Catalog> where
    S: ByteSource + ?Sized,
    M: Monitor + ?Sized,
{
    let mut reader = CatalogReader::new(source);
    let outcome = reader.walk(monitor);
    let mut catalog = reader.catalog.conclude(outcome)?;

    if let Some(last) = catalog.last_mut() {
        let incomplete = match &last.content {
            FrameContent::BluRay(composition) => {
                !composition.has_complete_object() || !composition.has_palette()
            }
            FrameContent::HdDvd(_) => false,
        };
        if incomplete {
            warn!("Missing PDS/ODS: last epoch is discarded");
            catalog.pop();
        }
    }

    monitor.progress(source.size());
    info!("Detected {} forced captions", catalog.forced_count());

    Ok(catalog)
}

/// A frame still being filled in by the segments of its epoch.
struct Epoch {
    start: u32,
    width: u16,
    height: u16,
    forced: bool,
    composition: Composition,
}

impl Epoch {

    fn seal(self) -> Frame {
        Frame {
            start: self.start as u64,
            end: 0,
            width: self.width,
            height: self.height,
            forced: self.forced,
            content: FrameContent::BluRay(self.composition),
        }
    }
}

struct CatalogReader<'a, S: ?Sized> {
    source: &'a S,
    catalog: Catalog,
    current: Option<Epoch>,
    palette_update: bool,
}

impl<'a, S> CatalogReader<'a, S> where
    S: ByteSource + ?Sized,
{

    fn new(source: &'a S) -> Self {
        Self {
            source,
            catalog: Catalog::new(),
            current: None,
            palette_update: false,
        }
    }

    fn walk<M: Monitor + ?Sized>(&mut self, monitor: &mut M) -> ReadResult<()> {

        let size = self.source.size();
        let mut offset = 0;

        while offset < size {

            if monitor.is_canceled() {
                return Err(ReadError::Canceled { offset })
            }

            let header = read_segment_header(self.source, offset)?;

            match header.kind {
                SegmentKind::PaletteDefinition => self.read_pds(&header)?,
                SegmentKind::ObjectDefinition => self.read_ods(&header)?,
                SegmentKind::PresentationComposition => self.read_pcs(&header)?,
                SegmentKind::WindowDefinition => self.read_wds(&header)?,
                SegmentKind::End => {
                    trace!("END offset: {:#010x}", offset);
                    self.seal();
                }
                SegmentKind::Unknown(kind) => {
                    warn!("<unknown> {:#04x} ofs: {:#010x}", kind, offset);
                }
            }

            offset = header.next_offset();
            monitor.progress(offset);
        }

        self.seal();

        Ok(())
    }

    fn seal(&mut self) {
        if let Some(epoch) = self.current.take() {
            self.catalog.push(epoch.seal());
        }
    }

    fn read_pcs(&mut self, header: &SegmentHeader) -> ReadResult<()> {

        let p = header.payload;

        trace!("PCS offset: {:#010x}, size: {:#06x}", header.offset, header.size);

        if header.size < 11 {
            warn!("PCS at {:#010x} is too short -> ignored", header.offset);
            return Ok(())
        }

        let state = CompositionState::from(self.source.read_u8(p + 7)?);

        self.palette_update = self.source.read_u8(p + 8)? == 0x80;

        match state {
            CompositionState::EpochStart | CompositionState::AcquisitionPoint => {
                self.seal();
                self.current = Some(self.read_composition(header, state)?);
            }
            CompositionState::Normal | CompositionState::Unspecified(_) => {
                trace!("PCS at {:#010x} continues the current epoch ({:?})", header.offset, state);
            }
        }

        if let Some(frame) = self.catalog.last_mut() {
            if frame.end == 0 {
                frame.end = header.pts as u64;
            }
        }

        Ok(())
    }

    fn read_composition(
        &self,
        header: &SegmentHeader,
        state: CompositionState,
    ) -> ReadResult<Epoch> {

        let p = header.payload;
        let end = header.next_offset();
        let width = self.source.read_u16_be(p)?;
        let height = self.source.read_u16_be(p + 2)?;
        let frame_rate = FrameRate::from_code(self.source.read_u8(p + 4)?);
        let number = self.source.read_u16_be(p + 5)?;
        let palette_id = self.source.read_u8(p + 9)?;
        let count = self.source.read_u8(p + 10)?;
        let mut objects = Vec::new();
        let mut pos = p + 11;

        for _ in 0..count {

            if end - pos < 8 {
                warn!("PCS at {:#010x} declares more objects than it holds", header.offset);
                break
            }

            let object_id = self.source.read_u16_be(pos)?;
            let window_id = self.source.read_u8(pos + 2)?;
            let flags = self.source.read_u8(pos + 3)?;
            let x = self.source.read_u16_be(pos + 4)?;
            let y = self.source.read_u16_be(pos + 6)?;

            pos += 8;

            let crop = if flags & 0x80 != 0 && end - pos >= 8 {
                let crop = Crop {
                    x: self.source.read_u16_be(pos)?,
                    y: self.source.read_u16_be(pos + 2)?,
                    width: self.source.read_u16_be(pos + 4)?,
                    height: self.source.read_u16_be(pos + 6)?,
                };
                pos += 8;
                Some(crop)
            } else {
                None
            };

            objects.push(
                CompositionObject {
                    object_id,
                    window_id,
                    forced: flags & 0x40 != 0,
                    x,
                    y,
                    crop,
                }
            );
        }

        debug!(
            "PCS at {:#010x}: {}x{}, composition {}, palette {}, {} object(s)",
            header.offset,
            width,
            height,
            number,
            palette_id,
            objects.len(),
        );

        Ok(
            Epoch {
                start: header.pts,
                width,
                height,
                forced: objects.iter().any(|co| co.forced),
                composition: Composition {
                    number,
                    state,
                    frame_rate,
                    palette_id,
                    objects,
                    ..Default::default()
                },
            }
        )
    }

    fn read_wds(&mut self, header: &SegmentHeader) -> ReadResult<()> {

        trace!("WDS offset: {:#010x}, size: {:#06x}", header.offset, header.size);

        let epoch = match self.current.as_mut() {
            Some(epoch) => epoch,
            None => {
                warn!("WDS at {:#010x}: missing PTS start -> ignored", header.offset);
                return Ok(())
            }
        };

        if header.size < 1 {
            return Ok(())
        }

        let count = self.source.read_u8(header.payload)? as usize;
        let available = (header.size - 1) / 9;

        if count > available {
            warn!("WDS at {:#010x} declares more windows than it holds", header.offset);
        }

        for i in 0..count.min(available) {

            let pos = header.payload + 1 + i * 9;
            let id = self.source.read_u8(pos)?;
            let window = Window {
                x: self.source.read_u16_be(pos + 1)?,
                y: self.source.read_u16_be(pos + 3)?,
                width: self.source.read_u16_be(pos + 5)?,
                height: self.source.read_u16_be(pos + 7)?,
            };

            trace!("  window {}: dim {}*{}", id, window.width, window.height);
            epoch.composition.windows.insert(id, window);
        }

        Ok(())
    }

    fn read_pds(&mut self, header: &SegmentHeader) -> ReadResult<()> {

        trace!("PDS offset: {:#010x}, size: {:#06x}", header.offset, header.size);

        let epoch = match self.current.as_mut() {
            Some(epoch) => epoch,
            None => {
                warn!("PDS at {:#010x}: missing PTS start -> ignored", header.offset);
                return Ok(())
            }
        };

        if header.size < 2 {
            warn!("PDS at {:#010x} is too short -> ignored", header.offset);
            return Ok(())
        }

        let id = self.source.read_u8(header.payload)?;
        let version = self.source.read_u8(header.payload + 1)?;

        if id > MAX_PALETTE_ID {
            warn!("Illegal palette id {} at offset {:#010x}", id, header.payload);
            return Ok(())
        }

        let chunks = epoch.composition.palettes.entry(id).or_default();

        if self.palette_update && chunks.pop().is_some() {
            debug!("Palette update replaces the last chunk of palette {}", id);
        }

        let chunk = PaletteChunk {
            id,
            version,
            offset: header.payload + 2,
            count: (header.size - 2) / 5,
        };

        trace!("  ID: {}, update: {}, {} entries", id, version, chunk.count);
        chunks.push(chunk);

        Ok(())
    }

    fn read_ods(&mut self, header: &SegmentHeader) -> ReadResult<()> {

        let p = header.payload;

        trace!("ODS offset: {:#010x}, size: {:#06x}", header.offset, header.size);

        if self.palette_update {
            trace!("  ignored (palette update only)");
            return Ok(())
        }

        let epoch = match self.current.as_mut() {
            Some(epoch) => epoch,
            None => {
                warn!("ODS at {:#010x}: missing PTS start -> ignored", header.offset);
                return Ok(())
            }
        };

        if header.size < 4 {
            warn!("ODS at {:#010x} is too short -> ignored", header.offset);
            return Ok(())
        }

        let id = self.source.read_u16_be(p)?;
        let version = self.source.read_u8(p + 2)?;
        let sequence = self.source.read_u8(p + 3)?;
        let first = sequence & 0x80 != 0;
        let last = sequence & 0x40 != 0;
        let starts_object = first || epoch.composition.image_objects
            .get(&id)
            .map_or(true, |object| object.fragments.is_empty());

        trace!(
            "  ID: {}, update: {}, seq: {}{}{}",
            id,
            version,
            if first { "first" } else { "" },
            if first && last { "/" } else { "" },
            if last { "last" } else { "" },
        );

        if starts_object {

            if header.size < 11 {
                warn!("ODS at {:#010x} is too short -> ignored", header.offset);
                return Ok(())
            }

            let declared_size = self.source.read_u24_be(p + 4)? as usize;
            let width = self.source.read_u16_be(p + 7)?;
            let height = self.source.read_u16_be(p + 9)?;

            if width > epoch.width || height > epoch.height {
                warn!("Invalid image size {}x{} -> object {} ignored", width, height, id);
                epoch.composition.image_objects.remove(&id);
                return Ok(())
            }

            let (x, y) = match epoch.composition.objects.iter().find(|co| co.object_id == id) {
                Some(co) => (co.x, co.y),
                None => {
                    warn!("Object {} is not referenced by its composition", id);
                    (0, 0)
                }
            };

            epoch.composition.image_objects.insert(
                id,
                ImageObject {
                    id,
                    version,
                    width,
                    height,
                    palette_id: epoch.composition.palette_id,
                    x,
                    y,
                    // The declared length covers the width and height fields as well.
                    declared_size: declared_size.saturating_sub(4),
                    fragments: vec![
                        Fragment {
                            offset: p + 11,
                            length: header.size - 11,
                        },
                    ],
                    complete: last,
                },
            );
        } else if let Some(object) = epoch.composition.image_objects.get_mut(&id) {
            object.fragments.push(
                Fragment {
                    offset: p + 4,
                    length: header.size - 4,
                }
            );
            object.complete = last;
        }

        if let Some(object) = epoch.composition.image_objects.get(&id) {
            if object.complete && object.buffer_size() != object.declared_size {
                warn!(
                    "Object {} holds {} bytes, but declared {}",
                    id,
                    object.buffer_size(),
                    object.declared_size,
                );
            }
        }

        Ok(())
    }
}

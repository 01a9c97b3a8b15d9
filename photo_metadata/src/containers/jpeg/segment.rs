//! Physical segments, and the logical payloads spread across them.

use std::{
    io::{self, Read, Write},
    sync::mpsc::{Receiver, SyncSender, sync_channel},
    thread,
};

use crate::{
    container::{Container as _, ContainerRef, check_written, write_bytes},
    error::MetadataError,
    source::Section,
};

/// The most a segment body can hold. The length field is 16 bits, and it
/// counts itself.
pub const MAX_BODY: u64 = 0xFFFF - 2;

/// How many writes the payload renderer can get ahead of the splitter.
const PIPE_DEPTH: usize = 4;

/// The segment payloads we know by their signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Jfif,
    Jfxx,
    Exif,
    Xmp,
    XmpExt,
    Psir,
}

impl Kind {
    pub const ALL: [Kind; 6] = [
        Kind::Jfif,
        Kind::Jfxx,
        Kind::Exif,
        Kind::Xmp,
        Kind::XmpExt,
        Kind::Psir,
    ];

    pub const fn marker(self) -> u8 {
        match self {
            Kind::Jfif | Kind::Jfxx => 0xE0,
            Kind::Exif | Kind::Xmp | Kind::XmpExt => 0xE1,
            Kind::Psir => 0xED,
        }
    }

    /// The bytes every body of this kind starts with.
    pub const fn signature(self) -> &'static [u8] {
        match self {
            Kind::Jfif => b"JFIF\0",
            Kind::Jfxx => b"JFXX\0",
            Kind::Exif => b"Exif\0\0",
            Kind::Xmp => b"http://ns.adobe.com/xap/1.0/\0",
            Kind::XmpExt => b"http://ns.adobe.com/xmp/extension/\0",
            Kind::Psir => b"Photoshop 3.0\0",
        }
    }

    /// Bytes skipped after the signature on every segment.
    ///
    /// Extension segments each carry a GUID, the full length, and their
    /// offset into the payload.
    const fn header_skip(self) -> u64 {
        match self {
            Kind::XmpExt => 40,
            _ => 0,
        }
    }

    /// How much payload fits in one segment.
    pub const fn chunk_len(self) -> u64 {
        MAX_BODY - self.signature().len() as u64
    }
}

/// A segment kept as-is.
#[derive(Clone, Debug)]
pub struct Segment {
    marker: u8,

    /// Markers like RSTn have no length and no body.
    body: Option<Section>,
}

impl Segment {
    pub(super) fn standalone(marker: u8) -> Self {
        Self { marker, body: None }
    }

    pub(super) fn with_body(marker: u8, body: Section) -> Self {
        Self {
            marker,
            body: Some(body),
        }
    }

    pub fn marker(&self) -> u8 {
        self.marker
    }

    pub fn body(&self) -> Option<&Section> {
        self.body.as_ref()
    }

    pub(super) fn size(&self) -> u64 {
        match self.body {
            Some(ref body) => 4 + body.len(),
            None => 2,
        }
    }

    pub(super) fn write(&self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        match self.body {
            Some(ref body) => {
                let count = write_header(out, self.marker, body.len())?;
                Ok(count + body.copy_to(out)?)
            }
            None => write_bytes(out, &[0xFF, self.marker]),
        }
    }
}

/// Every physical segment carrying one kind of payload, read as one.
#[derive(Clone, Debug)]
pub struct Group {
    kind: Kind,

    /// Whole bodies, signature included.
    segments: Vec<Section>,

    /// The payload with the per-segment signatures cut out.
    parts: Vec<Section>,

    container: Option<ContainerRef>,

    /// The payload size from the last layout, when re-rendering.
    size: u64,
}

impl Group {
    pub(super) fn new(kind: Kind) -> Self {
        Self {
            kind,
            segments: Vec::new(),
            parts: Vec::new(),
            container: None,
            size: 0,
        }
    }

    pub(super) fn push(&mut self, body: Section) -> Result<(), MetadataError> {
        let skip = self.kind.signature().len() as u64 + self.kind.header_skip();
        let skip = skip.min(body.len());

        self.parts.push(body.slice(skip, body.len() - skip)?);
        self.segments.push(body);
        Ok(())
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// How many physical segments the payload was read from.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The payload as read, or `None` if the file had none.
    pub fn payload(&self) -> Option<Section> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Section::chain(self.parts.clone()))
    }

    pub(super) fn set_container(&mut self, container: ContainerRef) {
        self.container = Some(container);
    }

    /// Whether the payload has to be rendered from its container.
    pub(super) fn dirty(&self) -> bool {
        self.container.as_ref().is_some_and(|c| c.read().dirty())
    }

    pub(super) fn layout(&mut self) -> Result<u64, MetadataError> {
        let Some(container) = self.container.as_ref().filter(|c| c.read().dirty()) else {
            return Ok(self.segments.iter().map(|s| 4 + s.len()).sum());
        };

        if self.kind == Kind::XmpExt {
            log::error!("Can't re-split an edited XMP extension payload!");
            return Err(MetadataError::Unsupported(
                "rewriting XMP extension segments".into(),
            ));
        }

        let mut container = container.write();
        if container.is_empty() {
            log::debug!("The `{:?}` payload is empty. Dropping its segments.", self.kind);
            self.size = 0;
            return Ok(0);
        }

        self.size = container.layout()?;
        let chunks = self.size.div_ceil(self.kind.chunk_len());
        let overhead = 4 + self.kind.signature().len() as u64;
        Ok(self.size + chunks * overhead)
    }

    pub(super) fn write(&self, out: &mut dyn Write) -> Result<u64, MetadataError> {
        let Some(container) = self.container.as_ref().filter(|c| c.read().dirty()) else {
            let mut count = 0;
            for body in &self.segments {
                count += write_header(out, self.kind.marker(), body.len())?;
                count += body.copy_to(out)?;
            }
            return Ok(count);
        };

        if self.size == 0 {
            return Ok(0);
        }
        if self.size <= self.kind.chunk_len() {
            let body_len = self.kind.signature().len() as u64 + self.size;
            let mut count = write_header(out, self.kind.marker(), body_len)?;
            count += write_bytes(out, self.kind.signature())?;
            let written = container.write().write(out)?;
            check_written("segment payload", self.size, written)?;
            return Ok(count + written);
        }

        self.write_split(out, container)
    }

    /// Streams the container through a pipe, so the payload is cut into
    /// segments as it's rendered.
    fn write_split(
        &self,
        out: &mut dyn Write,
        container: &ContainerRef,
    ) -> Result<u64, MetadataError> {
        log::debug!(
            "Splitting a `{}` byte `{:?}` payload across segments.",
            self.size,
            self.kind
        );
        let (tx, rx) = sync_channel(PIPE_DEPTH);

        thread::scope(|scope| {
            let renderer = scope.spawn(move || container.write().write(&mut PipeWriter(tx)));

            let mut pipe = PipeReader::new(rx);
            let emitted = self.write_chunks(out, &mut pipe);
            if emitted.is_ok() {
                // anything past the plan still has to be received, or the
                // renderer would block forever
                io::copy(&mut pipe, &mut io::sink())?;
            }
            drop(pipe);

            let rendered = renderer.join().map_err(|_| {
                log::error!("The segment payload renderer panicked!");
                MetadataError::Logic("segment payload renderer panicked".into())
            })?;

            let emitted = emitted?;
            check_written("segment payload", self.size, rendered?)?;
            Ok(emitted)
        })
    }

    /// Emits segments until the pipe runs dry or the payload is complete.
    fn write_chunks(
        &self,
        out: &mut dyn Write,
        pipe: &mut PipeReader,
    ) -> Result<u64, MetadataError> {
        let signature = self.kind.signature();
        let mut count = 0;
        let mut left = self.size;

        while left > 0 {
            let n = left.min(self.kind.chunk_len());
            count += write_header(out, self.kind.marker(), signature.len() as u64 + n)?;
            count += write_bytes(out, signature)?;

            let copied = io::copy(&mut pipe.by_ref().take(n), out)?;
            count += copied;
            if copied < n {
                log::warn!("Segment payload ended `{}` bytes early.", left - copied);
                break;
            }
            left -= n;
        }

        Ok(count)
    }
}

/// Writes `0xFF`, the marker, and the length of a `body_len` byte body.
fn write_header(out: &mut dyn Write, marker: u8, body_len: u64) -> Result<u64, MetadataError> {
    let length = u16::try_from(body_len + 2).map_err(|_| {
        log::error!("A `{body_len}` byte body doesn't fit in one segment!");
        MetadataError::Logic(format!("segment body of `{body_len}` bytes is too large"))
    })?;

    let [hi, lo] = length.to_be_bytes();
    write_bytes(out, &[0xFF, marker, hi, lo])
}

/// The renderer's end of the pipe.
struct PipeWriter(SyncSender<Vec<u8>>);

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "segment splitter hung up"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The splitter's end of the pipe. Reads end once the renderer is done.
struct PipeReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

impl PipeReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            buf: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        while self.pos == self.buf.len() {
            match self.rx.recv() {
                Ok(buf) => {
                    self.buf = buf;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Read as _, sync::mpsc::sync_channel, thread};

    use super::{Kind, PipeReader, PipeWriter};
    use crate::util::logger;

    #[test]
    fn chunk_sizes_leave_room_for_signatures() {
        logger();

        assert_eq!(Kind::Exif.chunk_len(), 0xFFFD - 6);
        assert_eq!(Kind::Xmp.chunk_len(), 0xFFFD - 29);
        assert_eq!(Kind::Psir.chunk_len(), 0xFFFD - 14);
    }

    #[test]
    fn pipe_keeps_order_with_a_tiny_buffer() {
        logger();

        let (tx, rx) = sync_channel(1);
        let mut got = Vec::new();
        thread::scope(|scope| {
            scope.spawn(move || {
                use std::io::Write as _;
                let mut pipe = PipeWriter(tx);
                for i in 0..200_u8 {
                    pipe.write_all(&[i, i]).unwrap();
                }
            });
            PipeReader::new(rx).read_to_end(&mut got).unwrap();
        });

        let expected: Vec<u8> = (0..200_u8).flat_map(|i| [i, i]).collect();
        assert_eq!(got, expected);
    }
}

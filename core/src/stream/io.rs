// ## 📂 File: `src/stream/io.rs`
// ## Normalized I/O for document passes

use std::io::{self, Read, Seek, Write};
use std::path::PathBuf;

use crate::types::DocumentError;

/// Canonical input abstraction
pub enum InputSource {
    Reader(Box<dyn Read + Send>),
    File(PathBuf),
    Memory(Vec<u8>),
}

/// Normalize input source into a boxed reader
pub fn open_input(src: InputSource) -> Result<Box<dyn Read + Send>, DocumentError> {
    let reader: Box<dyn Read + Send> = match src {
        InputSource::Reader(r) => r,
        InputSource::File(p) => Box::new(io::BufReader::new(std::fs::File::open(p)?)),
        InputSource::Memory(b) => Box::new(io::Cursor::new(b)),
    };
    Ok(reader)
}

/// Output that can be re-read and patched in place.
pub trait SeekableSink: Read + Write + Seek {}

impl<T: Read + Write + Seek> SeekableSink for T {}

/// Canonical output abstraction
pub enum OutputSink<'a> {
    Stream(&'a mut dyn Write),
    Seekable(&'a mut dyn SeekableSink),
}

impl<'a> OutputSink<'a> {
    pub fn is_seekable(&self) -> bool {
        matches!(self, OutputSink::Seekable(_))
    }

    pub fn as_write(&mut self) -> &mut dyn Write {
        match self {
            OutputSink::Stream(w) => w,
            OutputSink::Seekable(s) => s,
        }
    }
}

/// Writer that counts the bytes it forwards.
pub struct CountingWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Read up to `len` bytes, stopping early only at end of stream.
pub fn read_exact_or_eof<R: Read + ?Sized>(r: &mut R, len: usize) -> Result<Vec<u8>, DocumentError> {
    let mut buf = vec![0u8; len];
    let mut off = 0;

    while off < len {
        let n = match r.read(&mut buf[off..]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            break;
        }
        off += n;
    }

    buf.truncate(off);
    Ok(buf)
}

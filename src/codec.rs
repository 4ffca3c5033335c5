//! Construction of the standalone compression streams.
//!
//! This is the only module that touches the codec crates directly. Everything
//! else works against `Read`/`Write` and the [`Encoder`] wrapper, so the
//! engines stay identical across codecs.

use std::io::{self, Read, Write};

use brotli::CompressorWriter;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::format::Codec;

// Fixed compression levels: each codec packs at its maximum practical level.
const GZ_LEVEL: u32 = 9;
const BZ2_LEVEL: u32 = 9;
const XZ_LEVEL: u32 = 9;
const ZSTD_LEVEL: i32 = 19;
const BROTLI_QUALITY: u32 = 11;
const BROTLI_LG_WINDOW: u32 = 22;
const BROTLI_BUFFER: usize = 4096;

/// A compressing writer for one codec, generic over the sink so it can wrap
/// a plain file or feed a tar builder.
pub enum Encoder<W: Write> {
    Gz(GzEncoder<W>),
    Br(CompressorWriter<W>),
    Bz2(BzEncoder<W>),
    Lz4(lz4_flex::frame::FrameEncoder<W>),
    Sz(snap::write::FrameEncoder<W>),
    Xz(XzEncoder<W>),
    Zst(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(codec: Codec, writer: W) -> io::Result<Self> {
        Ok(match codec {
            Codec::Gz => Encoder::Gz(GzEncoder::new(writer, flate2::Compression::new(GZ_LEVEL))),
            Codec::Br => Encoder::Br(CompressorWriter::new(
                writer,
                BROTLI_BUFFER,
                BROTLI_QUALITY,
                BROTLI_LG_WINDOW,
            )),
            Codec::Bz2 => Encoder::Bz2(BzEncoder::new(writer, bzip2::Compression::new(BZ2_LEVEL))),
            Codec::Lz4 => Encoder::Lz4(lz4_flex::frame::FrameEncoder::new(writer)),
            Codec::Sz => Encoder::Sz(snap::write::FrameEncoder::new(writer)),
            Codec::Xz => Encoder::Xz(XzEncoder::new(writer, XZ_LEVEL)),
            Codec::Zst => Encoder::Zst(zstd::stream::write::Encoder::new(writer, ZSTD_LEVEL)?),
        })
    }

    /// Finalize the compressed stream, writing any trailer the codec needs.
    /// Must be called exactly once; dropping without finishing can truncate
    /// the stream for codecs with end markers.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Gz(e) => e.finish(),
            Encoder::Br(mut e) => {
                e.flush()?;
                Ok(e.into_inner())
            }
            Encoder::Bz2(e) => e.finish(),
            Encoder::Lz4(e) => e
                .finish()
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err)),
            Encoder::Sz(mut e) => {
                e.flush()?;
                e.into_inner()
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))
            }
            Encoder::Xz(e) => e.finish(),
            Encoder::Zst(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Gz(e) => e.write(buf),
            Encoder::Br(e) => e.write(buf),
            Encoder::Bz2(e) => e.write(buf),
            Encoder::Lz4(e) => e.write(buf),
            Encoder::Sz(e) => e.write(buf),
            Encoder::Xz(e) => e.write(buf),
            Encoder::Zst(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Gz(e) => e.flush(),
            Encoder::Br(e) => e.flush(),
            Encoder::Bz2(e) => e.flush(),
            Encoder::Lz4(e) => e.flush(),
            Encoder::Sz(e) => e.flush(),
            Encoder::Xz(e) => e.flush(),
            Encoder::Zst(e) => e.flush(),
        }
    }
}

/// A decompressing reader for one codec.
pub fn decoder<'a, R: Read + 'a>(codec: Codec, reader: R) -> io::Result<Box<dyn Read + 'a>> {
    Ok(match codec {
        Codec::Gz => Box::new(MultiGzDecoder::new(reader)),
        Codec::Br => Box::new(brotli::Decompressor::new(reader, BROTLI_BUFFER)),
        Codec::Bz2 => Box::new(BzDecoder::new(reader)),
        Codec::Lz4 => Box::new(lz4_flex::frame::FrameDecoder::new(reader)),
        Codec::Sz => Box::new(snap::read::FrameDecoder::new(reader)),
        Codec::Xz => Box::new(XzDecoder::new(reader)),
        Codec::Zst => Box::new(zstd::stream::read::Decoder::new(reader)?),
    })
}

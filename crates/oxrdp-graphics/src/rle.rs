//! Interleaved Run-Length Encoding (RLE) bitmap decompression, as used by
//! RDP bitmap updates (MS-RDPBCGR RLE_BITMAP_STREAM and its pseudo-code).
//!
//! The decompressor is a token-driven state machine over the source bytes.
//! On the first scanline, background runs emit black and foreground runs
//! emit the foreground pel directly; on every other line both are expressed
//! relative to the pixel one row above (copied, or XOR-ed with the
//! foreground pel).

use core::fmt;
use core::ops::BitXor;

/// Pixel layout produced by [`decompress`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RlePixelFormat {
    Rgb8,
    Rgb15,
    Rgb16,
    Rgb24,
    Rgb32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RleError {
    InvalidBpp {
        bpp: usize,
    },
    BadOrderCode,
    NotEnoughBytes {
        expected: usize,
        actual: usize,
    },
    InvalidImageSize {
        maximum_additional: usize,
        required_additional: usize,
    },
    EmptyImage,
    UnexpectedZeroLength,
}

impl fmt::Display for RleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RleError::InvalidBpp { bpp } => write!(f, "invalid bits per pixel: {bpp}"),
            RleError::BadOrderCode => write!(f, "bad RLE order code"),
            RleError::NotEnoughBytes { expected, actual } => {
                write!(f, "not enough bytes: expected {expected}, but got {actual}")
            }
            RleError::InvalidImageSize {
                maximum_additional,
                required_additional,
            } => write!(
                f,
                "invalid image size: output can receive at most {maximum_additional} more bytes, \
                 but {required_additional} are required"
            ),
            RleError::EmptyImage => write!(f, "width or height is zero"),
            RleError::UnexpectedZeroLength => write!(f, "unexpected zero-length run"),
        }
    }
}

impl std::error::Error for RleError {}

/// Decompresses an RLE compressed bitmap into `dst`, row-major top-to-bottom.
///
/// `width`/`height` describe the decompressed bitmap; `bpp` selects the
/// pixel mode (8, 15, 16, 24 or 32 bits per pixel).
pub fn decompress(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: impl Into<usize>,
    height: impl Into<usize>,
    bpp: impl Into<usize>,
) -> Result<RlePixelFormat, RleError> {
    match bpp.into() {
        8 => decompress_as::<Mode8Bpp>(src, dst, width.into(), height.into()),
        15 => decompress_as::<Mode15Bpp>(src, dst, width.into(), height.into()),
        16 => decompress_as::<Mode16Bpp>(src, dst, width.into(), height.into()),
        24 => decompress_as::<Mode24Bpp>(src, dst, width.into(), height.into()),
        32 => decompress_as::<Mode32Bpp>(src, dst, width.into(), height.into()),
        invalid => Err(RleError::InvalidBpp { bpp: invalid }),
    }
}

fn decompress_as<Mode: PixelMode>(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<RlePixelFormat, RleError> {
    if width == 0 || height == 0 {
        return Err(RleError::EmptyImage);
    }

    let row_delta = Mode::PIXEL_SIZE * width;
    dst.resize(row_delta * height, 0);
    decompress_impl::<Mode>(src, dst, row_delta)?;

    Ok(Mode::PIXEL_FORMAT)
}

macro_rules! ensure_bytes {
    (from: $buf:ident, size: $expected:expr) => {{
        let actual = $buf.remaining();
        let expected = $expected;
        if expected > actual {
            return Err(RleError::NotEnoughBytes { expected, actual });
        }
    }};
    (into: $buf:ident, size: $required:expr) => {{
        let maximum_additional = $buf.remaining();
        let required_additional = $required;
        if required_additional > maximum_additional {
            return Err(RleError::InvalidImageSize {
                maximum_additional,
                required_additional,
            });
        }
    }};
}

fn decompress_impl<Mode: PixelMode>(src: &[u8], dst: &mut [u8], row_delta: usize) -> Result<(), RleError> {
    let mut src = Source::new(src);
    let mut dst = Dest::new(dst);

    let mut fg_pel = Mode::WHITE;
    let mut insert_fg_pel = false;
    let mut first_line = true;

    while !src.eof() {
        if first_line && dst.pos >= row_delta {
            first_line = false;
            insert_fg_pel = false;
        }

        ensure_bytes!(from: src, size: 1);
        let header = src.read_u8();

        let code = OrderCode::decode(header)?;
        let run_length = code.run_length(header, &mut src)?;

        match code {
            OrderCode::BgRun | OrderCode::MegaMegaBgRun => {
                ensure_bytes!(into: dst, size: run_length * Mode::PIXEL_SIZE);

                let remaining = if insert_fg_pel {
                    if first_line {
                        Mode::write(&mut dst, fg_pel);
                    } else {
                        let above = dst.pixel_above::<Mode>(row_delta);
                        Mode::write(&mut dst, above ^ fg_pel);
                    }
                    run_length - 1
                } else {
                    run_length
                };

                if first_line {
                    for _ in 0..remaining {
                        Mode::write(&mut dst, Mode::BLACK);
                    }
                } else {
                    for _ in 0..remaining {
                        let above = dst.pixel_above::<Mode>(row_delta);
                        Mode::write(&mut dst, above);
                    }
                }

                // A follow-on background run needs a foreground pel inserted.
                insert_fg_pel = true;
                continue;
            }

            OrderCode::FgRun | OrderCode::MegaMegaFgRun | OrderCode::SetFgFgRun | OrderCode::MegaMegaSetFgRun => {
                if matches!(code, OrderCode::SetFgFgRun | OrderCode::MegaMegaSetFgRun) {
                    ensure_bytes!(from: src, size: Mode::PIXEL_SIZE);
                    fg_pel = Mode::read(&mut src);
                }

                ensure_bytes!(into: dst, size: run_length * Mode::PIXEL_SIZE);

                if first_line {
                    for _ in 0..run_length {
                        Mode::write(&mut dst, fg_pel);
                    }
                } else {
                    for _ in 0..run_length {
                        let above = dst.pixel_above::<Mode>(row_delta);
                        Mode::write(&mut dst, above ^ fg_pel);
                    }
                }
            }

            OrderCode::DitheredRun | OrderCode::MegaMegaDitheredRun => {
                ensure_bytes!(from: src, size: 2 * Mode::PIXEL_SIZE);
                let pixel_a = Mode::read(&mut src);
                let pixel_b = Mode::read(&mut src);

                ensure_bytes!(into: dst, size: run_length * 2 * Mode::PIXEL_SIZE);

                for _ in 0..run_length {
                    Mode::write(&mut dst, pixel_a);
                    Mode::write(&mut dst, pixel_b);
                }
            }

            OrderCode::ColorRun | OrderCode::MegaMegaColorRun => {
                ensure_bytes!(from: src, size: Mode::PIXEL_SIZE);
                let pixel = Mode::read(&mut src);

                ensure_bytes!(into: dst, size: run_length * Mode::PIXEL_SIZE);

                for _ in 0..run_length {
                    Mode::write(&mut dst, pixel);
                }
            }

            OrderCode::FgBgImage
            | OrderCode::MegaMegaFgBgImage
            | OrderCode::SetFgFgBgImage
            | OrderCode::MegaMegaSetFgBgImage => {
                if matches!(code, OrderCode::SetFgFgBgImage | OrderCode::MegaMegaSetFgBgImage) {
                    ensure_bytes!(from: src, size: Mode::PIXEL_SIZE);
                    fg_pel = Mode::read(&mut src);
                }

                let mut number_to_read = run_length;

                while number_to_read > 0 {
                    let c_bits = number_to_read.min(8);

                    ensure_bytes!(from: src, size: 1);
                    let bitmask = src.read_u8();

                    write_fg_bg_image::<Mode>(&mut dst, row_delta, first_line, bitmask, fg_pel, c_bits)?;

                    number_to_read -= c_bits;
                }
            }

            OrderCode::ColorImage | OrderCode::MegaMegaColorImage => {
                let byte_count = run_length * Mode::PIXEL_SIZE;

                ensure_bytes!(from: src, size: byte_count);
                ensure_bytes!(into: dst, size: byte_count);

                for _ in 0..byte_count {
                    let byte = src.read_u8();
                    dst.write_u8(byte);
                }
            }

            OrderCode::SpecialFgBg1 => {
                const MASK_SPECIAL_FGBG_1: u8 = 0x03;
                write_fg_bg_image::<Mode>(&mut dst, row_delta, first_line, MASK_SPECIAL_FGBG_1, fg_pel, 8)?;
            }

            OrderCode::SpecialFgBg2 => {
                const MASK_SPECIAL_FGBG_2: u8 = 0x05;
                write_fg_bg_image::<Mode>(&mut dst, row_delta, first_line, MASK_SPECIAL_FGBG_2, fg_pel, 8)?;
            }

            OrderCode::White => {
                ensure_bytes!(into: dst, size: Mode::PIXEL_SIZE);
                Mode::write(&mut dst, Mode::WHITE);
            }

            OrderCode::Black => {
                ensure_bytes!(into: dst, size: Mode::PIXEL_SIZE);
                Mode::write(&mut dst, Mode::BLACK);
            }
        }

        // Any non-background run resets the follow-on insertion rule.
        insert_fg_pel = false;
    }

    Ok(())
}

/// Writes up to eight foreground/background pixels selected by `bitmask`.
fn write_fg_bg_image<Mode: PixelMode>(
    dst: &mut Dest<'_>,
    row_delta: usize,
    first_line: bool,
    bitmask: u8,
    fg_pel: Mode::Pixel,
    c_bits: usize,
) -> Result<(), RleError> {
    ensure_bytes!(into: dst, size: c_bits * Mode::PIXEL_SIZE);

    let mut mask = 0x01;

    for _ in 0..c_bits {
        let fg_selected = bitmask & mask != 0;

        if first_line {
            if fg_selected {
                Mode::write(dst, fg_pel);
            } else {
                Mode::write(dst, Mode::BLACK);
            }
        } else {
            let above = dst.pixel_above::<Mode>(row_delta);
            if fg_selected {
                Mode::write(dst, above ^ fg_pel);
            } else {
                Mode::write(dst, above);
            }
        }

        mask <<= 1;
    }

    Ok(())
}

/// A compression order code, normalized from the three header forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OrderCode {
    BgRun,
    FgRun,
    FgBgImage,
    ColorRun,
    ColorImage,

    SetFgFgRun,
    SetFgFgBgImage,
    DitheredRun,

    MegaMegaBgRun,
    MegaMegaFgRun,
    MegaMegaFgBgImage,
    MegaMegaColorRun,
    MegaMegaColorImage,
    MegaMegaSetFgRun,
    MegaMegaSetFgBgImage,
    MegaMegaDitheredRun,

    SpecialFgBg1,
    SpecialFgBg2,
    White,
    Black,
}

const MASK_REGULAR_RUN_LENGTH: u8 = 0x1F;
const MASK_LITE_RUN_LENGTH: u8 = 0x0F;

impl OrderCode {
    fn decode(header: u8) -> Result<Self, RleError> {
        if (header & 0xC0) != 0xC0 {
            // REGULAR orders: the code is in the top three bits.
            match header >> 5 {
                0x00 => Ok(OrderCode::BgRun),
                0x01 => Ok(OrderCode::FgRun),
                0x02 => Ok(OrderCode::FgBgImage),
                0x03 => Ok(OrderCode::ColorRun),
                0x04 => Ok(OrderCode::ColorImage),
                _ => Err(RleError::BadOrderCode),
            }
        } else if (header & 0xF0) == 0xF0 {
            // MEGA and SPECIAL orders: the full byte is the code.
            match header {
                0xF0 => Ok(OrderCode::MegaMegaBgRun),
                0xF1 => Ok(OrderCode::MegaMegaFgRun),
                0xF2 => Ok(OrderCode::MegaMegaFgBgImage),
                0xF3 => Ok(OrderCode::MegaMegaColorRun),
                0xF4 => Ok(OrderCode::MegaMegaColorImage),
                0xF6 => Ok(OrderCode::MegaMegaSetFgRun),
                0xF7 => Ok(OrderCode::MegaMegaSetFgBgImage),
                0xF8 => Ok(OrderCode::MegaMegaDitheredRun),
                0xF9 => Ok(OrderCode::SpecialFgBg1),
                0xFA => Ok(OrderCode::SpecialFgBg2),
                0xFD => Ok(OrderCode::White),
                0xFE => Ok(OrderCode::Black),
                _ => Err(RleError::BadOrderCode),
            }
        } else {
            // LITE orders: the code is in the top four bits.
            match header >> 4 {
                0x0C => Ok(OrderCode::SetFgFgRun),
                0x0D => Ok(OrderCode::SetFgFgBgImage),
                0x0E => Ok(OrderCode::DitheredRun),
                _ => Err(RleError::BadOrderCode),
            }
        }
    }

    fn run_length(self, header: u8, src: &mut Source<'_>) -> Result<usize, RleError> {
        match self {
            Self::FgBgImage => extract_run_length_fg_bg(header, MASK_REGULAR_RUN_LENGTH, src),
            Self::SetFgFgBgImage => extract_run_length_fg_bg(header, MASK_LITE_RUN_LENGTH, src),

            Self::BgRun | Self::FgRun | Self::ColorRun | Self::ColorImage => {
                extract_run_length_regular(header, src)
            }

            Self::SetFgFgRun | Self::DitheredRun => extract_run_length_lite(header, src),

            Self::MegaMegaBgRun
            | Self::MegaMegaFgRun
            | Self::MegaMegaFgBgImage
            | Self::MegaMegaColorRun
            | Self::MegaMegaColorImage
            | Self::MegaMegaSetFgRun
            | Self::MegaMegaSetFgBgImage
            | Self::MegaMegaDitheredRun => extract_run_length_mega_mega(src),

            Self::SpecialFgBg1 | Self::SpecialFgBg2 | Self::White | Self::Black => Ok(0),
        }
    }
}

fn extract_run_length_fg_bg(header: u8, length_mask: u8, src: &mut Source<'_>) -> Result<usize, RleError> {
    match header & length_mask {
        0 => {
            ensure_bytes!(from: src, size: 1);
            Ok(usize::from(src.read_u8()) + 1)
        }
        run_length => Ok(usize::from(run_length) * 8),
    }
}

fn extract_run_length_regular(header: u8, src: &mut Source<'_>) -> Result<usize, RleError> {
    match header & MASK_REGULAR_RUN_LENGTH {
        0 => {
            // An extended (MEGA) run.
            ensure_bytes!(from: src, size: 1);
            Ok(usize::from(src.read_u8()) + 32)
        }
        run_length => Ok(usize::from(run_length)),
    }
}

fn extract_run_length_lite(header: u8, src: &mut Source<'_>) -> Result<usize, RleError> {
    match header & MASK_LITE_RUN_LENGTH {
        0 => {
            // An extended (MEGA) run.
            ensure_bytes!(from: src, size: 1);
            Ok(usize::from(src.read_u8()) + 16)
        }
        run_length => Ok(usize::from(run_length)),
    }
}

fn extract_run_length_mega_mega(src: &mut Source<'_>) -> Result<usize, RleError> {
    ensure_bytes!(from: src, size: 2);

    let run_length = usize::from(src.read_u16());

    if run_length == 0 {
        Err(RleError::UnexpectedZeroLength)
    } else {
        Ok(run_length)
    }
}

struct Source<'a> {
    inner: &'a [u8],
    pos: usize,
}

impl<'a> Source<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { inner: bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.inner.len() - self.pos
    }

    fn eof(&self) -> bool {
        self.pos == self.inner.len()
    }

    fn read_u8(&mut self) -> u8 {
        let byte = self.inner[self.pos];
        self.pos += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let value = u16::from_le_bytes([self.inner[self.pos], self.inner[self.pos + 1]]);
        self.pos += 2;
        value
    }
}

struct Dest<'a> {
    inner: &'a mut [u8],
    pos: usize,
}

impl<'a> Dest<'a> {
    fn new(bytes: &'a mut [u8]) -> Self {
        Self { inner: bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.inner.len() - self.pos
    }

    fn write_u8(&mut self, value: u8) {
        self.inner[self.pos] = value;
        self.pos += 1;
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.inner[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn pixel_above<Mode: PixelMode>(&self, row_delta: usize) -> Mode::Pixel {
        Mode::read_at(self.inner, self.pos - row_delta)
    }
}

/// Per-depth pixel access.
trait PixelMode {
    type Pixel: Copy + BitXor<Output = Self::Pixel>;

    /// Bytes per pixel.
    const PIXEL_SIZE: usize;

    const PIXEL_FORMAT: RlePixelFormat;

    const BLACK: Self::Pixel;

    const WHITE: Self::Pixel;

    fn read(src: &mut Source<'_>) -> Self::Pixel;

    fn read_at(buf: &[u8], pos: usize) -> Self::Pixel;

    fn write(dst: &mut Dest<'_>, pixel: Self::Pixel);
}

struct Mode8Bpp;

impl PixelMode for Mode8Bpp {
    type Pixel = u8;

    const PIXEL_SIZE: usize = 1;
    const PIXEL_FORMAT: RlePixelFormat = RlePixelFormat::Rgb8;
    const BLACK: u8 = 0x00;
    const WHITE: u8 = 0xFF;

    fn read(src: &mut Source<'_>) -> u8 {
        src.read_u8()
    }

    fn read_at(buf: &[u8], pos: usize) -> u8 {
        buf[pos]
    }

    fn write(dst: &mut Dest<'_>, pixel: u8) {
        dst.write_u8(pixel);
    }
}

struct Mode15Bpp;

impl PixelMode for Mode15Bpp {
    type Pixel = u16;

    const PIXEL_SIZE: usize = 2;
    const PIXEL_FORMAT: RlePixelFormat = RlePixelFormat::Rgb15;
    const BLACK: u16 = 0x0000;
    // 5 bits per RGB component
    const WHITE: u16 = 0x7FFF;

    fn read(src: &mut Source<'_>) -> u16 {
        src.read_u16()
    }

    fn read_at(buf: &[u8], pos: usize) -> u16 {
        u16::from_le_bytes([buf[pos], buf[pos + 1]])
    }

    fn write(dst: &mut Dest<'_>, pixel: u16) {
        dst.write_bytes(&pixel.to_le_bytes());
    }
}

struct Mode16Bpp;

impl PixelMode for Mode16Bpp {
    type Pixel = u16;

    const PIXEL_SIZE: usize = 2;
    const PIXEL_FORMAT: RlePixelFormat = RlePixelFormat::Rgb16;
    const BLACK: u16 = 0x0000;
    // 5-6-5 bits per component
    const WHITE: u16 = 0xFFFF;

    fn read(src: &mut Source<'_>) -> u16 {
        src.read_u16()
    }

    fn read_at(buf: &[u8], pos: usize) -> u16 {
        u16::from_le_bytes([buf[pos], buf[pos + 1]])
    }

    fn write(dst: &mut Dest<'_>, pixel: u16) {
        dst.write_bytes(&pixel.to_le_bytes());
    }
}

struct Mode24Bpp;

impl PixelMode for Mode24Bpp {
    type Pixel = u32;

    const PIXEL_SIZE: usize = 3;
    const PIXEL_FORMAT: RlePixelFormat = RlePixelFormat::Rgb24;
    const BLACK: u32 = 0x00_0000;
    const WHITE: u32 = 0xFF_FFFF;

    fn read(src: &mut Source<'_>) -> u32 {
        let b0 = src.read_u8();
        let b1 = src.read_u8();
        let b2 = src.read_u8();
        u32::from_le_bytes([b0, b1, b2, 0])
    }

    fn read_at(buf: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], 0])
    }

    fn write(dst: &mut Dest<'_>, pixel: u32) {
        dst.write_bytes(&pixel.to_le_bytes()[..3]);
    }
}

struct Mode32Bpp;

impl PixelMode for Mode32Bpp {
    type Pixel = u32;

    const PIXEL_SIZE: usize = 4;
    const PIXEL_FORMAT: RlePixelFormat = RlePixelFormat::Rgb32;
    const BLACK: u32 = 0x0000_0000;
    const WHITE: u32 = 0xFFFF_FFFF;

    fn read(src: &mut Source<'_>) -> u32 {
        let b0 = src.read_u8();
        let b1 = src.read_u8();
        let b2 = src.read_u8();
        let b3 = src.read_u8();
        u32::from_le_bytes([b0, b1, b2, b3])
    }

    fn read_at(buf: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
    }

    fn write(dst: &mut Dest<'_>, pixel: u32) {
        dst.write_bytes(&pixel.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_run_16_bpp() {
        // REGULAR_COLOR_RUN (code 3), length 4, pixel 0xBEEF
        let src = [(0b011 << 5) | 4, 0xEF, 0xBE];

        let mut dst = Vec::new();
        let format = decompress(&src, &mut dst, 4usize, 1usize, 16usize).unwrap();

        assert_eq!(format, RlePixelFormat::Rgb16);
        assert_eq!(dst, [0xEF, 0xBE, 0xEF, 0xBE, 0xEF, 0xBE, 0xEF, 0xBE]);
    }

    #[test]
    fn fg_run_first_line_writes_white() {
        // REGULAR_FG_RUN (code 1), length 3; default foreground is white.
        let src = [(0b001 << 5) | 3];

        let mut dst = Vec::new();
        decompress(&src, &mut dst, 3usize, 1usize, 16usize).unwrap();

        assert_eq!(dst, [0xFF; 6]);
    }

    #[test]
    fn bg_run_second_line_copies_row_above() {
        // Line 1: color run of 2 pixels 0x1234; line 2: background run of 2.
        let src = [(0b011 << 5) | 2, 0x34, 0x12, (0b000 << 5) | 2];

        let mut dst = Vec::new();
        decompress(&src, &mut dst, 2usize, 2usize, 16usize).unwrap();

        assert_eq!(dst[..4], dst[4..]);
        assert_eq!(&dst[4..], [0x34, 0x12, 0x34, 0x12]);
    }

    #[test]
    fn set_fg_run_updates_foreground() {
        // LITE_SET_FG_FG_RUN (0xC), length 2, new fg 0x00FF
        let src = [0xC2, 0xFF, 0x00];

        let mut dst = Vec::new();
        decompress(&src, &mut dst, 2usize, 1usize, 16usize).unwrap();

        assert_eq!(dst, [0xFF, 0x00, 0xFF, 0x00]);
    }

    #[test]
    fn color_image_copies_bytes() {
        // REGULAR_COLOR_IMAGE (code 4), length 2
        let src = [(0b100 << 5) | 2, 0x11, 0x22, 0x33, 0x44];

        let mut dst = Vec::new();
        decompress(&src, &mut dst, 2usize, 1usize, 16usize).unwrap();

        assert_eq!(dst, [0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn white_and_black_orders() {
        let src = [0xFD, 0xFE];

        let mut dst = Vec::new();
        decompress(&src, &mut dst, 2usize, 1usize, 16usize).unwrap();

        assert_eq!(dst, [0xFF, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn fg_bg_image_on_first_line() {
        // REGULAR_FGBG_IMAGE (code 2), one full bitmask: 0b0000_0101
        // selects fg, bg, fg, bg, ... on the first line -> white/black mix.
        let src = [(0b010 << 5) | 1, 0b0000_0101];

        let mut dst = Vec::new();
        decompress(&src, &mut dst, 8usize, 1usize, 8usize).unwrap();

        assert_eq!(dst, [0xFF, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn invalid_bpp_is_rejected() {
        let mut dst = Vec::new();
        assert!(matches!(
            decompress(&[0x00], &mut dst, 1usize, 1usize, 12usize),
            Err(RleError::InvalidBpp { bpp: 12 })
        ));
    }

    #[test]
    fn truncated_source_is_rejected() {
        // Color run promising a pixel that is not there.
        let src = [(0b011 << 5) | 2];

        let mut dst = Vec::new();
        assert!(matches!(
            decompress(&src, &mut dst, 2usize, 1usize, 16usize),
            Err(RleError::NotEnoughBytes { .. })
        ));
    }
}

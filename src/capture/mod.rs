//! Contains logic for grabbing bitmaps of screen regions on different
//! environments. [GenericFrameGrabber] is the main artifact of this module
//! that abstracts the platform backends.

pub mod cadence;
pub mod region;
#[cfg(feature = "win")]
pub mod win;

#[cfg(feature = "win")]
extern crate windows;

use anyhow::Result;
use image::RgbaImage;

use region::Region;

/// One grabbed bitmap. Pixels are tightly packed BGRA rows, top-down,
/// which is what both GDI and the OS text recognizer want.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RegionFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Average brightness over the whole frame, 0..=255. Used to detect
    /// loading screens, which render as a nearly black frame.
    pub fn mean_luma(&self) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let mut sum = 0u64;
        for px in self.pixels.chunks_exact(4) {
            // BT.601 integer approximation, input is BGRA
            let (b, g, r) = (px[0] as u64, px[1] as u64, px[2] as u64);
            sum += (29 * b + 150 * g + 77 * r) >> 8;
        }
        sum as f64 / (self.width as u64 * self.height as u64) as f64
    }

    /// Swizzles BGRA to RGBA so the frame can go through `image` operations.
    pub fn to_image(&self) -> RgbaImage {
        let mut rgba = self.pixels.clone();
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        RgbaImage::from_raw(self.width, self.height, rgba)
            .expect("frame buffer length matches dimensions")
    }

    /// Builds a frame back from an `image` buffer.
    pub fn from_image(image: &RgbaImage) -> Self {
        let mut bgra = image.as_raw().clone();
        for px in bgra.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        Self::new(image.width(), image.height(), bgra)
    }
}

/// Intended to serve as a contract every capture backend must implement.
#[cfg_attr(test, mockall::automock)]
pub trait FrameGrabber {
    fn screen_size(&mut self) -> Result<(u32, u32)>;

    /// Grabs a bitmap of the given region. A failure is non-fatal for the
    /// pipeline, the cycle is simply skipped.
    fn grab(&mut self, region: &Region) -> Result<RegionFrame>;
}

/// Serves as a cross-compatible [FrameGrabber] implementation.
pub struct GenericFrameGrabber {
    inner: Box<dyn FrameGrabber>,
}

impl GenericFrameGrabber {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::GdiFrameGrabber;
                Ok(Self {
                    inner: Box::new(GdiFrameGrabber::new()),
                })
            }
            else {
                // This runtime error is needed to allow the project to be compiled for during testing.
                unimplemented!("No capture backend was specified")
            }
        }
    }
}

impl FrameGrabber for GenericFrameGrabber {
    fn screen_size(&mut self) -> Result<(u32, u32)> {
        self.inner.screen_size()
    }

    fn grab(&mut self, region: &Region) -> Result<RegionFrame> {
        self.inner.grab(region)
    }
}

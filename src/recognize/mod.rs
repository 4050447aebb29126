//! Text extraction from grabbed frames. [GenericRecognizer] wraps the
//! platform OCR backend; [money] and [business] turn the raw text into
//! structured readings.

pub mod business;
pub mod money;
#[cfg(feature = "win")]
pub mod win;

use anyhow::Result;
use image::imageops::{self, FilterType};

use crate::capture::RegionFrame;

/// Raw recognizer output for a single region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedText {
    pub text: String,
}

impl RecognizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn empty() -> Self {
        Self {
            text: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Lowercases and collapses whitespace runs, the form the classifier
    /// and the parsers expect.
    pub fn normalized(&self) -> String {
        self.text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// Intended to serve as a contract every OCR backend must implement.
#[cfg_attr(test, mockall::automock)]
pub trait TextRecognizer {
    /// Extracts text from a frame. Errors are non-fatal for the pipeline.
    fn recognize(&mut self, frame: &RegionFrame) -> Result<RecognizedText>;
}

/// Serves as a cross-compatible [TextRecognizer] implementation.
pub struct GenericRecognizer {
    inner: Box<dyn TextRecognizer>,
}

impl GenericRecognizer {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WinOcrRecognizer;
                Ok(Self {
                    inner: Box::new(WinOcrRecognizer::new()?),
                })
            }
            else {
                // This runtime error is needed to allow the project to be compiled for during testing.
                unimplemented!("No recognizer backend was specified")
            }
        }
    }
}

impl TextRecognizer for GenericRecognizer {
    fn recognize(&mut self, frame: &RegionFrame) -> Result<RecognizedText> {
        self.inner.recognize(frame)
    }
}

/// Upscales and, for light-on-dark HUD text, inverts a frame before OCR.
/// The game renders HUD captions small; recognizers do noticeably better
/// on a 2x upscale.
pub fn preprocess(frame: &RegionFrame, scale: u32, invert: bool) -> RegionFrame {
    let mut image = frame.to_image();
    if invert {
        imageops::invert(&mut image);
    }
    if scale > 1 {
        image = imageops::resize(
            &image,
            frame.width * scale,
            frame.height * scale,
            FilterType::Triangle,
        );
    }
    RegionFrame::from_image(&image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_collapses_whitespace() {
        let text = RecognizedText::new("  Deliver   THE\tProduct ");
        assert_eq!(text.normalized(), "deliver the product");
    }

    #[test]
    fn test_empty_detection() {
        assert!(RecognizedText::new("   ").is_empty());
        assert!(!RecognizedText::new("$1,000").is_empty());
    }

    #[test]
    fn test_preprocess_scales_and_inverts() {
        let frame = RegionFrame::new(2, 1, vec![0, 0, 0, 255, 0, 0, 0, 255]);
        let processed = preprocess(&frame, 2, true);
        assert_eq!((processed.width, processed.height), (4, 2));
        // Black inverted to white.
        assert!(processed.mean_luma() > 250.0);
    }
}

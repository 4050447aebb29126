use anyhow::{anyhow, Context, Result};
use windows::{
    Graphics::Imaging::{BitmapPixelFormat, SoftwareBitmap},
    Media::Ocr::OcrEngine,
    Storage::Streams::DataWriter,
};

use super::{RecognizedText, TextRecognizer};
use crate::capture::RegionFrame;

/// OCR through the Windows.Media.Ocr engine shipped with the OS. No model
/// downloads, no per-call network access.
pub struct WinOcrRecognizer {
    engine: OcrEngine,
}

impl WinOcrRecognizer {
    pub fn new() -> Result<Self> {
        let engine = OcrEngine::TryCreateFromUserProfileLanguages()
            .context("Failed to create OCR engine from user profile languages")?;
        Ok(Self { engine })
    }

    fn to_software_bitmap(frame: &RegionFrame) -> Result<SoftwareBitmap> {
        let writer = DataWriter::new()?;
        writer.WriteBytes(&frame.pixels)?;
        let buffer = writer.DetachBuffer()?;
        SoftwareBitmap::CreateCopyFromBuffer(
            &buffer,
            BitmapPixelFormat::Bgra8,
            frame.width as i32,
            frame.height as i32,
        )
        .map_err(|e| anyhow!("Failed to build software bitmap: {e}"))
    }
}

impl TextRecognizer for WinOcrRecognizer {
    fn recognize(&mut self, frame: &RegionFrame) -> Result<RecognizedText> {
        let bitmap = Self::to_software_bitmap(frame)?;
        let result = self
            .engine
            .RecognizeAsync(&bitmap)?
            .get()
            .context("OCR recognition failed")?;
        Ok(RecognizedText::new(result.Text()?.to_string()))
    }
}

use anyhow::{anyhow, Result};
use windows::Win32::{
    Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
        DIB_RGB_COLORS, SRCCOPY,
    },
    UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN},
};

use super::{region::Region, FrameGrabber, RegionFrame};

/// GDI based capture of the primary monitor. Slower than the DirectX
/// capture APIs but it needs no device setup and works on every desktop.
pub struct GdiFrameGrabber {
    _private: (),
}

impl GdiFrameGrabber {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl FrameGrabber for GdiFrameGrabber {
    fn screen_size(&mut self) -> Result<(u32, u32)> {
        let width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        if width <= 0 || height <= 0 {
            return Err(anyhow!("Failed to query primary monitor size"));
        }
        Ok((width as u32, height as u32))
    }

    fn grab(&mut self, region: &Region) -> Result<RegionFrame> {
        let (screen_width, screen_height) = self.screen_size()?;
        let (left, top, width, height) = region.to_absolute(screen_width, screen_height);

        unsafe {
            let screen_dc = GetDC(None);
            if screen_dc.is_invalid() {
                return Err(anyhow!("GetDC failed"));
            }

            let memory_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, width as i32, height as i32);
            let previous = SelectObject(memory_dc, bitmap);

            let result = BitBlt(
                memory_dc,
                0,
                0,
                width as i32,
                height as i32,
                screen_dc,
                left,
                top,
                SRCCOPY,
            )
            .map_err(|e| anyhow!("BitBlt failed: {e}"))
            .and_then(|_| {
                let mut info = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: width as i32,
                        // Negative height requests a top-down bitmap.
                        biHeight: -(height as i32),
                        biPlanes: 1,
                        biBitCount: 32,
                        biCompression: BI_RGB.0,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                let mut pixels = vec![0u8; (width * height * 4) as usize];
                let copied = GetDIBits(
                    memory_dc,
                    bitmap,
                    0,
                    height,
                    Some(pixels.as_mut_ptr() as *mut _),
                    &mut info,
                    DIB_RGB_COLORS,
                );
                if copied == 0 {
                    Err(anyhow!("GetDIBits failed"))
                } else {
                    Ok(RegionFrame::new(width, height, pixels))
                }
            });

            SelectObject(memory_dc, previous);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(memory_dc);
            ReleaseDC(None, screen_dc);

            result
        }
    }
}

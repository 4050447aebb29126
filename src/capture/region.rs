use serde::{Deserialize, Serialize};

/// A rectangular screen area in relative coordinates, so the same layout
/// works on every resolution. All fields are fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Converts the relative region to pixel coordinates: `(left, top, width, height)`.
    /// The result is never smaller than one pixel so a grab always has data.
    pub fn to_absolute(&self, screen_width: u32, screen_height: u32) -> (i32, i32, u32, u32) {
        let left = (self.x * screen_width as f64) as i32;
        let top = (self.y * screen_height as f64) as i32;
        let right = ((self.x + self.width) * screen_width as f64) as i32;
        let bottom = ((self.y + self.height) * screen_height as f64) as i32;
        let width = (right - left).max(1) as u32;
        let height = (bottom - top).max(1) as u32;
        (left, top, width, height)
    }
}

/// Names for the fixed HUD areas the tracker samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    MoneyDisplay,
    MissionText,
    CenterPrompt,
    BusinessStock,
    BusinessSupplies,
    BusinessValue,
    FullScreen,
}

/// The game's default HUD layout. Money sits top-right, objective text
/// top-center, interaction prompts mid-screen, and the business laptop
/// renders its stock/supply rows in the right half.
#[derive(Debug, Clone)]
pub struct ScreenRegions {
    pub money_display: Region,
    pub mission_text: Region,
    pub center_prompt: Region,
    pub business_stock: Region,
    pub business_supplies: Region,
    pub business_value: Region,
    pub full_screen: Region,
}

impl Default for ScreenRegions {
    fn default() -> Self {
        Self {
            money_display: Region::new(0.78, 0.015, 0.21, 0.045),
            mission_text: Region::new(0.25, 0.02, 0.50, 0.08),
            center_prompt: Region::new(0.25, 0.45, 0.50, 0.15),
            business_stock: Region::new(0.55, 0.35, 0.25, 0.08),
            business_supplies: Region::new(0.55, 0.45, 0.25, 0.08),
            business_value: Region::new(0.55, 0.55, 0.25, 0.08),
            full_screen: Region::new(0.0, 0.0, 1.0, 1.0),
        }
    }
}

impl ScreenRegions {
    pub fn get(&self, kind: RegionKind) -> Region {
        match kind {
            RegionKind::MoneyDisplay => self.money_display,
            RegionKind::MissionText => self.mission_text,
            RegionKind::CenterPrompt => self.center_prompt,
            RegionKind::BusinessStock => self.business_stock,
            RegionKind::BusinessSupplies => self.business_supplies,
            RegionKind::BusinessValue => self.business_value,
            RegionKind::FullScreen => self.full_screen,
        }
    }

    /// Regions sampled on every cycle.
    pub fn hud_regions(&self) -> [(RegionKind, Region); 3] {
        [
            (RegionKind::MoneyDisplay, self.money_display),
            (RegionKind::MissionText, self.mission_text),
            (RegionKind::CenterPrompt, self.center_prompt),
        ]
    }

    /// Regions sampled only while the business laptop is open.
    pub fn business_regions(&self) -> [(RegionKind, Region); 3] {
        [
            (RegionKind::BusinessStock, self.business_stock),
            (RegionKind::BusinessSupplies, self.business_supplies),
            (RegionKind::BusinessValue, self.business_value),
        ]
    }
}

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// CT display window in Hounsfield units (center, width)
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct WindowSetting {
    pub center: f32,
    pub width: f32,
}

impl Default for WindowSetting {
    /// Brain window: level 40, width 150
    fn default() -> Self {
        Self {
            center: 40.0,
            width: 150.0,
        }
    }
}

impl WindowSetting {
    /// Creates a new WindowSetting
    pub fn new(center: f32, width: f32) -> Self {
        Self { center, width }
    }

    /// Lower bound of the window
    pub fn min(&self) -> f32 {
        self.center - self.width / 2.0
    }

    /// Upper bound of the window
    pub fn max(&self) -> f32 {
        self.center + self.width / 2.0
    }

    /// Parses a window from string
    ///
    /// Accepts formats like:
    /// - "40,150"
    /// - "40\\150" (DICOM multi-value)
    /// - "40 150"
    /// - "[40, 150]"
    /// - "-600 1500"
    ///
    /// # Errors
    ///
    /// Returns an error if the string does not hold two numbers
    pub fn parse(s: &str) -> Result<Self, String> {
        static REGEX: OnceLock<Regex> = OnceLock::new();
        let re = REGEX.get_or_init(|| {
            Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("Failed to compile regex")
        });

        let mut numbers = re.find_iter(s).map(|m| m.as_str());
        let center_str = numbers
            .next()
            .ok_or_else(|| format!("Failed to parse window from '{}'", s))?;
        let width_str = numbers
            .next()
            .ok_or_else(|| format!("Failed to parse window from '{}'", s))?;

        let center: f32 = center_str
            .parse()
            .map_err(|e| format!("Failed to parse window center: {}", e))?;
        let width: f32 = width_str
            .parse()
            .map_err(|e| format!("Failed to parse window width: {}", e))?;

        if width < 0.0 {
            return Err(format!("Window width must be non-negative, got {}", width));
        }

        Ok(WindowSetting { center, width })
    }
}

impl fmt::Display for WindowSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{} / W{} HU", self.center, self.width)
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    #[serde(default)]
    pub engine: Engine,

    /// Path of the browser or tool binary, looked up in `PATH` when unset
    #[serde(default)]
    pub program: Option<PathBuf>,

    #[serde(default)]
    pub page_size: PageSize,

    /// Page margins in inches
    #[serde(default = "default_margin")]
    pub margin: f32,

    /// Milliseconds given to scripts before printing
    #[serde(default = "default_javascript_delay")]
    pub javascript_delay: u64,

    #[serde(default = "default_print_background")]
    pub print_background: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            program: None,
            page_size: PageSize::default(),
            margin: default_margin(),
            javascript_delay: default_javascript_delay(),
            print_background: default_print_background(),
        }
    }
}

fn default_margin() -> f32 {
    0.75
}

fn default_javascript_delay() -> u64 {
    2000
}

fn default_print_background() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ArgEnum))]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Headless Chrome print-to-PDF
    Chrome,
    /// The `wkhtmltopdf` command
    Wkhtmltopdf,
    /// The `weasyprint` command
    Weasyprint,
    /// Built-in text only layout, no external program needed
    Plain,
}

impl Default for Engine {
    fn default() -> Self {
        Self::Chrome
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in inches.
    pub fn inches(&self) -> (f32, f32) {
        match self {
            Self::A4 => (8.27, 11.69),
            Self::Letter => (8.5, 11.0),
        }
    }

    /// Width and height in PDF points.
    pub fn points(&self) -> (f32, f32) {
        match self {
            Self::A4 => (595.0, 842.0),
            Self::Letter => (612.0, 792.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::Letter => "Letter",
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

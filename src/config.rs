//! Configuration types for LaTeX-to-DOCX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks and to diff two runs to understand
//! why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fourteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Latex2DocxError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Configuration for a LaTeX-to-DOCX conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use latex2docx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .density(200)
///     .concurrency(2)
///     .clean_intermediates(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rasterisation density in DPI for figure PNGs. Range: 72–1200. Default: 300.
    ///
    /// 300 DPI keeps TikZ line art and axis labels crisp when Word scales the
    /// image to page width. Below ~150 DPI thin strokes start aliasing; above
    /// 600 the PNGs balloon without visible benefit in a DOCX.
    pub density: u32,

    /// PNG quality passed to ImageMagick. Range: 1–100. Default: 90.
    pub quality: u32,

    /// Width of substituted images as a fraction of `\textwidth`. Default: 0.8.
    ///
    /// 0.8 leaves a margin that matches how LaTeX floats typically sit on the
    /// page; 1.0 makes figures span the full text column.
    pub image_width: f32,

    /// Number of figures compiled in parallel. Default: 4.
    ///
    /// Figure compilation is CPU-bound (one pdflatex process each), so the
    /// useful ceiling is the core count, not the 10+ that network-bound
    /// pipelines enjoy. 4 keeps a laptop responsive while still cutting
    /// wall-clock time on figure-heavy documents.
    pub concurrency: usize,

    /// LaTeX engine used to compile standalone figure units. Default: "pdflatex".
    ///
    /// The standalone boilerplate only uses pdflatex-compatible packages, so
    /// the default works even for source documents that themselves need
    /// LuaLaTeX. Set to "lualatex" or "xelatex" if your figures require it.
    pub latex_engine: String,

    /// Directory (relative to the input) for unit files and their PDFs.
    /// Default: "tikz_extracted".
    pub build_dir: String,

    /// Directory (relative to the input) for the rendered PNGs; also the path
    /// prefix written into `\includegraphics` references. Default: "tikz_png".
    pub asset_dir: String,

    /// Name of a data directory copied next to the unit files before
    /// compilation, for figures that `\input` or plot external data files.
    /// Skipped silently when it does not exist. Default: "data".
    pub data_dir: String,

    /// Extra directories appended to pandoc's `--resource-path`, after the
    /// input's own directory and the asset directory. Default: `data`, `figures`.
    pub resource_paths: Vec<String>,

    /// Pass `--toc` to pandoc. Default: true.
    pub toc: bool,

    /// Pass `--number-sections` to pandoc. Default: true.
    pub number_sections: bool,

    /// Delete the working directories, intermediate `.tex` files and the
    /// pandoc transcript after a successful export. Default: false.
    ///
    /// Off by default because the intermediates are the first thing you want
    /// to look at when a figure comes out wrong.
    pub clean_intermediates: bool,

    /// Per-invocation timeout for external tools (LaTeX engine, ImageMagick,
    /// pandoc) in seconds. Default: 300.
    ///
    /// pdflatex hangs forever on some malformed input even with
    /// `-interaction=nonstopmode`; the timeout turns that into a per-figure
    /// error instead of a stuck pipeline.
    pub tool_timeout_secs: u64,

    /// Optional progress callback invoked as figures compile.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            density: 300,
            quality: 90,
            image_width: 0.8,
            concurrency: 4,
            latex_engine: "pdflatex".to_string(),
            build_dir: "tikz_extracted".to_string(),
            asset_dir: "tikz_png".to_string(),
            data_dir: "data".to_string(),
            resource_paths: vec!["data".to_string(), "figures".to_string()],
            toc: true,
            number_sections: true,
            clean_intermediates: false,
            tool_timeout_secs: 300,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("density", &self.density)
            .field("quality", &self.quality)
            .field("image_width", &self.image_width)
            .field("concurrency", &self.concurrency)
            .field("latex_engine", &self.latex_engine)
            .field("build_dir", &self.build_dir)
            .field("asset_dir", &self.asset_dir)
            .field("data_dir", &self.data_dir)
            .field("resource_paths", &self.resource_paths)
            .field("toc", &self.toc)
            .field("number_sections", &self.number_sections)
            .field("clean_intermediates", &self.clean_intermediates)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn density(mut self, dpi: u32) -> Self {
        self.config.density = dpi.clamp(72, 1200);
        self
    }

    pub fn quality(mut self, q: u32) -> Self {
        self.config.quality = q.clamp(1, 100);
        self
    }

    pub fn image_width(mut self, fraction: f32) -> Self {
        self.config.image_width = fraction;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn latex_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.latex_engine = engine.into();
        self
    }

    pub fn build_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.build_dir = dir.into();
        self
    }

    pub fn asset_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.asset_dir = dir.into();
        self
    }

    pub fn data_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn resource_paths(mut self, paths: Vec<String>) -> Self {
        self.config.resource_paths = paths;
        self
    }

    pub fn toc(mut self, v: bool) -> Self {
        self.config.toc = v;
        self
    }

    pub fn number_sections(mut self, v: bool) -> Self {
        self.config.number_sections = v;
        self
    }

    pub fn clean_intermediates(mut self, v: bool) -> Self {
        self.config.clean_intermediates = v;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Latex2DocxError> {
        let c = &self.config;
        if c.density < 72 || c.density > 1200 {
            return Err(Latex2DocxError::InvalidConfig(format!(
                "density must be 72–1200 DPI, got {}",
                c.density
            )));
        }
        if !(c.image_width > 0.0 && c.image_width <= 1.0) {
            return Err(Latex2DocxError::InvalidConfig(format!(
                "image_width must be in (0, 1], got {}",
                c.image_width
            )));
        }
        if c.concurrency == 0 {
            return Err(Latex2DocxError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        if c.latex_engine.is_empty() {
            return Err(Latex2DocxError::InvalidConfig(
                "latex_engine must not be empty".into(),
            ));
        }
        if c.build_dir.is_empty() || c.asset_dir.is_empty() {
            return Err(Latex2DocxError::InvalidConfig(
                "build_dir and asset_dir must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

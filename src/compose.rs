//! Final artifact composition: the rendered base image centered on a white
//! canvas, with the headline and summary laid out in a text region below it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use ab_glyph::{FontVec, PxScale};
use chrono::Local;
use image::{ImageFormat, Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use textwrap::{Options, WrapAlgorithm};
use tracing::{debug, info, warn};

use crate::config::CompositionConfig;
use crate::error::CompositionError;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const DIVIDER_COLOR: Rgb<u8> = Rgb([0xcc, 0xcc, 0xcc]);
const DIVIDER_THICKNESS: u32 = 2;
const TEXT_MARGIN: u32 = 40;
const TITLE_GAP: u32 = 20;
const BOTTOM_GUARD: u32 = 30;
const MAX_NAME_LEN: usize = 50;

struct TextStyle {
    scale: f32,
    color: Rgb<u8>,
    line_height: u32,
    wrap_width: usize,
}

const TITLE: TextStyle = TextStyle {
    scale: 28.0,
    color: Rgb([0x1a, 0x1a, 0x1a]),
    line_height: 35,
    wrap_width: 60,
};

const BODY: TextStyle = TextStyle {
    scale: 18.0,
    color: Rgb([0x40, 0x40, 0x40]),
    line_height: 25,
    wrap_width: 80,
};

/// Where each text line and the divider go on a canvas of a given height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPlan {
    pub title_lines: Vec<(String, u32)>,
    pub divider_y: u32,
    /// Only lines that fit; the rest of the body is clipped.
    pub body_lines: Vec<(String, u32)>,
}

impl TextPlan {
    pub fn new(headline: &str, summary: &str, start_y: u32, canvas_height: u32) -> Self {
        let mut y = start_y + TITLE_GAP;

        let mut title_lines = Vec::new();
        for line in wrap_text(headline, TITLE.wrap_width) {
            title_lines.push((line, y));
            y += TITLE.line_height;
        }

        y += 10;
        let divider_y = y;
        y += 20;

        let mut body_lines = Vec::new();
        for line in wrap_text(summary, BODY.wrap_width) {
            if y > canvas_height.saturating_sub(BOTTOM_GUARD) {
                break;
            }
            body_lines.push((line, y));
            y += BODY.line_height;
        }

        Self {
            title_lines,
            divider_y,
            body_lines,
        }
    }
}

/// Turns raw rendered image bytes plus text into a finished artifact on disk.
pub struct CompositionPipeline {
    config: CompositionConfig,
    font: Option<FontVec>,
}

impl CompositionPipeline {
    /// Create the output directory and load the configured font, or a
    /// common system font when none is configured.
    pub fn new(config: &CompositionConfig) -> Result<Self, CompositionError> {
        fs::create_dir_all(&config.output_dir)?;

        let font = match config.resolve_font() {
            Some(path) => match load_font(&path) {
                Ok(font) => {
                    debug!(path = %path.display(), "font loaded");
                    Some(font)
                }
                Err(e) => {
                    warn!("{e}; artifacts will be composed without text");
                    None
                }
            },
            None => {
                warn!("no usable font found; artifacts will be composed without text");
                None
            }
        };

        Ok(Self {
            config: config.clone(),
            font,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Compose `base_image` with the headline and summary and write the
    /// result as a PNG in the output directory.
    pub fn compose(
        &self,
        base_image: &[u8],
        headline: &str,
        summary: &str,
    ) -> Result<PathBuf, CompositionError> {
        // Removed when dropped, whichever way composition ends.
        let mut transient = tempfile::Builder::new()
            .prefix("temp_main_")
            .suffix(".png")
            .tempfile_in(&self.config.output_dir)?;
        transient.write_all(base_image)?;
        transient.flush()?;

        let bytes = fs::read(transient.path())?;
        let base = image::load_from_memory(&bytes)
            .map_err(CompositionError::Decode)?
            .to_rgb8();

        let canvas = self.layout(&base, headline, summary);

        let path = self.artifact_path(headline);
        canvas
            .save_with_format(&path, ImageFormat::Png)
            .map_err(CompositionError::Encode)?;

        info!(path = %path.display(), width = canvas.width(), height = canvas.height(), "artifact written");
        Ok(path)
    }

    fn layout(&self, base: &RgbImage, headline: &str, summary: &str) -> RgbImage {
        let (base_w, base_h) = base.dimensions();
        let width = base_w.max(self.config.min_width);
        let height = base_h + self.config.text_region_height + self.config.padding;

        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
        let x = (width - base_w) / 2;
        imageops::overlay(&mut canvas, base, i64::from(x), i64::from(self.config.top_offset));

        let plan = TextPlan::new(headline, summary, base_h + self.config.padding, height);

        for (line, y) in &plan.title_lines {
            self.draw_centered(&mut canvas, line, *y, &TITLE);
        }

        let rule_width = width.saturating_sub(TEXT_MARGIN * 2).max(1);
        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(TEXT_MARGIN as i32, plan.divider_y as i32).of_size(rule_width, DIVIDER_THICKNESS),
            DIVIDER_COLOR,
        );

        for (line, y) in &plan.body_lines {
            self.draw_centered(&mut canvas, line, *y, &BODY);
        }

        canvas
    }

    fn draw_centered(&self, canvas: &mut RgbImage, line: &str, y: u32, style: &TextStyle) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(style.scale);
        let (text_w, _) = text_size(scale, font, line);
        let x = canvas.width().saturating_sub(text_w) / 2;
        draw_text_mut(canvas, style.color, x as i32, y as i32, scale, font, line);
    }

    /// `<timestamp>_<sanitized headline>.png`, suffixed on collision.
    fn artifact_path(&self, headline: &str) -> PathBuf {
        let stem = format!(
            "{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            sanitize_headline(headline)
        );

        let mut path = self.config.output_dir.join(format!("{stem}.png"));
        let mut n = 1;
        while path.exists() {
            path = self.config.output_dir.join(format!("{stem}_{n}.png"));
            n += 1;
        }
        path
    }

    /// Delete PNG artifacts last modified more than `max_age` ago.
    pub fn cleanup_older_than(&self, max_age: Duration) -> usize {
        let entries = match fs::read_dir(&self.config.output_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.config.output_dir.display(), "cleanup skipped: {e}");
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut deleted = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|modified| now.duration_since(modified).unwrap_or_default());

            match age {
                Ok(age) if age > max_age => match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "removed old artifact");
                        deleted += 1;
                    }
                    Err(e) => warn!(path = %path.display(), "could not delete: {e}"),
                },
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), "could not read file age: {e}"),
            }
        }

        if deleted > 0 {
            info!(deleted, "cleaned up old artifacts");
        }
        deleted
    }
}

fn load_font(path: &Path) -> Result<FontVec, CompositionError> {
    let bytes = fs::read(path)
        .map_err(|e| CompositionError::Font(format!("cannot read {}: {e}", path.display())))?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| CompositionError::Font(format!("invalid font {}: {e}", path.display())))
}

/// Keep alphanumerics, spaces, `-` and `_`; spaces become underscores.
pub fn sanitize_headline(headline: &str) -> String {
    let kept: String = headline
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let name: String = kept
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(MAX_NAME_LEN)
        .collect();

    if name.is_empty() {
        "headline".to_string()
    } else {
        name
    }
}

/// Greedy word wrap at `width` columns. Words longer than a line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let options = Options::new(width.max(1)).wrap_algorithm(WrapAlgorithm::FirstFit);
    textwrap::wrap(text, options)
        .into_iter()
        .map(|line| line.into_owned())
        .filter(|line| !line.trim().is_empty())
        .collect()
}

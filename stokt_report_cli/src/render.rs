use std::panic;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use plotters_backend::text_anchor::{HPos, Pos, VPos};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
};
use stokt_report::{
    parse_polygon, Hold, HoldCatalog, HoldId, HoldRole, NormalizedRoute, StoktError,
};
use tracing::warn;

#[derive(Clone, Copy, Debug)]
pub struct DrawStyle {
    pub stroke_width: u32,
    pub title_size: u32,
}

pub fn role_color(hold_id: HoldId, role: HoldRole) -> Result<RGBColor, StoktError> {
    match role {
        HoldRole::Start => Ok(RGBColor(0, 128, 0)),
        HoldRole::Foot => Ok(RGBColor(0, 0, 255)),
        HoldRole::On => Ok(BLACK),
        HoldRole::Top => Ok(RGBColor(255, 0, 0)),
        HoldRole::Unknown(role) => Err(StoktError::UnrenderableRole { hold_id, role }),
    }
}

/// Catalog holds carry no role of their own; they are drawn as on-route holds.
pub fn catalog_selection<'a>(
    catalog: &'a HoldCatalog,
    ids: &[HoldId],
) -> Vec<(&'a Hold, HoldRole)> {
    catalog
        .select(ids)
        .into_iter()
        .map(|hold| (hold, HoldRole::On))
        .collect()
}

pub fn route_selection(route: &NormalizedRoute) -> Vec<(&Hold, HoldRole)> {
    route
        .normalized_holds
        .iter()
        .map(|h| (&h.hold, h.role))
        .collect()
}

/// The wall photo, faded toward white once so every overlay starts from the same base.
pub struct WallCanvas {
    background: RgbImage,
    style: DrawStyle,
}

impl WallCanvas {
    pub fn load(path: &Path, alpha: f64, style: DrawStyle) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open wall image {}", path.display()))?
            .to_rgb8();
        Ok(Self::from_image(image, alpha, style))
    }

    pub fn from_image(mut background: RgbImage, alpha: f64, style: DrawStyle) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        for pixel in background.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = (alpha * *channel as f64 + (1.0 - alpha) * 255.0).round() as u8;
            }
        }
        Self { background, style }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.background.dimensions()
    }

    pub fn draw(&self, holds: &[(&Hold, HoldRole)], title: &str) -> Result<RgbImage> {
        let (width, height) = self.background.dimensions();
        let mut buffer = self.background.as_raw().clone();
        {
            let backend = BitMapBackend::with_buffer(&mut buffer, (width, height));
            let root = FontSafeBackend::new(backend).into_drawing_area();

            for (hold, role) in holds {
                let color = role_color(hold.id, *role)?;
                let mut outline: Vec<BackendCoord> = parse_polygon(hold)?
                    .into_iter()
                    .map(|(x, y)| (x.round() as i32, y.round() as i32))
                    .collect();
                if let Some(&first) = outline.first() {
                    outline.push(first);
                }
                root.draw(&PathElement::new(
                    outline,
                    plotters::style::Color::stroke_width(&color, self.style.stroke_width),
                ))
                .map_err(|e| anyhow!("plotting error: {e}"))?;
            }

            if !title.is_empty() {
                let font = FontDesc::new(
                    FontFamily::SansSerif,
                    self.style.title_size as f64,
                    FontStyle::Normal,
                );
                let text_style = font
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Top));
                root.draw(&Text::new(
                    title.to_string(),
                    ((width / 2) as i32, 8),
                    text_style,
                ))
                .map_err(|e| anyhow!("plotting error: {e}"))?;
            }

            root.present().map_err(|e| anyhow!("plotting error: {e}"))?;
        }
        RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| anyhow!("rendered buffer does not match {width}x{height}"))
    }

    pub fn render(&self, holds: &[(&Hold, HoldRole)], title: &str, path: &Path) -> Result<()> {
        let image = self.draw(holds, title)?;
        image
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Run a render, turning a panicking font or image backend into an error.
pub fn render_guard(render: impl FnOnce() -> Result<()>) -> Result<()> {
    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| anyhow!("rendering backend panicked"))?
}

/// Passes everything through to the wrapped backend except text, which is
/// dropped with a warning when no usable font is installed. Titles are
/// decoration; a missing font must not lose the hold overlay.
struct FontSafeBackend<DB> {
    inner: DB,
    warned: bool,
}

impl<DB> FontSafeBackend<DB> {
    fn new(inner: DB) -> Self {
        Self {
            inner,
            warned: false,
        }
    }
}

impl<DB: DrawingBackend> DrawingBackend for FontSafeBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.draw_text(text, style, pos)
        })) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(DrawingErrorKind::FontError(err))) => {
                self.warn_once(&err.to_string());
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                self.warn_once("font backend panicked");
                Ok(())
            }
        }
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.estimate_text_size(text, style)
        })) {
            Ok(Err(DrawingErrorKind::FontError(_))) | Err(_) => Ok((0, 0)),
            Ok(result) => result,
        }
    }
}

impl<DB> FontSafeBackend<DB> {
    fn warn_once(&mut self, reason: &str) {
        if !self.warned {
            warn!("Skipping title text ({reason})");
            self.warned = true;
        }
    }
}

/// File-system safe stem for a route image.
pub fn safe_name(name: &str) -> String {
    name.replace(['/', '$'], "-")
}

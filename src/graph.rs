use crate::ir::{ChartKind, DashboardView};
use crate::palette;
use crate::{OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::ops::Range;

const BAR_WIDTH: f64 = 0.8;
/// Gap between the x axis and the category labels, in pixels
const LABEL_OFFSET: i32 = 8;

fn to_rgb(color: palette::Color) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}

/// Value range with 5% headroom; bars always start from zero.
fn value_range(values: &[f64], kind: ChartKind) -> Range<f64> {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let (lo, hi) = match kind {
        ChartKind::Bar => (min.min(0.0), max.max(0.0)),
        ChartKind::Line => (min, max),
    };
    if lo == hi {
        (lo - 1.0)..(hi + 1.0)
    } else {
        let padding = (hi - lo) * 0.05;
        let lo = if kind == ChartKind::Bar && lo == 0.0 { 0.0 } else { lo - padding };
        lo..(hi + padding)
    }
}

/// Bar (and point) centers on the 0..n category axis
fn category_centers(n: usize) -> Vec<f64> {
    (0..n).map(|idx| idx as f64 + 0.5).collect()
}

/// Draw the view onto any plotters drawing area
fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, view: &DashboardView) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let labels: Vec<String> = view.table.rows.iter().map(|r| r.label()).collect();
    let values = view.table.values();
    if values.is_empty() {
        anyhow::bail!("Cannot draw a chart with no data");
    }
    if values.len() != view.colors.len() {
        anyhow::bail!(
            "Values and colors must have the same length (values: {}, colors: {})",
            values.len(),
            view.colors.len()
        );
    }

    root.fill(&WHITE).context("Failed to fill background")?;

    let centers = category_centers(labels.len());
    let y_range = value_range(&values, view.chart);
    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&view.title, ("sans-serif", 20))
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..(labels.len() as f64), y_range.clone())
        .context("Failed to build chart")?;

    // Category names are drawn below at the bar centers; numeric x ticks would
    // land on round numbers between the bars
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(view.x_label.as_str())
        .y_desc(view.y_label.as_str())
        .x_labels(0)
        .draw()
        .context("Failed to draw mesh")?;

    let label_style = TextStyle::from(("sans-serif", 12).into_font())
        .pos(Pos::new(HPos::Center, VPos::Top));
    for (label, &x) in labels.iter().zip(&centers) {
        let (px, py) = chart.backend_coord(&(x, y_range.start));
        root.draw(&Text::new(label.clone(), (px, py + LABEL_OFFSET), label_style.clone()))
            .context("Failed to draw category label")?;
    }

    match view.chart {
        ChartKind::Bar => {
            for ((&value, &color), &x_center) in values.iter().zip(&view.colors).zip(&centers) {
                chart
                    .draw_series(std::iter::once(Rectangle::new(
                        [
                            (x_center - BAR_WIDTH / 2.0, 0.0),
                            (x_center + BAR_WIDTH / 2.0, value),
                        ],
                        to_rgb(color).filled(),
                    )))
                    .context("Failed to draw bar")?;
            }
        }
        ChartKind::Line => {
            let points: Vec<(f64, f64)> = centers.iter().copied().zip(values.iter().copied()).collect();
            chart
                .draw_series(LineSeries::new(points.clone(), BLACK.mix(0.4).stroke_width(2)))
                .context("Failed to draw line series")?;
            chart
                .draw_series(
                    points
                        .iter()
                        .zip(&view.colors)
                        .map(|(&(x, y), &color)| Circle::new((x, y), 5, to_rgb(color).filled())),
                )
                .context("Failed to draw point series")?;
        }
    }

    root.present().context("Failed to present drawing")?;
    Ok(())
}

/// Render the view as PNG bytes
pub fn render_png(view: &DashboardView, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root, view)?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

/// Render the view as an SVG document
pub fn render_svg(view: &DashboardView, options: &RenderOptions) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        draw(&root, view)?;
    }
    Ok(svg)
}

/// Render in the configured output format
pub fn render_chart(view: &DashboardView, options: &RenderOptions) -> Result<Vec<u8>> {
    match options.format {
        OutputFormat::Png => render_png(view, options),
        OutputFormat::Svg => render_svg(view, options).map(String::into_bytes),
    }
}

//! ROC canvas rendering
//!
//! Writes the background-rejection-versus-signal-efficiency canvas as a
//! standalone SVG, one colored polyline per method plus a legend with
//! the ROC integrals. No plotting backend needed; the markup is small
//! enough to assemble directly.

use crate::eval::MethodEvaluation;
use crate::Result;
use std::fs;
use std::path::Path;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 190.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;

const PALETTE: [&str; 6] = [
    "#1f77b4", "#d62728", "#2ca02c", "#9467bd", "#ff7f0e", "#8c564b",
];

fn x_pixel(signal_eff: f64) -> f64 {
    MARGIN_LEFT + signal_eff * (WIDTH - MARGIN_LEFT - MARGIN_RIGHT)
}

fn y_pixel(background_rej: f64) -> f64 {
    HEIGHT - MARGIN_BOTTOM - background_rej * (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM)
}

/// Render the ROC canvas for a set of evaluated methods
///
/// Replaces any previous file at `path`.
///
/// # Errors
/// Returns error if the file cannot be written
pub fn render_roc_svg(methods: &[MethodEvaluation], path: &Path) -> Result<()> {
    let mut svg = String::with_capacity(16 * 1024);
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
         viewBox=\"0 0 {WIDTH} {HEIGHT}\">\n"
    ));
    svg.push_str(&format!(
        "  <rect width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"white\"/>\n"
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" \
         font-size=\"18\">Background rejection versus signal efficiency</text>\n",
        (MARGIN_LEFT + WIDTH - MARGIN_RIGHT) / 2.0,
        MARGIN_TOP - 20.0
    ));

    // Grid and tick labels, 0.2 steps on both axes.
    for step in 0..=5 {
        let value = f64::from(step) * 0.2;
        let x = x_pixel(value);
        let y = y_pixel(value);
        svg.push_str(&format!(
            "  <line x1=\"{x:.1}\" y1=\"{:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" \
             stroke=\"#cccccc\" stroke-dasharray=\"4 4\"/>\n",
            y_pixel(0.0),
            y_pixel(1.0)
        ));
        svg.push_str(&format!(
            "  <line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" \
             stroke=\"#cccccc\" stroke-dasharray=\"4 4\"/>\n",
            x_pixel(0.0),
            x_pixel(1.0)
        ));
        svg.push_str(&format!(
            "  <text x=\"{x:.1}\" y=\"{:.1}\" text-anchor=\"middle\" \
             font-family=\"sans-serif\" font-size=\"12\">{value:.1}</text>\n",
            y_pixel(0.0) + 20.0
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" \
             font-family=\"sans-serif\" font-size=\"12\">{value:.1}</text>\n",
            x_pixel(0.0) - 8.0,
            y + 4.0
        ));
    }

    // Axis frame.
    svg.push_str(&format!(
        "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" \
         stroke=\"black\"/>\n",
        x_pixel(0.0),
        y_pixel(1.0),
        x_pixel(1.0) - x_pixel(0.0),
        y_pixel(0.0) - y_pixel(1.0)
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" \
         font-size=\"14\">Signal efficiency</text>\n",
        (x_pixel(0.0) + x_pixel(1.0)) / 2.0,
        HEIGHT - 15.0
    ));
    svg.push_str(&format!(
        "  <text x=\"20\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" \
         font-size=\"14\" transform=\"rotate(-90 20 {:.1})\">Background rejection</text>\n",
        (y_pixel(0.0) + y_pixel(1.0)) / 2.0,
        (y_pixel(0.0) + y_pixel(1.0)) / 2.0
    ));

    for (index, method) in methods.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        let points: Vec<String> = method
            .roc_curve
            .points()
            .iter()
            .map(|p| {
                format!(
                    "{:.1},{:.1}",
                    x_pixel(p.signal_eff.clamp(0.0, 1.0)),
                    y_pixel(p.background_rej.clamp(0.0, 1.0))
                )
            })
            .collect();
        svg.push_str(&format!(
            "  <polyline fill=\"none\" stroke=\"{color}\" stroke-width=\"2\" \
             points=\"{}\"/>\n",
            points.join(" ")
        ));

        #[allow(clippy::cast_precision_loss)]
        let legend_y = MARGIN_TOP + 20.0 + 22.0 * index as f64;
        let legend_x = WIDTH - MARGIN_RIGHT + 15.0;
        svg.push_str(&format!(
            "  <line x1=\"{legend_x:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" \
             stroke=\"{color}\" stroke-width=\"2\"/>\n",
            legend_y - 4.0,
            legend_x + 24.0,
            legend_y - 4.0
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{legend_y:.1}\" font-family=\"sans-serif\" \
             font-size=\"13\">{} ({:.3})</text>\n",
            legend_x + 30.0,
            method.name,
            method.roc_integral
        ));
    }

    svg.push_str("</svg>\n");
    fs::write(path, svg)?;
    Ok(())
}

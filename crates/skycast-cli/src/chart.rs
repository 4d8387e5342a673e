//! Self-contained SVG line charts of forecasts: context, point forecast,
//! optional ground truth, and a shaded quantile band.

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 540.0;
const MARGIN: f64 = 50.0;

const CONTEXT_COLOR: &str = "#17becf";
const FORECAST_COLOR: &str = "#d62728";
const TRUTH_COLOR: &str = "#9467bd";
const BAND_COLOR: &str = "#ff7f0e";

pub struct ChartInput<'a> {
    pub title: &'a str,
    pub context: &'a [f64],
    pub point_forecast: &'a [f64],
    pub lower: Option<&'a [f64]>,
    pub upper: Option<&'a [f64]>,
    pub ground_truth: Option<&'a [f64]>,
}

pub fn render(input: &ChartInput) -> String {
    let total = input.context.len() + input.point_forecast.len();
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
         viewBox=\"0 0 {WIDTH} {HEIGHT}\">\n"
    ));
    svg.push_str(&format!(
        "  <rect width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"white\"/>\n"
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"30\" text-anchor=\"middle\" font-family=\"sans-serif\" \
         font-size=\"18\">{}</text>\n",
        WIDTH / 2.0,
        escape(input.title)
    ));

    if total < 2 {
        svg.push_str("</svg>\n");
        return svg;
    }

    let (min, max) = value_range(input);
    let scale = Scale {
        total,
        min,
        max,
    };

    // shaded band under everything else
    if let (Some(lower), Some(upper)) = (input.lower, input.upper) {
        if !lower.is_empty() && lower.len() == upper.len() {
            svg.push_str(&band_polygon(&scale, input.context.len(), lower, upper));
        }
    }

    svg.push_str(&polyline(&scale, 0, input.context, CONTEXT_COLOR, None));
    svg.push_str(&polyline(
        &scale,
        input.context.len(),
        input.point_forecast,
        FORECAST_COLOR,
        Some("6 3"),
    ));
    if let Some(truth) = input.ground_truth {
        svg.push_str(&polyline(&scale, input.context.len(), truth, TRUTH_COLOR, None));
    }

    // axes
    let x0 = MARGIN;
    let x1 = WIDTH - MARGIN;
    let y0 = HEIGHT - MARGIN;
    let y1 = MARGIN;
    svg.push_str(&format!(
        "  <line x1=\"{x0}\" y1=\"{y0}\" x2=\"{x1}\" y2=\"{y0}\" stroke=\"#333\"/>\n"
    ));
    svg.push_str(&format!(
        "  <line x1=\"{x0}\" y1=\"{y0}\" x2=\"{x0}\" y2=\"{y1}\" stroke=\"#333\"/>\n"
    ));

    svg.push_str("</svg>\n");
    svg
}

struct Scale {
    total: usize,
    min: f64,
    max: f64,
}

impl Scale {
    fn x(&self, index: usize) -> f64 {
        let span = (self.total - 1) as f64;
        MARGIN + (WIDTH - 2.0 * MARGIN) * index as f64 / span
    }

    fn y(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        let t = (value - self.min) / span;
        HEIGHT - MARGIN - (HEIGHT - 2.0 * MARGIN) * t
    }
}

fn value_range(input: &ChartInput) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut take = |values: &[f64]| {
        for &v in values {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
    };
    take(input.context);
    take(input.point_forecast);
    if let Some(lower) = input.lower {
        take(lower);
    }
    if let Some(upper) = input.upper {
        take(upper);
    }
    if let Some(truth) = input.ground_truth {
        take(truth);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        // flat series: pad so the scale stays finite
        return (min - 1.0, max + 1.0);
    }
    (min, max)
}

fn polyline(
    scale: &Scale,
    offset: usize,
    values: &[f64],
    color: &str,
    dash: Option<&str>,
) -> String {
    if values.is_empty() {
        return String::new();
    }
    let points: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| format!("{:.1},{:.1}", scale.x(offset + i), scale.y(v)))
        .collect();
    let dash_attr = dash
        .map(|d| format!(" stroke-dasharray=\"{d}\""))
        .unwrap_or_default();
    format!(
        "  <polyline points=\"{}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"2\"{dash_attr}/>\n",
        points.join(" ")
    )
}

fn band_polygon(scale: &Scale, offset: usize, lower: &[f64], upper: &[f64]) -> String {
    let mut points: Vec<String> = upper
        .iter()
        .enumerate()
        .map(|(i, &v)| format!("{:.1},{:.1}", scale.x(offset + i), scale.y(v)))
        .collect();
    points.extend(
        lower
            .iter()
            .enumerate()
            .rev()
            .map(|(i, &v)| format!("{:.1},{:.1}", scale.x(offset + i), scale.y(v))),
    );
    format!(
        "  <polygon points=\"{}\" fill=\"{BAND_COLOR}\" fill-opacity=\"0.25\" stroke=\"none\"/>\n",
        points.join(" ")
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_context_and_forecast() {
        let svg = render(&ChartInput {
            title: "Forecast",
            context: &[1.0, 2.0, 3.0],
            point_forecast: &[4.0, 5.0],
            lower: None,
            upper: None,
            ground_truth: None,
        });
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert_eq!(svg.matches("<polygon").count(), 0);
    }

    #[test]
    fn band_and_truth_add_elements() {
        let svg = render(&ChartInput {
            title: "Forecast <with band>",
            context: &[1.0, 2.0, 3.0],
            point_forecast: &[4.0, 5.0],
            lower: Some(&[3.0, 4.0]),
            upper: Some(&[5.0, 6.0]),
            ground_truth: Some(&[4.2, 4.9]),
        });
        assert_eq!(svg.matches("<polyline").count(), 3);
        assert_eq!(svg.matches("<polygon").count(), 1);
        assert!(svg.contains("Forecast &lt;with band&gt;"));
    }

    #[test]
    fn degenerate_inputs_still_produce_valid_svg() {
        let flat = render(&ChartInput {
            title: "Flat",
            context: &[5.0, 5.0, 5.0],
            point_forecast: &[5.0],
            lower: None,
            upper: None,
            ground_truth: None,
        });
        assert!(flat.contains("<polyline"));

        let empty = render(&ChartInput {
            title: "Empty",
            context: &[],
            point_forecast: &[1.0],
            lower: None,
            upper: None,
            ground_truth: None,
        });
        assert!(empty.trim_end().ends_with("</svg>"));
    }
}

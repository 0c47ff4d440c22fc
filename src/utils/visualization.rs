//! Visualization utilities for lti_mpc
//!
//! Time-series plots of closed-loop responses using gnuplot.

use gnuplot::{AxesCommon, Caption, Color, Figure, LineWidth};

use crate::common::{MpcError, MpcResult};

/// Color palette for consistent styling
pub mod colors {
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00AA00";
    pub const BLUE: &str = "#0000FF";
    pub const ORANGE: &str = "#FFA500";
    pub const PURPLE: &str = "#800080";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const SETPOINT: &str = GRAY;
    pub const OUTPUT: [&str; 4] = [BLUE, RED, GREEN, PURPLE];
    pub const INPUT: &str = ORANGE;
}

/// Style for a single time series
#[derive(Debug, Clone)]
pub struct SeriesStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl SeriesStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for SeriesStyle {
    fn default() -> Self {
        Self {
            color: colors::BLUE.to_string(),
            line_width: 2.0,
            caption: "Output".to_string(),
        }
    }
}

struct Series {
    x: Vec<f64>,
    y: Vec<f64>,
    style: SeriesStyle,
}

/// Collects series and renders them onto a single set of axes
pub struct Visualizer {
    series: Vec<Series>,
    title: String,
    x_label: String,
    y_label: String,
}

impl Visualizer {
    /// Create a new visualizer
    pub fn new() -> Self {
        Self {
            series: Vec::new(),
            title: String::new(),
            x_label: "Time [s]".to_string(),
            y_label: "Value".to_string(),
        }
    }

    /// Set the plot title
    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Set Y axis label
    pub fn set_y_label(&mut self, label: &str) -> &mut Self {
        self.y_label = label.to_string();
        self
    }

    /// Add a series; `x` and `y` are truncated to the shorter length
    pub fn plot_series(&mut self, x: &[f64], y: &[f64], style: &SeriesStyle) -> &mut Self {
        let len = x.len().min(y.len());
        self.series.push(Series {
            x: x[..len].to_vec(),
            y: y[..len].to_vec(),
            style: style.clone(),
        });
        self
    }

    /// Add a constant reference line over the span of `x`
    pub fn plot_setpoint(&mut self, x: &[f64], value: f64, caption: &str) -> &mut Self {
        let y = vec![value; x.len()];
        let style = SeriesStyle::new(colors::SETPOINT, caption).with_line_width(1.0);
        self.plot_series(x, &y, &style)
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Save plot to PNG file
    pub fn save_png(&self, path: &str, width: u32, height: u32) -> MpcResult<()> {
        let mut figure = self.render();
        figure
            .save_to_png(path, width, height)
            .map_err(|e| MpcError::Visualization(e.to_string()))
    }

    fn render(&self) -> Figure {
        let mut figure = Figure::new();
        {
            let axes = figure.axes2d();
            if !self.title.is_empty() {
                axes.set_title(&self.title, &[]);
            }
            axes.set_x_label(&self.x_label, &[]);
            axes.set_y_label(&self.y_label, &[]);

            for series in &self.series {
                axes.lines(
                    &series.x,
                    &series.y,
                    &[
                        Caption(series.style.caption.as_str()),
                        Color(series.style.color.as_str()),
                        LineWidth(series.style.line_width),
                    ],
                );
            }
        }
        figure
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

//! Time-series and distribution plots.

pub mod axis;
pub mod renderer;

pub use axis::{Autoscale, AxisMap, AxisRange, AxisScale, AxisSpec, Tick};
pub use renderer::{
    downsample_indices, Band, Highlight, Orientation, PlotLayout, PlotRenderer, PlotSeries, PlotSpec,
    RefValue, ReferenceLine, SeriesStyle,
};

//! Terminal plotting.

pub mod ascii;

pub use ascii::render_daily_chart;

//! Report generation port trait.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::SentitraderError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn render(&self, report: &BacktestReport) -> String;

    /// Default implementation: renders and writes the result to `output_path`.
    fn write(&self, report: &BacktestReport, output_path: &str) -> Result<(), SentitraderError> {
        std::fs::write(output_path, self.render(report))?;
        Ok(())
    }
}

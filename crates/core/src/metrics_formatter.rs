#![allow(clippy::format_push_string)]

use crate::report::BacktestReport;

pub struct MetricsFormatter;

impl MetricsFormatter {
    #[must_use]
    pub fn format(report: &BacktestReport) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!("  BACKTEST RESULTS: {}\n", report.strategy));
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output.push_str("Windows\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!(
            "Evaluated:             {}\n",
            report.windows_evaluated
        ));
        output.push_str(&format!("Failed:                {}\n", report.windows_failed));
        output.push('\n');

        output.push_str("Trade Statistics\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("Total Trades:          {}\n", report.trade_count));
        output.push_str(&format!(
            "Wins / Losses / BE:    {} / {} / {}\n",
            report.wins, report.losses, report.breakevens
        ));

        if report.trade_count > 0 {
            output.push_str(&format!(
                "Win Rate:              {:.2}%\n",
                report.win_rate * 100.0
            ));
        } else {
            output.push_str("Win Rate:              N/A (no trades)\n");
        }
        output.push_str(&format!("Total P/L (pts):       {:.2}\n", report.total_pnl));
        output.push_str(&format!("Average P/L (pts):     {:.2}\n", report.average_pnl));
        output.push_str(&format!("Max Drawdown (pts):    {:.2}\n", report.max_drawdown));

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        if !report.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &report.warnings {
                output.push_str(&format!("  - {warning}\n"));
            }
        }

        if report.trade_count == 0 {
            output.push_str("\n⚠️  No trades were made during this backtest.\n");
            output.push_str("    Consider adjusting strategy parameters or data range.\n\n");
        }

        output
    }
}

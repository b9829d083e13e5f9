use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::model::TaskTotals;

/// Terminal progress for a replay run: one overall bar plus a spinner for
/// the task in flight. Hidden when disabled (JSON output, non-tty).
pub struct ReplayProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    current: Option<ProgressBar>,
    enabled: bool,
}

impl ReplayProgress {
    pub fn new(total_tasks: usize, enabled: bool) -> Self {
        if !enabled {
            return Self {
                multi: MultiProgress::new(),
                overall: ProgressBar::hidden(),
                current: None,
                enabled: false,
            };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_tasks as u64));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}")
        {
            overall.set_style(style.progress_chars("█▓▒░  "));
        }
        overall.set_message("Starting...");

        Self {
            multi,
            overall,
            current: None,
            enabled: true,
        }
    }

    pub fn start_task(&mut self, title: &str) {
        if !self.enabled {
            return;
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.set_message(format!("⏳ {}", title));
        bar.enable_steady_tick(Duration::from_millis(100));
        if let Some(prev) = self.current.replace(bar) {
            prev.finish_and_clear();
        }
    }

    pub fn finish_task(&mut self, title: &str, status: &str, duration_ms: u64) {
        if !self.enabled {
            return;
        }

        if let Some(bar) = self.current.take() {
            let icon = match status {
                "success" => "✅",
                "error" => "❌",
                _ => "⏭",
            };
            bar.finish_with_message(format!("{} {} ({}ms)", icon, title, duration_ms));
        }
        self.overall.inc(1);
    }

    pub fn finish(&self, totals: &TaskTotals) {
        if !self.enabled {
            return;
        }
        self.overall.finish_with_message(format!(
            "{} ok, {} failed, {} other",
            totals.success, totals.error, totals.other
        ));
    }
}

impl Drop for ReplayProgress {
    fn drop(&mut self) {
        if let Some(bar) = self.current.take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_is_inert() {
        let mut progress = ReplayProgress::new(2, false);
        progress.start_task("a");
        progress.finish_task("a", "success", 10);
        progress.finish(&TaskTotals::default());
    }

    #[test]
    fn test_enabled_progress() {
        let mut progress = ReplayProgress::new(2, true);
        progress.start_task("a");
        progress.finish_task("a", "success", 10);
        progress.start_task("b");
        progress.finish_task("b", "error", 20);
        progress.finish(&TaskTotals {
            success: 1,
            error: 1,
            other: 0,
        });
    }
}

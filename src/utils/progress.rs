//! Progress reporting for index builds; no-op when the `progress` feature is
//! disabled or output is silenced

#[cfg(feature = "progress")]
pub use self::bars::BuildProgress;

#[cfg(not(feature = "progress"))]
pub use self::noop::BuildProgress;

#[cfg(feature = "progress")]
mod bars {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    /// Progress handle shown while populating an index
    #[derive(Clone)]
    pub struct BuildProgress {
        bar: Option<ProgressBar>,
    }

    impl BuildProgress {
        /// Bar over `len` documents, hidden when `silent`
        pub fn bar(len: u64, message: &'static str, silent: bool) -> Self {
            let bar = (!silent).then(|| {
                let pb = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
                ) {
                    pb.set_style(style.progress_chars("█▓▒░  "));
                }
                pb.set_message(message);
                pb
            });
            Self { bar }
        }

        /// Indeterminate spinner, hidden when `silent`
        pub fn spinner(message: &'static str, silent: bool) -> Self {
            let bar = (!silent).then(|| {
                let spinner = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                    spinner.set_style(style);
                }
                spinner.set_message(message);
                spinner.enable_steady_tick(Duration::from_millis(80));
                spinner
            });
            Self { bar }
        }

        pub fn inc(&self, delta: u64) {
            if let Some(bar) = &self.bar {
                bar.inc(delta);
            }
        }

        pub fn finish(&self, message: String) {
            if let Some(bar) = &self.bar {
                bar.finish_with_message(message);
            }
        }
    }
}

#[cfg(not(feature = "progress"))]
mod noop {
    /// No-op progress handle when the `progress` feature is disabled
    #[derive(Clone)]
    pub struct BuildProgress;

    impl BuildProgress {
        pub fn bar(_len: u64, _message: &'static str, _silent: bool) -> Self {
            BuildProgress
        }

        pub fn spinner(_message: &'static str, _silent: bool) -> Self {
            BuildProgress
        }

        pub fn inc(&self, _delta: u64) {}

        pub fn finish(&self, _message: String) {}
    }
}

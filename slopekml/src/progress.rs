use indicatif::{ProgressBar, ProgressStyle};

/// Returns a progress bar tracking resolved points.
pub fn bar(header: String, length: u64) -> ProgressBar {
    let pb = ProgressBar::new(length);
    pb.set_prefix(header);
    pb.set_style(
        ProgressStyle::with_template("{prefix}...\n[{wide_bar:.cyan/blue}] {pos}/{len}")
            .expect("incorrect progress bar format string")
            .progress_chars("#>-"),
    );
    pb
}

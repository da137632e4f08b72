// CLI command implementations

use indicatif::{ProgressBar, ProgressStyle};

pub mod languages;
pub mod process;
pub mod query;
pub mod serve;
pub mod stats;

/// Bar shared by the crawl and embedding phases; each phase resets its length.
pub(crate) fn progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message.to_string());
    pb
}

use crate::config::Config;
use crate::indexer::parser::Language;

pub fn list_languages(config: &Config) {
    let enabled = config.enabled_languages();

    println!("Supported languages:");
    for language in Language::ALL {
        let marker = if enabled.contains(&language) { "*" } else { " " };
        println!(
            "  {} {:<12} {}",
            marker,
            language.name(),
            language.extensions().join(", ")
        );
    }
    println!("\n* enabled in the current configuration");
}

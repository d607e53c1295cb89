use tracing::{info, warn};

/// Switch the message language, falling back to English for unknown locales
pub fn set_locale(locale: &str) {
    let locale = locale.trim();
    if rust_i18n::available_locales!()
        .iter()
        .any(|available| *available == locale)
    {
        rust_i18n::set_locale(locale);
        info!("Setting locale to {}", locale);
    } else {
        warn!("Unknown locale {}, using en", locale);
        rust_i18n::set_locale("en");
    }
}

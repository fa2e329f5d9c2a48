//! Interactive prompt utilities.

use dialoguer::{Password, theme::ColorfulTheme};

/// Prompt for a secret (hidden input).
pub fn password(prompt: &str) -> Result<String, dialoguer::Error> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
}

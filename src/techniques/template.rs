//! Template rendering for technique output.

use tera::{Context, Tera};

use crate::errors::TechniqueError;

/// Render a one-off template. Autoescaping is off since output is plain
/// prompt text.
pub fn render(template: &str, context: &Context) -> Result<String, TechniqueError> {
    Ok(Tera::one_off(template, context, false)?)
}

/// Prefix `noun` with "a" or "an".
pub fn with_article(noun: &str) -> String {
    let starts_with_vowel = noun
        .chars()
        .next()
        .map_or(false, |c| "aeiouAEIOU".contains(c));
    if starts_with_vowel {
        format!("an {}", noun)
    } else {
        format!("a {}", noun)
    }
}

//! `{{key}}` placeholder substitution for help and status text.

/// Replace every `{{key}}` in `template` with its value.
///
/// Unknown placeholders are left untouched.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{{{key}}}}}"), value)
    })
}

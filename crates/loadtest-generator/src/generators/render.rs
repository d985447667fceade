//! Placeholder substitution for payload templates.
//!
//! Supports placeholders:
//! - `{{message_id}}` - fresh UUID per rendered element
//! - `{{user_id}}` - simulated user id
//! - `{{run_id}}` - correlation id shared by the whole run
//! - `{{timestamp}}`, `{{original_timestamp}}`, `{{sent_at}}` - current time
//! - `{{events}}` - rendered sub-elements (batch envelopes only)
//!
//! Unknown placeholders are left untouched.

/// Values substituted into one rendered element.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub message_id: &'a str,
    pub user_id: &'a str,
    pub run_id: &'a str,
    pub timestamp: &'a str,
    pub events: Option<&'a str>,
}

impl Placeholders<'_> {
    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "message_id" => Some(self.message_id),
            "user_id" => Some(self.user_id),
            "run_id" => Some(self.run_id),
            "timestamp" | "original_timestamp" | "sent_at" => Some(self.timestamp),
            "events" => self.events,
            _ => None,
        }
    }
}

/// Render `template` into `out`.
pub fn render_into(template: &str, values: &Placeholders<'_>, out: &mut String) {
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            // Unterminated placeholder, copy verbatim.
            out.push_str(&rest[start..]);
            return;
        };

        let key = after_open[..end].trim();
        match values.lookup(key) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
}

/// Render `template` into a new string.
pub fn render(template: &str, values: &Placeholders<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    render_into(template, values, &mut out);
    out
}

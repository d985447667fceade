//! Batch envelope rendering.
//!
//! A batch payload is the `batch` template with `{{events}}` replaced by a
//! comma-separated list of rendered sub-elements.

use super::render::{render, render_into, Placeholders};
use super::uuid::new_message_id;
use crate::error::GeneratorError;
use std::sync::Arc;

/// Sub-element counts for `batch(page,track,identify)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchComposition {
    pub page: u32,
    pub track: u32,
    pub identify: u32,
}

impl BatchComposition {
    /// Composition from DSL values; missing values are 0.
    pub fn from_values(values: &[u32]) -> Result<Self, String> {
        if values.len() > 3 {
            return Err(format!(
                "batch takes at most 3 values (page,track,identify), got {}",
                values.len()
            ));
        }
        let composition = Self {
            page: values.first().copied().unwrap_or(0),
            track: values.get(1).copied().unwrap_or(0),
            identify: values.get(2).copied().unwrap_or(0),
        };
        if composition.total() == 0 {
            return Err("batch composition must contain at least one event".to_string());
        }
        Ok(composition)
    }

    pub fn total(&self) -> u64 {
        u64::from(self.page) + u64::from(self.track) + u64::from(self.identify)
    }
}

/// Templates needed to render a batch.
#[derive(Debug, Clone)]
pub struct BatchTemplates {
    pub envelope: Arc<str>,
    pub page: Option<Arc<str>>,
    pub track: Option<Arc<str>>,
    pub identify: Option<Arc<str>>,
}

impl BatchTemplates {
    fn sub_template(&self, name: &'static str) -> Result<&Arc<str>, GeneratorError> {
        let template = match name {
            "page" => self.page.as_ref(),
            "track" => self.track.as_ref(),
            _ => self.identify.as_ref(),
        };
        template.ok_or_else(|| GeneratorError::TemplateNotFound(name.to_string()))
    }

    /// Check that every template the composition references is present.
    pub fn validate(&self, composition: Option<&BatchComposition>) -> Result<(), GeneratorError> {
        match composition {
            None => self.sub_template("track").map(|_| ()),
            Some(c) => {
                for (name, count) in [("page", c.page), ("track", c.track), ("identify", c.identify)] {
                    if count > 0 {
                        self.sub_template(name)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Render a batch payload.
///
/// With a composition the sub-elements are `page` pages, then `track`
/// tracks, then `identify` identifies. Without one, `batch_count` track
/// elements are rendered. Templates must have been checked with
/// [`BatchTemplates::validate`]; missing ones render nothing.
pub fn render_batch(
    templates: &BatchTemplates,
    composition: Option<&BatchComposition>,
    batch_count: u32,
    user_id: &str,
    run_id: &str,
    timestamp: &str,
) -> String {
    let parts: Vec<(Option<&Arc<str>>, u32)> = match composition {
        Some(c) => vec![
            (templates.page.as_ref(), c.page),
            (templates.track.as_ref(), c.track),
            (templates.identify.as_ref(), c.identify),
        ],
        None => vec![(templates.track.as_ref(), batch_count)],
    };

    let mut events = String::new();
    let mut first = true;
    for (template, count) in parts {
        let Some(template) = template else { continue };
        for _ in 0..count {
            if !first {
                events.push(',');
            }
            first = false;
            let message_id = new_message_id();
            render_into(
                template,
                &Placeholders {
                    message_id: &message_id,
                    user_id,
                    run_id,
                    timestamp,
                    events: None,
                },
                &mut events,
            );
        }
    }

    let message_id = new_message_id();
    render(
        &templates.envelope,
        &Placeholders {
            message_id: &message_id,
            user_id,
            run_id,
            timestamp,
            events: Some(&events),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> BatchTemplates {
        BatchTemplates {
            envelope: Arc::from(r#"{"batch":[{{events}}],"sentAt":"{{sent_at}}"}"#),
            page: Some(Arc::from(r#"{"type":"page","messageId":"{{message_id}}"}"#)),
            track: Some(Arc::from(
                r#"{"type":"track","messageId":"{{message_id}}","userId":"{{user_id}}"}"#,
            )),
            identify: None,
        }
    }

    fn batch_types(payload: &str) -> Vec<String> {
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        value["batch"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_render_batch_count() {
        for n in [1u32, 2, 7] {
            let payload = render_batch(&templates(), None, n, "u1", "r1", "t");
            let types = batch_types(&payload);
            assert_eq!(types.len(), n as usize);
            assert!(types.iter().all(|t| t == "track"));
        }
    }

    #[test]
    fn test_render_batch_composition() {
        let composition = BatchComposition::from_values(&[2, 3]).unwrap();
        let payload = render_batch(&templates(), Some(&composition), 99, "u1", "r1", "t");
        assert_eq!(
            batch_types(&payload),
            vec!["page", "page", "track", "track", "track"]
        );
    }

    #[test]
    fn test_sub_elements_have_distinct_ids() {
        let payload = render_batch(&templates(), None, 3, "u1", "r1", "t");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        let ids: std::collections::HashSet<_> = value["batch"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["messageId"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_composition_from_values() {
        assert_eq!(
            BatchComposition::from_values(&[1]).unwrap(),
            BatchComposition {
                page: 1,
                track: 0,
                identify: 0
            }
        );
        assert_eq!(BatchComposition::from_values(&[1, 2, 3]).unwrap().total(), 6);
        assert!(BatchComposition::from_values(&[0, 0]).is_err());
        assert!(BatchComposition::from_values(&[1, 1, 1, 1]).is_err());
    }

    #[test]
    fn test_validate_templates() {
        let t = templates();
        assert!(t.validate(None).is_ok());
        assert!(t
            .validate(Some(&BatchComposition::from_values(&[1, 1]).unwrap()))
            .is_ok());
        assert!(matches!(
            t.validate(Some(&BatchComposition::from_values(&[0, 0, 1]).unwrap())),
            Err(GeneratorError::TemplateNotFound(name)) if name == "identify"
        ));
    }
}

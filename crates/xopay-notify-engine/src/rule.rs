//! Notification rule types.

use serde::{Deserialize, Serialize};

/// A persisted notification rule: a bundle of templates describing when
/// and how to notify.
///
/// Every `*_template` field uses `{{ expr }}` placeholders with dotted-path
/// access into the triggering event. `case_regex` is stored verbatim and
/// compiled lazily at match time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotifyRule {
    pub id: String,
    pub name: String,
    pub case_regex: String,
    pub case_template: String,
    pub header_template: String,
    pub body_template: String,
    pub subscribers_template: String,
}

impl NotifyRule {
    /// Field-length validation applied at the admin surface.
    ///
    /// Returns one message per violated field.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        check_len("name", &self.name, 4, 50, &mut errors);
        check_len("case_regex", &self.case_regex, 2, 255, &mut errors);
        check_len("case_template", &self.case_template, 2, 255, &mut errors);
        check_len("header_template", &self.header_template, 2, 255, &mut errors);
        check_len("body_template", &self.body_template, 2, 255, &mut errors);
        check_len(
            "subscribers_template",
            &self.subscribers_template,
            2,
            255,
            &mut errors,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check_len(field: &str, value: &str, min: usize, max: usize, errors: &mut Vec<String>) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(format!("{field} length must be between {min} and {max}"));
    }
}

/// A rule after its templates are applied to one event. Lives only for the
/// duration of that event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotifyNode {
    pub id: String,
    pub name: String,
    pub case_regex: String,
    pub case: String,
    pub header: String,
    pub body: String,
    pub subscribers: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> NotifyRule {
        NotifyRule {
            id: "r-1".to_string(),
            name: "errors".to_string(),
            case_regex: "status: 500".to_string(),
            case_template: "status: {{ query.status_code }}".to_string(),
            header_template: "Server error".to_string(),
            body_template: "Path {{ query.path }}".to_string(),
            subscribers_template: "group:admin".to_string(),
        }
    }

    #[test]
    fn test_valid_rule_passes() {
        assert!(rule().validate().is_ok());
    }

    #[test]
    fn test_short_name_rejected() {
        let mut bad = rule();
        bad.name = "abc".to_string();
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("name"));
    }

    #[test]
    fn test_overlong_template_rejected() {
        let mut bad = rule();
        bad.body_template = "x".repeat(256);
        assert!(bad.validate().is_err());
    }
}

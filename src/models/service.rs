use serde::{Deserialize, Serialize};

/// A bookable catalog entry. Copied into the wizard by value when chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(alias = "price_cents")]
    pub price_cents: u32,
    #[serde(default, alias = "duration_minutes", skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Replaces the business-wide buffer for bookings of this service.
    #[serde(default, alias = "buffer_minutes", skip_serializing_if = "Option::is_none")]
    pub buffer_minutes: Option<u32>,
}

impl Service {
    pub fn price_display(&self) -> String {
        format_cents(self.price_cents)
    }

    pub fn duration_display(&self) -> Option<String> {
        self.duration_minutes.map(format_duration)
    }
}

/// `3500` -> `"$35.00"`
pub fn format_cents(cents: u32) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// `45` -> `"45 min"`, `90` -> `"1h 30m"`, `120` -> `"2h"`
pub fn format_duration(minutes: u32) -> String {
    if minutes < 60 {
        return format!("{minutes} min");
    }
    let h = minutes / 60;
    let m = minutes % 60;
    if m == 0 {
        format!("{h}h")
    } else {
        format!("{h}h {m}m")
    }
}

/// Catalog offered in preview mode, when no business is configured.
pub fn demo_catalog() -> Vec<Service> {
    let entry = |id: &str, name: &str, description: &str, price_cents, minutes, category: &str| Service {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        price_cents,
        duration_minutes: Some(minutes),
        category: Some(category.to_string()),
        buffer_minutes: None,
    };

    vec![
        entry("demo_consultation", "Consultation", "First visit and assessment", 7500, 60, "Consultations"),
        entry("demo_follow_up", "Follow-up", "Short progress check", 5000, 30, "Consultations"),
        entry("demo_full_session", "Full Session", "Complete treatment session", 15000, 90, "Treatments"),
        entry("demo_signature", "Signature Package", "Extended premium session", 25000, 120, "Treatments"),
        entry("demo_express", "Express", "Quick focused visit", 3500, 20, "Express"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(7500), "$75.00");
        assert_eq!(format_cents(3505), "$35.05");
        assert_eq!(format_cents(0), "$0.00");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45 min");
        assert_eq!(format_duration(60), "1h");
        assert_eq!(format_duration(90), "1h 30m");
    }

    #[test]
    fn test_deserialize_snake_case_fields() {
        let json = r#"{"id":"s1","name":"Cut","price_cents":2500,"duration_minutes":30}"#;
        let service: Service = serde_json::from_str(json).unwrap();
        assert_eq!(service.price_cents, 2500);
        assert_eq!(service.duration_minutes, Some(30));
        assert_eq!(service.category, None);
        assert_eq!(service.buffer_minutes, None);
    }

    #[test]
    fn test_demo_catalog_has_consultation() {
        let catalog = demo_catalog();
        let consultation = catalog.iter().find(|s| s.name == "Consultation").unwrap();
        assert_eq!(consultation.price_display(), "$75.00");
        assert_eq!(consultation.duration_minutes, Some(60));
    }
}

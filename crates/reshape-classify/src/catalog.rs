//! The default detector catalog.
//!
//! Each entry is a flat data definition: taxonomy position, column-name
//! keywords, applicability gate, and the weighted checks. Specializations
//! repeat their family's base check (numeric or string-type) so their
//! average reflects the whole bundle.

use std::sync::Arc;

use crate::check::{Check, CheckKind};
use crate::detector::{Applicability, Detector};
use crate::registry::DetectorRegistry;

fn numeric_check() -> Check {
    Check::new("numeric_check", 0.5, CheckKind::Numeric)
}

fn string_check() -> Check {
    Check::new("string_check", 0.5, CheckKind::StringType)
}

fn length_variance(max: f64) -> Check {
    Check::new(
        "length_variance_check",
        1.1,
        CheckKind::LengthVariance { min: 0.0, max: Some(max) },
    )
}

fn uniqueness_min(min: f64) -> Check {
    Check::new("uniqueness_check", 1.0, CheckKind::Uniqueness { min, max: None })
}

/// Register the full catalog into `registry`.
pub fn install_default_detectors(registry: &Arc<DetectorRegistry>) {
    // Roots.
    registry.register(Detector::new(
        "text",
        None,
        &[],
        Applicability::TextShare(0.1),
        vec![string_check()],
    ));
    registry.register(Detector::new(
        "boolean",
        None,
        &[],
        Applicability::Always,
        vec![Check::new("boolean_check", 0.5, CheckKind::Boolean)],
    ));
    registry.register(Detector::new(
        "numeric",
        None,
        &[],
        Applicability::AnyNumeric,
        vec![numeric_check()],
    ));
    registry.register(Detector::new(
        "date",
        None,
        &["date"],
        Applicability::Always,
        vec![Check::new("date_check", 1.0, CheckKind::Date)],
    ));

    // Numeric specializations.
    registry.register(Detector::new(
        "duns",
        Some("numeric"),
        &["duns"],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::pattern("duns_check", 1.0, r"^\d{9}$"),
            Check::pattern("duns_hyphen_check", 1.6, r"^\d{2}-\d{3}-\d{4}$"),
            length_variance(0.1),
            uniqueness_min(0.8),
        ],
    ));
    registry.register(Detector::new(
        "numerical_category",
        Some("numeric"),
        &[],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::new(
                "variance_check",
                1.0,
                CheckKind::Variance { min: 0.0, max: 0.2 },
            ),
            Check::new(
                "uniqueness_check",
                1.0,
                CheckKind::Uniqueness { min: 0.0, max: Some(0.1) },
            ),
        ],
    ));
    registry.register(Detector::new(
        "zip_code",
        Some("numeric"),
        &["zip", "postal"],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::pattern("zip_code_check", 1.0, r"^\d{5}(-\d{4})?$"),
            Check::pattern("zip_code_5_digit_check", 1.2, r"^\d{5}$"),
            length_variance(0.1),
            uniqueness_min(0.8),
        ],
    ));
    registry.register(Detector::new(
        "phone_number",
        Some("numeric"),
        &["phone"],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::pattern(
                "phone_number_check",
                0.75,
                r"^(?:\+?\d{1,3}[-.\s]?)?(?:\(?\d{2,4}\)?[-.\s]?)?\d{3,4}[-.\s]?\d{4}$",
            ),
            length_variance(0.1),
            uniqueness_min(0.8),
        ],
    ));
    registry.register(Detector::new(
        "nordic_registration_number",
        Some("numeric"),
        &[],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::pattern(
                "nordic_registration_number_check",
                0.5,
                r"^(?:\d{7}-\d|\d{8}|\d{9}|\d{10}|(16|[2-9]\d)\d{6}-?\d{4})$",
            ),
            length_variance(0.1),
            uniqueness_min(0.8),
        ],
    ));

    // Country specializations of the Nordic registration number.
    registry.register(Detector::new(
        "swedish_registration_number",
        Some("nordic_registration_number"),
        &[],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::pattern(
                "swedish_registration_number_check",
                1.0,
                r"^(16)?\d{6}(-)?\d{4}$",
            ),
            length_variance(0.1),
            uniqueness_min(0.8),
        ],
    ));
    registry.register(Detector::new(
        "norwegian_registration_number",
        Some("nordic_registration_number"),
        &[],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::pattern("norwegian_registration_number_check", 0.75, r"^\d{9}$"),
            length_variance(0.1),
            uniqueness_min(0.8),
        ],
    ));
    registry.register(Detector::new(
        "finnish_registration_number",
        Some("nordic_registration_number"),
        &[],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::pattern("finnish_registration_number_check", 1.0, r"^\d{7}-\d$"),
            length_variance(0.01),
            uniqueness_min(0.8),
        ],
    ));
    registry.register(Detector::new(
        "danish_registration_number",
        Some("nordic_registration_number"),
        &[],
        Applicability::AnyNumeric,
        vec![
            numeric_check(),
            Check::pattern("danish_registration_number_check", 0.75, r"^\d{8}$"),
            length_variance(0.01),
            uniqueness_min(0.8),
        ],
    ));

    // Text specializations.
    registry.register(Detector::new(
        "name",
        Some("text"),
        &["name"],
        Applicability::Always,
        vec![
            Check::new("name_alpha_check", 1.0, CheckKind::AlphaTokens),
            Check::new(
                "name_length",
                1.0,
                CheckKind::Length { min: 3, max: Some(50) },
            ),
        ],
    ));
    registry.register(Detector::new(
        "company_name",
        Some("text"),
        &["company", "business", "organization"],
        Applicability::TextShare(0.1),
        vec![
            string_check(),
            Check::pattern("company_name_pattern", 1.5, r"^[A-Za-z0-9\s&.,-]+$"),
            Check::new(
                "company_name_length",
                1.0,
                CheckKind::Length { min: 3, max: Some(100) },
            ),
        ],
    ));
    registry.register(Detector::new(
        "country_name",
        Some("text"),
        &["country", "nation", "state"],
        Applicability::TextShare(0.1),
        vec![
            string_check(),
            Check::pattern("country_name_pattern", 1.5, r"^[A-Za-z\s-]+$"),
            Check::new(
                "country_name_length",
                1.0,
                CheckKind::Length { min: 3, max: Some(50) },
            ),
        ],
    ));
    registry.register(Detector::new(
        "country_code",
        Some("text"),
        &["country", "iso"],
        Applicability::TextShare(0.1),
        vec![
            string_check(),
            Check::pattern("country_code", 2.0, r"^[A-Z]{2}$"),
            Check::new(
                "country_code_length",
                1.5,
                CheckKind::Length { min: 2, max: Some(2) },
            ),
        ],
    ));
    registry.register(Detector::new(
        "currency_code",
        Some("text"),
        &["currency", "iso4217"],
        Applicability::TextShare(0.1),
        vec![
            string_check(),
            Check::pattern("currency_code", 2.0, r"^[A-Z]{3}$"),
            Check::new(
                "currency_code_length",
                1.5,
                CheckKind::Length { min: 3, max: Some(3) },
            ),
        ],
    ));
    registry.register(Detector::new(
        "text_category",
        Some("text"),
        &["category", "type", "classification"],
        Applicability::TextShare(0.1),
        vec![
            string_check(),
            Check::pattern("text_category_pattern", 1.5, r"^[A-Za-z\s]+$"),
            Check::new(
                "text_category_length",
                1.0,
                CheckKind::Length { min: 3, max: Some(50) },
            ),
        ],
    ));
    registry.register(Detector::new(
        "email",
        Some("text"),
        &["email", "e-mail"],
        Applicability::TextShare(0.1),
        vec![
            string_check(),
            Check::pattern("email_check", 1.5, r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$"),
            uniqueness_min(0.8),
        ],
    ));
}

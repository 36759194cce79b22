//! Property-based tests for offline validation
//!
//! Run with: cargo test --test proptest_validation

use googlebigquery::validation::{
    check_field_mode, check_field_type, check_resource_id, validate_credentials, FIELD_MODES,
    FIELD_TYPES,
};
use googlebigquery::ProviderError;
use proptest::prelude::*;

fn service_account_json(email: &str, key: &str, key_id: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "private_key_id": key_id,
        "private_key": key,
        "client_email": email,
        "client_id": "1234567890",
        "project_id": "my-project"
    })
    .to_string()
}

proptest! {
    /// Any well-formed service account blob passes with no diagnostics
    #[test]
    fn valid_service_account_has_no_diagnostics(
        user in "[a-z][a-z0-9-]{0,20}",
        key in "[ -~]{1,64}",
        key_id in "[a-f0-9]{8,40}",
    ) {
        let email = format!("{}@my-project.iam.gserviceaccount.com", user);
        let diags = validate_credentials(&service_account_json(&email, &key, &key_id));
        prop_assert!(diags.is_empty(), "unexpected diagnostics: {}", diags);
    }

    /// Text that is not a JSON object fails and names the offending value
    #[test]
    fn malformed_credentials_report_contents(value in "[a-zA-Z~/.][a-zA-Z0-9 _./-]{0,40}") {
        let diags = validate_credentials(&value);
        prop_assert_eq!(diags.errors.len(), 1);
        match &diags.errors[0] {
            ProviderError::CredentialParse { contents, .. } => prop_assert_eq!(contents, &value),
            other => prop_assert!(false, "expected CredentialParse, got {:?}", other),
        }
        prop_assert!(diags.errors[0].to_string().contains(&value));
    }

    /// Credentials missing either required key are rejected
    #[test]
    fn missing_required_key_fails(drop_email in any::<bool>(), key in "[ -~]{1,32}") {
        let mut value: serde_json::Value = serde_json::from_str(
            &service_account_json("sa@p.iam.gserviceaccount.com", &key, "abc123"),
        ).unwrap();
        let object = value.as_object_mut().unwrap();
        if drop_email {
            object.remove("client_email");
        } else {
            object.remove("private_key");
        }

        let diags = validate_credentials(&value.to_string());
        prop_assert!(diags.has_errors());
    }

    /// Ids made of letters, digits and underscores are accepted
    #[test]
    fn resource_id_accepts_word_characters(id in "[A-Za-z0-9_]{1,100}") {
        prop_assert!(check_resource_id(&id).is_ok());
    }

    /// Any other character is rejected
    #[test]
    fn resource_id_rejects_other_characters(
        prefix in "[A-Za-z0-9_]{0,10}",
        bad in "[-.: /$@]",
        suffix in "[A-Za-z0-9_]{0,10}",
    ) {
        let id = format!("{}{}{}", prefix, bad, suffix);
        prop_assert!(check_resource_id(&id).is_err());
    }

    /// Known types and modes are accepted in any letter case
    #[test]
    fn types_and_modes_case_insensitive(
        type_index in 0..FIELD_TYPES.len(),
        mode_index in 0..FIELD_MODES.len(),
        lower in any::<bool>(),
    ) {
        let case = |s: &str| if lower { s.to_ascii_lowercase() } else { s.to_string() };
        prop_assert!(check_field_type(&case(FIELD_TYPES[type_index])).is_ok());
        prop_assert!(check_field_mode(&case(FIELD_MODES[mode_index])).is_ok());
    }

    /// Unknown type names are rejected
    #[test]
    fn unknown_types_rejected(value in "[a-z]{1,12}") {
        prop_assume!(!FIELD_TYPES.iter().any(|t| t.eq_ignore_ascii_case(&value)));
        prop_assert!(check_field_type(&value).is_err());
    }
}

#[test]
fn empty_id_rejected() {
    assert!(check_resource_id("").is_err());
    assert!(check_resource_id(&"a".repeat(1025)).is_err());
    assert!(check_resource_id(&"a".repeat(1024)).is_ok());
}

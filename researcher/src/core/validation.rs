//! Quality gates applied before facts reach the store.

use thiserror::Error;

/// A candidate fact was dropped on purpose. Not an error for the loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationRejection {
    #[error("contact has neither a name nor an email")]
    EmptyContact,
}

/// Accept a contact only when it names a person/role or gives an email.
///
/// A phone number alone is not enough: form labels such as "Phone *" and
/// generic switchboard numbers are common on contact pages.
pub fn validate_contact(name: &str, email: &str) -> Result<(), ValidationRejection> {
    if name.trim().is_empty() && email.trim().is_empty() {
        return Err(ValidationRejection::EmptyContact);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_name_and_email() {
        assert_eq!(
            validate_contact("", ""),
            Err(ValidationRejection::EmptyContact)
        );
        assert_eq!(
            validate_contact(" \t", "  "),
            Err(ValidationRejection::EmptyContact)
        );
    }

    #[test]
    fn accepts_name_or_email() {
        assert!(validate_contact("Jane Doe", "").is_ok());
        assert!(validate_contact("", "sales@acme.example").is_ok());
        assert!(validate_contact("Sales Team", "sales@acme.example").is_ok());
    }
}

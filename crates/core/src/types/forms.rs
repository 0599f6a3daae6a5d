//! Form schemas and their validation rules.
//!
//! Both the storefront and the accounts API validate with these, so the
//! messages a shopper sees are the same whichever side rejects the input.
//! Lengths are counted in characters, not bytes.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::email::Email;

static EXPIRATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("Invalid regex"));

/// Per-field validation messages. Holds the first failure for each field.
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[error("{} field(s) failed validation", .0.len())]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless the field already failed.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// Message for `field`, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The first message in field-name order, for one-line summaries.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn check_required(errors: &mut FieldErrors, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.add(field, message);
    }
}

fn check_email(errors: &mut FieldErrors, value: &str) {
    if Email::parse(value).is_err() {
        errors.add("email", "Email is invalid");
    }
}

fn check_password(errors: &mut FieldErrors, value: &str) {
    let len = char_len(value);
    if len < 6 {
        errors.add("password", "Password must be at least 6 characters long");
    } else if len > 20 {
        errors.add("password", "Password can't be more than 20 characters long");
    }
}

/// Shipping details collected at checkout step 2.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
}

impl ShippingForm {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        check_required(&mut errors, "name", &self.name, "Name is required");

        check_required(&mut errors, "email", &self.email, "Email is required");
        check_email(&mut errors, &self.email);

        let phone_len = char_len(&self.phone);
        if phone_len < 7 {
            errors.add("phone", "Phone number must be at least 7 digits");
        } else if phone_len > 10 {
            errors.add("phone", "Phone number can't be more than 10 digits");
        } else if !self.phone.chars().all(|c| c.is_ascii_digit()) {
            errors.add("phone", "Phone number must contain only numbers");
        }

        check_required(&mut errors, "address", &self.address, "Address is required");
        check_required(&mut errors, "city", &self.city, "City is required");

        errors.into_result()
    }
}

/// Card details collected at checkout step 3. Never stored.
#[derive(Clone, Default, Deserialize)]
pub struct PaymentForm {
    #[serde(default)]
    pub card_holder: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub expiration_date: String,
    #[serde(default)]
    pub cvv: String,
}

impl PaymentForm {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        check_required(
            &mut errors,
            "card_holder",
            &self.card_holder,
            "Cardholder is required",
        );

        if char_len(&self.card_number) != 16 {
            errors.add("card_number", "Card Number is required");
        }

        if !EXPIRATION_RE.is_match(&self.expiration_date) {
            errors.add("expiration_date", "Expiration date must be MM/YY format");
        }

        if char_len(&self.cvv) != 3 {
            errors.add("cvv", "CVV is required");
        }

        errors.into_result()
    }
}

impl fmt::Debug for PaymentForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentForm")
            .field("card_holder", &"[REDACTED]")
            .field("card_number", &"[REDACTED]")
            .field("expiration_date", &"[REDACTED]")
            .field("cvv", &"[REDACTED]")
            .finish()
    }
}

/// Credentials submitted on the login page.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Details submitted on the registration page.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterForm {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        let name_len = char_len(self.name.trim());
        if name_len < 2 {
            errors.add("name", "Name must be at least 2 characters long");
        } else if name_len > 100 {
            errors.add("name", "Name can't be more than 100 characters long");
        }

        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);

        errors.into_result()
    }
}

impl fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shipping() -> ShippingForm {
        ShippingForm {
            name: "John Doe".to_string(),
            email: "john@doe.com".to_string(),
            phone: "1234567".to_string(),
            address: "123 Main St".to_string(),
            city: "New York".to_string(),
        }
    }

    fn payment() -> PaymentForm {
        PaymentForm {
            card_holder: "John Doe".to_string(),
            card_number: "4242424242424242".to_string(),
            expiration_date: "12/27".to_string(),
            cvv: "123".to_string(),
        }
    }

    #[test]
    fn test_shipping_valid() {
        assert!(shipping().validate().is_ok());
        let mut form = shipping();
        form.phone = "1234567890".to_string();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_shipping_reports_every_field() {
        let errors = ShippingForm::default().validate().unwrap_err();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(
            errors.get("phone"),
            Some("Phone number must be at least 7 digits")
        );
        assert_eq!(errors.get("address"), Some("Address is required"));
        assert_eq!(errors.get("city"), Some("City is required"));
    }

    #[test]
    fn test_shipping_phone_rules() {
        let mut form = shipping();
        form.phone = "12345678901".to_string();
        assert_eq!(
            form.validate().unwrap_err().get("phone"),
            Some("Phone number can't be more than 10 digits")
        );

        form.phone = "555-1234".to_string();
        assert_eq!(
            form.validate().unwrap_err().get("phone"),
            Some("Phone number must contain only numbers")
        );
    }

    #[test]
    fn test_shipping_invalid_email() {
        let mut form = shipping();
        form.email = "not-an-email".to_string();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is invalid"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_payment_valid() {
        assert!(payment().validate().is_ok());
    }

    #[test]
    fn test_payment_rules() {
        let mut form = payment();
        form.card_number = "4242".to_string();
        form.expiration_date = "13/27".to_string();
        form.cvv = "12".to_string();
        form.card_holder = " ".to_string();

        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("card_holder"), Some("Cardholder is required"));
        assert_eq!(errors.get("card_number"), Some("Card Number is required"));
        assert_eq!(
            errors.get("expiration_date"),
            Some("Expiration date must be MM/YY format")
        );
        assert_eq!(errors.get("cvv"), Some("CVV is required"));
    }

    #[test]
    fn test_expiration_format() {
        let mut form = payment();
        for ok in ["01/25", "09/30", "12/99"] {
            form.expiration_date = ok.to_string();
            assert!(form.validate().is_ok(), "{ok}");
        }
        for bad in ["00/25", "1/25", "12/2025", "12-25", ""] {
            form.expiration_date = bad.to_string();
            assert!(form.validate().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_payment_debug_redacts() {
        let debug = format!("{:?}", payment());
        assert!(!debug.contains("4242"));
        assert!(!debug.contains("123"));
    }

    #[test]
    fn test_login_rules() {
        let form = LoginForm {
            email: "john@doe.com".to_string(),
            password: "secret1".to_string(),
        };
        assert!(form.validate().is_ok());

        let form = LoginForm {
            email: "john".to_string(),
            password: "12345".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is invalid"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters long")
        );

        let form = LoginForm {
            email: "john@doe.com".to_string(),
            password: "x".repeat(21),
        };
        assert_eq!(
            form.validate().unwrap_err().get("password"),
            Some("Password can't be more than 20 characters long")
        );
    }

    #[test]
    fn test_register_name_length() {
        let mut form = RegisterForm {
            name: "J".to_string(),
            email: "john@doe.com".to_string(),
            password: "secret1".to_string(),
        };
        assert_eq!(
            form.validate().unwrap_err().get("name"),
            Some("Name must be at least 2 characters long")
        );

        form.name = "J".repeat(101);
        assert_eq!(
            form.validate().unwrap_err().get("name"),
            Some("Name can't be more than 100 characters long")
        );

        form.name = "Jo".to_string();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_password_counts_characters() {
        let form = LoginForm {
            email: "john@doe.com".to_string(),
            password: "ééééé".to_string(),
        };
        assert!(form.validate().is_err());
        let form = LoginForm {
            email: "john@doe.com".to_string(),
            password: "éééééé".to_string(),
        };
        assert!(form.validate().is_ok());
    }
}

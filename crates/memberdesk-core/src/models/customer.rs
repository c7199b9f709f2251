use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::fee::{self, FeeStatus};

/// Stable customer identifier.
///
/// The service sends ids as numbers, while UI forms hand them over as text.
/// Both deserialize into the same integer so comparisons never depend on
/// where an id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CustomerId(pub i64);

impl CustomerId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for CustomerId {
    fn from(id: i64) -> Self {
        CustomerId(id)
    }
}

impl FromStr for CustomerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(CustomerId)
    }
}

impl<'de> Deserialize<'de> for CustomerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl<'de> de::Visitor<'de> for IdVisitor {
            type Value = CustomerId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer id or a string holding one")
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
                Ok(CustomerId(v))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                i64::try_from(v)
                    .map(CustomerId)
                    .map_err(|_| E::custom(format!("customer id {} out of range", v)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                    Ok(CustomerId(v as i64))
                } else {
                    Err(E::custom(format!("customer id {} is not an integer", v)))
                }
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                v.parse()
                    .map_err(|_| E::custom(format!("customer id {:?} is not an integer", v)))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Anything a caller may use to address a customer.
///
/// Implemented for integers and text so that an id typed into a form and
/// an id read from the service address the same entry.
pub trait CustomerKey: fmt::Display {
    /// Normalize to an integer id, or `None` if the key is not numeric.
    fn to_customer_id(&self) -> Option<CustomerId>;
}

impl CustomerKey for CustomerId {
    fn to_customer_id(&self) -> Option<CustomerId> {
        Some(*self)
    }
}

impl CustomerKey for i64 {
    fn to_customer_id(&self) -> Option<CustomerId> {
        Some(CustomerId(*self))
    }
}

impl CustomerKey for i32 {
    fn to_customer_id(&self) -> Option<CustomerId> {
        Some(CustomerId(i64::from(*self)))
    }
}

impl CustomerKey for u32 {
    fn to_customer_id(&self) -> Option<CustomerId> {
        Some(CustomerId(i64::from(*self)))
    }
}

impl CustomerKey for u64 {
    fn to_customer_id(&self) -> Option<CustomerId> {
        i64::try_from(*self).ok().map(CustomerId)
    }
}

impl CustomerKey for str {
    fn to_customer_id(&self) -> Option<CustomerId> {
        self.parse().ok()
    }
}

impl CustomerKey for String {
    fn to_customer_id(&self) -> Option<CustomerId> {
        self.as_str().to_customer_id()
    }
}

impl<T: CustomerKey + ?Sized> CustomerKey for &T {
    fn to_customer_id(&self) -> Option<CustomerId> {
        (**self).to_customer_id()
    }
}

/// A member record.
///
/// Alternate spellings the service (or older exports) use are folded into
/// one canonical field set when deserializing; fields the core does not
/// know about are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Customer {
    #[cfg_attr(feature = "ts", ts(type = "number"))]
    pub id: CustomerId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub membership_type: Option<String>,
    pub monthly_fee: Option<f64>,
    pub join_date: Option<String>,
    pub next_due_date: Option<String>,
    pub last_payment_date: Option<String>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for Customer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawCustomer::deserialize(deserializer)?;
        let profile = raw.profile.normalize();
        Ok(Customer {
            id: raw.id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            phone: profile.phone,
            address: profile.address,
            membership_type: profile.membership_type,
            monthly_fee: profile.monthly_fee,
            join_date: profile.join_date,
            next_due_date: profile.next_due_date,
            last_payment_date: profile.last_payment_date,
            image_url: profile.image_url,
            notes: profile.notes,
            extra: profile.extra,
        })
    }
}

impl Customer {
    /// Minimal record with only an id, mostly useful for building fixtures.
    pub fn new(id: i64) -> Self {
        Self {
            id: CustomerId(id),
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            address: None,
            membership_type: None,
            monthly_fee: None,
            join_date: None,
            next_due_date: None,
            last_payment_date: None,
            image_url: None,
            notes: None,
            extra: Map::new(),
        }
    }

    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{} {}", first, last),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (true, true) => format!("Customer #{}", self.id),
        }
    }

    /// "Last, First" for sorted lists
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{}, {}", last, first)
            }
            _ => self.full_name(),
        }
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due_date.as_deref().and_then(fee::parse_date)
    }

    pub fn last_payment(&self) -> Option<DateTime<Utc>> {
        self.last_payment_date.as_deref().and_then(fee::parse_date)
    }

    pub fn fee_status(&self, now: DateTime<Utc>) -> FeeStatus {
        fee::classify(self.next_due(), self.last_payment(), now)
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().map(|u| !u.is_empty()).unwrap_or(false)
    }
}

/// Payload for creating or updating a customer.
///
/// Only fields that are set are sent, so an update can patch a subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for CustomerDraft {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let profile = RawProfile::deserialize(deserializer)?.normalize();
        let mut extra = profile.extra;
        // A draft has no image field; keep one the caller sent rather than dropping it
        if let Some(image_url) = profile.image_url {
            extra.insert("image_url".to_string(), Value::String(image_url));
        }
        Ok(CustomerDraft {
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            phone: profile.phone,
            address: profile.address,
            membership_type: profile.membership_type,
            monthly_fee: profile.monthly_fee,
            join_date: profile.join_date,
            next_due_date: profile.next_due_date,
            last_payment_date: profile.last_payment_date,
            notes: profile.notes,
            extra,
        })
    }
}

#[derive(Deserialize)]
struct RawCustomer {
    id: CustomerId,
    #[serde(flatten)]
    profile: RawProfile,
}

// Every spelling is its own field: serde aliases reject a record that carries
// two spellings of one field, even when one of them is null.
#[derive(Default, Deserialize)]
#[serde(default)]
struct RawProfile {
    first_name: Option<String>,
    #[serde(rename = "firstName")]
    first_name_camel: Option<String>,
    last_name: Option<String>,
    #[serde(rename = "lastName")]
    last_name_camel: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    #[serde(rename = "phoneNumber")]
    phone_number: Option<String>,
    address: Option<String>,
    membership_type: Option<String>,
    #[serde(rename = "membershipType")]
    membership_type_camel: Option<String>,
    plan: Option<String>,
    #[serde(deserialize_with = "deserialize_amount")]
    monthly_fee: Option<f64>,
    #[serde(rename = "monthlyFee", deserialize_with = "deserialize_amount")]
    monthly_fee_camel: Option<f64>,
    join_date: Option<String>,
    #[serde(rename = "joinDate")]
    join_date_camel: Option<String>,
    joined_at: Option<String>,
    #[serde(deserialize_with = "deserialize_date_string")]
    next_due_date: Option<String>,
    #[serde(rename = "nextDueDate", deserialize_with = "deserialize_date_string")]
    next_due_date_camel: Option<String>,
    #[serde(deserialize_with = "deserialize_date_string")]
    last_payment_date: Option<String>,
    #[serde(rename = "lastPaymentDate", deserialize_with = "deserialize_date_string")]
    last_payment_date_camel: Option<String>,
    #[serde(deserialize_with = "deserialize_date_string")]
    fee_paid_date: Option<String>,
    #[serde(rename = "feePaidDate", deserialize_with = "deserialize_date_string")]
    fee_paid_date_camel: Option<String>,
    image_url: Option<String>,
    #[serde(rename = "imageUrl")]
    image_url_camel: Option<String>,
    image: Option<String>,
    profile_image: Option<String>,
    notes: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Canonical profile fields after folding spellings together.
struct Profile {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    membership_type: Option<String>,
    monthly_fee: Option<f64>,
    join_date: Option<String>,
    next_due_date: Option<String>,
    last_payment_date: Option<String>,
    image_url: Option<String>,
    notes: Option<String>,
    extra: Map<String, Value>,
}

impl RawProfile {
    fn normalize(self) -> Profile {
        Profile {
            first_name: first_present([self.first_name, self.first_name_camel]),
            last_name: first_present([self.last_name, self.last_name_camel]),
            email: self.email,
            phone: first_present([self.phone, self.phone_number]),
            address: self.address,
            membership_type: first_present([
                self.membership_type,
                self.membership_type_camel,
                self.plan,
            ]),
            monthly_fee: self.monthly_fee.or(self.monthly_fee_camel),
            join_date: first_present([self.join_date, self.join_date_camel, self.joined_at]),
            next_due_date: first_present([self.next_due_date, self.next_due_date_camel]),
            last_payment_date: first_present([
                self.last_payment_date,
                self.last_payment_date_camel,
                self.fee_paid_date,
                self.fee_paid_date_camel,
            ]),
            image_url: first_present([
                self.image_url,
                self.image_url_camel,
                self.image,
                self.profile_image,
            ]),
            notes: self.notes,
            extra: self.extra,
        }
    }
}

// First non-blank spelling wins; a blank one is kept only if nothing else is set
fn first_present<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    let mut fallback = None;
    for value in candidates.into_iter().flatten() {
        if !value.trim().is_empty() {
            return Some(value);
        }
        fallback.get_or_insert(value);
    }
    fallback
}

// Helper to deserialize a fee given as a number or a numeric string
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct AmountVisitor;

    impl<'de> de::Visitor<'de> for AmountVisitor {
        type Value = Option<f64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or a numeric string")
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            // Malformed amounts degrade to "not set" rather than failing the record
            Ok(v.trim().parse::<f64>().ok())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(AmountVisitor)
}

// Helper to deserialize an optional date string, treating "" as absent
fn deserialize_date_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    use crate::fee::FeeStatusKind;

    #[test]
    fn test_id_accepts_number_and_string() {
        let a: CustomerId = serde_json::from_value(json!(42)).unwrap();
        let b: CustomerId = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_value::<CustomerId>(json!("forty-two")).is_err());
    }

    #[test]
    fn test_id_serializes_as_number() {
        assert_eq!(serde_json::to_value(CustomerId(7)).unwrap(), json!(7));
    }

    #[test]
    fn test_customer_key_normalization() {
        assert_eq!("42".to_customer_id(), Some(CustomerId(42)));
        assert_eq!(" 42 ".to_customer_id(), Some(CustomerId(42)));
        assert_eq!(42i64.to_customer_id(), Some(CustomerId(42)));
        assert_eq!(String::from("42").to_customer_id(), Some(CustomerId(42)));
        assert_eq!("abc".to_customer_id(), None);
        assert_eq!("".to_customer_id(), None);
    }

    #[test]
    fn test_alternate_spellings_normalize() {
        let snake: Customer = serde_json::from_value(json!({
            "id": 1,
            "first_name": "Ada",
            "monthly_fee": 49.5,
            "fee_paid_date": "2024-03-01",
            "next_due_date": "2024-04-01"
        }))
        .unwrap();
        let camel: Customer = serde_json::from_value(json!({
            "id": "1",
            "firstName": "Ada",
            "monthlyFee": "49.5",
            "lastPaymentDate": "2024-03-01",
            "nextDueDate": "2024-04-01"
        }))
        .unwrap();
        assert_eq!(snake, camel);
        assert_eq!(snake.monthly_fee, Some(49.5));
        assert_eq!(snake.last_payment_date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_two_spellings_of_one_field_first_non_empty_wins() {
        let customer: Customer = serde_json::from_value(json!({
            "id": 1,
            "last_payment_date": null,
            "fee_paid_date": "2024-03-01",
            "image": null,
            "image_url": "https://img.test/1.png",
            "first_name": "",
            "firstName": "Ada",
            "monthly_fee": "n/a",
            "monthlyFee": 30
        }))
        .unwrap();
        assert_eq!(customer.last_payment_date.as_deref(), Some("2024-03-01"));
        assert_eq!(customer.image_url.as_deref(), Some("https://img.test/1.png"));
        assert_eq!(customer.first_name.as_deref(), Some("Ada"));
        assert_eq!(customer.monthly_fee, Some(30.0));
        assert!(customer.extra.is_empty());

        let both_set: Customer = serde_json::from_value(json!({
            "id": 2,
            "phone": "555-0100",
            "phoneNumber": "555-0199"
        }))
        .unwrap();
        assert_eq!(both_set.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_unknown_fields_kept_in_extra() {
        let customer: Customer = serde_json::from_value(json!({
            "id": 3,
            "locker_number": "B12",
            "emergency_contact": {"name": "Bob"}
        }))
        .unwrap();
        assert_eq!(customer.extra.get("locker_number"), Some(&json!("B12")));

        let back = serde_json::to_value(&customer).unwrap();
        assert_eq!(back["locker_number"], json!("B12"));
        assert_eq!(back["emergency_contact"]["name"], json!("Bob"));
    }

    #[test]
    fn test_malformed_fee_and_empty_dates_degrade() {
        let customer: Customer = serde_json::from_value(json!({
            "id": 4,
            "monthly_fee": "n/a",
            "next_due_date": "",
            "last_payment_date": null
        }))
        .unwrap();
        assert_eq!(customer.monthly_fee, None);
        assert_eq!(customer.next_due_date, None);
        assert_eq!(customer.last_payment_date, None);
    }

    #[test]
    fn test_names() {
        let mut customer = Customer::new(9);
        assert_eq!(customer.full_name(), "Customer #9");

        customer.first_name = Some("Grace".into());
        assert_eq!(customer.full_name(), "Grace");
        assert_eq!(customer.display_name(), "Grace");

        customer.last_name = Some("Hopper".into());
        assert_eq!(customer.full_name(), "Grace Hopper");
        assert_eq!(customer.display_name(), "Hopper, Grace");
    }

    #[test]
    fn test_fee_status_uses_parsed_dates() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let mut customer = Customer::new(5);
        customer.next_due_date = Some("2024-05-13T12:00:00Z".into());
        let status = customer.fee_status(now);
        assert_eq!(status.kind, FeeStatusKind::DueSoon);
        assert_eq!(status.days, 3);

        customer.next_due_date = Some("not a date".into());
        assert_eq!(customer.fee_status(now).kind, FeeStatusKind::Unknown);
    }

    #[test]
    fn test_draft_serializes_only_set_fields() {
        let draft = CustomerDraft {
            first_name: Some("Ada".into()),
            monthly_fee: Some(30.0),
            ..Default::default()
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value, json!({"first_name": "Ada", "monthly_fee": 30.0}));
    }

    #[test]
    fn test_draft_accepts_camel_case() {
        let draft: CustomerDraft = serde_json::from_value(json!({
            "firstName": "Ada",
            "feePaidDate": "2024-01-01"
        }))
        .unwrap();
        assert_eq!(draft.first_name.as_deref(), Some("Ada"));
        assert_eq!(draft.last_payment_date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_draft_tolerates_duplicate_spellings() {
        let draft: CustomerDraft = serde_json::from_value(json!({
            "last_payment_date": null,
            "feePaidDate": "2024-01-01",
            "nextDueDate": "2024-02-01",
            "next_due_date": ""
        }))
        .unwrap();
        assert_eq!(draft.last_payment_date.as_deref(), Some("2024-01-01"));
        assert_eq!(draft.next_due_date.as_deref(), Some("2024-02-01"));
    }
}

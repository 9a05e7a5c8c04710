//! The intake form record and its field rules.

use crate::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conditions offered by the disease multi-select.
pub const KNOWN_DISEASES: [&str; 4] = ["Diabetes", "Heart disease", "Asthma", "Cancer"];

const MAX_PHONE_DIGITS: usize = 10;

/// Keeps ASCII letters only.
pub fn sanitize_name(raw: &str) -> String {
	raw.chars().filter(char::is_ascii_alphabetic).collect()
}

/// Strips everything but digits. `None` if more than ten digits remain.
pub fn sanitize_phone(raw: &str) -> Option<String> {
	let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
	(digits.len() <= MAX_PHONE_DIGITS).then_some(digits)
}

/// Body-mass index from centimetres and kilograms, to two decimals.
pub fn bmi(height_cm: f64, weight_kg: f64) -> Option<String> {
	if !(height_cm > 0.0 && weight_kg > 0.0) {
		return None;
	}
	let metres = height_cm / 100.0;
	let value = weight_kg / (metres * metres);
	value.is_finite().then(|| format!("{:.2}", value))
}

/// A captured intake form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeForm {
	pub first_name: String,
	pub last_name: String,
	pub email: String,
	pub phone_number: String,
	pub dob: String,
	pub gender: String,
	pub disease: Vec<String>,
	/// Centimetres.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub height: Option<f64>,
	/// Kilograms.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub weight: Option<f64>,
}

impl IntakeForm {
	pub fn set_first_name(&mut self, raw: &str) {
		self.first_name = sanitize_name(raw);
	}

	pub fn set_last_name(&mut self, raw: &str) {
		self.last_name = sanitize_name(raw);
	}

	/// Returns `false` and keeps the previous number if `raw` has too many digits.
	pub fn set_phone_number(&mut self, raw: &str) -> bool {
		match sanitize_phone(raw) {
			Some(digits) => {
				self.phone_number = digits;
				true
			}
			None => {
				tracing::debug!("rejected phone number input");
				false
			}
		}
	}

	pub fn bmi(&self) -> Option<String> {
		bmi(self.height?, self.weight?)
	}

	/// Flattens the form into the submitted document, with `bmi` filled in
	/// (empty when height or weight is missing).
	pub fn into_payload(self) -> Result<Payload, serde_json::Error> {
		let bmi = self.bmi().unwrap_or_default();
		let mut payload = match serde_json::to_value(self)? {
			Value::Object(map) => map,
			_ => Payload::new(),
		};
		payload.insert("bmi".into(), Value::String(bmi));
		Ok(payload)
	}
}

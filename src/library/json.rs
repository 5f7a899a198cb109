//! Typed accessors over `json` values, with errors that remember where they happened.

use json::JsonValue;

pub(super) trait SerialExtend {
	fn as_object(&self) -> Option<&json::object::Object>;
}

impl SerialExtend for JsonValue {
	fn as_object(&self) -> Option<&json::object::Object> {
		if let JsonValue::Object(object) = self {
			Some(object)
		} else {
			None
		}
	}
}

pub type JsonResult<T> = Result<T, JsonError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonError {
	#[error("Key {0:?} does not exist")]
	KeyDoesNotExist(String),
	#[error("Value at {0:?} is not an object")]
	ValueIsNotObject(String),
	#[error("Value at {0:?} is not a list")]
	ValueIsNotList(String),
	#[error("Value at {0:?} is not a string")]
	ValueIsNotString(String),
	#[error("Value at {0:?} is not a number")]
	ValueIsNotNumber(String),
	#[error("Value at {0:?} is not a bool")]
	ValueIsNotBool(String),
	#[error("Error while parsing int at {0:?}\n  - number out of scope")]
	ParseIntError(String),
	#[error("Error in list at index {index}\n  - {inner}")]
	ErrorInList { index: usize, inner: Box<JsonError> },
	#[error("Error in object at {key:?}\n  - {inner}")]
	ErrorInObject { key: String, inner: Box<JsonError> },
}

impl JsonError {
	pub fn nested(self, key: &str) -> Self {
		Self::ErrorInObject {
			key: key.to_owned(),
			inner: Box::new(self),
		}
	}

	pub fn in_list(self, index: usize) -> Self {
		Self::ErrorInList {
			index,
			inner: Box::new(self),
		}
	}
}

#[derive(Clone, Copy)]
pub struct JsonObject<'a>(pub &'a json::object::Object);

impl<'a> JsonObject<'a> {
	fn get(&self, key: &str) -> JsonResult<&'a JsonValue> {
		match self.0.get(key) {
			Some(value) => Ok(value),
			None => Err(JsonError::KeyDoesNotExist(key.to_owned())),
		}
	}

	/// Whether the key exists and holds something other than `null`.
	pub fn has(&self, key: &str) -> bool {
		self.0.get(key).is_some_and(|value| !value.is_null())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a JsonValue)> {
		self.0.iter()
	}

	pub fn get_object(&self, key: &str) -> JsonResult<JsonObject<'a>> {
		match self.get(key)?.as_object() {
			Some(obj) => Ok(JsonObject(obj)),
			None => Err(JsonError::ValueIsNotObject(key.to_owned())),
		}
	}

	pub fn get_list(&self, key: &str) -> JsonResult<&'a [JsonValue]> {
		match self.get(key)? {
			JsonValue::Array(arr) => Ok(arr),
			_ => Err(JsonError::ValueIsNotList(key.to_owned())),
		}
	}

	/// A list that may be left out, defaulting to empty.
	pub fn get_optional_list(&self, key: &str) -> JsonResult<&'a [JsonValue]> {
		if self.has(key) {
			self.get_list(key)
		} else {
			Ok(&[])
		}
	}

	pub fn get_nullable_str(&self, key: &str) -> JsonResult<Option<&'a str>> {
		let Some(val) = self.0.get(key) else {
			return Ok(None);
		};
		if val.is_null() {
			return Ok(None);
		}
		match val.as_str() {
			Some(val) => Ok(Some(val)),
			None => Err(JsonError::ValueIsNotString(key.to_owned())),
		}
	}

	pub fn get_str(&self, key: &str) -> JsonResult<&'a str> {
		match self.get(key)?.as_str() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotString(key.to_owned())),
		}
	}

	fn get_number(&self, key: &str) -> JsonResult<json::number::Number> {
		match self.get(key)?.as_number() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotNumber(key.to_owned())),
		}
	}

	pub fn get_f32(&self, key: &str) -> JsonResult<f32> {
		Ok(self.get_number(key)?.into())
	}

	pub fn get_u32(&self, key: &str) -> JsonResult<u32> {
		self.get_number(key)?
			.try_into()
			.map_err(|_| JsonError::ParseIntError(key.to_owned()))
	}

	pub fn get_i32(&self, key: &str) -> JsonResult<i32> {
		self.get_number(key)?
			.try_into()
			.map_err(|_| JsonError::ParseIntError(key.to_owned()))
	}

	pub fn get_bool(&self, key: &str) -> JsonResult<bool> {
		match self.get(key)?.as_bool() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotBool(key.to_owned())),
		}
	}

	/// A bool that may be left out, defaulting to `false`.
	pub fn get_flag(&self, key: &str) -> JsonResult<bool> {
		if self.has(key) {
			self.get_bool(key)
		} else {
			Ok(false)
		}
	}

	/// Flat list of numbers.
	pub fn get_f32s(&self, key: &str) -> JsonResult<Vec<f32>> {
		let list = self.get_list(key)?;
		list.iter()
			.enumerate()
			.map(|(i, val)| match val.as_f32() {
				Some(val) => Ok(val),
				None => Err(JsonError::ValueIsNotNumber(i.to_string()).nested(key)),
			})
			.collect()
	}

	/// Flat list of non-negative integers.
	pub fn get_u32s(&self, key: &str) -> JsonResult<Vec<u32>> {
		let list = self.get_list(key)?;
		list.iter()
			.enumerate()
			.map(|(i, val)| match val.as_u32() {
				Some(val) => Ok(val),
				None => Err(JsonError::ParseIntError(i.to_string()).nested(key)),
			})
			.collect()
	}

	/// List of strings, or `null`s.
	pub fn get_nullable_strs(&self, key: &str) -> JsonResult<Vec<Option<&'a str>>> {
		let list = self.get_list(key)?;
		list.iter()
			.enumerate()
			.map(|(i, val)| match val {
				JsonValue::Null => Ok(None),
				val => match val.as_str() {
					Some(s) => Ok(Some(s)),
					None => Err(JsonError::ValueIsNotString(i.to_string()).nested(key)),
				},
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn object(src: &str) -> json::JsonValue {
		json::parse(src).unwrap()
	}

	#[test]
	fn typed_getters() {
		let value = object(r#"{"name": "CharRig", "size": 512, "uvs": [0.5, 1], "loops": [0, 1, 2], "hidden": true}"#);
		let obj = JsonObject(value.as_object().unwrap());

		assert_eq!(obj.get_str("name").unwrap(), "CharRig");
		assert_eq!(obj.get_u32("size").unwrap(), 512);
		assert_eq!(obj.get_f32s("uvs").unwrap(), vec![0.5, 1.0]);
		assert_eq!(obj.get_u32s("loops").unwrap(), vec![0, 1, 2]);
		assert!(obj.get_flag("hidden").unwrap());
		assert!(!obj.get_flag("exclude").unwrap());
		assert_eq!(obj.get_nullable_str("parent").unwrap(), None);
		assert!(obj.get_optional_list("children").unwrap().is_empty());
	}

	#[test]
	fn errors_carry_their_path() {
		let value = object(r#"{"loops": [0, -1], "name": 3}"#);
		let obj = JsonObject(value.as_object().unwrap());

		assert_eq!(
			obj.get_u32s("loops").unwrap_err(),
			JsonError::ParseIntError("1".to_owned()).nested("loops")
		);
		assert_eq!(obj.get_str("name").unwrap_err(), JsonError::ValueIsNotString("name".to_owned()));
		assert_eq!(obj.get_list("nope").unwrap_err(), JsonError::KeyDoesNotExist("nope".to_owned()));
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Zone-less millisecond timestamps used on the wire.
//!
//! Both the event channel and the batch read API carry timestamps as
//! `yyyy-MM-ddTHH:mm:ss.SSS` without an offset. Producers always write UTC.
//! Decoding is lenient about the number of fractional digits so that values
//! written by other producers (no millis, micros) are still accepted.

use chrono::{NaiveDateTime, SubsecRound, Utc};

/// Format used when writing timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// `%.f` consumes an optional dot and any number of digits.
const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Current UTC time truncated to millisecond precision.
pub fn now_millis() -> NaiveDateTime {
	Utc::now().naive_utc().trunc_subsecs(3)
}

pub fn format(ts: &NaiveDateTime) -> String {
	ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
	NaiveDateTime::parse_from_str(value, PARSE_FORMAT)
}

/// Serde adapter for required timestamps.
pub mod millis {
	use chrono::NaiveDateTime;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&super::format(ts))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;
		super::parse(&raw).map_err(serde::de::Error::custom)
	}
}

/// Serde adapter for optional timestamps. Pair with `#[serde(default)]`.
pub mod option_millis {
	use chrono::NaiveDateTime;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(ts: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match ts {
			Some(ts) => serializer.serialize_str(&super::format(ts)),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Option::<String>::deserialize(deserializer)?;
		raw
			.map(|value| super::parse(&value).map_err(serde::de::Error::custom))
			.transpose()
	}
}

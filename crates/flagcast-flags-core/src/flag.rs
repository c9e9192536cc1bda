// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::{FlagsError, Result};

/// Maximum length of a flag name.
pub const MAX_FLAG_NAME_LEN: usize = 100;

/// Maximum length of a flag description.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Returns true if `name` is a valid flag name.
///
/// Valid names are 1-100 characters of ASCII letters, digits and underscores.
pub fn is_valid_flag_name(name: &str) -> bool {
	!name.is_empty()
		&& name.len() <= MAX_FLAG_NAME_LEN
		&& name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates a flag name, returning a descriptive error when it is rejected.
pub fn validate_flag_name(name: &str) -> Result<()> {
	if name.trim().is_empty() {
		return Err(FlagsError::InvalidFlagName(
			"flag name is required".to_string(),
		));
	}
	if name.len() > MAX_FLAG_NAME_LEN {
		return Err(FlagsError::InvalidFlagName(format!(
			"flag name must be between 1 and {MAX_FLAG_NAME_LEN} characters"
		)));
	}
	if !is_valid_flag_name(name) {
		return Err(FlagsError::InvalidFlagName(
			"flag name can only contain letters, numbers, and underscores".to_string(),
		));
	}
	Ok(())
}

/// Validates an optional description.
pub fn validate_description(description: Option<&str>) -> Result<()> {
	match description {
		Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(FlagsError::InvalidDescription(
			format!("description must not exceed {MAX_DESCRIPTION_LEN} characters"),
		)),
		_ => Ok(()),
	}
}

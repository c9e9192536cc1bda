// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

/// Errors raised while loading or resolving flagcast configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// An environment variable was set but could not be parsed.
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("config file {path} is not valid TOML: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("cannot read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The merged layers resolved to an unusable configuration.
	#[error("invalid configuration: {0}")]
	Validation(String),
}

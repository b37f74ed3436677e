// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use std::{fmt, io, path::PathBuf};

use crate::abi::AbiType;

/// The result of a nicelink operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by library resolution, declaration and dispatch.
///
/// None of these are recovered from inside the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid library name `{0}`: expected a non-empty name without path separators")]
	InvalidLibraryName(String),

	#[error("platform `{os}` is not supported yet; no library paths are known for it")]
	UnsupportedPlatform { os: String },

	#[error("could not load library `{library}`; {attempts}")]
	LibraryNotFound { library: String, attempts: Attempts },

	#[error("symbol `{symbol}` not found in `{library}`: {source}")]
	SymbolNotFound {
		symbol: String,
		library: PathBuf,
		source: io::Error,
	},

	#[error("type mismatch in `{function}`: {mismatch}")]
	TypeMismatch { function: String, mismatch: Mismatch },

	#[error("`{function}` returned a null pointer")]
	NullPointer { function: String },

	#[error("no function named `{0}` has been declared")]
	UnknownFunction(String),

	#[error("layout `{layout}` has no field `{field}`")]
	UnknownField { layout: String, field: String },

	#[error("invalid path table: {0}")]
	InvalidPathTable(String),
}

impl Error {
	pub(crate) fn mismatch(function: impl Into<String>, mismatch: Mismatch) -> Self {
		Self::TypeMismatch {
			function: function.into(),
			mismatch,
		}
	}
}

/// Describes how a call or field access disagreed with its declaration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
	#[error("expected {expected} argument(s), got {found}")]
	Arity { expected: usize, found: usize },

	#[error("argument {index} expects {expected}, got {found}")]
	Argument {
		index: usize,
		expected: AbiType,
		found: String,
	},

	#[error("return type must be {expected}, declared {found}")]
	Return { expected: AbiType, found: AbiType },

	#[error("field `{field}` holds {expected}, got {found}")]
	Field {
		field: String,
		expected: String,
		found: String,
	},
}

/// One failed load of a candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
	pub path: PathBuf,
	pub reason: String,
}

/// Every candidate tried while resolving a library, in the order tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attempts(pub Vec<Attempt>);

impl Attempts {
	#[inline]
	pub fn paths(&self) -> impl Iterator<Item = &std::path::Path> {
		self.0.iter().map(|attempt| attempt.path.as_path())
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for Attempts {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.0.is_empty() {
			return write!(f, "no paths were tried");
		}
		write!(f, "tried:")?;
		for attempt in &self.0 {
			write!(f, "\n  {} ({})", attempt.path.display(), attempt.reason)?;
		}
		Ok(())
	}
}

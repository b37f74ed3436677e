// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use std::ffi::OsStr;
use std::path::PathBuf;

use once_cell::sync::OnceCell;

use crate::error::{Attempt, Attempts, Error, Result};
use crate::load::{self, Loader};
use crate::paths::{PathTable, LIBRARY_PATHS};
use crate::Library;

#[derive(Debug, Clone, Copy)]
enum Source {
	Default,
	Table(&'static PathTable),
	This,
}

/// An object providing access to a lazily resolved library.
///
/// This object is designed to be used with [`nicelink`](crate::nicelink) and
/// [`LazyFn`](crate::LazyFn), and is usually stored in a `static`.
#[derive(Debug)]
pub struct LibLock<L: Loader = load::System> {
	name: &'static str,
	source: Source,
	hlib: OnceCell<Library<L>>,
}

impl<L: Loader> LibLock<L> {
	/// Constructs a new `LibLock` for the library's short name, searched with [`LIBRARY_PATHS`].
	///
	/// # Examples
	///
	/// ```rust
	/// # use nicelink::*;
	/// static SDL: LibLock = LibLock::new("SDL");
	/// ```
	#[inline]
	pub const fn new(name: &'static str) -> Self {
		Self {
			name,
			source: Source::Default,
			hlib: OnceCell::new(),
		}
	}

	/// Constructs a new `LibLock` searched with a custom table.
	#[inline]
	pub const fn with_table(name: &'static str, table: &'static PathTable) -> Self {
		Self {
			name,
			source: Source::Table(table),
			hlib: OnceCell::new(),
		}
	}

	#[inline]
	pub const fn name(&self) -> &'static str {
		self.name
	}

	/// May block if another thread is currently resolving the library.
	///
	/// The library is resolved at most once. A failed resolution is not cached,
	/// so a later call tries again.
	///
	/// # Errors
	/// Whatever [`PathTable::resolve`] returns for the running OS.
	pub fn get(&self) -> Result<&Library<L>> {
		self.hlib.get_or_try_init(|| match self.source {
			Source::Default => LIBRARY_PATHS.resolve(self.name, std::env::consts::OS),
			Source::Table(table) => table.resolve(self.name, std::env::consts::OS),
			Source::This => match unsafe { L::open(OsStr::new("")) } {
				Ok(handle) => Ok(Library::new(PathBuf::new(), handle)),
				Err(err) => Err(Error::LibraryNotFound {
					library: self.name.to_owned(),
					attempts: Attempts(vec![Attempt {
						path: PathBuf::new(),
						reason: err.to_string(),
					}]),
				}),
			},
		})
	}

	/// Gets the reference to the underlying value.
	///
	/// Returns `None` if the library is unresolved, or being resolved. This
	/// method never blocks.
	#[inline]
	pub fn try_get(&self) -> Option<&Library<L>> {
		self.hlib.get()
	}
}

impl LibLock<load::This> {
	/// A lock over the symbols already loaded into the running process.
	///
	/// # Examples
	///
	/// ```rust
	/// # use nicelink::*;
	/// static PROCESS: LibLock<load::This> = LibLock::this();
	/// ```
	#[inline]
	pub const fn this() -> Self {
		Self {
			name: "this",
			source: Source::This,
			hlib: OnceCell::new(),
		}
	}
}

// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::load::{self, Loader};
use crate::paths::LIBRARY_PATHS;
use crate::Symbol;

/// A library handle resolved from one candidate path.
///
/// Lives for as long as the owner keeps it; there is no explicit unload.
#[derive(Debug)]
pub struct Library<L: Loader = load::System> {
	path: PathBuf,
	handle: L,
}

impl<L: Loader> Library<L> {
	pub(crate) fn new(path: PathBuf, handle: L) -> Self {
		Self { path, handle }
	}

	/// The path, or bare name, that was successfully loaded.
	#[inline]
	pub fn path(&self) -> &Path {
		&self.path
	}

	#[inline]
	pub fn loader(&self) -> &L {
		&self.handle
	}

	/// Retrieves the address of `name`.
	///
	/// # Errors
	/// [`Error::SymbolNotFound`] if the library does not export `name`.
	///
	/// # Safety
	/// The address is only meaningful when cast to the symbol's true type.
	pub unsafe fn symbol(&self, name: &str) -> Result<Symbol> {
		self.handle.symbol(name).map_err(|source| Error::SymbolNotFound {
			symbol: name.to_owned(),
			library: self.path.clone(),
			source,
		})
	}
}

/// Resolves `library` for the running OS with [`LIBRARY_PATHS`] and the system loader.
///
/// # Examples
///
/// ```no_run
/// let sdl = nicelink::resolve("SDL").unwrap();
/// println!("SDL loaded from {}", sdl.path().display());
/// ```
pub fn resolve(library: &str) -> Result<Library> {
	LIBRARY_PATHS.resolve(library, std::env::consts::OS)
}

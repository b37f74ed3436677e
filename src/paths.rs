// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

//! Where to look for libraries on each operating system.

use std::path::{Path, PathBuf};

use crate::error::{Attempt, Attempts, Error, Result};
use crate::load::Loader;
use crate::Library;

/// Placeholder substituted with the library's short name in every path template.
pub const PLACEHOLDER: &str = "[LIB]";

const SEPARATORS: &[char] = &['/', '\\'];

/// A group of operating systems sharing one ordered list of path templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsFamily {
	pub name: &'static str,
	/// Case-insensitive substrings of an OS identifier that select this family.
	pub matches: &'static [&'static str],
	/// Tried first to last. `[LIB]` stands for the library's short name.
	pub templates: &'static [&'static str],
}

impl OsFamily {
	/// Returns `true` if `os` names an operating system in this family.
	pub fn recognizes(&self, os: &str) -> bool {
		let os = os.to_ascii_lowercase();
		self.matches
			.iter()
			.any(|pattern| os.contains(&pattern.to_ascii_lowercase()))
	}
}

/// An immutable table of [`OsFamily`] entries, searched in order.
///
/// The first family recognizing the OS identifier wins, so more specific
/// families must come before broader ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTable {
	families: &'static [OsFamily],
}

/// The default search paths.
///
/// A bare `[LIB]` at the end of each list defers to the system loader's own search path.
pub static LIBRARY_PATHS: PathTable = PathTable::new(&[
	OsFamily {
		name: "unix",
		matches: &["linux", "bsd", "dragonfly"],
		templates: &[
			"/usr/local/lib/lib[LIB].so",
			"/usr/lib/lib[LIB].so",
			"[LIB]",
		],
	},
	OsFamily {
		name: "darwin",
		matches: &["darwin", "macos"],
		templates: &[
			"/usr/local/lib/lib[LIB].dylib",
			"/sw/lib/lib[LIB].dylib",
			"/opt/local/lib/lib[LIB].dylib",
			"~/Library/Frameworks/[LIB].framework/[LIB]",
			"/Library/Frameworks/[LIB].framework/[LIB]",
			"[LIB]",
		],
	},
	OsFamily {
		name: "windows",
		matches: &["windows", "win32", "mingw"],
		templates: &[
			"C:\\windows\\system32\\[LIB].dll",
			"C:\\windows\\system\\[LIB].dll",
			"[LIB]",
		],
	},
]);

impl Default for PathTable {
	fn default() -> Self {
		LIBRARY_PATHS
	}
}

impl PathTable {
	/// Constructs a table. Use [`validate`](Self::validate) to check a hand-written table.
	pub const fn new(families: &'static [OsFamily]) -> Self {
		Self { families }
	}

	#[inline]
	pub fn families(&self) -> &'static [OsFamily] {
		self.families
	}

	/// Finds the first family that recognizes `os`.
	pub fn family(&self, os: &str) -> Option<&'static OsFamily> {
		self.families.iter().find(|family| family.recognizes(os))
	}

	/// Checks that every family has templates and every template names the library.
	pub fn validate(&self) -> Result<()> {
		for family in self.families {
			if family.matches.is_empty() {
				return Err(Error::InvalidPathTable(format!(
					"family `{}` matches no operating system",
					family.name
				)));
			}
			if family.templates.is_empty() {
				return Err(Error::InvalidPathTable(format!(
					"family `{}` has no path templates",
					family.name
				)));
			}
			if let Some(template) = family.templates.iter().find(|t| !t.contains(PLACEHOLDER)) {
				return Err(Error::InvalidPathTable(format!(
					"template `{template}` in family `{}` has no `{PLACEHOLDER}`",
					family.name
				)));
			}
		}
		Ok(())
	}

	/// Produces the ordered candidate paths for `library` on `os`.
	///
	/// The result is the same for the same inputs on every call. Templates
	/// under `~` are left out when the home directory is unknown.
	///
	/// # Errors
	/// [`Error::InvalidLibraryName`] if `library` is empty or contains a path separator,
	/// [`Error::UnsupportedPlatform`] if no family recognizes `os`.
	pub fn candidates(&self, library: &str, os: &str) -> Result<Vec<PathBuf>> {
		check_name(library)?;
		let family = self.family(os).ok_or_else(|| Error::UnsupportedPlatform { os: os.to_owned() })?;
		let home = home::home_dir();
		Ok(family
			.templates
			.iter()
			.filter_map(|template| {
				let path = template.replace(PLACEHOLDER, library);
				let expanded = expand(&path, home.as_deref());
				if expanded.is_none() {
					log::debug!("skipping `{path}`: no home directory");
				}
				expanded
			})
			.collect())
	}

	/// Loads the first candidate for `library` on `os` that `L` can open.
	///
	/// Nothing is loaded when the platform is unsupported. Candidates that
	/// don't exist on disk are still handed to the loader.
	///
	/// # Errors
	/// Everything [`candidates`](Self::candidates) returns, and
	/// [`Error::LibraryNotFound`] with every attempt if no candidate loads.
	pub fn resolve<L: Loader>(&self, library: &str, os: &str) -> Result<Library<L>> {
		let candidates = self.candidates(library, os)?;
		let mut attempts = Vec::with_capacity(candidates.len());
		for path in candidates {
			match unsafe { L::open(path.as_os_str()) } {
				Ok(handle) => {
					log::debug!("loaded `{library}` from {}", path.display());
					return Ok(Library::new(path, handle));
				}
				Err(err) => {
					log::debug!("failed to load `{library}` from {}: {err}", path.display());
					attempts.push(Attempt {
						path,
						reason: err.to_string(),
					});
				}
			}
		}
		Err(Error::LibraryNotFound {
			library: library.to_owned(),
			attempts: Attempts(attempts),
		})
	}
}

fn check_name(library: &str) -> Result<()> {
	if library.is_empty() || library.contains(SEPARATORS) {
		Err(Error::InvalidLibraryName(library.to_owned()))
	} else {
		Ok(())
	}
}

// Absolute for the template's own platform, not the host's.
fn is_absolute(path: &str) -> bool {
	let bytes = path.as_bytes();
	path.starts_with(SEPARATORS)
		|| (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

// `None` for a home-relative path when there is no home directory.
fn expand(path: &str, home: Option<&Path>) -> Option<PathBuf> {
	if let Some(rest) = path.strip_prefix('~') {
		if rest.is_empty() || rest.starts_with(SEPARATORS) {
			return home.map(|home| home.join(rest.trim_start_matches(SEPARATORS)));
		}
	}
	if is_absolute(path) || !path.contains(SEPARATORS) {
		return Some(PathBuf::from(path));
	}
	Some(match std::env::current_dir() {
		Ok(dir) => dir.join(Path::new(path)),
		Err(_) => PathBuf::from(path),
	})
}

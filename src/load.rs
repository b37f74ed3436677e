// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use std::ffi::OsStr;
use std::io;

use crate::Symbol;

mod sys;
mod this;

/// Used to specify the run-time linker loader constraint for [`Library`](crate::Library),
/// [`LibLock`](crate::LibLock) and [`PathTable::resolve`](crate::PathTable::resolve).
///
/// `Loader` can also be used to make custom loaders.
///
/// # Safety
/// `symbol` must only return addresses that stay valid for as long as the loader value lives.
pub unsafe trait Loader: Send + Sync + Sized {
	/// Attempts to open a shared library.
	///
	/// A failed attempt must not leave anything behind that a later attempt could observe.
	unsafe fn open(path: &OsStr) -> io::Result<Self>;
	/// Retrieves the raw address of `name`.
	unsafe fn symbol(&self, name: &str) -> io::Result<Symbol>;
}

/// An object providing access to an open shared library on the filesystem.
///
/// This is the loader primitive used by default, backed by `dlopen` on unix and
/// `LoadLibraryExW` on windows.
#[derive(Debug)]
pub struct System(crate::os::Handle);

/// An object providing access to the symbols of the running process.
///
/// The `path` given to [`Loader::open`] is ignored.
#[derive(Debug)]
pub struct This(crate::os::Handle);

// internal handles are opaque and managed by the OS.
unsafe impl Send for System {}
unsafe impl Sync for System {}
unsafe impl Send for This {}
unsafe impl Sync for This {}

// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use std::ffi::c_void;
use std::ptr::NonNull;

/// The raw, non-null address of a symbol exported by a library.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(transparent)]
pub struct Symbol(pub(crate) NonNull<c_void>);

// an address is only ever read, never written through by nicelink.
unsafe impl Send for Symbol {}
unsafe impl Sync for Symbol {}

impl Symbol {
	/// Wraps a raw address, for custom [`Loader`](crate::load::Loader)s.
	///
	/// Returns `None` for null.
	#[inline]
	pub fn new(addr: *mut c_void) -> Option<Self> {
		NonNull::new(addr).map(Self)
	}

	#[inline]
	pub const fn as_ptr(self) -> *const c_void {
		self.0.as_ptr().cast_const()
	}

	/// Casts to a pointer of another type.
	#[inline]
	pub const fn cast<T>(self) -> *mut T {
		self.0.as_ptr().cast()
	}
}

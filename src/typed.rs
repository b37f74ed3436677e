// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

//! Typed pointers: return values and fields whose raw address is converted
//! into a structured value before it reaches the caller.

use std::ffi::c_void;
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::abi::Value;
use crate::error::{Error, Result};
use crate::layout::{Record, StructLayout};

/// What a null address means for a typed pointer.
///
/// This is decided per declaration, following what the native library
/// documents for that function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapRule {
	/// Null is a legitimate "nothing" and becomes [`Value::Absent`].
	#[default]
	Nullable,
	/// Null is a failure and becomes [`Error::NullPointer`].
	NonNull,
}

/// A return or field descriptor naming a target layout and a [`WrapRule`].
#[derive(Debug, Clone, PartialEq)]
pub struct TypedPointer {
	target: Arc<StructLayout>,
	rule: WrapRule,
}

impl TypedPointer {
	#[inline]
	pub fn new(target: &Arc<StructLayout>, rule: WrapRule) -> Self {
		Self {
			target: Arc::clone(target),
			rule,
		}
	}

	/// Null becomes [`Value::Absent`].
	#[inline]
	pub fn nullable(target: &Arc<StructLayout>) -> Self {
		Self::new(target, WrapRule::Nullable)
	}

	/// Null becomes [`Error::NullPointer`].
	#[inline]
	pub fn non_null(target: &Arc<StructLayout>) -> Self {
		Self::new(target, WrapRule::NonNull)
	}

	#[inline]
	pub fn target(&self) -> &Arc<StructLayout> {
		&self.target
	}

	#[inline]
	pub fn rule(&self) -> WrapRule {
		self.rule
	}

	/// Converts `addr` into a [`Value::Record`] or the rule's absent value.
	///
	/// `origin` names the function or field the address came from.
	///
	/// # Safety
	/// A non-null `addr` must point to memory laid out as the target.
	pub unsafe fn wrap(&self, addr: *mut c_void, origin: &str) -> Result<Value> {
		match (NonNull::new(addr), self.rule) {
			(Some(addr), _) => Ok(Value::Record(Record::from_raw(Arc::clone(&self.target), addr))),
			(None, WrapRule::Nullable) => Ok(Value::Absent),
			(None, WrapRule::NonNull) => Err(Error::NullPointer {
				function: origin.to_owned(),
			}),
		}
	}
}

/// A non-null pointer returned by a typed-pointer function attached with
/// [`nicelink`](crate::nicelink).
///
/// Dereferences to the `#[repr(C)]` type it points at. The pointee belongs to
/// the native library.
#[repr(transparent)]
pub struct TypedPtr<T>(NonNull<T>);

impl<T> TypedPtr<T> {
	/// Wraps `addr`, yielding `None` for null.
	///
	/// # Safety
	/// A non-null `addr` must point to a valid `T` for as long as the result is used.
	#[inline]
	pub unsafe fn wrap_nullable(addr: *const T) -> Option<Self> {
		NonNull::new(addr.cast_mut()).map(Self)
	}

	/// Wraps `addr`, treating null as an error of `function`.
	///
	/// # Safety
	/// Same as [`wrap_nullable`](Self::wrap_nullable).
	#[inline]
	pub unsafe fn wrap(addr: *const T, function: &str) -> Result<Self> {
		Self::wrap_nullable(addr).ok_or_else(|| Error::NullPointer {
			function: function.to_owned(),
		})
	}

	#[inline]
	pub fn as_ptr(&self) -> *mut T {
		self.0.as_ptr()
	}
}

impl<T> Deref for TypedPtr<T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		// validity was promised when the pointer was wrapped.
		unsafe { self.0.as_ref() }
	}
}

impl<T> Clone for TypedPtr<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for TypedPtr<T> {}

impl<T> fmt::Debug for TypedPtr<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("TypedPtr").field(&self.0).finish()
	}
}

impl<T> PartialEq for TypedPtr<T> {
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}

impl<T> Eq for TypedPtr<T> {}

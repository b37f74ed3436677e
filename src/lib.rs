// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
#![allow(clippy::missing_safety_doc)]

//! Run-time binding to native shared libraries.
//!
//! A library is found by short name through a per-OS [`PathTable`], then its
//! functions are attached either statically with the [`nicelink`] attribute
//! macro or at run time through a [`Dispatch`] table. Functions returning
//! pointers to structures can be declared as typed pointers, so callers get a
//! [`Record`] (or [`TypedPtr`]) instead of a raw address.
//!
//! ```no_run
//! use std::ffi::c_int;
//! use nicelink::*;
//!
//! #[repr(C)]
//! pub struct Version {
//! 	pub major: u8,
//! 	pub minor: u8,
//! 	pub patch: u8,
//! }
//!
//! static SDL: LibLock = LibLock::new("SDL");
//!
//! #[nicelink(library = SDL, prefix = "SDL_")]
//! extern "C" {
//! 	fn Init(flags: u32) -> c_int;
//! 	#[typed_pointer]
//! 	fn Linked_Version() -> *const Version;
//! }
//!
//! unsafe {
//! 	assert_eq!(Init(0).unwrap(), 0);
//! 	let version = Linked_Version().unwrap();
//! 	println!("SDL {}.{}.{}", version.major, version.minor, version.patch);
//! }
//! ```

pub mod abi;
pub mod dispatch;
mod error;
pub mod layout;
mod lazyfn;
mod library;
pub mod load;
mod os;
pub mod paths;
mod sym;
mod sync;
pub mod typed;

pub use abi::{AbiType, Invoker, NativeType, Signature, Value};
pub use dispatch::{Dispatch, FunctionDecl, ReturnDescriptor};
pub use error::*;
pub use layout::{FieldType, LayoutBuilder, LayoutKind, Record, RecordBuf, StructLayout};
pub use lazyfn::LazyFn;
pub use library::{resolve, Library};
pub use paths::{OsFamily, PathTable, LIBRARY_PATHS};
pub use sym::Symbol;
pub use sync::LibLock;
pub use typed::{TypedPointer, TypedPtr, WrapRule};

/// Macro for generating dynamically linked functions.
///
/// See the [crate docs](crate) for an example.
#[cfg(feature = "macros")]
pub use nicelink_macro::nicelink;

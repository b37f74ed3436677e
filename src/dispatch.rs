// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

//! The runtime dispatch table.
//!
//! A declaration whose return is a [`ReturnDescriptor::Primitive`] becomes one
//! direct binding. A [`ReturnDescriptor::TypedPointer`] declaration becomes two:
//! a raw binding, kept in a registry nothing outside this module can reach, and
//! a public binding that calls it and wraps the address it returns.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::OnceCell;

use crate::abi::{AbiType, Invoker, Signature, Value};
use crate::error::{Error, Mismatch, Result};
use crate::load::{self, Loader};
use crate::typed::TypedPointer;
use crate::{Library, Symbol};

/// What a declared function hands back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnDescriptor {
	/// Returned unmodified.
	Primitive(AbiType),
	/// The native function returns an address, wrapped before it reaches the caller.
	TypedPointer(TypedPointer),
}

impl ReturnDescriptor {
	/// The type the native function actually returns.
	pub fn native(&self) -> AbiType {
		match self {
			Self::Primitive(ty) => *ty,
			Self::TypedPointer(_) => AbiType::Pointer,
		}
	}
}

/// A function as the dispatch table knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
	/// The name callers use.
	pub name: String,
	/// The name the library exports.
	pub symbol: String,
	pub params: Vec<AbiType>,
	pub returns: ReturnDescriptor,
}

struct RawBinding {
	symbol: String,
	invoker: Invoker,
	addr: OnceCell<Symbol>,
}

impl RawBinding {
	// `addr` seeds the cache when the symbol was already looked up.
	fn new(symbol: String, invoker: Invoker, addr: Option<Symbol>) -> Self {
		Self {
			symbol,
			invoker,
			addr: addr.map_or_else(OnceCell::new, OnceCell::with_value),
		}
	}

	fn resolve<L: Loader>(&self, lib: &Library<L>) -> Result<Symbol> {
		self.addr
			.get_or_try_init(|| unsafe { lib.symbol(&self.symbol) })
			.copied()
	}

	unsafe fn invoke<L: Loader>(&self, lib: &Library<L>, function: &str, args: &[Value]) -> Result<Value> {
		let symbol = self.resolve(lib)?;
		log::trace!("calling `{function}` through `{}`", self.symbol);
		(self.invoker)(symbol, args).map_err(|mismatch| Error::mismatch(function, mismatch))
	}
}

impl fmt::Debug for RawBinding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RawBinding")
			.field("symbol", &self.symbol)
			.field("addr", &self.addr.get())
			.finish_non_exhaustive()
	}
}

#[derive(Debug)]
enum Binding {
	Direct(RawBinding),
	// the raw half lives in `Dispatch::raw` under the same name.
	Wrapped(TypedPointer),
}

/// A table mapping public names to callable bindings into one [`Library`].
///
/// Declaring takes `&mut self` and calling takes `&self`, so a table that is
/// shared between threads is frozen.
///
/// # Examples
///
/// ```no_run
/// # use nicelink::*;
/// let sdl = resolve("SDL").unwrap();
/// let mut dispatch = Dispatch::with_prefix(&sdl, "SDL_");
/// dispatch.attach_prefixed::<unsafe extern "C" fn(u32) -> i32>("Init");
/// let status = unsafe { dispatch.call("Init", &[Value::U32(0x20)]) }.unwrap();
/// assert_eq!(status, Value::I32(0));
/// ```
#[derive(Debug)]
pub struct Dispatch<'lib, L: Loader = load::System> {
	lib: &'lib Library<L>,
	prefix: String,
	decls: BTreeMap<String, FunctionDecl>,
	bindings: BTreeMap<String, Binding>,
	raw: BTreeMap<String, RawBinding>,
}

impl<'lib, L: Loader> Dispatch<'lib, L> {
	pub fn new(lib: &'lib Library<L>) -> Self {
		Self::with_prefix(lib, "")
	}

	/// A table whose [`attach_prefixed`](Self::attach_prefixed) symbols start with `prefix`.
	pub fn with_prefix(lib: &'lib Library<L>, prefix: impl Into<String>) -> Self {
		Self {
			lib,
			prefix: prefix.into(),
			decls: BTreeMap::new(),
			bindings: BTreeMap::new(),
			raw: BTreeMap::new(),
		}
	}

	#[inline]
	pub fn library(&self) -> &'lib Library<L> {
		self.lib
	}

	#[inline]
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// The symbol `name` is exported as under this table's prefix.
	pub fn prefixed(&self, name: &str) -> String {
		format!("{}{name}", self.prefix)
	}

	/// Declares `name` as a call to `symbol`, with parameters and return taken from `F`.
	pub fn attach<F: Signature>(&mut self, name: &str, symbol: &str) -> &mut Self {
		self.declare(primitive_decl::<F>(name, symbol), F::invoke)
	}

	/// [`attach`](Self::attach) with the symbol composed from the prefix and `name`.
	pub fn attach_prefixed<F: Signature>(&mut self, name: &str) -> &mut Self {
		let symbol = self.prefixed(name);
		self.attach::<F>(name, &symbol)
	}

	/// Declares `name` as a call to `symbol` whose returned address is wrapped by `typed`.
	///
	/// # Errors
	/// [`Error::TypeMismatch`] if `F` does not return a pointer.
	pub fn attach_typed<F: Signature>(&mut self, name: &str, symbol: &str, typed: TypedPointer) -> Result<&mut Self> {
		if F::returns() != AbiType::Pointer {
			return Err(Error::mismatch(
				name,
				Mismatch::Return {
					expected: AbiType::Pointer,
					found: F::returns(),
				},
			));
		}
		let decl = FunctionDecl {
			name: name.to_owned(),
			symbol: symbol.to_owned(),
			params: F::params(),
			returns: ReturnDescriptor::TypedPointer(typed),
		};
		Ok(self.declare(decl, F::invoke))
	}

	/// Declares `name` only if the library exports `symbol`.
	///
	/// Returns `Ok(false)` and declares nothing when it doesn't.
	pub fn attach_optional<F: Signature>(&mut self, name: &str, symbol: &str) -> Result<bool> {
		let addr = match unsafe { self.lib.symbol(symbol) } {
			Ok(addr) => addr,
			Err(Error::SymbolNotFound { source, .. }) => {
				log::warn!(
					"optional function `{name}` is missing from {}: {source}",
					self.lib.path().display()
				);
				return Ok(false);
			}
			Err(err) => return Err(err),
		};
		self.insert(primitive_decl::<F>(name, symbol), F::invoke, Some(addr));
		Ok(true)
	}

	/// The entry point every `attach` goes through.
	///
	/// `invoker` must call functions returning `decl.returns.native()`.
	/// Redeclaring a name replaces everything declared under it before.
	pub fn declare(&mut self, decl: FunctionDecl, invoker: Invoker) -> &mut Self {
		self.insert(decl, invoker, None)
	}

	fn insert(&mut self, decl: FunctionDecl, invoker: Invoker, addr: Option<Symbol>) -> &mut Self {
		let name = decl.name.clone();
		let raw = RawBinding::new(decl.symbol.clone(), invoker, addr);
		let binding = match &decl.returns {
			ReturnDescriptor::Primitive(_) => {
				self.raw.remove(&name);
				Binding::Direct(raw)
			}
			ReturnDescriptor::TypedPointer(typed) => {
				self.raw.insert(name.clone(), raw);
				Binding::Wrapped(typed.clone())
			}
		};
		if self.bindings.insert(name.clone(), binding).is_some() {
			log::debug!("redeclared `{name}` as `{}`", decl.symbol);
		} else {
			log::debug!("declared `{name}` as `{}`", decl.symbol);
		}
		self.decls.insert(name, decl);
		self
	}

	/// Calls the function declared as `name`.
	///
	/// Typed-pointer functions never return [`Value::Pointer`]: they return a
	/// [`Value::Record`], or [`Value::Absent`] for a nullable null.
	///
	/// # Errors
	/// - [`Error::UnknownFunction`] if nothing is declared as `name`.
	/// - [`Error::TypeMismatch`] if `args` disagree with the declaration. No native call is made.
	/// - [`Error::SymbolNotFound`] if this is the first call and the symbol is missing.
	/// - [`Error::NullPointer`] if a non-null typed pointer came back null.
	///
	/// # Safety
	/// The declaration must match the native function, and `args` must satisfy
	/// whatever the native function requires of them.
	pub unsafe fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
		let (Some(decl), Some(binding)) = (self.decls.get(name), self.bindings.get(name)) else {
			return Err(Error::UnknownFunction(name.to_owned()));
		};
		check_args(decl, args)?;
		match binding {
			Binding::Direct(raw) => raw.invoke(self.lib, name, args),
			Binding::Wrapped(typed) => {
				let raw = self.raw(name)?;
				match raw.invoke(self.lib, name, args)? {
					Value::Pointer(addr) => typed.wrap(addr, name),
					other => Err(Error::mismatch(
						name,
						Mismatch::Return {
							expected: AbiType::Pointer,
							found: other.abi_type().unwrap_or(AbiType::Void),
						},
					)),
				}
			}
		}
	}

	/// Looks up the symbol behind `name` now instead of at its first call.
	pub fn link(&self, name: &str) -> Result<Symbol> {
		match self.bindings.get(name) {
			Some(Binding::Direct(raw)) => raw.resolve(self.lib),
			Some(Binding::Wrapped(_)) => self.raw(name)?.resolve(self.lib),
			None => Err(Error::UnknownFunction(name.to_owned())),
		}
	}

	#[inline]
	pub fn declaration(&self, name: &str) -> Option<&FunctionDecl> {
		self.decls.get(name)
	}

	/// Every declared public name, sorted.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.decls.keys().map(String::as_str)
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.decls.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.decls.is_empty()
	}

	fn raw(&self, name: &str) -> Result<&RawBinding> {
		self.raw
			.get(name)
			.ok_or_else(|| Error::UnknownFunction(name.to_owned()))
	}
}

fn primitive_decl<F: Signature>(name: &str, symbol: &str) -> FunctionDecl {
	FunctionDecl {
		name: name.to_owned(),
		symbol: symbol.to_owned(),
		params: F::params(),
		returns: ReturnDescriptor::Primitive(F::returns()),
	}
}

fn check_args(decl: &FunctionDecl, args: &[Value]) -> Result<()> {
	if args.len() != decl.params.len() {
		return Err(Error::mismatch(
			&decl.name,
			Mismatch::Arity {
				expected: decl.params.len(),
				found: args.len(),
			},
		));
	}
	match decl.params.iter().zip(args).position(|(ty, arg)| !arg.fits(*ty)) {
		Some(index) => Err(Error::mismatch(
			&decl.name,
			Mismatch::Argument {
				index,
				expected: decl.params[index],
				found: args[index].kind(),
			},
		)),
		None => Ok(()),
	}
}

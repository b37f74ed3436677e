// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use once_cell::sync::OnceCell;

use crate::abi::cast_symbol;
use crate::error::Result;
use crate::load::Loader;
use crate::LibLock;

/// A function pointer resolved from a [`LibLock`] the first time it's needed.
///
/// This is what [`nicelink`](crate::nicelink) generates for every declaration,
/// but it can be used safely without the macro.
/// `F` can be anything as long as it's the size of a function pointer.
///
/// # Examples
///
/// ```no_run
/// # use nicelink::*;
/// static LIBC: LibLock = LibLock::new("c");
/// static ABS: LazyFn<unsafe extern "C" fn(i32) -> i32> = LazyFn::new("abs");
///
/// let abs = ABS.link(&LIBC).unwrap();
/// assert_eq!(unsafe { abs(-4) }, 4);
/// ```
#[derive(Debug)]
pub struct LazyFn<F: 'static> {
	symbol: &'static str,
	addr: OnceCell<F>,
}

impl<F: Copy + 'static> LazyFn<F> {
	#[inline]
	pub const fn new(symbol: &'static str) -> Self {
		Self {
			symbol,
			addr: OnceCell::new(),
		}
	}

	#[inline]
	pub const fn symbol(&self) -> &'static str {
		self.symbol
	}

	/// If successful, stores the address and returns it.
	///
	/// Resolves `lib` first if nobody has yet. Failures are not cached.
	///
	/// # Errors
	/// Whatever [`LibLock::get`] returns, or [`Error::SymbolNotFound`](crate::Error::SymbolNotFound).
	pub fn link<L: Loader>(&self, lib: &LibLock<L>) -> Result<F> {
		self.addr
			.get_or_try_init(|| {
				let library = lib.get()?;
				let symbol = unsafe { library.symbol(self.symbol)? };
				log::trace!("linked `{}` from {}", self.symbol, library.path().display());
				// declarations are trusted to match the symbol's real type.
				Ok(unsafe { cast_symbol::<F>(symbol) })
			})
			.copied()
	}

	/// The address, if it has already been linked.
	#[inline]
	pub fn try_get(&self) -> Option<F> {
		self.addr.get().copied()
	}
}

// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use super::*;
use crate::os::imp;

unsafe impl Loader for This {
	/// Does not increment reference count to handle.
	unsafe fn open(_: &OsStr) -> io::Result<Self> {
		imp::dylib_this().map(Self)
	}

	unsafe fn symbol(&self, name: &str) -> io::Result<Symbol> {
		imp::dylib_symbol(self.0, name).map(Symbol)
	}
}

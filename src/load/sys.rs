// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use super::*;
use crate::os::imp;

unsafe impl Loader for System {
	/// If successful, increments reference count to shared library handle, and constructs `System`.
	unsafe fn open(path: &OsStr) -> io::Result<Self> {
		imp::dylib_open(path).map(Self)
	}

	unsafe fn symbol(&self, name: &str) -> io::Result<Symbol> {
		imp::dylib_symbol(self.0, name).map(Symbol)
	}
}

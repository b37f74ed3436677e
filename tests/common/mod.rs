// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
#![allow(dead_code)]

// An in-memory loader whose "libraries" export plain Rust functions.

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, c_void, OsStr};
use std::io;
use std::path::PathBuf;
use std::ptr;

use nicelink::load::Loader;
use nicelink::*;

/// The only path `FakeLoader` can open.
pub const FAKE_PATH: &str = "/usr/lib/libFoo.so";

#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub struct Version {
	pub major: u8,
	pub minor: u8,
	pub patch: u8,
}

pub static VERSION: Version = Version {
	major: 1,
	minor: 2,
	patch: 3,
};

thread_local! {
	static OPENED: RefCell<Vec<PathBuf>> = const { RefCell::new(Vec::new()) };
	static VERSION_CALLS: Cell<usize> = const { Cell::new(0) };
	static ADD_CALLS: Cell<usize> = const { Cell::new(0) };
	static LOOKUPS: Cell<usize> = const { Cell::new(0) };
}

/// Every path this thread handed to `FakeLoader::open`, in order.
pub fn opened() -> Vec<PathBuf> {
	OPENED.with(|opened| opened.borrow().clone())
}

pub fn version_calls() -> usize {
	VERSION_CALLS.with(Cell::get)
}

pub fn add_calls() -> usize {
	ADD_CALLS.with(Cell::get)
}

/// How many times this thread asked a `FakeLoader` for a symbol.
pub fn lookups() -> usize {
	LOOKUPS.with(Cell::get)
}

#[derive(Debug)]
pub struct FakeLoader {
	path: PathBuf,
}

unsafe impl Loader for FakeLoader {
	unsafe fn open(path: &OsStr) -> io::Result<Self> {
		OPENED.with(|opened| opened.borrow_mut().push(PathBuf::from(path)));
		if path == OsStr::new(FAKE_PATH) {
			Ok(Self {
				path: PathBuf::from(path),
			})
		} else {
			Err(io::Error::new(
				io::ErrorKind::NotFound,
				format!("{}: cannot open shared object file", path.to_string_lossy()),
			))
		}
	}

	unsafe fn symbol(&self, name: &str) -> io::Result<Symbol> {
		LOOKUPS.with(|lookups| lookups.set(lookups.get() + 1));
		let addr = match name {
			"lib_get_version" => lib_get_version as *const (),
			"lookup_missing" => lookup_missing as *const (),
			"add" => add as *const (),
			"sub" => sub as *const (),
			"Foo_Init" => foo_init as *const (),
			"greeting" => greeting as *const (),
			"nothing" => nothing as *const (),
			"scale" => scale as *const (),
			"version_sum" => version_sum as *const (),
			_ => ptr::null(),
		};
		Symbol::new(addr.cast_mut().cast()).ok_or_else(|| {
			io::Error::new(
				io::ErrorKind::NotFound,
				format!("{}: undefined symbol: {name}", self.path.display()),
			)
		})
	}
}

/// Resolves the fake library through the default linux paths.
pub fn fake_library() -> Library<FakeLoader> {
	LIBRARY_PATHS
		.resolve::<FakeLoader>("Foo", "linux")
		.expect("fake library should resolve")
}

pub static FAKE_TABLE: PathTable = PathTable::new(&[OsFamily {
	name: "fake",
	matches: &[std::env::consts::OS],
	templates: &["/usr/local/lib/lib[LIB].so", "/usr/lib/lib[LIB].so"],
}]);

pub fn version_layout() -> std::sync::Arc<StructLayout> {
	StructLayout::build("Version")
		.field("major", AbiType::U8)
		.field("minor", AbiType::U8)
		.field("patch", AbiType::U8)
		.finish()
}

pub extern "C" fn lib_get_version() -> *const Version {
	VERSION_CALLS.with(|calls| calls.set(calls.get() + 1));
	&VERSION
}

pub extern "C" fn lookup_missing() -> *const Version {
	ptr::null()
}

pub extern "C" fn add(a: i32, b: i32) -> i32 {
	ADD_CALLS.with(|calls| calls.set(calls.get() + 1));
	a + b
}

pub extern "C" fn sub(a: i32, b: i32) -> i32 {
	a - b
}

pub extern "C" fn foo_init(flags: u32) -> i32 {
	flags as i32
}

pub extern "C" fn greeting() -> *const c_char {
	b"hello\0".as_ptr().cast()
}

pub extern "C" fn nothing() -> *const c_char {
	ptr::null()
}

pub extern "C" fn scale(x: f64) -> f64 {
	x * 2.5
}

pub extern "C" fn version_sum(version: *const c_void) -> u32 {
	let version = unsafe { &*version.cast::<Version>() };
	u32::from(version.major) + u32::from(version.minor) + u32::from(version.patch)
}

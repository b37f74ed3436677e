// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
#![cfg(target_os = "macos")]

use std::ffi::{c_char, c_int};
use std::path::{Path, PathBuf};

use nicelink::*;

// system libraries live in the dyld cache, not on disk.
static DARWIN: PathTable = PathTable::new(&[OsFamily {
	name: "darwin",
	matches: &["macos"],
	templates: &[
		"/usr/lib/lib[LIB].B.dylib",
		"/System/Library/Frameworks/[LIB].framework/[LIB]",
	],
}]);

static LIBSYSTEM: LibLock = LibLock::with_table("System", &DARWIN);

#[nicelink(library = LIBSYSTEM)]
extern "C" {
	fn atoi(s: *const c_char) -> c_int;
}

#[test]
fn test_resolve_libsystem() {
	let lib = LIBSYSTEM.get().unwrap();
	assert_eq!(lib.path(), Path::new("/usr/lib/libSystem.B.dylib"));
	assert!(unsafe { lib.symbol("malloc") }.is_ok());
}

#[test]
fn test_macro_atoi() {
	assert_eq!(unsafe { atoi(b"42\0".as_ptr().cast()) }.unwrap(), 42);
}

#[test]
fn test_framework_fallback() {
	let lib = DARWIN.resolve::<load::System>("CoreFoundation", "macos").unwrap();
	assert_eq!(
		lib.path(),
		Path::new("/System/Library/Frameworks/CoreFoundation.framework/CoreFoundation")
	);

	let mut dispatch = Dispatch::new(&lib);
	dispatch.attach::<unsafe extern "C" fn() -> f64>("AbsoluteTime", "CFAbsoluteTimeGetCurrent");
	let Value::F64(now) = unsafe { dispatch.call("AbsoluteTime", &[]) }.unwrap() else {
		panic!("expected a double");
	};
	// seconds since 2001.
	assert!(now > 0.0);
}

#[test]
fn test_default_darwin_candidates() {
	let paths = LIBRARY_PATHS.candidates("SDL", std::env::consts::OS).unwrap();
	assert_eq!(paths.first(), Some(&PathBuf::from("/usr/local/lib/libSDL.dylib")));
	assert_eq!(paths.last(), Some(&PathBuf::from("SDL")));
	if let Some(home) = home::home_dir() {
		assert!(paths.contains(&home.join("Library/Frameworks/SDL.framework/SDL")));
	}
}

// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
#![cfg(windows)]

use std::path::Path;

use nicelink::*;

static KERNEL32: LibLock = LibLock::new("kernel32");

#[nicelink(library = KERNEL32)]
extern "system" {
	fn SetLastError(code: u32);
	fn GetLastError() -> u32;
}

#[test]
fn test_resolve_kernel32() {
	let lib = LIBRARY_PATHS.resolve::<load::System>("kernel32", "windows").unwrap();
	assert_eq!(lib.path(), Path::new("C:\\windows\\system32\\kernel32.dll"));
	assert!(unsafe { lib.symbol("GetProcAddress") }.is_ok());
	assert!(matches!(
		unsafe { lib.symbol("nicelink_no_such_symbol") },
		Err(Error::SymbolNotFound { .. })
	));
}

#[test]
fn test_missing_library_reports_every_attempt() {
	let err = LIBRARY_PATHS
		.resolve::<load::System>("nicelink-missing", "windows")
		.unwrap_err();
	let Error::LibraryNotFound { attempts, .. } = &err else {
		panic!("expected LibraryNotFound, got {err:?}");
	};
	let family = LIBRARY_PATHS.family("windows").unwrap();
	assert_eq!(attempts.len(), family.templates.len());
	assert_eq!(attempts.0[0].path, Path::new("C:\\windows\\system32\\nicelink-missing.dll"));
}

#[test]
fn test_macro() {
	unsafe {
		// link both first, so nothing touches the error code in between.
		GetLastError().unwrap();
		SetLastError(53).unwrap();
		assert_eq!(GetLastError().unwrap(), 53);
	}
}

#[test]
fn test_dispatch_kernel32() {
	let lib = KERNEL32.get().unwrap();
	let mut dispatch = Dispatch::new(lib);
	dispatch.attach::<unsafe extern "C" fn() -> u32>("ProcessId", "GetCurrentProcessId");
	let pid = unsafe { dispatch.call("ProcessId", &[]) }.unwrap();
	assert_eq!(pid, Value::U32(std::process::id()));
}

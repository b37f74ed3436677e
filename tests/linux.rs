// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
#![cfg(all(target_os = "linux", target_env = "gnu"))]

use std::ffi::{c_char, c_int, c_long, c_void, CString};
use std::mem::{align_of, offset_of, size_of};

use nicelink::*;

// glibc's soname; the loader finds it on its own search path.
static GLIBC: PathTable = PathTable::new(&[OsFamily {
	name: "glibc",
	matches: &["linux"],
	templates: &["lib[LIB].so.6"],
}]);

static LIBC: LibLock = LibLock::with_table("c", &GLIBC);

#[nicelink(library = LIBC)]
extern "C" {
	fn atoi(s: *const c_char) -> c_int;
	#[typed_pointer]
	fn gmtime(time: *const libc::time_t) -> *mut libc::tm;
	#[typed_pointer(nullable)]
	#[link_name = "getenv"]
	fn lookup_env(name: *const c_char) -> *const c_char;
}

#[test]
fn test_resolve_glibc() {
	let lib = GLIBC.resolve::<load::System>("c", "linux").unwrap();
	assert_eq!(lib.path(), std::path::Path::new("libc.so.6"));
	assert!(unsafe { lib.symbol("atoi") }.is_ok());
	assert!(matches!(
		unsafe { lib.symbol("nicelink_no_such_symbol") },
		Err(Error::SymbolNotFound { .. })
	));
}

#[test]
fn test_missing_library_reports_reason() {
	let err = GLIBC.resolve::<load::System>("nicelink-missing", "linux").unwrap_err();
	let Error::LibraryNotFound { attempts, .. } = &err else {
		panic!("expected LibraryNotFound, got {err:?}");
	};
	assert_eq!(attempts.len(), 1);
	assert!(!attempts.0[0].reason.is_empty());
}

#[test]
fn test_macro_atoi() {
	let five = unsafe { atoi(b"5\0".as_ptr().cast()) }.unwrap();
	assert_eq!(five, 5);
	assert!(LIBC.try_get().is_some());
}

#[test]
fn test_macro_gmtime() {
	let epoch: libc::time_t = 0;
	let tm = unsafe { gmtime(&epoch) }.unwrap();
	assert_eq!(tm.tm_year, 70);
	assert_eq!(tm.tm_mon, 0);
	assert_eq!(tm.tm_mday, 1);
}

#[test]
fn test_macro_nullable_getenv() {
	let name = CString::new("NICELINK_SURELY_UNSET_VARIABLE").unwrap();
	assert!(unsafe { lookup_env(name.as_ptr()) }.unwrap().is_none());
}

fn tm_layout() -> std::sync::Arc<StructLayout> {
	StructLayout::build("tm")
		.field("tm_sec", AbiType::I32)
		.field("tm_min", AbiType::I32)
		.field("tm_hour", AbiType::I32)
		.field("tm_mday", AbiType::I32)
		.field("tm_mon", AbiType::I32)
		.field("tm_year", AbiType::I32)
		.field("tm_wday", AbiType::I32)
		.field("tm_yday", AbiType::I32)
		.field("tm_isdst", AbiType::I32)
		.field("tm_gmtoff", AbiType::LONG)
		.field("tm_zone", AbiType::CStr)
		.finish()
}

#[test]
fn test_tm_layout_matches_glibc() {
	let tm = tm_layout();
	assert_eq!(tm.size(), size_of::<libc::tm>());
	assert_eq!(tm.align(), align_of::<libc::tm>());
	assert_eq!(tm.offset_of("tm_gmtoff"), Some(offset_of!(libc::tm, tm_gmtoff)));
	assert_eq!(tm.offset_of("tm_zone"), Some(offset_of!(libc::tm, tm_zone)));
}

#[test]
fn test_dispatch_glibc() {
	let lib = LIBC.get().unwrap();
	let tm = tm_layout();

	let mut dispatch = Dispatch::new(lib);
	dispatch
		.attach::<unsafe extern "C" fn(*const c_char) -> c_int>("Atoi", "atoi")
		.attach::<unsafe extern "C" fn(*const c_char) -> usize>("StrLen", "strlen")
		.attach::<unsafe extern "C" fn(*const c_char) -> *const c_char>("GetEnv", "getenv")
		.attach_typed::<unsafe extern "C" fn(*const c_void, *mut c_void) -> *mut c_void>(
			"GmTime",
			"gmtime_r",
			TypedPointer::non_null(&tm),
		)
		.unwrap();
	assert_eq!(dispatch.declaration("StrLen").unwrap().returns.native(), AbiType::SIZE);

	// `gmtime_r` fills all of it.
	let out = RecordBuf::new(tm);
	assert_eq!(out.layout().size(), size_of::<libc::tm>());
	let day: libc::time_t = 86_400;
	unsafe {
		let digits = Value::Str(CString::new("1234").unwrap());
		assert_eq!(dispatch.call("Atoi", &[digits.clone()]).unwrap(), Value::I32(1234));
		assert_eq!(dispatch.call("StrLen", &[digits]).unwrap(), 4usize.into_value());

		let unset = Value::Str(CString::new("NICELINK_SURELY_UNSET_VARIABLE").unwrap());
		assert_eq!(dispatch.call("GetEnv", &[unset]).unwrap(), Value::Absent);

		let time = Value::Pointer((&day as *const libc::time_t).cast_mut().cast());
		let result = dispatch.call("GmTime", &[time, Value::Pointer(out.as_ptr())]).unwrap();
		let record = result.as_record().unwrap();
		// `gmtime_r` hands back the buffer it was given.
		assert_eq!(record.as_ptr(), out.as_ptr());
		assert_eq!(record.get("tm_mday").unwrap(), Value::I32(2));
		assert_eq!(out.get("tm_year").unwrap(), Value::I32(70));
		assert_eq!(out.get("tm_gmtoff").unwrap(), c_long::default().into_value());
		assert_eq!(out.get("tm_zone").unwrap(), Value::Str(CString::new("GMT").unwrap()));
	}
}

#[test]
fn test_this_process() {
	static PROCESS: LibLock<load::This> = LibLock::this();
	static ATOI: LazyFn<unsafe extern "C" fn(*const c_char) -> c_int> = LazyFn::new("atoi");

	let atoi = ATOI.link(&PROCESS).unwrap();
	assert_eq!(unsafe { atoi(b"-17\0".as_ptr().cast()) }, -17);
	assert!(ATOI.try_get().is_some());
}

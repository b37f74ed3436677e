// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

mod common;

use std::ptr;

use common::*;
use nicelink::*;

static FAKE: LibLock<FakeLoader> = LibLock::with_table("Foo", &FAKE_TABLE);
static ADD: LazyFn<unsafe extern "C" fn(i32, i32) -> i32> = LazyFn::new("add");

#[test]
fn test_liblock_resolves_once() {
	let libs: Vec<usize> = std::thread::scope(|s| {
		let handles: Vec<_> = (0..8)
			.map(|i| {
				s.spawn(move || {
					let lib = FAKE.get().unwrap();
					let add = ADD.link(&FAKE).unwrap();
					assert_eq!(unsafe { add(i, 1) }, i + 1);
					lib as *const Library<FakeLoader> as usize
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});
	assert!(libs.windows(2).all(|pair| pair[0] == pair[1]));
	assert!(ptr::eq(FAKE.try_get().unwrap(), libs[0] as *const Library<FakeLoader>));
}

#[test]
fn test_failed_resolution_is_retried() {
	static MISSING: LibLock<FakeLoader> = LibLock::with_table("Missing", &FAKE_TABLE);
	std::thread::scope(|s| {
		for _ in 0..4 {
			s.spawn(|| {
				assert!(matches!(MISSING.get(), Err(Error::LibraryNotFound { .. })));
				// nothing is cached, so this thread tried every candidate itself.
				assert_eq!(opened().len(), FAKE_TABLE.families()[0].templates.len());
			});
		}
	});
	assert!(MISSING.try_get().is_none());
}

#[test]
fn test_dispatch_is_shared_between_threads() {
	let lib = fake_library();
	let mut dispatch = Dispatch::new(&lib);
	dispatch.attach::<unsafe extern "C" fn(i32, i32) -> i32>("Add", "add");
	let dispatch = &dispatch;
	std::thread::scope(|s| {
		for i in 0..4 {
			s.spawn(move || {
				let sum = unsafe { dispatch.call("Add", &[Value::I32(i), Value::I32(i)]) }.unwrap();
				assert_eq!(sum, Value::I32(2 * i));
			});
		}
	});
}

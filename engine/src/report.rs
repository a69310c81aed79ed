//! Structured reporting of statistics and running times as JSON.
//!
//! Reporting is organized as a stack of contexts which is manipulated through RAII guards,
//! so the resulting JSON document is roughly isomorph to the call graph of the algorithms.
//! Nothing is recorded unless `enable_reporting` was called on the current thread.
//! The finished document is printed to stdout when the `ReportingGuard` is dropped.
//! Reporting is thread local, values reported from rayon worker threads are lost.

use crate::built_info;
use serde_json::{Map, Value};
use std::cell::RefCell;

pub use serde_json::json;

#[derive(Debug)]
enum Frame {
    Object(Map<String, Value>),
    Collection(Vec<Value>),
    Blocked,
}

#[derive(Debug)]
struct Reporter {
    // each frame remembers the key it will be stored under in its parent, collection items have none
    stack: Vec<(Option<String>, Frame)>,
}

impl Default for Reporter {
    fn default() -> Self {
        Reporter {
            stack: vec![(None, Frame::Object(Map::new()))],
        }
    }
}

impl Reporter {
    fn is_blocked(&self) -> bool {
        matches!(self.stack.last(), Some((_, Frame::Blocked)))
    }

    fn push_object(&mut self, key: String) {
        if self.is_blocked() {
            self.stack.push((None, Frame::Blocked));
            return;
        }
        assert!(matches!(self.stack.last(), Some((_, Frame::Object(_)))), "Cannot create object at key in collection");
        self.stack.push((Some(key), Frame::Object(Map::new())));
    }

    fn push_collection(&mut self, key: String) {
        if self.is_blocked() {
            self.stack.push((None, Frame::Blocked));
            return;
        }
        assert!(
            matches!(self.stack.last(), Some((_, Frame::Object(_)))),
            "Cannot create collection at key in collection"
        );
        self.stack.push((Some(key), Frame::Collection(Vec::new())));
    }

    fn push_collection_item(&mut self) {
        if self.is_blocked() {
            self.stack.push((None, Frame::Blocked));
            return;
        }
        assert!(
            matches!(self.stack.last(), Some((_, Frame::Collection(_)))),
            "Cannot create collection item in object"
        );
        self.stack.push((None, Frame::Object(Map::new())));
    }

    fn block(&mut self) {
        self.stack.push((None, Frame::Blocked));
    }

    fn report(&mut self, key: String, val: Value) {
        match self.stack.last_mut() {
            Some((_, Frame::Object(object))) => {
                let prev = object.insert(key, val);
                if !cfg!(feature = "report-allow-override") {
                    assert!(prev.is_none());
                }
            }
            Some((_, Frame::Collection(_))) => panic!("Cannot report value on collection"),
            Some((_, Frame::Blocked)) | None => (),
        }
    }

    fn pop(&mut self) {
        assert!(self.stack.len() > 1, "tried to pop root context");
        let (key, frame) = self.stack.pop().expect("stack has more than one frame");
        let value = match frame {
            Frame::Object(object) => Value::Object(object),
            Frame::Collection(collection) => Value::Array(collection),
            Frame::Blocked => return,
        };
        match (self.stack.last_mut(), key) {
            (Some((_, Frame::Object(parent))), Some(key)) => {
                let prev = parent.insert(key, value);
                assert_eq!(prev, None);
            }
            (Some((_, Frame::Collection(parent))), None) => parent.push(value),
            _ => panic!("Inconsistent context stack"),
        }
    }

    fn finish(&mut self) -> Value {
        assert_eq!(self.stack.len(), 1, "unclosed reporting contexts");
        match self.stack.pop() {
            Some((_, Frame::Object(object))) => Value::Object(object),
            _ => panic!("broken root object for reporting"),
        }
    }
}

thread_local! {
    static REPORTER: RefCell<Option<Reporter>> = RefCell::new(None);
}

fn with_reporter(f: impl FnOnce(&mut Reporter)) {
    REPORTER.with(|reporter| {
        if let Some(r) = reporter.borrow_mut().as_mut() {
            f(r)
        }
    });
}

#[must_use]
pub struct ContextGuard(());

impl Drop for ContextGuard {
    fn drop(&mut self) {
        with_reporter(Reporter::pop);
    }
}

/// Everything reported while the guard lives ends up in an object under `key`.
pub fn push_context(key: String) -> ContextGuard {
    with_reporter(|r| r.push_object(key));
    ContextGuard(())
}

#[must_use]
pub struct CollectionContextGuard(());

impl Drop for CollectionContextGuard {
    fn drop(&mut self) {
        with_reporter(Reporter::pop);
    }
}

pub fn push_collection_context(key: String) -> CollectionContextGuard {
    with_reporter(|r| r.push_collection(key));
    CollectionContextGuard(())
}

impl CollectionContextGuard {
    pub fn push_collection_item(&mut self) -> CollectionItemContextGuard {
        with_reporter(Reporter::push_collection_item);
        CollectionItemContextGuard(self)
    }
}

#[must_use]
pub struct CollectionItemContextGuard<'a>(&'a CollectionContextGuard);

impl<'a> Drop for CollectionItemContextGuard<'a> {
    fn drop(&mut self) {
        with_reporter(Reporter::pop);
    }
}

#[must_use]
pub struct BlockedReportingContextGuard(());

impl Drop for BlockedReportingContextGuard {
    fn drop(&mut self) {
        with_reporter(Reporter::pop);
    }
}

/// Suppress all reporting while the guard lives.
pub fn block_reporting() -> BlockedReportingContextGuard {
    with_reporter(Reporter::block);
    BlockedReportingContextGuard(())
}

pub fn report(key: String, val: Value) {
    if cfg!(feature = "report-to-stderr") {
        eprintln!("{}: {}", key, val);
    }
    report_silent(key, val)
}

pub fn report_silent(key: String, val: Value) {
    with_reporter(|r| r.report(key, val));
}

#[must_use]
pub struct ReportingGuard(());

impl Drop for ReportingGuard {
    fn drop(&mut self) {
        REPORTER.with(|reporter| {
            if let Some(mut r) = reporter.borrow_mut().take() {
                println!("{}", r.finish());
            }
        });
    }
}

#[macro_export]
macro_rules! report {
    ($k:expr, $($json:tt)+) => { $crate::report::report($k.to_string(), $crate::report::json!($($json)+)) };
}

#[macro_export]
macro_rules! report_silent {
    ($k:expr, $($json:tt)+) => { $crate::report::report_silent($k.to_string(), $crate::report::json!($($json)+)) };
}

/// Start recording reported values on this thread.
/// The returned guard prints the whole document when dropped.
pub fn enable_reporting(program: &str) -> ReportingGuard {
    REPORTER.with(|reporter| reporter.replace(Some(Reporter::default())));

    report!("git_revision", built_info::GIT_VERSION.unwrap_or(""));
    report!("build_target", built_info::TARGET);
    report!("build_profile", built_info::PROFILE);
    report!("feature_flags", built_info::FEATURES_STR);
    report!("build_time", built_info::BUILT_TIME_UTC);
    report!("build_with_rustc", built_info::RUSTC_VERSION);

    if let Ok(hostname) = std::process::Command::new("hostname").output() {
        report!("hostname", String::from_utf8_lossy(&hostname.stdout).trim());
    }

    report!("program", program);
    if let Ok(since_epoch) = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        report!("start_time_unix_s", since_epoch.as_secs());
    }
    report!("args", std::env::args().collect::<Vec<String>>());

    ReportingGuard(())
}

/// Take the document recorded so far on this thread and stop reporting.
/// Unlike dropping the `ReportingGuard`, nothing is printed.
pub fn take_report() -> Option<Value> {
    REPORTER.with(|reporter| reporter.borrow_mut().take().map(|mut r| r.finish()))
}

pub mod benchmark;
pub use benchmark::*;

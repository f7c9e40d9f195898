pub mod selector;
pub mod syntax;
pub mod urls;

// Re-exports so other crates can just use `css::...` nicely.
pub use selector::{SelectorList, SelectorParseError};
pub use syntax::{Declaration, parse_declarations, serialize_declarations, split_rule};
pub use urls::{absolute_to_stylesheet, extract_origin, is_relative_path};

/// Collects `css.*` log lines emitted on the current thread.
#[cfg(test)]
mod test_log {
    use log::{LevelFilter, Log, Metadata, Record};
    use std::cell::RefCell;
    use std::sync::Once;

    thread_local! {
        static LINES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    struct Capture;

    impl Log for Capture {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.target().starts_with("css.")
        }

        fn log(&self, record: &Record<'_>) {
            if self.enabled(record.metadata()) {
                LINES.with(|lines| {
                    lines
                        .borrow_mut()
                        .push(format!("{}: {}", record.target(), record.args()))
                });
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: Capture = Capture;

    pub(crate) fn capture(run: impl FnOnce()) -> Vec<String> {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            if log::set_logger(&LOGGER).is_ok() {
                log::set_max_level(LevelFilter::Debug);
            }
        });
        LINES.with(|lines| lines.borrow_mut().clear());
        run();
        LINES.with(|lines| lines.take())
    }
}

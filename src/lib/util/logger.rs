//! `slog` logger construction: a discarding logger by default, a pretty
//! terminal drain when the caller asks for debug output.

use slog::{o, Discard, Drain, Logger};

pub fn build_logger(debug: bool) -> Logger {
    if debug {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::CompactFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Logger::root(drain, o!())
    } else {
        Logger::root(Discard, o!())
    }
}

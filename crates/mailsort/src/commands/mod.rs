//! Single remote calls addressed by verb name

mod call;

pub use call::{CallArgs, CallTable, Handler, parse_argument, parse_call_line};

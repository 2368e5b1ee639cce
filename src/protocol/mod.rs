//! MPD wire protocol: framing, error lines, command encoding and response
//! shape inference. Nothing in here owns a connection.

pub mod encode;
pub mod error;
pub mod frame;
pub mod parser;
pub mod shape;

pub use encode::{encode_command, quote_arg};
pub use error::{AckCode, AckError, MpdError, Result};
pub use frame::{parse_greeting, read_batch, read_frame, Frame, Line};
pub use parser::{parse, Groups, ListItem, MultiRecord, ParsedValue, Record};
pub use shape::{ResponseShapes, Shape};

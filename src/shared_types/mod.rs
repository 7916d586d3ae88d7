pub mod call_kind;
pub mod status_code;

pub use call_kind::CallKind;
pub use status_code::Code;

//! ---
//! gse_section: "02-messaging-data-model"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Item model, transport adapters, and dictionary helpers."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric identifier of a telemetry channel.
pub type ChannelId = u32;
/// Numeric identifier of an event.
pub type EventId = u32;
/// Numeric identifier of a command.
pub type Opcode = u32;

/// Decoded value carried by a telemetry point or an event argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer too large for `Int`.
    UInt(u64),
    /// Floating point sample.
    Float(f64),
    /// Text value.
    Str(String),
    /// Ordered sequence, used for event argument lists.
    List(Vec<Value>),
}

impl Value {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Exact integer view of the value, if it is an integer.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(i128::from(*v)),
            Value::UInt(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    /// Borrow the value as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the value as a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $target:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

value_from! {
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => Str as String,
    &str => Str as String,
}

/// Unsigned values that fit an `i64` are stored as `Int`, so identity checks
/// do not depend on the integer type the caller wrote.
impl From<u64> for Value {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Value::UInt(value), Value::Int)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// One decoded item popped from the transport queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawItem {
    /// Telemetry channel update.
    Telemetry {
        /// Channel identifier, resolved through the dictionary.
        id: ChannelId,
        /// Decoded sample.
        value: Value,
    },
    /// Event record with its decoded arguments.
    Event {
        /// Event identifier, resolved through the dictionary.
        id: EventId,
        /// Decoded arguments in declaration order.
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl RawItem {
    /// Construct a telemetry item.
    pub fn telemetry(id: ChannelId, value: impl Into<Value>) -> Self {
        RawItem::Telemetry {
            id,
            value: value.into(),
        }
    }

    /// Construct an event item.
    pub fn event<I, V>(id: EventId, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        RawItem::Event {
            id,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Convenience accessor returning the item kind as a static string.
    pub fn kind(&self) -> &'static str {
        match self {
            RawItem::Telemetry { .. } => "telemetry",
            RawItem::Event { .. } => "event",
        }
    }

    /// Numeric identifier of the item.
    pub fn id(&self) -> u32 {
        match self {
            RawItem::Telemetry { id, .. } | RawItem::Event { id, .. } => *id,
        }
    }
}

/// Command dispatched towards the system under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Opcode resolved from the mnemonic.
    pub opcode: Opcode,
    /// Mnemonic the caller used.
    pub mnemonic: String,
    /// Arguments in declaration order.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Command {
    /// Construct a new command.
    pub fn new(opcode: Opcode, mnemonic: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            opcode,
            mnemonic: mnemonic.into(),
            args,
        }
    }
}

/// Transport verdict on a command send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandStatus {
    /// The command left the ground system.
    Sent,
    /// The transport refused the command.
    Rejected {
        /// Reason reported by the transport.
        reason: String,
    },
}

impl CommandStatus {
    /// Whether the command was handed to the system under test.
    pub fn is_sent(&self) -> bool {
        matches!(self, CommandStatus::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_items_decode_from_tagged_json() {
        let item: RawItem =
            serde_json::from_str(r#"{"kind":"event","id":7,"args":[1,"ok",2.5]}"#)
                .expect("event decodes");
        assert_eq!(
            item,
            RawItem::Event {
                id: 7,
                args: vec![Value::Int(1), Value::Str("ok".into()), Value::Float(2.5)],
            }
        );
        assert_eq!(item.kind(), "event");
        assert_eq!(item.id(), 7);
    }

    #[test]
    fn event_args_default_to_empty() {
        let item: RawItem = serde_json::from_str(r#"{"kind":"event","id":3}"#).expect("decodes");
        assert_eq!(item, RawItem::event(3, Vec::<Value>::new()));
    }

    #[test]
    fn large_unsigned_values_keep_their_width() {
        let value: Value = serde_json::from_str("18446744073709551615").expect("decodes");
        assert_eq!(value, Value::UInt(u64::MAX));
        assert_eq!(value.as_i128(), Some(i128::from(u64::MAX)));
        assert_eq!(Value::from(u64::MAX), Value::UInt(u64::MAX));
    }

    #[test]
    fn small_unsigned_values_are_stored_as_int() {
        assert_eq!(Value::from(5u64), Value::Int(5));
        assert_eq!(Value::from(i64::MAX as u64), Value::Int(i64::MAX));
        assert_eq!(Value::from(i64::MAX as u64 + 1), Value::UInt(1 << 63));
    }

    #[test]
    fn display_renders_lists_and_strings() {
        let value = Value::from(vec![Value::from(4u32), Value::from("done")]);
        assert_eq!(value.to_string(), r#"[4, "done"]"#);
    }

    #[test]
    fn command_status_reports_sent() {
        assert!(CommandStatus::Sent.is_sent());
        assert!(!CommandStatus::Rejected {
            reason: "busy".into()
        }
        .is_sent());
    }
}

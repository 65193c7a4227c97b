use crate::{Error, Node};

// -----------------------------------------------------------------------------
// Operand
// -----------------------------------------------------------------------------
/// Input accepted by the fallible builders of [crate::Graph] and [Node].
///
/// Numbers and numeric texts are promoted to constant leaves before
/// any arithmetic runs.
#[derive(Debug, Clone)]
pub enum Operand {
    Node(Node),
    Number(f64),
    Text(String),
}

//
// conversion
//
impl From<Node> for Operand {
    #[inline]
    fn from(node: Node) -> Self {
        Operand::Node(node)
    }
}

impl From<&Node> for Operand {
    #[inline]
    fn from(node: &Node) -> Self {
        Operand::Node(node.clone())
    }
}

macro_rules! _define_number_conversion {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Operand {
                #[inline]
                fn from(v: $ty) -> Self {
                    Operand::Number(f64::from(v))
                }
            }
        )*
    };
}

_define_number_conversion!(f64, f32, i32, u32, i16, u16, i8, u8);

impl From<i64> for Operand {
    #[inline]
    fn from(v: i64) -> Self {
        Operand::Number(v as f64)
    }
}

impl From<&str> for Operand {
    #[inline]
    fn from(s: &str) -> Self {
        Operand::Text(s.to_string())
    }
}

impl From<String> for Operand {
    #[inline]
    fn from(s: String) -> Self {
        Operand::Text(s)
    }
}

#[cfg(feature = "json")]
impl TryFrom<&serde_json::Value> for Operand {
    type Error = Error;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        let type_name = match value {
            Value::Number(n) => {
                return n
                    .as_f64()
                    .map(Operand::Number)
                    .ok_or_else(|| Error::ConversionError {
                        input: n.to_string(),
                        reason: "number is not representable as f64".to_string(),
                    })
            }
            Value::String(s) => return Ok(Operand::Text(s.clone())),
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        Err(Error::InvalidOperandType {
            type_name: type_name.to_string(),
        })
    }
}

#[cfg(feature = "json")]
impl TryFrom<serde_json::Value> for Operand {
    type Error = Error;

    #[inline]
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Operand::try_from(&value)
    }
}

//
// methods
//
impl Operand {
    /// Numeric value of the operand, parsing texts.
    pub fn value(&self) -> Result<f64, Error> {
        match self {
            Operand::Node(node) => Ok(node.value()),
            Operand::Number(v) => Ok(*v),
            Operand::Text(s) => s.trim().parse().map_err(|e: std::num::ParseFloatError| {
                Error::ConversionError {
                    input: s.clone(),
                    reason: e.to_string(),
                }
            }),
        }
    }
}

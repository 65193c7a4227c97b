use std::fmt::Debug;

// -----------------------------------------------------------------------------
// GradFn
// -----------------------------------------------------------------------------
/// Local gradient of a user defined operation.
///
/// The closure receives the upstream gradient and must return one gradient
/// per operand, in the order the operands were given to [crate::Graph::custom].
/// It runs while the graph is borrowed, so it may read node values
/// but must not build or drop nodes.
pub type GradFn = Box<dyn Fn(f64) -> Vec<f64>>;

/// Offset inside the logarithms of the binary cross entropy.
pub(super) const BCE_EPS: f64 = 1e-4;

// -----------------------------------------------------------------------------
// _BinOp
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum _BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl _BinOp {
    #[inline]
    pub(super) fn _name(self) -> &'static str {
        match self {
            _BinOp::Add => "add",
            _BinOp::Sub => "sub",
            _BinOp::Mul => "mul",
            _BinOp::Div => "div",
        }
    }

    /// Evaluate the operator and bind the matching catalog entry.
    #[inline]
    pub(super) fn _forward(self, lhs: f64, rhs: f64) -> (f64, Op) {
        match self {
            _BinOp::Add => (lhs + rhs, Op::Add),
            _BinOp::Sub => (lhs - rhs, Op::Sub),
            _BinOp::Mul => (lhs * rhs, Op::Mul { lhs, rhs }),
            _BinOp::Div => (lhs / rhs, Op::Div { lhs, rhs }),
        }
    }
}

// -----------------------------------------------------------------------------
// Op
// -----------------------------------------------------------------------------
/// Local operation of a node.
///
/// Every value needed for differentiation is copied in when the node is built,
/// so the operation never reads its operands again.
pub(super) enum Op {
    // unary
    Neg,
    Exp { value: f64 },
    Log { arg: f64 },
    Sqrt { value: f64 },
    Powi { arg: f64, exp: i32 },
    Tanh { value: f64 },
    Bce { target: f64, prob: f64 },

    // binary
    Add,
    Sub,
    Mul { lhs: f64, rhs: f64 },
    Div { lhs: f64, rhs: f64 },

    // multi-ary
    Custom { name: String, grad_fn: GradFn },
}

impl Debug for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Neg => write!(f, "Neg"),
            Op::Exp { value } => f.debug_struct("Exp").field("value", value).finish(),
            Op::Log { arg } => f.debug_struct("Log").field("arg", arg).finish(),
            Op::Sqrt { value } => f.debug_struct("Sqrt").field("value", value).finish(),
            Op::Powi { arg, exp } => f
                .debug_struct("Powi")
                .field("arg", arg)
                .field("exp", exp)
                .finish(),
            Op::Tanh { value } => f.debug_struct("Tanh").field("value", value).finish(),
            Op::Bce { target, prob } => f
                .debug_struct("Bce")
                .field("target", target)
                .field("prob", prob)
                .finish(),
            Op::Add => write!(f, "Add"),
            Op::Sub => write!(f, "Sub"),
            Op::Mul { lhs, rhs } => f
                .debug_struct("Mul")
                .field("lhs", lhs)
                .field("rhs", rhs)
                .finish(),
            Op::Div { lhs, rhs } => f
                .debug_struct("Div")
                .field("lhs", lhs)
                .field("rhs", rhs)
                .finish(),
            Op::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

impl Op {
    /// Short label used in error messages and graph dumps.
    pub(super) fn _label(&self) -> String {
        match self {
            Op::Neg => "neg".to_string(),
            Op::Exp { .. } => "exp".to_string(),
            Op::Log { .. } => "log".to_string(),
            Op::Sqrt { .. } => "sqrt".to_string(),
            Op::Powi { exp, .. } => format!("^{exp}"),
            Op::Tanh { .. } => "tanh".to_string(),
            Op::Bce { .. } => "bce".to_string(),
            Op::Add => "+".to_string(),
            Op::Sub => "-".to_string(),
            Op::Mul { .. } => "*".to_string(),
            Op::Div { .. } => "/".to_string(),
            Op::Custom { name, .. } => name.clone(),
        }
    }

    /// Write the gradient of each operand into `out`, given the upstream gradient.
    ///
    /// Built-in entries always write exactly as many values as they have operands.
    /// Custom entries write whatever their closure returns and the caller checks the arity.
    pub(super) fn _local_grads(&self, grad: f64, out: &mut Vec<f64>) {
        out.clear();
        match self {
            Op::Neg => out.push(-grad),
            Op::Exp { value } => out.push(grad * value),
            Op::Log { arg } => out.push(grad / arg),
            Op::Sqrt { value } => out.push(grad * 0.5 / value),
            Op::Powi { exp: 0, .. } => out.push(0.0),
            Op::Powi { arg, exp } => out.push(grad * f64::from(*exp) * arg.powi(exp - 1)),
            Op::Tanh { value } => out.push(grad * (1.0 - value * value)),
            Op::Bce { target, prob } => out.push(
                grad * (-0.5 * target / (prob + BCE_EPS)
                    + 0.5 * (1.0 - target) / (1.0 - prob + BCE_EPS)),
            ),
            Op::Add => out.extend([grad, grad]),
            Op::Sub => out.extend([grad, -grad]),
            Op::Mul { lhs, rhs } => out.extend([grad * rhs, grad * lhs]),
            Op::Div { lhs, rhs } => out.extend([grad / rhs, -grad * lhs / (rhs * rhs)]),
            Op::Custom { grad_fn, .. } => out.extend(grad_fn(grad)),
        }
    }
}
